use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A finished match as stored by the stats service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    pub id: u64,
    pub score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counters submitted at the end of a match. Elapsed time is not
/// part of the stored shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_counts"))]
pub struct NewGameStats {
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub total_questions: u32,
}

fn validate_counts(stats: &NewGameStats) -> Result<(), ValidationError> {
    if stats.correct_answers > stats.total_questions {
        let mut err = ValidationError::new("correct_exceeds_total");
        err.message = Some("correctAnswers cannot exceed totalQuestions".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighScoreResponse {
    pub high_score: u32,
}
