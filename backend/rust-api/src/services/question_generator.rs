//! Arithmetic question construction.
//!
//! Each call is independent: pick an operator, draw operands according to the
//! tier's rules, derive a distractor that differs from the correct answer and
//! shuffle both into a two-slot option pair.

use rand::Rng;

use crate::models::{DifficultyTier, Operator, Question};

const ADVANCED_TENS: [u32; 5] = [10, 20, 30, 40, 50];
const ADVANCED_MAX_OFFSET: u32 = 20;

/// Largest correct answer a tier/operator pair can produce. Distractors stay
/// within `0..=max_answer`.
pub fn max_answer(tier: DifficultyTier, operator: Operator) -> u32 {
    match (tier, operator) {
        (DifficultyTier::Basic, Operator::Add) => 18,
        (DifficultyTier::Basic, Operator::Subtract) => 9,
        (DifficultyTier::Advanced, Operator::Add) => 59,
        (DifficultyTier::Advanced, Operator::Subtract) => 49,
    }
}

/// Generates a question with the thread-local RNG.
pub fn generate_question(tier: DifficultyTier) -> Question {
    generate(tier, &mut rand::rng())
}

pub fn generate<R: Rng + ?Sized>(tier: DifficultyTier, rng: &mut R) -> Question {
    let operator = if rng.random_bool(0.5) {
        Operator::Add
    } else {
        Operator::Subtract
    };
    generate_with_operator(tier, operator, rng)
}

pub(crate) fn generate_with_operator<R: Rng + ?Sized>(
    tier: DifficultyTier,
    operator: Operator,
    rng: &mut R,
) -> Question {
    let [lhs, rhs] = draw_operands(tier, operator, rng);
    let correct_answer = match operator {
        Operator::Add => lhs + rhs,
        // rhs <= lhs holds for every tier
        Operator::Subtract => lhs - rhs,
    };
    let distractor = draw_distractor(tier, operator, correct_answer, rng);

    let correct_index = rng.random_range(0..2usize);
    let mut options = [distractor; 2];
    options[correct_index] = correct_answer;

    Question {
        display: format!("{} {} {} = ?", lhs, operator.symbol(), rhs),
        operands: [lhs, rhs],
        operator,
        correct_answer,
        options,
        correct_index,
    }
}

fn draw_operands<R: Rng + ?Sized>(
    tier: DifficultyTier,
    operator: Operator,
    rng: &mut R,
) -> [u32; 2] {
    match tier {
        DifficultyTier::Basic => {
            let lhs = rng.random_range(0..=9);
            let rhs = match operator {
                Operator::Add => rng.random_range(0..=9),
                Operator::Subtract => rng.random_range(0..=lhs),
            };
            [lhs, rhs]
        }
        DifficultyTier::Advanced => {
            let lhs = ADVANCED_TENS[rng.random_range(0..ADVANCED_TENS.len())];
            [lhs, rng.random_range(1..=9)]
        }
    }
}

fn draw_distractor<R: Rng + ?Sized>(
    tier: DifficultyTier,
    operator: Operator,
    correct_answer: u32,
    rng: &mut R,
) -> u32 {
    let max = max_answer(tier, operator);
    match tier {
        // Uniform over the whole answer range. Every range holds at least ten
        // values, so the resample terminates.
        DifficultyTier::Basic => loop {
            let candidate = rng.random_range(0..=max);
            if candidate != correct_answer {
                return candidate;
            }
        },
        // Near miss: correct ± offset, flipped back into range at either edge.
        DifficultyTier::Advanced => {
            let correct = i64::from(correct_answer);
            let max = i64::from(max);
            loop {
                let offset = i64::from(rng.random_range(1..=ADVANCED_MAX_OFFSET));
                let mut candidate = if rng.random_bool(0.5) {
                    correct + offset
                } else {
                    correct - offset
                };
                if candidate < 0 {
                    candidate = correct + offset;
                }
                if candidate > max {
                    candidate = correct - offset;
                }
                if candidate != correct && (0..=max).contains(&candidate) {
                    return candidate as u32;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const RUNS: usize = 10_000;
    const TIERS: [DifficultyTier; 2] = [DifficultyTier::Basic, DifficultyTier::Advanced];
    const OPERATORS: [Operator; 2] = [Operator::Add, Operator::Subtract];

    fn assert_well_formed(tier: DifficultyTier, question: &Question) {
        let max = max_answer(tier, question.operator);
        assert_eq!(
            question.options[question.correct_index], question.correct_answer,
            "{:?}",
            question
        );
        let matching = question
            .options
            .iter()
            .filter(|&&option| option == question.correct_answer)
            .count();
        assert_eq!(matching, 1, "exactly one correct option: {:?}", question);
        assert_ne!(question.distractor(), question.correct_answer);
        assert!(question.distractor() <= max, "{:?}", question);
        assert!(question.correct_answer <= max, "{:?}", question);
        assert_eq!(
            question.operator.apply(question.operands[0], question.operands[1]),
            Some(question.correct_answer)
        );
    }

    #[test]
    fn every_tier_and_operator_produces_well_formed_questions() {
        let mut rng = StdRng::seed_from_u64(7);
        for tier in TIERS {
            for operator in OPERATORS {
                for _ in 0..RUNS {
                    let question = generate_with_operator(tier, operator, &mut rng);
                    assert_eq!(question.operator, operator);
                    assert_well_formed(tier, &question);
                }
            }
        }
    }

    #[test]
    fn basic_subtraction_never_goes_negative() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..RUNS {
            let question = generate_with_operator(DifficultyTier::Basic, Operator::Subtract, &mut rng);
            let [lhs, rhs] = question.operands;
            assert!(lhs <= 9);
            assert!(rhs <= lhs, "{:?}", question);
        }
    }

    #[test]
    fn basic_addition_uses_single_digits() {
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..RUNS {
            let question = generate_with_operator(DifficultyTier::Basic, Operator::Add, &mut rng);
            assert!(question.operands.iter().all(|&n| n <= 9), "{:?}", question);
        }
    }

    #[test]
    fn advanced_operands_are_tens_and_a_digit() {
        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..RUNS {
            let question = generate(DifficultyTier::Advanced, &mut rng);
            let [lhs, rhs] = question.operands;
            assert!(ADVANCED_TENS.contains(&lhs), "{:?}", question);
            assert!((1..=9).contains(&rhs), "{:?}", question);
        }
    }

    #[test]
    fn advanced_distractors_are_near_misses() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..RUNS {
            let question = generate(DifficultyTier::Advanced, &mut rng);
            let gap = question.distractor().abs_diff(question.correct_answer);
            assert!((1..=ADVANCED_MAX_OFFSET).contains(&gap), "{:?}", question);
        }
    }

    #[test]
    fn operator_and_slot_are_both_randomized() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut adds = 0;
        let mut left = 0;
        for _ in 0..1_000 {
            let question = generate(DifficultyTier::Basic, &mut rng);
            if question.operator == Operator::Add {
                adds += 1;
            }
            if question.correct_index == 0 {
                left += 1;
            }
        }
        assert!((350..=650).contains(&adds), "adds={}", adds);
        assert!((350..=650).contains(&left), "left={}", left);
    }

    #[test]
    fn display_reads_like_the_problem() {
        let mut rng = StdRng::seed_from_u64(29);
        let question = generate_with_operator(DifficultyTier::Basic, Operator::Subtract, &mut rng);
        let expected = format!("{} - {} = ?", question.operands[0], question.operands[1]);
        assert_eq!(question.display, expected);
    }

    #[test]
    fn thread_rng_entry_point_is_well_formed() {
        for tier in TIERS {
            let question = generate_question(tier);
            assert_well_formed(tier, &question);
        }
    }
}
