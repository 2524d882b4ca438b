//! Per-round countdown handles.
//!
//! A [`Countdown`] is owned by the round it belongs to. Dropping it cancels the
//! driver behind it, so replacing or resolving a round can never leave a live
//! timer behind. Every countdown carries a unique id and the ticks it produces
//! are tagged with that id; the controller uses it to recognise stale ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::AbortHandle;

pub type CountdownId = u64;

pub struct Countdown {
    id: CountdownId,
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl Countdown {
    pub fn new(id: CountdownId, abort: Option<AbortHandle>) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
            abort,
        }
    }

    pub fn id(&self) -> CountdownId {
        self.id
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Shared flag that flips to `true` once this countdown is cancelled.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.abort.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Countdown")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Starts countdown drivers for the match controller.
pub trait Ticker: Send {
    /// Arms a countdown that delivers at most `ticks` one-second ticks tagged with `id`.
    fn arm(&mut self, id: CountdownId, ticks: u32) -> Countdown;
}

/// Tokio-backed ticker: one interval task per countdown, each tick handed to
/// `on_tick`. The task stops early when `on_tick` returns `false` (receiver
/// gone) and is aborted when the [`Countdown`] is dropped.
pub struct IntervalTicker<F> {
    period: Duration,
    on_tick: F,
}

impl<F> IntervalTicker<F>
where
    F: Fn(CountdownId) -> bool + Clone + Send + Sync + 'static,
{
    pub fn new(period: Duration, on_tick: F) -> Self {
        Self { period, on_tick }
    }
}

impl<F> Ticker for IntervalTicker<F>
where
    F: Fn(CountdownId) -> bool + Clone + Send + Sync + 'static,
{
    fn arm(&mut self, id: CountdownId, ticks: u32) -> Countdown {
        let on_tick = self.on_tick.clone();
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            for _ in 0..ticks {
                interval.tick().await;
                if !on_tick(id) {
                    tracing::debug!(countdown = id, "tick receiver gone, stopping countdown");
                    break;
                }
            }
        });

        Countdown::new(id, Some(task.abort_handle()))
    }
}

/// Ticker with no driver: ticks are fed to the controller by hand. Clones share
/// the record of armed countdowns.
#[derive(Clone, Default)]
pub struct ManualTicker {
    armed: Arc<Mutex<Vec<(CountdownId, Arc<AtomicBool>)>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of countdowns armed so far, oldest first.
    #[cfg(test)]
    pub(crate) fn armed(&self) -> Vec<CountdownId> {
        self.lock().iter().map(|(id, _)| *id).collect()
    }

    /// Ids of countdowns armed and not yet cancelled.
    pub fn live(&self) -> Vec<CountdownId> {
        self.lock()
            .iter()
            .filter(|(_, cancelled)| !cancelled.load(Ordering::SeqCst))
            .map(|(id, _)| *id)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(CountdownId, Arc<AtomicBool>)>> {
        self.armed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Ticker for ManualTicker {
    fn arm(&mut self, id: CountdownId, _ticks: u32) -> Countdown {
        let countdown = Countdown::new(id, None);
        self.lock().push((id, countdown.cancellation_flag()));
        countdown
    }
}
