//! Process-wide "quota exhausted" latch with a cancellable auto-clear timer.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Upper bound on how long a reported reset time may keep the latch set.
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60 * 60);

#[derive(Default)]
struct LatchState {
    limited: bool,
    deadline: Option<Instant>,
    reset_at: Option<DateTime<Utc>>,
    /// Bumped on every trip so a stale timer cannot clear a newer trip.
    generation: u64,
    timer: Option<CancellationToken>,
}

impl LatchState {
    fn reset(&mut self) {
        self.limited = false;
        self.deadline = None;
        self.reset_at = None;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

impl Drop for LatchState {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

fn lock(state: &Mutex<LatchState>) -> MutexGuard<'_, LatchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// While set, the fetcher answers from cache without touching the network.
///
/// Clones share the same state. The auto-clear timer only holds a weak
/// reference, and dropping the last clone cancels it.
#[derive(Clone, Default)]
pub struct RateLimitLatch {
    state: Arc<Mutex<LatchState>>,
}

impl RateLimitLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the latch is set. A latch whose deadline has passed clears itself
    /// here even if the timer task has not run yet.
    pub fn is_set(&self) -> bool {
        let mut state = lock(&self.state);
        if state.limited && state.deadline.is_some_and(|d| Instant::now() >= d) {
            state.reset();
            info!("rate limit window elapsed");
        }
        state.limited
    }

    /// Reset time reported by upstream for the current trip.
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.state).reset_at
    }

    /// Time left until the latch clears, if set.
    pub fn remaining(&self) -> Option<Duration> {
        let state = lock(&self.state);
        if !state.limited {
            return None;
        }
        state
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Set the latch until `reset_at`, capped at [`MAX_RATE_LIMIT_WAIT`] from
    /// `now`. A missing reset time waits the full cap; one in the past clears
    /// on the next check. Returns the wait that was scheduled.
    pub fn trip(&self, reset_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        let wait = match reset_at {
            Some(reset) => (reset - now).to_std().unwrap_or(Duration::ZERO),
            None => MAX_RATE_LIMIT_WAIT,
        }
        .min(MAX_RATE_LIMIT_WAIT);
        let deadline = Instant::now() + wait;
        let token = CancellationToken::new();

        let generation = {
            let mut state = lock(&self.state);
            state.reset();
            state.limited = true;
            state.deadline = Some(deadline);
            state.reset_at = reset_at;
            state.generation += 1;
            state.timer = Some(token.clone());
            state.generation
        };
        info!(wait_secs = wait.as_secs(), "rate limit latch set");

        // Outside a runtime the deadline check in `is_set` is the only clearing path
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let weak = Arc::downgrade(&self.state);
            handle.spawn(auto_clear(weak, token, deadline, generation));
        }
        wait
    }

    /// Clear the latch and cancel any pending timer.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        if state.limited {
            info!("rate limit latch cleared");
        }
        state.reset();
    }
}

async fn auto_clear(
    state: Weak<Mutex<LatchState>>,
    token: CancellationToken,
    deadline: Instant,
    generation: u64,
) {
    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::time::sleep_until(deadline) => {
            if let Some(state) = state.upgrade() {
                let mut state = lock(&state);
                if state.generation == generation && state.limited {
                    state.reset();
                    info!("rate limit window elapsed");
                }
            }
        }
    }
}
