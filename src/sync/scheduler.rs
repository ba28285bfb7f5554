//! Sync Scheduler (§4.G): push cooldown, single-flight guard, and the
//! connectivity hook that lets a host embedding fire a push the moment the
//! network comes back instead of waiting for the next background tick.

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::SyncConfig;

#[derive(Debug, Default)]
struct State {
    in_flight: bool,
    last_push_started: Option<Instant>,
}

/// Owned by [`crate::sync::manager::SyncManager`], not free-standing module
/// state (§5) — nothing here survives past the `SyncManager` that created
/// it, so tests can spin up as many independent schedulers as they like
/// without cross-talk.
pub struct Scheduler {
    state: Mutex<State>,
    cooldown: std::time::Duration,
}

/// What the caller should do given the scheduler's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Proceed; the caller must call [`Scheduler::finish`] when the push
    /// cycle (success or failure) is over.
    Go,
    /// Another push is already running (single-flight, §4.G).
    AlreadyRunning,
    /// Too soon since the last push started (cooldown, §4.G).
    Cooldown,
}

impl Scheduler {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            cooldown: config.push_cooldown,
        }
    }

    /// Attempt to start a push cycle `now`. On [`Admission::Go`] the
    /// scheduler is left in the "in flight" state until [`Self::finish`] is
    /// called, guaranteeing at most one push runs at a time.
    pub fn try_start_push(&self, now: Instant) -> Admission {
        let mut state = self.state.lock();
        if state.in_flight {
            return Admission::AlreadyRunning;
        }
        if let Some(last) = state.last_push_started {
            if now.saturating_duration_since(last) < self.cooldown {
                return Admission::Cooldown;
            }
        }
        state.in_flight = true;
        state.last_push_started = Some(now);
        Admission::Go
    }

    /// Mark the in-flight push cycle as complete, freeing the single-flight
    /// slot for the next caller (subject to cooldown).
    pub fn finish(&self) {
        self.state.lock().in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn second_concurrent_push_is_rejected_single_flight() {
        let config = SyncConfig::default();
        let scheduler = Scheduler::new(&config);

        assert_eq!(scheduler.try_start_push(Instant::now()), Admission::Go);
        assert_eq!(
            scheduler.try_start_push(Instant::now()),
            Admission::AlreadyRunning
        );

        scheduler.finish();
        assert!(!scheduler.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn push_within_cooldown_is_rejected() {
        let config = SyncConfig::default();
        let scheduler = Scheduler::new(&config);

        assert_eq!(scheduler.try_start_push(Instant::now()), Admission::Go);
        scheduler.finish();

        assert_eq!(scheduler.try_start_push(Instant::now()), Admission::Cooldown);
    }

    #[tokio::test(start_paused = true)]
    async fn push_after_cooldown_elapses_is_admitted() {
        let config = SyncConfig::default();
        let scheduler = Scheduler::new(&config);

        assert_eq!(scheduler.try_start_push(Instant::now()), Admission::Go);
        scheduler.finish();

        tokio::time::advance(config.push_cooldown + std::time::Duration::from_millis(1)).await;
        assert_eq!(scheduler.try_start_push(Instant::now()), Admission::Go);
    }
}
