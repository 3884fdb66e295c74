//! The four breaker status variants.
//!
//! Each variant answers three questions about a record:
//! - `entry`: what a fresh record looks like when the status is entered,
//! - `next`: whether a transition is due,
//! - `execute`: whether to run the guarded call and how to count its outcome.
//!
//! Variants are a closed set dispatched through [`TABLE`], indexed by [`Status`].
//! Isolated never reports a transition; only an explicit overwrite leaves it.

use crate::config::BreakerConfig;
use crate::error::BreakerError;
use crate::state::{BreakerState, Status};
use crate::window::SamplingWindow;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Variant {
    Closed,
    Open,
    HalfOpen,
    Isolated,
}

/// Lookup table keyed on `Status::index()`.
const TABLE: [Variant; 4] = [Variant::Closed, Variant::Open, Variant::HalfOpen, Variant::Isolated];

impl Variant {
    pub(crate) fn of(status: Status) -> Variant {
        TABLE[status.index()]
    }

    pub(crate) fn status(self) -> Status {
        match self {
            Variant::Closed => Status::Closed,
            Variant::Open => Status::Open,
            Variant::HalfOpen => Status::HalfOpen,
            Variant::Isolated => Status::Isolated,
        }
    }

    pub(crate) fn entry<E>(
        self,
        config: &BreakerConfig<E>,
        prior: &BreakerState,
        now_millis: u64,
    ) -> BreakerState {
        let mut state = BreakerState::entered(self.status(), prior);
        match self {
            Variant::Closed => {
                let window = SamplingWindow::new(config.sampling_duration());
                state.push_reset_at(now_millis.saturating_add(window.duration_millis()));
            }
            Variant::Open => {
                state.push_close_at(now_millis.saturating_add(config.break_millis()));
            }
            Variant::HalfOpen | Variant::Isolated => {}
        }
        state
    }

    pub(crate) fn next<E>(
        self,
        config: &BreakerConfig<E>,
        state: &BreakerState,
        now_millis: u64,
    ) -> Option<Status> {
        match self {
            Variant::Closed => {
                let window = SamplingWindow::new(config.sampling_duration());
                window
                    .exceeds(state, now_millis, config.failure_threshold(), config.failure_ratio())
                    .then_some(Status::Open)
            }
            Variant::Open => (now_millis >= state.close_at_millis).then_some(Status::HalfOpen),
            Variant::HalfOpen => {
                // A single failed probe is definitive, whatever succeeded before it.
                if state.probe_failed {
                    Some(Status::Open)
                } else if state.success_count >= config.success_threshold() {
                    Some(Status::Closed)
                } else {
                    None
                }
            }
            Variant::Isolated => None,
        }
    }

    pub(crate) async fn execute<T, E, Fut, Op>(
        self,
        config: &BreakerConfig<E>,
        state: &mut BreakerState,
        now_millis: u64,
        operation: Op,
    ) -> Result<T, BreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
        Op: FnOnce() -> Fut,
    {
        match self {
            Variant::Closed => {
                let window = SamplingWindow::new(config.sampling_duration());
                window.roll(state, now_millis);
                let result = operation().await;
                let failed = result.as_ref().err().is_some_and(|e| config.is_failure(e));
                window.record(state, failed);
                result.map_err(BreakerError::Inner)
            }
            Variant::Open => {
                let remaining = state.close_at_millis.saturating_sub(now_millis);
                Err(BreakerError::BrokenCircuit { retry_in: Duration::from_millis(remaining) })
            }
            Variant::HalfOpen => {
                let result = operation().await;
                let failed = result.as_ref().err().is_some_and(|e| config.is_failure(e));
                if failed {
                    state.probe_failed = true;
                } else {
                    state.success_count = state.success_count.saturating_add(1);
                }
                result.map_err(BreakerError::Inner)
            }
            Variant::Isolated => Err(BreakerError::IsolatedCircuit),
        }
    }
}
