//! Rolling sampling window over the Closed-state counters.
//!
//! The window owns no storage: it reads and mutates the counters of a
//! [`BreakerState`](crate::BreakerState) so the record stays the single source of truth
//! for both in-process and shared stores.

use crate::state::BreakerState;
use std::time::Duration;

/// Failure ratio of a sample, or `None` when nothing has been sampled yet.
///
/// An empty window has no ratio; callers treat `None` as "ratio not exceeded" instead of
/// relying on NaN comparisons.
pub fn failure_ratio(failures: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(failures as f64 / total as f64)
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SamplingWindow {
    duration_millis: u64,
}

impl SamplingWindow {
    pub(crate) fn new(duration: Duration) -> Self {
        Self { duration_millis: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX) }
    }

    pub(crate) fn duration_millis(&self) -> u64 {
        self.duration_millis
    }

    /// now >= resetAt
    pub(crate) fn is_expired(&self, state: &BreakerState, now_millis: u64) -> bool {
        now_millis >= state.reset_at_millis
    }

    /// Zero the counters and start a new window when the current one has elapsed.
    /// Returns true if a reset happened.
    pub(crate) fn roll(&self, state: &mut BreakerState, now_millis: u64) -> bool {
        if !self.is_expired(state, now_millis) {
            return false;
        }
        state.failure_count = 0;
        state.total_count = 0;
        state.push_reset_at(now_millis.saturating_add(self.duration_millis));
        true
    }

    pub(crate) fn record(&self, state: &mut BreakerState, failed: bool) {
        state.total_count = state.total_count.saturating_add(1);
        if failed {
            state.failure_count = state.failure_count.saturating_add(1);
        }
        debug_assert!(state.failure_count <= state.total_count);
    }

    /// Both the absolute threshold and the ratio must be reached inside a live window.
    /// Comparisons are inclusive (`>=`) for both.
    pub(crate) fn exceeds(
        &self,
        state: &BreakerState,
        now_millis: u64,
        failure_threshold: u64,
        failure_ratio_limit: f64,
    ) -> bool {
        if self.is_expired(state, now_millis) {
            return false;
        }
        let threshold_reached = state.failure_count >= failure_threshold;
        let ratio_reached = failure_ratio(state.failure_count, state.total_count)
            .is_some_and(|ratio| ratio >= failure_ratio_limit);
        threshold_reached && ratio_reached
    }
}
