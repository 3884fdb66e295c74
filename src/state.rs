//! Breaker status and the per-key state record persisted by stores.

use std::fmt;

/// Current status of a keyed breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Status {
    /// Normal operating mode; calls run and are sampled.
    #[default]
    Closed,
    /// Short-circuits every call until the break duration elapses.
    Open,
    /// Probe mode; calls run and decide whether to close or reopen.
    HalfOpen,
    /// Manually isolated; short-circuits until explicitly overwritten.
    Isolated,
}

impl Status {
    /// All statuses, in lookup-table order.
    pub const ALL: [Status; 4] = [Status::Closed, Status::Open, Status::HalfOpen, Status::Isolated];

    pub(crate) fn index(self) -> usize {
        match self {
            Status::Closed => 0,
            Status::Open => 1,
            Status::HalfOpen => 2,
            Status::Isolated => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Closed => "closed",
            Status::Open => "open",
            Status::HalfOpen => "half-open",
            Status::Isolated => "isolated",
        }
    }

    pub fn is_closed(self) -> bool {
        self == Status::Closed
    }

    pub fn is_open(self) -> bool {
        self == Status::Open
    }

    pub fn is_half_open(self) -> bool {
        self == Status::HalfOpen
    }

    pub fn is_isolated(self) -> bool {
        self == Status::Isolated
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State record for one breaker key.
///
/// Counters belong to the current status: `failure_count`/`total_count` sample the Closed
/// window, `success_count`/`probe_failed` track HalfOpen probes. Deadlines are clock
/// milliseconds; `0` means "never set".
///
/// Invariants: `failure_count <= total_count`; `reset_at_millis` and `close_at_millis`
/// never move backwards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BreakerState {
    pub status: Status,
    pub previous: Option<Status>,
    pub failure_count: u64,
    pub total_count: u64,
    pub success_count: u64,
    pub probe_failed: bool,
    pub reset_at_millis: u64,
    pub close_at_millis: u64,
}

impl BreakerState {
    /// Record for a key that has never been written: Closed, window starting now.
    pub fn initial(now_millis: u64, sampling_millis: u64) -> Self {
        Self { reset_at_millis: now_millis.saturating_add(sampling_millis), ..Self::default() }
    }

    /// Fresh record for `status`, carrying deadlines forward from `prior`.
    pub(crate) fn entered(status: Status, prior: &BreakerState) -> Self {
        Self {
            status,
            previous: Some(prior.status),
            reset_at_millis: prior.reset_at_millis,
            close_at_millis: prior.close_at_millis,
            ..Self::default()
        }
    }

    pub(crate) fn push_reset_at(&mut self, millis: u64) {
        self.reset_at_millis = self.reset_at_millis.max(millis);
    }

    pub(crate) fn push_close_at(&mut self, millis: u64) {
        self.close_at_millis = self.close_at_millis.max(millis);
    }
}

/// A stored value paired with the version the store assigned to it.
///
/// Versions start at 1 on first write; `0` stands for "key absent" in write preconditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_are_stable() {
        let names: Vec<_> = Status::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["closed", "open", "half-open", "isolated"]);
    }

    #[test]
    fn lookup_indices_follow_all_order() {
        for (i, status) in Status::ALL.iter().enumerate() {
            assert_eq!(status.index(), i);
        }
    }

    #[test]
    fn entered_resets_counters_but_keeps_deadlines() {
        let prior = BreakerState {
            status: Status::Closed,
            failure_count: 4,
            total_count: 6,
            reset_at_millis: 900,
            close_at_millis: 300,
            ..BreakerState::default()
        };
        let next = BreakerState::entered(Status::Open, &prior);
        assert_eq!(next.status, Status::Open);
        assert_eq!(next.previous, Some(Status::Closed));
        assert_eq!((next.failure_count, next.total_count), (0, 0));
        assert_eq!(next.reset_at_millis, 900);
        assert_eq!(next.close_at_millis, 300);
    }

    #[test]
    fn deadlines_only_move_forward() {
        let mut state = BreakerState::initial(100, 50);
        state.push_reset_at(120);
        assert_eq!(state.reset_at_millis, 150);
        state.push_close_at(80);
        state.push_close_at(40);
        assert_eq!(state.close_at_millis, 80);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn record_serializes_with_kebab_status() {
        let state = BreakerState { status: Status::HalfOpen, ..BreakerState::default() };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "half-open");
        let back: BreakerState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
