//! Error types for keyed breakers and their stores
use std::fmt;
use std::time::Duration;

/// Failure reported by a [`StateStore`](crate::StateStore).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("store backend failed for '{key}': {message}")]
    Backend { key: String, message: String },
    /// A versioned write lost against a concurrent writer.
    #[error("version conflict for '{key}' (expected {expected}, found {found})")]
    Conflict { key: String, expected: u64, found: u64 },
    /// A stored record could not be encoded or decoded.
    #[error("invalid record for '{key}': {message}")]
    Codec { key: String, message: String },
}

impl StoreError {
    pub fn backend(key: &str, message: impl fmt::Display) -> Self {
        StoreError::Backend { key: key.to_string(), message: message.to_string() }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn key(&self) -> &str {
        match self {
            StoreError::Backend { key, .. }
            | StoreError::Conflict { key, .. }
            | StoreError::Codec { key, .. } => key,
        }
    }
}

/// Unified error type returned by [`KeyedBreaker`](crate::KeyedBreaker) calls.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakerError<E> {
    /// The breaker is open; the call was not attempted.
    BrokenCircuit { retry_in: Duration },
    /// The breaker was manually isolated; the call was not attempted.
    IsolatedCircuit,
    /// The state record could not be read or written.
    Store(StoreError),
    /// The guarded call failed; passed through unchanged.
    Inner(E),
    /// The call finished (successfully or not) but its state could not be persisted.
    Persist { outcome: Box<BreakerError<E>>, store: StoreError },
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrokenCircuit { retry_in } => {
                write!(f, "circuit-breaker: broken (retry in {:?})", retry_in)
            }
            Self::IsolatedCircuit => write!(f, "circuit-breaker: isolated"),
            Self::Store(e) => write!(f, "circuit-breaker: {}", e),
            Self::Inner(e) => write!(f, "{}", e),
            Self::Persist { outcome, store } => {
                write!(f, "{}; additionally failed to persist state: {}", outcome, store)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Persist { store, .. } => Some(store),
            _ => None,
        }
    }
}

impl<E> BreakerError<E> {
    /// Combine a call outcome with a failed write. Neither error is dropped.
    pub(crate) fn with_persist_failure(outcome: Option<BreakerError<E>>, store: StoreError) -> Self {
        match outcome {
            Some(outcome) => Self::Persist { outcome: Box::new(outcome), store },
            None => Self::Store(store),
        }
    }

    /// Check if the call was short-circuited by an open breaker, including when the
    /// short-circuit is wrapped in a persistence failure.
    pub fn is_broken(&self) -> bool {
        match self {
            Self::BrokenCircuit { .. } => true,
            Self::Persist { outcome, .. } => outcome.is_broken(),
            _ => false,
        }
    }

    /// Check if the call was short-circuited by isolation.
    pub fn is_isolated(&self) -> bool {
        match self {
            Self::IsolatedCircuit => true,
            Self::Persist { outcome, .. } => outcome.is_isolated(),
            _ => false,
        }
    }

    /// Check if any store failure is involved.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Persist { .. })
    }

    /// Check if this error is exactly the guarded call's own error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// The store failure, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) | Self::Persist { store: e, .. } => Some(e),
            _ => None,
        }
    }

    /// Borrow the guarded call's error, looking through persistence failures.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Persist { outcome, .. } => outcome.as_inner(),
            _ => None,
        }
    }

    /// Take the guarded call's error, looking through persistence failures.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Persist { outcome, .. } => outcome.into_inner(),
            _ => None,
        }
    }

    /// Remaining break time for a short-circuited call.
    pub fn retry_in(&self) -> Option<Duration> {
        match self {
            Self::BrokenCircuit { retry_in } => Some(*retry_in),
            Self::Persist { outcome, .. } => outcome.retry_in(),
            _ => None,
        }
    }
}
