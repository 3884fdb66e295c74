//! Convenient re-exports for common Tripwire types.
pub use crate::{
    breaker::KeyedBreaker,
    clock::{Clock, ManualClock, SystemClock},
    config::{BreakerConfig, ConfigError, WriteMode},
    error::{BreakerError, StoreError},
    notify::TransitionListener,
    state::{BreakerState, Status},
    store::{InMemoryStateStore, StateStore},
    transport::{BreakerLayer, TransportError},
};
