#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Tripwire
//!
//! Keyed circuit breakers for async Rust: one breaker instance guards many dependencies,
//! each tracked by its own persisted state record.
//!
//! ## Features
//!
//! - **Per-key breakers** with Closed, Open, HalfOpen and Isolated states
//! - **Windowed sampling**: trips on a failure count *and* a failure ratio within a window
//! - **Pluggable stores**: in-process memory, or any shared key/value backend
//! - **Versioned writes** to detect concurrent writers on shared stores
//! - **Deterministic time** via a replaceable clock
//! - **Tower middleware** for guarding outbound services
//!
//! ## Quick Start
//!
//! ```rust
//! use tripwire::{BreakerConfig, KeyedBreaker};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = BreakerConfig::<std::io::Error>::builder()
//!         .failure_threshold(10)
//!         .failure_ratio(0.5)
//!         .break_duration(Duration::from_secs(5))
//!         .build()
//!         .unwrap();
//!     let breaker = KeyedBreaker::new(config);
//!
//!     let result = breaker.call("postgres", || async {
//!         // Your async operation here
//!         Ok::<_, std::io::Error>(())
//!     }).await;
//!     assert!(result.is_ok());
//! }
//! ```

pub mod breaker;
pub mod clock;
pub mod config;
pub mod error;
mod locks;
pub mod notify;
pub mod prelude;
pub mod state;
pub mod store;
pub mod transport;
mod variants;
pub mod window;

// Re-exports
pub use breaker::KeyedBreaker;
pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
#[cfg(feature = "serde")]
pub use config::BreakerSettings;
pub use config::{BreakerConfig, BreakerConfigBuilder, ConfigError, WriteMode};
pub use error::{BreakerError, StoreError};
pub use notify::{FanoutListener, LogListener, MemoryListener, NullListener, TransitionListener};
pub use state::{BreakerState, Status, Versioned};
pub use store::{InMemoryStateStore, StateStore};
#[cfg(feature = "serde")]
pub use store::{KeyValueBackend, SharedStateStore};
pub use transport::{BreakerLayer, BreakerService, TransportError};
