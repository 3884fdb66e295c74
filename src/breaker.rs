//! Keyed circuit breaker facade.
//!
//! One [`KeyedBreaker`] guards any number of logical dependencies, each identified by a
//! key and backed by its own record in the configured [`StateStore`](crate::StateStore).
//!
//! A call runs as one read-modify-write of that record:
//! 1. read the record (a read failure is returned as [`BreakerError::Store`] and the guarded
//!    call is not attempted: the breaker neither fails open nor fails closed on its own),
//! 2. apply any transition that is already due (e.g. Open → HalfOpen after the break),
//! 3. let the current variant run or short-circuit the call and update its counters,
//! 4. apply any transition the outcome triggered (trip, close, reopen),
//! 5. write the record back; a write failure is combined with the call outcome.
//!
//! Transition listeners hear about steps 2 and 4 only once step 5 succeeded.
//!
//! Same-key calls within a process are serialized by striped locks held for the whole call,
//! so the guarded operation for a key never runs concurrently with itself in one process.
//! Across processes sharing a store, [`WriteMode`] decides between lossy overwrites and
//! version-checked writes.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use tripwire::{BreakerConfig, KeyedBreaker, ManualClock, Status};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let clock = ManualClock::new();
//! let config = BreakerConfig::<std::io::Error>::builder()
//!     .failure_threshold(2)
//!     .break_duration(Duration::from_secs(5))
//!     .clock(clock.clone())
//!     .build()
//!     .unwrap();
//! let breaker = KeyedBreaker::new(config);
//!
//! for _ in 0..2 {
//!     let _ = breaker
//!         .call("db", || async { Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "down")) })
//!         .await;
//! }
//! assert_eq!(breaker.status("db").await.unwrap(), Status::Open);
//! assert!(breaker.call("db", || async { Ok::<_, std::io::Error>(()) }).await.unwrap_err().is_broken());
//! # });
//! ```

use crate::config::{BreakerConfig, WriteMode};
use crate::error::{BreakerError, StoreError};
use crate::locks::KeyLocks;
use crate::state::{BreakerState, Status};
use crate::variants::Variant;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

struct Inner<E> {
    config: BreakerConfig<E>,
    locks: KeyLocks,
}

/// Circuit breaker guarding calls per key.
///
/// Clones share configuration, store, and locks via `Arc`.
pub struct KeyedBreaker<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for KeyedBreaker<E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<E> std::fmt::Debug for KeyedBreaker<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedBreaker")
            .field("config", &self.inner.config)
            .field("lock_stripes", &self.inner.config.lock_stripes())
            .finish()
    }
}

impl<E> KeyedBreaker<E> {
    pub fn new(config: BreakerConfig<E>) -> Self {
        let locks = KeyLocks::new(config.lock_stripes());
        Self { inner: Arc::new(Inner { config, locks }) }
    }

    pub fn config(&self) -> &BreakerConfig<E> {
        &self.inner.config
    }

    /// Executes the provided async operation under the breaker for `key`.
    ///
    /// # Behavior
    /// - **Closed**: runs the operation and samples its outcome in the current window.
    ///   Trips to Open on the call that reaches both the failure threshold and ratio.
    /// - **Open**: returns [`BreakerError::BrokenCircuit`] without running the operation.
    /// - **HalfOpen**: runs the operation as a probe; one failure reopens, reaching the
    ///   success threshold closes.
    /// - **Isolated**: returns [`BreakerError::IsolatedCircuit`] without running the operation.
    ///
    /// # Errors
    /// - `Inner(E)` if the operation itself fails.
    /// - `Store` if the record could not be read (operation not run), or if the operation
    ///   succeeded but the record could not be written (the success value is discarded).
    /// - `Persist` if the operation failed or was short-circuited and the write failed too.
    pub async fn call<T, Fut, Op>(&self, key: &str, operation: Op) -> Result<T, BreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
        Op: FnOnce() -> Fut,
    {
        let config = &self.inner.config;
        let _guard = self.inner.locks.lock(key).await;

        let (mut state, version) = match self.load(key).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(target: "tripwire::breaker", key, error = %e, "failed to read breaker state");
                return Err(BreakerError::Store(e));
            }
        };

        let mut transitions = Vec::with_capacity(2);
        transitions.extend(self.advance(key, &mut state));
        let now = config.clock().now_millis();
        let variant = Variant::of(state.status);
        let outcome = variant.execute(config, &mut state, now, operation).await;
        match &outcome {
            Err(BreakerError::BrokenCircuit { retry_in }) => {
                tracing::debug!(target: "tripwire::breaker", key, retry_in = ?retry_in, "breaker open; call rejected");
            }
            Err(BreakerError::IsolatedCircuit) => {
                tracing::debug!(target: "tripwire::breaker", key, "breaker isolated; call rejected");
            }
            _ => {}
        }
        transitions.extend(self.advance(key, &mut state));

        let expected = match config.write_mode() {
            WriteMode::CompareAndSwap => Some(version),
            WriteMode::LastWriteWins => None,
        };
        match config.store().set(key, state, expected).await {
            Ok(_) => {
                for (from, to) in transitions {
                    config.listener().on_transition(key, from, to);
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(target: "tripwire::breaker", key, error = %e, "failed to persist breaker state");
                Err(BreakerError::with_persist_failure(outcome.err(), e))
            }
        }
    }

    /// Stored status for `key`, without running anything. Unknown keys are Closed.
    pub async fn status(&self, key: &str) -> Result<Status, StoreError> {
        Ok(self.state(key).await?.status)
    }

    /// Snapshot of the stored record for `key`.
    pub async fn state(&self, key: &str) -> Result<BreakerState, StoreError> {
        self.load(key).await.map(|(state, _)| state)
    }

    /// Time left before an Open breaker lets a probe through.
    ///
    /// Zero when the breaker is not Open or the break has already elapsed.
    pub async fn reset_in(&self, key: &str) -> Result<Duration, StoreError> {
        let state = self.state(key).await?;
        if !state.status.is_open() {
            return Ok(Duration::ZERO);
        }
        let now = self.inner.config.clock().now_millis();
        Ok(Duration::from_millis(state.close_at_millis.saturating_sub(now)))
    }

    /// Force `key` into Isolated until it is explicitly reset.
    pub async fn isolate(&self, key: &str) -> Result<(), StoreError> {
        self.force(key, Status::Isolated).await
    }

    /// Force `key` back to Closed with a fresh sampling window.
    pub async fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.force(key, Status::Closed).await
    }

    /// Overwrite the record for `key` with a freshly entered `status`.
    ///
    /// This is the only way out of Isolated. The transition listener fires when the status
    /// actually changes and the write succeeded.
    pub async fn force(&self, key: &str, status: Status) -> Result<(), StoreError> {
        let config = &self.inner.config;
        let _guard = self.inner.locks.lock(key).await;

        let (prior, version) = self.load(key).await?;
        let now = config.clock().now_millis();
        let next = Variant::of(status).entry(config, &prior, now);
        let expected = match config.write_mode() {
            WriteMode::CompareAndSwap => Some(version),
            WriteMode::LastWriteWins => None,
        };
        config.store().set(key, next, expected).await?;

        tracing::info!(target: "tripwire::breaker", key, from = %prior.status, to = %status, "breaker status forced");
        if prior.status != status {
            config.listener().on_transition(key, prior.status, status);
        }
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<(BreakerState, u64), StoreError> {
        let config = &self.inner.config;
        match config.store().get(key).await? {
            Some(stored) => Ok((stored.value, stored.version)),
            None => {
                let now = config.clock().now_millis();
                let sampling = u64::try_from(config.sampling_duration().as_millis()).unwrap_or(u64::MAX);
                Ok((BreakerState::initial(now, sampling), 0))
            }
        }
    }

    /// Apply the transition the current variant reports as due, if any.
    ///
    /// Returns the applied `(from, to)` pair; listeners are told once the record is written.
    fn advance(&self, key: &str, state: &mut BreakerState) -> Option<(Status, Status)> {
        let config = &self.inner.config;
        let now = config.clock().now_millis();
        let from = state.status;
        let to = Variant::of(from).next(config, state, now)?;

        match to {
            Status::Open => tracing::warn!(
                target: "tripwire::breaker",
                key,
                %from,
                failures = state.failure_count,
                total = state.total_count,
                "breaker → open"
            ),
            Status::HalfOpen => tracing::info!(target: "tripwire::breaker", key, %from, "breaker → half-open"),
            Status::Closed => tracing::info!(
                target: "tripwire::breaker",
                key,
                %from,
                successes = state.success_count,
                "breaker → closed"
            ),
            Status::Isolated => tracing::info!(target: "tripwire::breaker", key, %from, "breaker → isolated"),
        }

        *state = Variant::of(to).entry(config, state, now);
        Some((from, to))
    }
}
