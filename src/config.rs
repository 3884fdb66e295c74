//! Breaker configuration, its builder, and validation.
//!
//! A [`BreakerConfig`] is immutable once built and shared by every status variant of the
//! breaker it configures.

use crate::clock::{Clock, SystemClock};
use crate::notify::{NullListener, TransitionListener};
use crate::store::{InMemoryStateStore, StateStore};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SUCCESS_THRESHOLD: u64 = 5;
pub const DEFAULT_FAILURE_THRESHOLD: u64 = 10;
pub const DEFAULT_BREAK_DURATION: Duration = Duration::from_secs(5);
pub const DEFAULT_SAMPLING_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_FAILURE_RATIO: f64 = 0.5;
pub const DEFAULT_LOCK_STRIPES: usize = 64;

/// How the breaker writes state back to its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WriteMode {
    /// Overwrite unconditionally; concurrent writers may lose each other's counts.
    #[default]
    LastWriteWins,
    /// Reject the write if another writer changed the record since it was read.
    ///
    /// A call that already ran still reports the conflict, so a successful value is lost.
    CompareAndSwap,
}

/// Errors produced when validating breaker configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Success threshold must be > 0.
    InvalidSuccessThreshold { provided: u64 },
    /// Failure threshold must be > 0.
    InvalidFailureThreshold { provided: u64 },
    /// Break duration must be > 0.
    InvalidBreakDuration(Duration),
    /// Sampling duration must be > 0.
    InvalidSamplingDuration(Duration),
    /// Failure ratio must be a finite value in `[0, 1]`.
    InvalidFailureRatio(f64),
    /// Lock stripe count must be > 0.
    InvalidLockStripes { provided: usize },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidSuccessThreshold { provided } => {
                write!(f, "success_threshold must be > 0 (got {})", provided)
            }
            ConfigError::InvalidFailureThreshold { provided } => {
                write!(f, "failure_threshold must be > 0 (got {})", provided)
            }
            ConfigError::InvalidBreakDuration(d) => {
                write!(f, "break_duration must be > 0 (got {:?})", d)
            }
            ConfigError::InvalidSamplingDuration(d) => {
                write!(f, "sampling_duration must be > 0 (got {:?})", d)
            }
            ConfigError::InvalidFailureRatio(r) => {
                write!(f, "failure_ratio must be within [0, 1] (got {})", r)
            }
            ConfigError::InvalidLockStripes { provided } => {
                write!(f, "lock_stripes must be > 0 (got {})", provided)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Validated configuration for a [`KeyedBreaker`](crate::KeyedBreaker).
pub struct BreakerConfig<E> {
    success_threshold: u64,
    failure_threshold: u64,
    break_duration: Duration,
    sampling_duration: Duration,
    failure_ratio: f64,
    write_mode: WriteMode,
    lock_stripes: usize,
    clock: Arc<dyn Clock>,
    is_failure: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    listener: Arc<dyn TransitionListener>,
    store: Arc<dyn StateStore>,
}

impl<E> Clone for BreakerConfig<E> {
    fn clone(&self) -> Self {
        Self {
            success_threshold: self.success_threshold,
            failure_threshold: self.failure_threshold,
            break_duration: self.break_duration,
            sampling_duration: self.sampling_duration,
            failure_ratio: self.failure_ratio,
            write_mode: self.write_mode,
            lock_stripes: self.lock_stripes,
            clock: self.clock.clone(),
            is_failure: self.is_failure.clone(),
            listener: self.listener.clone(),
            store: self.store.clone(),
        }
    }
}

impl<E> std::fmt::Debug for BreakerConfig<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerConfig")
            .field("success_threshold", &self.success_threshold)
            .field("failure_threshold", &self.failure_threshold)
            .field("break_duration", &self.break_duration)
            .field("sampling_duration", &self.sampling_duration)
            .field("failure_ratio", &self.failure_ratio)
            .field("write_mode", &self.write_mode)
            .field("lock_stripes", &self.lock_stripes)
            .field("clock", &self.clock)
            .field("store", &self.store)
            .field("is_failure", &"<classifier>")
            .field("listener", &"<listener>")
            .finish()
    }
}

impl<E> BreakerConfig<E> {
    /// Construct a new builder with defaults.
    pub fn builder() -> BreakerConfigBuilder<E> {
        BreakerConfigBuilder::new()
    }

    /// HalfOpen successes required before closing.
    pub fn success_threshold(&self) -> u64 {
        self.success_threshold
    }

    /// Failures required in one window before tripping.
    pub fn failure_threshold(&self) -> u64 {
        self.failure_threshold
    }

    /// Time spent Open before probing.
    pub fn break_duration(&self) -> Duration {
        self.break_duration
    }

    /// Length of one Closed sampling window.
    pub fn sampling_duration(&self) -> Duration {
        self.sampling_duration
    }

    /// Minimum failures/total ratio required before tripping.
    pub fn failure_ratio(&self) -> f64 {
        self.failure_ratio
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    pub fn lock_stripes(&self) -> usize {
        self.lock_stripes
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn listener(&self) -> &dyn TransitionListener {
        self.listener.as_ref()
    }

    pub(crate) fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub(crate) fn is_failure(&self, error: &E) -> bool {
        (self.is_failure)(error)
    }

    pub(crate) fn break_millis(&self) -> u64 {
        u64::try_from(self.break_duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Builder for [`BreakerConfig`].
pub struct BreakerConfigBuilder<E> {
    success_threshold: u64,
    failure_threshold: u64,
    break_duration: Duration,
    sampling_duration: Duration,
    failure_ratio: f64,
    write_mode: WriteMode,
    lock_stripes: usize,
    clock: Arc<dyn Clock>,
    is_failure: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    listener: Arc<dyn TransitionListener>,
    store: Arc<dyn StateStore>,
}

impl<E> Default for BreakerConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> BreakerConfigBuilder<E> {
    /// Create a builder with the documented defaults and an in-memory store.
    pub fn new() -> Self {
        Self {
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            break_duration: DEFAULT_BREAK_DURATION,
            sampling_duration: DEFAULT_SAMPLING_DURATION,
            failure_ratio: DEFAULT_FAILURE_RATIO,
            write_mode: WriteMode::default(),
            lock_stripes: DEFAULT_LOCK_STRIPES,
            clock: Arc::new(SystemClock),
            is_failure: Arc::new(|_| true),
            listener: Arc::new(NullListener),
            store: Arc::new(InMemoryStateStore::new()),
        }
    }

    pub fn success_threshold(mut self, n: u64) -> Self {
        self.success_threshold = n;
        self
    }

    pub fn failure_threshold(mut self, n: u64) -> Self {
        self.failure_threshold = n;
        self
    }

    pub fn break_duration(mut self, d: Duration) -> Self {
        self.break_duration = d;
        self
    }

    pub fn sampling_duration(mut self, d: Duration) -> Self {
        self.sampling_duration = d;
        self
    }

    pub fn failure_ratio(mut self, ratio: f64) -> Self {
        self.failure_ratio = ratio;
        self
    }

    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Number of lock stripes serializing same-key calls inside this process.
    pub fn lock_stripes(mut self, n: usize) -> Self {
        self.lock_stripes = n;
        self
    }

    /// Override the clock (useful for deterministic tests).
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Decide which errors count as failures. Errors that are not failures are still returned
    /// to the caller but are sampled as successful calls.
    pub fn failure_classifier<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_failure = Arc::new(f);
        self
    }

    /// Callback fired on every status change.
    pub fn on_transition<L: TransitionListener + 'static>(mut self, listener: L) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    /// Store holding the per-key records.
    pub fn store<S: StateStore + 'static>(mut self, store: S) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Share an existing store handle between several breakers.
    pub fn shared_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<BreakerConfig<E>, ConfigError> {
        if self.success_threshold == 0 {
            return Err(ConfigError::InvalidSuccessThreshold { provided: 0 });
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold { provided: 0 });
        }
        if self.break_duration.is_zero() {
            return Err(ConfigError::InvalidBreakDuration(self.break_duration));
        }
        if self.sampling_duration.is_zero() {
            return Err(ConfigError::InvalidSamplingDuration(self.sampling_duration));
        }
        if !self.failure_ratio.is_finite() || !(0.0..=1.0).contains(&self.failure_ratio) {
            return Err(ConfigError::InvalidFailureRatio(self.failure_ratio));
        }
        if self.lock_stripes == 0 {
            return Err(ConfigError::InvalidLockStripes { provided: 0 });
        }

        Ok(BreakerConfig {
            success_threshold: self.success_threshold,
            failure_threshold: self.failure_threshold,
            break_duration: self.break_duration,
            sampling_duration: self.sampling_duration,
            failure_ratio: self.failure_ratio,
            write_mode: self.write_mode,
            lock_stripes: self.lock_stripes,
            clock: self.clock,
            is_failure: self.is_failure,
            listener: self.listener,
            store: self.store,
        })
    }
}

/// Plain, file-loadable breaker settings. Unset fields keep builder defaults.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerSettings {
    pub success_threshold: Option<u64>,
    pub failure_threshold: Option<u64>,
    pub break_duration_ms: Option<u64>,
    pub sampling_duration_ms: Option<u64>,
    pub failure_ratio: Option<f64>,
    pub write_mode: Option<WriteMode>,
    pub lock_stripes: Option<usize>,
}

#[cfg(feature = "serde")]
impl BreakerSettings {
    /// Parse settings from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Overlay these settings on a builder.
    pub fn apply<E>(&self, mut builder: BreakerConfigBuilder<E>) -> BreakerConfigBuilder<E> {
        if let Some(n) = self.success_threshold {
            builder = builder.success_threshold(n);
        }
        if let Some(n) = self.failure_threshold {
            builder = builder.failure_threshold(n);
        }
        if let Some(ms) = self.break_duration_ms {
            builder = builder.break_duration(Duration::from_millis(ms));
        }
        if let Some(ms) = self.sampling_duration_ms {
            builder = builder.sampling_duration(Duration::from_millis(ms));
        }
        if let Some(ratio) = self.failure_ratio {
            builder = builder.failure_ratio(ratio);
        }
        if let Some(mode) = self.write_mode {
            builder = builder.write_mode(mode);
        }
        if let Some(n) = self.lock_stripes {
            builder = builder.lock_stripes(n);
        }
        builder
    }
}
