//! Transition listeners fired on every status change.
//!
//! Listeners run synchronously inside the breaker call that caused the transition, after
//! the new record is persisted; keep them cheap and non-blocking. A transition whose write
//! was rejected is never reported.

use crate::state::Status;
use std::sync::{Arc, Mutex};

/// Callback invoked with `(key, from, to)` whenever a breaker changes status.
pub trait TransitionListener: Send + Sync {
    fn on_transition(&self, key: &str, from: Status, to: Status);
}

impl<F> TransitionListener for F
where
    F: Fn(&str, Status, Status) + Send + Sync,
{
    fn on_transition(&self, key: &str, from: Status, to: Status) {
        self(key, from, to)
    }
}

/// Listener that ignores all transitions.
#[derive(Clone, Debug, Default)]
pub struct NullListener;

impl TransitionListener for NullListener {
    fn on_transition(&self, _key: &str, _from: Status, _to: Status) {}
}

/// Listener that logs transitions using the `tracing` crate.
#[derive(Clone, Debug, Default)]
pub struct LogListener;

impl TransitionListener for LogListener {
    fn on_transition(&self, key: &str, from: Status, to: Status) {
        tracing::info!(target: "tripwire::notify", key, %from, %to, "breaker_transition");
    }
}

/// A transition as recorded by [`MemoryListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub key: String,
    pub from: Status,
    pub to: Status,
}

/// Listener that stores transitions in memory, mainly for tests and inspection.
#[derive(Clone, Debug, Default)]
pub struct MemoryListener {
    transitions: Arc<Mutex<Vec<Transition>>>,
}

impl MemoryListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<Transition> {
        match self.transitions.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The most recent transition, if any.
    pub fn last(&self) -> Option<Transition> {
        self.transitions().pop()
    }

    pub fn clear(&self) {
        match self.transitions.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl TransitionListener for MemoryListener {
    fn on_transition(&self, key: &str, from: Status, to: Status) {
        let transition = Transition { key: key.to_string(), from, to };
        match self.transitions.lock() {
            Ok(mut guard) => guard.push(transition),
            Err(poisoned) => poisoned.into_inner().push(transition),
        }
    }
}

/// Fan out to several listeners in order.
#[derive(Clone, Default)]
pub struct FanoutListener {
    listeners: Vec<Arc<dyn TransitionListener>>,
}

impl FanoutListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<L: TransitionListener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }
}

impl std::fmt::Debug for FanoutListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutListener").field("listeners", &self.listeners.len()).finish()
    }
}

impl TransitionListener for FanoutListener {
    fn on_transition(&self, key: &str, from: Status, to: Status) {
        for listener in &self.listeners {
            listener.on_transition(key, from, to);
        }
    }
}
