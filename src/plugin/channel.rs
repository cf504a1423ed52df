//! # Subscribe/notify channel embedded by plugins.
//!
//! [`Channel`] is the explicit replacement for an event emitter: a plugin owns
//! one per stream it produces (metrics, errors) and the task subscribes the
//! downstream handlers at wiring time.
//!
//! ## Rules
//! - Sinks are notified **synchronously**, in subscription order
//! - `emit` snapshots the sink list, so a sink may subscribe further sinks
//! - Clones share the sink list

use std::fmt;
use std::sync::{Arc, RwLock};

/// Handler attached to a [`Channel`].
pub type Sink<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered list of sinks notified on every emitted value.
pub struct Channel<T> {
    sinks: Arc<RwLock<Vec<Sink<T>>>>,
}

impl<T> Channel<T> {
    /// Creates a channel without sinks.
    pub fn new() -> Self {
        Self {
            sinks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Appends a sink.
    pub fn subscribe(&self, sink: impl Fn(&T) + Send + Sync + 'static) {
        self.subscribe_sink(Arc::new(sink));
    }

    /// Appends an already shared sink.
    pub fn subscribe_sink(&self, sink: Sink<T>) {
        self.sinks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(sink);
    }

    /// Notifies every sink in subscription order; returns how many were notified.
    pub fn emit(&self, value: &T) -> usize {
        let sinks: Vec<Sink<T>> = self
            .sinks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for sink in &sinks {
            sink(value);
        }
        sinks.len()
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True if nobody listens.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            sinks: Arc::clone(&self.sinks),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("sinks", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emits_in_subscription_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ch: Channel<u32> = Channel::new();
        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            ch.subscribe(move |v| seen.lock().unwrap().push(format!("{tag}{v}")));
        }
        assert_eq!(ch.emit(&7), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn sink_may_subscribe_during_emit() {
        let ch: Channel<u32> = Channel::new();
        let inner = ch.clone();
        ch.subscribe(move |_| inner.subscribe(|_| {}));
        assert_eq!(ch.emit(&1), 1);
        assert_eq!(ch.len(), 2);
    }

    #[test]
    fn empty_channel_notifies_nobody() {
        let ch: Channel<&str> = Channel::default();
        assert!(ch.is_empty());
        assert_eq!(ch.emit(&"x"), 0);
    }
}
