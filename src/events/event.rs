//! # Runtime events emitted by runners, tasks and subscribers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: runner transitions (starting, started, stopping, stopped, failures)
//! - **Composite events**: rollback after a failed start
//! - **Plugin events**: out-of-band plugin errors, ping cycles and ping warnings
//! - **Subscriber events**: overflow and panics inside subscriber workers
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use plugvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::PluginError)
//!     .with_runner("<cpu:collector[0]:Procfs>")
//!     .with_reason("read failed");
//!
//! assert_eq!(ev.kind, EventKind::PluginError);
//! assert_eq!(ev.runner.as_deref(), Some("<cpu:collector[0]:Procfs>"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::lifecycle::State;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle events ===
    /// Runner entered `Starting`.
    ///
    /// Sets: `runner`, `state`
    RunnerStarting,

    /// Runner entered `Started`.
    ///
    /// Sets: `runner`, `state`
    RunnerStarted,

    /// Runner start hook failed; runner is back in `Stopped`.
    ///
    /// Sets: `runner`, `state`, `reason`
    RunnerStartFailed,

    /// Runner entered `Stopping`.
    ///
    /// Sets: `runner`, `state`
    RunnerStopping,

    /// Runner entered `Stopped` after a clean stop.
    ///
    /// Sets: `runner`, `state`
    RunnerStopped,

    /// Runner stop hook failed; runner is in `Stopped` anyway.
    ///
    /// Sets: `runner`, `state`, `reason`
    RunnerStopFailed,

    // === Composite events ===
    /// A child failed to start; already-started children are being stopped.
    ///
    /// Sets: `runner` (composite), `reason` (original failure)
    RollbackStarted,

    // === Plugin events ===
    /// A plugin reported an error outside of any start/stop/ping call.
    ///
    /// Sets: `runner` (origin plugin), `reason`
    PluginError,

    /// A ping cycle started on a task.
    ///
    /// Sets: `runner` (task)
    PingStarted,

    /// A ping cycle finished on a task.
    ///
    /// Sets: `runner` (task)
    PingCompleted,

    /// Non-fatal ping anomaly (double or stale completion).
    ///
    /// Sets: `runner` (plugin), `reason`
    PingWarning,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `runner` (subscriber name), `reason`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `runner` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the runner/plugin the event originates from.
    pub runner: Option<Arc<str>>,
    /// State the runner entered, for lifecycle events.
    pub state: Option<State>,
    /// Human-readable reason (errors, warnings, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            runner: None,
            state: None,
            reason: None,
        }
    }

    /// Attaches the origin runner name.
    #[inline]
    pub fn with_runner(mut self, runner: impl Into<Arc<str>>) -> Self {
        self.runner = Some(runner.into());
        self
    }

    /// Attaches the entered state.
    #[inline]
    pub fn with_state(mut self, state: State) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_runner(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_runner(subscriber)
            .with_reason(info)
    }

    /// True for events describing a failure (start/stop failures, plugin errors).
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::RunnerStartFailed | EventKind::RunnerStopFailed | EventKind::PluginError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::RunnerStarting);
        let b = Event::new(EventKind::RunnerStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_set_fields() {
        let ev = Event::new(EventKind::RunnerStartFailed)
            .with_runner("r")
            .with_state(State::Stopped)
            .with_reason("boom");
        assert_eq!(ev.runner.as_deref(), Some("r"));
        assert_eq!(ev.state, Some(State::Stopped));
        assert_eq!(ev.reason.as_deref(), Some("boom"));
        assert!(ev.is_failure());
        assert!(!Event::new(EventKind::PingCompleted).is_failure());
    }
}
