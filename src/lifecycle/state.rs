//! # Lifecycle states and call options.

use std::fmt;

/// Lifecycle state of a [`Runner`](crate::Runner).
///
/// ```text
/// Stopped ──start──► Starting ──ok──► Started
///    ▲                  │                │
///    └──────err─────────┘              stop
///    ▲                                   ▼
///    └────────────(always)────────── Stopping
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Initial and final state.
    #[default]
    Stopped,
    /// Start hook in flight.
    Starting,
    /// Start hook succeeded.
    Started,
    /// Stop hook in flight.
    Stopping,
}

impl State {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            State::Stopped => "stopped",
            State::Starting => "starting",
            State::Started => "started",
            State::Stopping => "stopping",
        }
    }

    /// True while a transition is in flight.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, State::Starting | State::Stopping)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Options accepted by `start`/`stop`.
///
/// With `grace` set, a call that would conflict with the current state joins or
/// replays instead of failing:
/// - already in the requested state → immediate success;
/// - same transition in flight → resolves with its outcome;
/// - opposite transition in flight → re-issued once it settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Join or replay instead of returning a [`StateError`](crate::StateError).
    pub grace: bool,
}

impl Options {
    /// Options with `grace` enabled.
    pub const fn grace() -> Self {
        Self { grace: true }
    }
}
