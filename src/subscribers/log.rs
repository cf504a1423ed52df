//! # Logging subscriber.
//!
//! [`LogWriter`] forwards runtime events to `tracing`, one line per event.
//!
//! ## Levels
//! ```text
//! RunnerStartFailed, RunnerStopFailed, PluginError,
//! PingWarning, SubscriberPanicked, SubscriberOverflow   → warn
//! RunnerStarted, RunnerStopped, RollbackStarted          → info
//! everything else                                        → debug
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use plugvisor::{Config, Control};
//! use plugvisor::subscribers::LogWriter;
//!
//! # async fn demo() {
//! let control = Control::builder(Config::default())
//!     .with_subscribers(vec![Arc::new(LogWriter)])
//!     .build();
//! # }
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};

use super::subscribe::Subscribe;

/// Writes every event through `tracing`.
///
/// Enabled via the `logging` feature.
pub struct LogWriter;

impl LogWriter {
    fn label(kind: EventKind) -> &'static str {
        match kind {
            EventKind::RunnerStarting => "starting",
            EventKind::RunnerStarted => "started",
            EventKind::RunnerStartFailed => "start-failed",
            EventKind::RunnerStopping => "stopping",
            EventKind::RunnerStopped => "stopped",
            EventKind::RunnerStopFailed => "stop-failed",
            EventKind::RollbackStarted => "rollback",
            EventKind::PluginError => "plugin-error",
            EventKind::PingStarted => "ping-started",
            EventKind::PingCompleted => "ping-completed",
            EventKind::PingWarning => "ping-warning",
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let event = Self::label(e.kind);
        let runner = e.runner.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::RunnerStartFailed
            | EventKind::RunnerStopFailed
            | EventKind::PluginError
            | EventKind::PingWarning
            | EventKind::SubscriberPanicked
            | EventKind::SubscriberOverflow => {
                warn!(seq = e.seq, runner, reason, "[{event}]");
            }
            EventKind::RunnerStarted | EventKind::RunnerStopped | EventKind::RollbackStarted => {
                info!(seq = e.seq, runner, "[{event}]");
            }
            EventKind::RunnerStarting
            | EventKind::RunnerStopping
            | EventKind::PingStarted
            | EventKind::PingCompleted => {
                debug!(seq = e.seq, runner, "[{event}]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
