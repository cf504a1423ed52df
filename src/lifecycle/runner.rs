//! # Runner contract.
//!
//! [`Runner`] is the object-safe face of every lifecycle participant: plugin
//! adapters, composites, tasks and the control. Composites hold their children
//! as [`RunnerRef`].

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{RunnerError, StateError};
use crate::events::Bus;

use super::state::{Options, State};

/// Outcome of a start/stop call.
///
/// The transition is already running when the call returns; awaiting the
/// completion only observes its result.
pub type Completion = BoxFuture<'static, Result<(), RunnerError>>;

/// Shared handle to a runner.
pub type RunnerRef = Arc<dyn Runner>;

/// # Start/stop lifecycle participant.
///
/// `start` and `stop` validate the current state synchronously and return a
/// [`StateError`] for illegal ordering (unless [`Options::grace`] is set).
/// Otherwise they return a [`Completion`] resolving once the transition settles.
///
/// Calls must be made from within a tokio runtime.
pub trait Runner: Send + Sync + 'static {
    /// Stable name used in logs, events and error origins.
    fn name(&self) -> &str;

    /// Current lifecycle state.
    fn state(&self) -> State;

    /// Requests `Stopped → Started`.
    fn start(&self, opts: Options) -> Result<Completion, StateError>;

    /// Requests `Started → Stopped`.
    fn stop(&self, opts: Options) -> Result<Completion, StateError>;

    /// Keep-alive hint; suppresses keep-alive of wrapped resources where supported.
    fn unref(&self);

    /// Event bus this runner publishes on.
    fn bus(&self) -> &Bus;
}
