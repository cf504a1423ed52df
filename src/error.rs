//! Error types used by the plugvisor runtime and plugins.
//!
//! This module defines the error taxonomy:
//!
//! - [`StateError`]: programmer errors (illegal call ordering); always returned synchronously.
//! - [`RunnerError`]: asynchronous start/stop failures delivered through a completion.
//! - [`AggregateError`]: every failure collected during one sequential sweep.
//! - [`RegisterError`]: plugin registration failures on a [`Task`](crate::Task).
//! - [`PluginError`]: the cause type plugins return from their hooks and emit out-of-band.
//!
//! All types provide `as_label` for logs/metrics. Runtime errors are `Clone` so that
//! grace joiners observe the same outcome as the original caller.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::AggregatePolicy;
use crate::plugin::Role;

/// # Illegal call ordering.
///
/// Returned synchronously at the call site; never retried or swallowed.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// `start` while `Started` or `Starting`.
    #[error("cannot start before stop")]
    AlreadyStarted,

    /// `start` while `Stopping`.
    #[error("cannot start before stop has completed")]
    StopInProgress,

    /// `stop` while `Stopped` or `Stopping`.
    #[error("cannot stop before start")]
    AlreadyStopped,

    /// `stop` while `Starting`.
    #[error("cannot stop before start has completed")]
    StartInProgress,

    /// `ping` while a previous ping on the same task is unresolved.
    #[error("cannot ping while a ping is in progress")]
    PingInProgress,

    /// Registration on a frozen task.
    #[error("cannot register plugins after the task has started")]
    Frozen,

    /// `add_runner` on a composite whose start has begun.
    #[error("cannot add a runner after start")]
    CompositeStarted,
}

impl StateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use plugvisor::StateError;
    ///
    /// assert_eq!(StateError::Frozen.as_label(), "state_frozen");
    /// assert_eq!(StateError::Frozen.to_string(), "cannot register plugins after the task has started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StateError::AlreadyStarted => "state_already_started",
            StateError::StopInProgress => "state_stop_in_progress",
            StateError::AlreadyStopped => "state_already_stopped",
            StateError::StartInProgress => "state_start_in_progress",
            StateError::PingInProgress => "state_ping_in_progress",
            StateError::Frozen => "state_frozen",
            StateError::CompositeStarted => "state_composite_started",
        }
    }
}

/// # Failure reported by a plugin.
///
/// Carries a human-readable message and, optionally, the underlying error.
/// Cheap to clone.
#[derive(Clone)]
pub struct PluginError {
    message: Arc<str>,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl PluginError {
    /// Creates an error from a message.
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an arbitrary error, keeping it as the source.
    pub fn from_error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: err.to_string().into(),
            source: Some(Arc::new(err)),
        }
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginError")
            .field("message", &self.message)
            .field("source", &self.source.as_ref().map(|s| s.to_string()))
            .finish()
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for PluginError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn StdError + 'static))
    }
}

impl From<&str> for PluginError {
    fn from(message: &str) -> Self {
        PluginError::new(message)
    }
}

impl From<String> for PluginError {
    fn from(message: String) -> Self {
        PluginError::new(message)
    }
}

/// # Asynchronous start/stop failures.
///
/// Delivered through a [`Completion`](crate::Completion), never returned synchronously.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RunnerError {
    /// A runner's start hook failed.
    #[error("{origin} failed to start: {source}")]
    Start {
        /// Fully-qualified name of the failing runner.
        origin: Arc<str>,
        /// Underlying cause.
        #[source]
        source: PluginError,
    },

    /// A runner's stop hook failed.
    #[error("{origin} failed to stop: {source}")]
    Stop {
        /// Fully-qualified name of the failing runner.
        origin: Arc<str>,
        /// Underlying cause.
        #[source]
        source: PluginError,
    },

    /// Failures collected during one composite sweep.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// A hook panicked; the machine settled anyway.
    #[error("{origin} panicked: {info}")]
    Panicked {
        /// Name of the runner whose hook panicked.
        origin: Arc<str>,
        /// Panic payload, if it was a string.
        info: String,
    },

    /// A grace replay hit an illegal state.
    #[error(transparent)]
    State(#[from] StateError),
}

impl RunnerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RunnerError::Start { .. } => "runner_start_failed",
            RunnerError::Stop { .. } => "runner_stop_failed",
            RunnerError::Aggregate(_) => "runner_aggregate",
            RunnerError::Panicked { .. } => "runner_panicked",
            RunnerError::State(e) => e.as_label(),
        }
    }

    /// Name of the runner the error originates from, when it has a single origin.
    pub fn origin(&self) -> Option<&str> {
        match self {
            RunnerError::Start { origin, .. }
            | RunnerError::Stop { origin, .. }
            | RunnerError::Panicked { origin, .. } => Some(origin),
            RunnerError::Aggregate(_) | RunnerError::State(_) => None,
        }
    }

    /// Returns the aggregate, if this is one.
    pub fn as_aggregate(&self) -> Option<&AggregateError> {
        match self {
            RunnerError::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }
}

/// # Every failure of one sequential sweep.
///
/// Built by composite runners during rollback and stop. The first entry of a
/// rollback aggregate is always the start failure that triggered it.
#[derive(Debug, Clone)]
pub struct AggregateError {
    errors: Vec<RunnerError>,
}

impl AggregateError {
    /// Creates an aggregate from the collected errors.
    pub fn new(errors: Vec<RunnerError>) -> Self {
        Self { errors }
    }

    /// Folds collected errors into a sweep outcome according to `policy`.
    ///
    /// No errors yields `Ok(())`. With [`AggregatePolicy::UnwrapSingle`] a
    /// single error is returned as-is instead of wrapped.
    pub fn collect(
        mut errors: Vec<RunnerError>,
        policy: AggregatePolicy,
    ) -> Result<(), RunnerError> {
        match (errors.len(), policy) {
            (0, _) => Ok(()),
            (1, AggregatePolicy::UnwrapSingle) => Err(errors.remove(0)),
            _ => Err(RunnerError::Aggregate(AggregateError::new(errors))),
        }
    }

    /// Like [`collect`](AggregateError::collect) for a sweep known to have failed:
    /// `cause` leads, followed by `rest`.
    pub fn with_cause(
        cause: RunnerError,
        rest: Vec<RunnerError>,
        policy: AggregatePolicy,
    ) -> RunnerError {
        if rest.is_empty() && policy == AggregatePolicy::UnwrapSingle {
            return cause;
        }
        let mut errors = Vec::with_capacity(rest.len() + 1);
        errors.push(cause);
        errors.extend(rest);
        RunnerError::Aggregate(AggregateError::new(errors))
    }

    /// Underlying errors in the order they occurred.
    pub fn errors(&self) -> &[RunnerError] {
        &self.errors
    }

    /// Number of underlying errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True if no errors were collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consumes the aggregate and returns the underlying errors.
    pub fn into_errors(self) -> Vec<RunnerError> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{e}")?;
        }
        Ok(())
    }
}

impl StdError for AggregateError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.errors.first().map(|e| e as &(dyn StdError + 'static))
    }
}

/// # Plugin registration failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RegisterError {
    /// The task is frozen.
    #[error(transparent)]
    State(#[from] StateError),

    /// The plugin does not expose a capability its role requires.
    #[error("{role} `{plugin}` lacks required capability `{capability}`")]
    MissingCapability {
        /// Role the plugin was registered for.
        role: Role,
        /// Type tag of the factory.
        plugin: Arc<str>,
        /// Missing capability.
        capability: &'static str,
    },

    /// The factory could not build the plugin.
    #[error("factory `{plugin}` failed: {source}")]
    Factory {
        /// Type tag of the factory.
        plugin: Arc<str>,
        /// Underlying cause.
        #[source]
        source: PluginError,
    },
}

impl RegisterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegisterError::State(e) => e.as_label(),
            RegisterError::MissingCapability { .. } => "register_missing_capability",
            RegisterError::Factory { .. } => "register_factory_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_err(origin: &str, msg: &str) -> RunnerError {
        RunnerError::Start {
            origin: origin.into(),
            source: PluginError::new(msg),
        }
    }

    #[test]
    fn state_messages_are_fixed() {
        assert_eq!(StateError::AlreadyStarted.to_string(), "cannot start before stop");
        assert_eq!(
            StateError::StopInProgress.to_string(),
            "cannot start before stop has completed"
        );
        assert_eq!(StateError::AlreadyStopped.to_string(), "cannot stop before start");
        assert_eq!(
            StateError::StartInProgress.to_string(),
            "cannot stop before start has completed"
        );
        assert_eq!(
            StateError::PingInProgress.to_string(),
            "cannot ping while a ping is in progress"
        );
    }

    #[test]
    fn collect_empty_is_ok() {
        assert!(AggregateError::collect(Vec::new(), AggregatePolicy::Always).is_ok());
        assert!(AggregateError::collect(Vec::new(), AggregatePolicy::UnwrapSingle).is_ok());
    }

    #[test]
    fn collect_single_respects_policy() {
        let wrapped = AggregateError::collect(vec![start_err("a", "boom")], AggregatePolicy::Always)
            .unwrap_err();
        assert_eq!(wrapped.as_aggregate().map(|a| a.len()), Some(1));

        let bare =
            AggregateError::collect(vec![start_err("a", "boom")], AggregatePolicy::UnwrapSingle)
                .unwrap_err();
        assert!(matches!(bare, RunnerError::Start { .. }));
        assert_eq!(bare.origin(), Some("a"));
    }

    #[test]
    fn collect_many_always_wraps() {
        let err = AggregateError::collect(
            vec![start_err("a", "one"), start_err("b", "two")],
            AggregatePolicy::UnwrapSingle,
        )
        .unwrap_err();
        let agg = err.as_aggregate().expect("aggregate");
        assert_eq!(agg.len(), 2);
        assert_eq!(
            agg.to_string(),
            "2 error(s) occurred: a failed to start: one; b failed to start: two"
        );

        let origins: Vec<_> = agg
            .clone()
            .into_errors()
            .iter()
            .map(|e| e.origin().map(str::to_owned))
            .collect();
        assert_eq!(origins, vec![Some("a".to_owned()), Some("b".to_owned())]);
    }

    #[test]
    fn plugin_error_keeps_source() {
        let io = std::io::Error::other("disk gone");
        let err = PluginError::from_error(io);
        assert_eq!(err.message(), "disk gone");
        assert!(StdError::source(&err).is_some());
        assert!(StdError::source(&PluginError::new("plain")).is_none());
    }
}
