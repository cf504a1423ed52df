//! # Plugin contract.
//!
//! A plugin is any object implementing [`Plugin`]. Every method is optional:
//! the lifecycle hooks default to an asynchronous no-op and the capability
//! accessors default to `None`.
//!
//! | Capability  | Accessor                   | Needed by                     |
//! |-------------|----------------------------|-------------------------------|
//! | ping        | [`Plugin::pinger`]         | ping cursor (else skipped)    |
//! | process     | [`Plugin::processor`]      | processors                    |
//! | publish     | [`Plugin::publisher`]      | publishers                    |
//! | metrics out | [`Plugin::metrics`]        | collectors, processors        |
//! | errors out  | [`Plugin::errors`]         | optional for every role       |
//!
//! Capabilities are probed once per registration and once when the task wraps
//! its plugins; a plugin must answer consistently.

use async_trait::async_trait;

use crate::error::PluginError;
use crate::metric::MetricRef;
use crate::task::PingDone;

use super::Role;
use super::channel::Channel;

/// # Pipeline plugin.
///
/// ### Example
/// ```rust
/// use async_trait::async_trait;
/// use plugvisor::{Channel, MetricRef, Plugin, PluginError};
///
/// struct Cpu {
///     out: Channel<MetricRef>,
/// }
///
/// #[async_trait]
/// impl Plugin for Cpu {
///     async fn start(&self) -> Result<(), PluginError> {
///         Ok(())
///     }
///
///     fn metrics(&self) -> Option<&Channel<MetricRef>> {
///         Some(&self.out)
///     }
/// }
/// ```
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Acquires resources. Defaults to a no-op that yields once.
    async fn start(&self) -> Result<(), PluginError> {
        tokio::task::yield_now().await;
        Ok(())
    }

    /// Releases resources. Defaults to a no-op that yields once.
    async fn stop(&self) -> Result<(), PluginError> {
        tokio::task::yield_now().await;
        Ok(())
    }

    /// Keep-alive hint: the plugin should not hold the process open.
    fn unref(&self) {}

    /// Ping capability.
    fn pinger(&self) -> Option<&dyn Pinger> {
        None
    }

    /// Processing capability.
    fn processor(&self) -> Option<&dyn Processor> {
        None
    }

    /// Publishing capability.
    fn publisher(&self) -> Option<&dyn Publisher> {
        None
    }

    /// Outgoing metrics.
    fn metrics(&self) -> Option<&Channel<MetricRef>> {
        None
    }

    /// Out-of-band errors, forwarded to the event bus by the task.
    fn errors(&self) -> Option<&Channel<PluginError>> {
        None
    }
}

/// Triggers one unit of work on request.
///
/// The plugin must eventually call [`PingDone::complete`] or
/// [`PingDone::fail`], either before `ping` returns or later from any thread.
pub trait Pinger: Send + Sync {
    /// Starts one unit of work.
    fn ping(&self, done: PingDone);
}

/// Receives every metric of the previous pipeline stage.
///
/// Output goes to the plugin's own [`Plugin::metrics`] channel.
pub trait Processor: Send + Sync {
    /// Handles one metric.
    fn process(&self, metric: &MetricRef);
}

/// Terminal pipeline stage.
pub trait Publisher: Send + Sync {
    /// Handles one metric. The task releases the metric after every publisher returned.
    fn publish(&self, metric: &MetricRef);
}

/// Snapshot of the capabilities a plugin exposes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Has a [`Pinger`].
    pub ping: bool,
    /// Has a [`Processor`].
    pub process: bool,
    /// Has a [`Publisher`].
    pub publish: bool,
    /// Has a metrics channel.
    pub metrics: bool,
    /// Has an errors channel.
    pub errors: bool,
}

impl Capabilities {
    /// Probes `plugin`.
    pub fn of(plugin: &dyn Plugin) -> Self {
        Self {
            ping: plugin.pinger().is_some(),
            process: plugin.processor().is_some(),
            publish: plugin.publisher().is_some(),
            metrics: plugin.metrics().is_some(),
            errors: plugin.errors().is_some(),
        }
    }

    /// First capability `role` requires but this plugin lacks.
    pub fn missing_for(&self, role: Role) -> Option<&'static str> {
        match role {
            Role::Collector if !self.metrics => Some("metrics"),
            Role::Processor if !self.process => Some("process"),
            Role::Processor if !self.metrics => Some("metrics"),
            Role::Publisher if !self.publish => Some("publish"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    #[async_trait]
    impl Plugin for Bare {}

    struct Sink;

    impl Publisher for Sink {
        fn publish(&self, _metric: &MetricRef) {}
    }

    #[async_trait]
    impl Plugin for Sink {
        fn publisher(&self) -> Option<&dyn Publisher> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn default_hooks_succeed() {
        let p = Bare;
        assert!(p.start().await.is_ok());
        assert!(p.stop().await.is_ok());
    }

    #[test]
    fn requirements_per_role() {
        let bare = Capabilities::of(&Bare);
        assert_eq!(bare, Capabilities::default());
        assert_eq!(bare.missing_for(Role::Collector), Some("metrics"));
        assert_eq!(bare.missing_for(Role::Processor), Some("process"));
        assert_eq!(bare.missing_for(Role::Publisher), Some("publish"));
        assert_eq!(bare.missing_for(Role::Schedule), None);

        let sink = Capabilities::of(&Sink);
        assert!(sink.publish);
        assert_eq!(sink.missing_for(Role::Publisher), None);
    }
}
