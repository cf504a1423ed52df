//! # Runner adapter around a single plugin.
//!
//! [`DecoratedRunner`] gives a [`Plugin`] the full lifecycle state machine:
//! state guards, grace semantics, lifecycle events and error tagging.
//!
//! ## Flow
//! ```text
//! start(opts) ── Machine ──► plugin.start()
//!                              ├─ Ok      → Started
//!                              └─ Err(e)  → Stopped, RunnerError::Start { origin: name, source: e }
//!
//! plugin.errors().emit(e) ──► publish PluginError { runner: name, reason: e }
//! ```
//!
//! ## Rules
//! - The plugin's `start`/`stop` run **at most once** per transition
//! - Errors carry the runner's name as origin
//! - `unref` is forwarded to the plugin

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{PluginError, RunnerError, StateError};
use crate::events::{Bus, Event, EventKind};
use crate::lifecycle::{Completion, Hooks, Machine, Options, Runner, State};
use crate::plugin::Plugin;

struct PluginHooks {
    name: Arc<str>,
    plugin: Arc<dyn Plugin>,
}

#[async_trait]
impl Hooks for PluginHooks {
    async fn enter_started(&self) -> Result<(), RunnerError> {
        self.plugin
            .start()
            .await
            .map_err(|source| RunnerError::Start {
                origin: Arc::clone(&self.name),
                source,
            })
    }

    async fn enter_stopped(&self) -> Result<(), RunnerError> {
        self.plugin
            .stop()
            .await
            .map_err(|source| RunnerError::Stop {
                origin: Arc::clone(&self.name),
                source,
            })
    }

    fn unref(&self) {
        self.plugin.unref();
    }
}

/// Lifecycle adapter for one plugin.
pub struct DecoratedRunner {
    machine: Machine<PluginHooks>,
}

impl DecoratedRunner {
    /// Wraps `plugin` under `name`, publishing on `bus`.
    ///
    /// If the plugin exposes an errors channel, every emitted error is
    /// published as [`EventKind::PluginError`] with `name` as origin.
    pub fn new(name: impl Into<Arc<str>>, plugin: Arc<dyn Plugin>, bus: Bus) -> Self {
        let name: Arc<str> = name.into();
        if let Some(errors) = plugin.errors() {
            let origin = Arc::clone(&name);
            let bus = bus.clone();
            errors.subscribe(move |err: &PluginError| {
                warn!(runner = %origin, error = %err, "plugin error");
                bus.publish(
                    Event::new(EventKind::PluginError)
                        .with_runner(Arc::clone(&origin))
                        .with_reason(err.to_string()),
                );
            });
        }
        Self {
            machine: Machine::new(Arc::clone(&name), PluginHooks { name, plugin }, bus),
        }
    }

    /// Wrapped plugin.
    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.machine.hooks().plugin
    }
}

impl Runner for DecoratedRunner {
    fn name(&self) -> &str {
        self.machine.name()
    }

    fn state(&self) -> State {
        self.machine.state()
    }

    fn start(&self, opts: Options) -> Result<Completion, StateError> {
        self.machine.start(opts)
    }

    fn stop(&self, opts: Options) -> Result<Completion, StateError> {
        self.machine.stop(opts)
    }

    fn unref(&self) {
        self.machine.unref();
    }

    fn bus(&self) -> &Bus {
        self.machine.bus()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Channel;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Probe {
        starts: AtomicUsize,
        stops: AtomicUsize,
        unrefs: AtomicUsize,
        fail_start: AtomicBool,
        errors: Channel<PluginError>,
    }

    #[async_trait]
    impl Plugin for Probe {
        async fn start(&self) -> Result<(), PluginError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start.load(Ordering::SeqCst) {
                return Err("port in use".into());
            }
            Ok(())
        }

        async fn stop(&self) -> Result<(), PluginError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn unref(&self) {
            self.unrefs.fetch_add(1, Ordering::SeqCst);
        }

        fn errors(&self) -> Option<&Channel<PluginError>> {
            Some(&self.errors)
        }
    }

    fn wrap(probe: &Arc<Probe>) -> DecoratedRunner {
        DecoratedRunner::new(
            "<t:collector[0]:Probe>",
            Arc::clone(probe) as Arc<dyn Plugin>,
            Bus::new(16),
        )
    }

    #[tokio::test]
    async fn start_and_stop_call_plugin_once() {
        let probe = Arc::new(Probe::default());
        let runner = wrap(&probe);

        runner.start(Options::default()).unwrap().await.unwrap();
        runner.start(Options::grace()).unwrap().await.unwrap();
        runner.stop(Options::default()).unwrap().await.unwrap();

        assert_eq!(probe.starts.load(Ordering::SeqCst), 1);
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
        assert_eq!(runner.state(), State::Stopped);
    }

    #[tokio::test]
    async fn start_failure_is_tagged_with_name() {
        let probe = Arc::new(Probe::default());
        probe.fail_start.store(true, Ordering::SeqCst);
        let runner = wrap(&probe);

        let err = runner.start(Options::default()).unwrap().await.unwrap_err();
        assert_eq!(err.origin(), Some("<t:collector[0]:Probe>"));
        assert_eq!(
            err.to_string(),
            "<t:collector[0]:Probe> failed to start: port in use"
        );
        assert_eq!(runner.state(), State::Stopped);
    }

    #[tokio::test]
    async fn plugin_errors_reach_the_bus() {
        let probe = Arc::new(Probe::default());
        let runner = wrap(&probe);
        let mut rx = runner.bus().subscribe();

        probe.errors.emit(&PluginError::new("read timeout"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::PluginError);
        assert_eq!(ev.runner.as_deref(), Some("<t:collector[0]:Probe>"));
        assert_eq!(ev.reason.as_deref(), Some("read timeout"));
    }

    #[test]
    fn unref_reaches_plugin() {
        let probe = Arc::new(Probe::default());
        let runner = wrap(&probe);
        runner.unref();
        assert_eq!(probe.unrefs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exposes_the_wrapped_plugin() {
        let probe = Arc::new(Probe::default());
        let runner = wrap(&probe);
        let expected = Arc::clone(&probe) as Arc<dyn Plugin>;
        assert!(Arc::ptr_eq(runner.plugin(), &expected));
        assert!(runner.plugin().errors().is_some());
    }
}
