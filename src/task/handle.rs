//! # Task: a pipeline of plugins with one lifecycle.
//!
//! A [`Task`] collects plugins by role, freezes on its first start, wraps and
//! wires them, then behaves as a composite runner over the wrapped plugins.
//!
//! ## Lifecycle
//! ```text
//! collect/process/publish/schedule/apply ──► (first start) freeze
//!                                                 │
//!                                   wrap + register + route (once)
//!                                                 │
//!                                  start/stop delegate to the composite
//! ```
//!
//! ## Ordering
//! - start: collectors → processors → publishers → schedules
//! - stop:  schedules → collectors → processors → publishers
//! - ping:  collectors → processors → publishers (pingable only)
//!
//! ## Example
//! ```rust,no_run
//! use plugvisor::{Config, Options, Runner, Task};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let task = Task::new("edge", Config::default());
//! // task.collect(...)?.publish(...)?;
//! task.start(Options::default())?.await?;
//! task.ping()?.await;
//! task.stop(Options::default())?.await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use tracing::debug;

use crate::config::Config;
use crate::error::{RegisterError, StateError};
use crate::events::Bus;
use crate::lifecycle::{Completion, Options, Runner, State};
use crate::plugin::{Capabilities, PluginOptions, Preset, Registration, Role};
use crate::runners::CompositeRunner;
use crate::util::lock;

use super::ping::{self, Cursor, PingCompletion};
use super::wiring::{self, Entry, Pipeline, Roles};

#[derive(Default)]
struct Slots {
    frozen: bool,
    roles: Roles,
}

pub(crate) struct TaskInner {
    pub(super) name: Arc<str>,
    config: Config,
    pub(super) composite: CompositeRunner,
    slots: Mutex<Slots>,
    pub(super) pipeline: OnceLock<Pipeline>,
    pub(super) cursor: Mutex<Cursor>,
}

/// Handle to a task. Clones refer to the same task.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

/// Non-owning task handle, for plugins that need to reach their task.
#[derive(Clone)]
pub struct WeakTask {
    inner: Weak<TaskInner>,
}

impl Task {
    /// Creates an empty, stopped task.
    pub fn new(name: impl Into<Arc<str>>, config: Config) -> Self {
        let name: Arc<str> = name.into();
        let composite = CompositeRunner::new(
            Arc::clone(&name),
            Bus::new(config.bus_capacity_clamped()),
            config.aggregate,
        );
        Self {
            inner: Arc::new(TaskInner {
                name,
                config,
                composite,
                slots: Mutex::new(Slots::default()),
                pipeline: OnceLock::new(),
                cursor: Mutex::new(Cursor::default()),
            }),
        }
    }

    /// Returns a non-owning handle.
    pub fn downgrade(&self) -> WeakTask {
        WeakTask {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True once the task has been started at least once.
    pub fn is_frozen(&self) -> bool {
        lock(&self.inner.slots).frozen
    }

    /// Registers collectors.
    pub fn collect(&self, reg: impl Into<Registration>) -> Result<&Self, RegisterError> {
        self.register(Role::Collector, reg.into(), &PluginOptions::new())
    }

    /// Registers collectors with per-call default options.
    pub fn collect_with(
        &self,
        reg: impl Into<Registration>,
        defaults: PluginOptions,
    ) -> Result<&Self, RegisterError> {
        self.register(Role::Collector, reg.into(), &defaults)
    }

    /// Registers processors. Processors run in registration order.
    pub fn process(&self, reg: impl Into<Registration>) -> Result<&Self, RegisterError> {
        self.register(Role::Processor, reg.into(), &PluginOptions::new())
    }

    /// Registers processors with per-call default options.
    pub fn process_with(
        &self,
        reg: impl Into<Registration>,
        defaults: PluginOptions,
    ) -> Result<&Self, RegisterError> {
        self.register(Role::Processor, reg.into(), &defaults)
    }

    /// Registers publishers.
    pub fn publish(&self, reg: impl Into<Registration>) -> Result<&Self, RegisterError> {
        self.register(Role::Publisher, reg.into(), &PluginOptions::new())
    }

    /// Registers publishers with per-call default options.
    pub fn publish_with(
        &self,
        reg: impl Into<Registration>,
        defaults: PluginOptions,
    ) -> Result<&Self, RegisterError> {
        self.register(Role::Publisher, reg.into(), &defaults)
    }

    /// Registers schedules. Schedules start last and stop first.
    pub fn schedule(&self, reg: impl Into<Registration>) -> Result<&Self, RegisterError> {
        self.register(Role::Schedule, reg.into(), &PluginOptions::new())
    }

    /// Registers schedules with per-call default options.
    pub fn schedule_with(
        &self,
        reg: impl Into<Registration>,
        defaults: PluginOptions,
    ) -> Result<&Self, RegisterError> {
        self.register(Role::Schedule, reg.into(), &defaults)
    }

    /// Runs a preset against this task.
    pub fn apply(&self, preset: &Preset) -> Result<&Self, RegisterError> {
        self.apply_with(preset, PluginOptions::new())
    }

    /// Runs a preset with options layered over the configured defaults.
    pub fn apply_with(
        &self,
        preset: &Preset,
        options: PluginOptions,
    ) -> Result<&Self, RegisterError> {
        if self.is_frozen() {
            return Err(StateError::Frozen.into());
        }
        debug!(task = %self.inner.name, preset = %preset.name(), "applying preset");
        preset.run(self, &self.inner.config.defaults.merged(&options))?;
        Ok(self)
    }

    /// Pings every pingable plugin in order.
    ///
    /// Fails with [`StateError::PingInProgress`] while a previous ping is unresolved.
    pub fn ping(&self) -> Result<PingCompletion, StateError> {
        ping::begin(&self.inner)
    }

    /// Pings and calls `on_done` afterwards, always from a spawned task.
    pub fn ping_with<F>(&self, on_done: F) -> Result<(), StateError>
    where
        F: FnOnce() + Send + 'static,
    {
        let completion = self.ping()?;
        tokio::spawn(async move {
            completion.await;
            on_done();
        });
        Ok(())
    }

    /// Wrapped name of the plugin currently being pinged.
    pub fn current_ping_target(&self) -> Option<Arc<str>> {
        lock(&self.inner.cursor).current()
    }

    /// Wrapped plugin names in start order. Empty before the first start.
    pub fn names(&self) -> Vec<Arc<str>> {
        self.inner
            .pipeline
            .get()
            .map(|p| p.all().map(|w| Arc::clone(&w.name)).collect())
            .unwrap_or_default()
    }

    fn register(
        &self,
        role: Role,
        reg: Registration,
        defaults: &PluginOptions,
    ) -> Result<&Self, RegisterError> {
        if self.is_frozen() {
            return Err(StateError::Frozen.into());
        }

        // Factories receive the task and may register on it, so build unlocked.
        let base = self.inner.config.defaults.merged(defaults);
        let mut built = Vec::new();
        for (factory, opts) in reg.expand(&base) {
            let plugin = factory
                .build(&opts, self)
                .map_err(|source| RegisterError::Factory {
                    plugin: factory.type_name_arc(),
                    source,
                })?;
            if let Some(capability) = Capabilities::of(plugin.as_ref()).missing_for(role) {
                return Err(RegisterError::MissingCapability {
                    role,
                    plugin: factory.type_name_arc(),
                    capability,
                });
            }
            built.push(Entry {
                plugin,
                type_name: factory.type_name_arc(),
            });
        }

        let mut slots = lock(&self.inner.slots);
        if slots.frozen {
            return Err(StateError::Frozen.into());
        }
        debug!(task = %self.inner.name, %role, count = built.len(), "plugins registered");
        slots.roles.get_mut(role).extend(built);
        Ok(self)
    }

    fn freeze(&self) -> Result<(), StateError> {
        let mut slots = lock(&self.inner.slots);
        if slots.frozen {
            return Ok(());
        }
        slots.frozen = true;
        let roles = std::mem::take(&mut slots.roles);
        let pipeline = wiring::assemble(
            &self.inner.name,
            roles,
            &self.inner.composite,
            self.inner.config.bus_capacity_clamped(),
        )?;
        let _ = self.inner.pipeline.set(pipeline);
        Ok(())
    }
}

impl Runner for Task {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn state(&self) -> State {
        self.inner.composite.state()
    }

    /// Freezes the task on first call, then starts every plugin in order.
    fn start(&self, opts: Options) -> Result<Completion, StateError> {
        self.freeze()?;
        self.inner.composite.start(opts)
    }

    fn stop(&self, opts: Options) -> Result<Completion, StateError> {
        self.inner.composite.stop(opts)
    }

    fn unref(&self) {
        self.inner.composite.unref();
    }

    fn bus(&self) -> &Bus {
        self.inner.composite.bus()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

impl WeakTask {
    /// Returns the task if it is still alive.
    pub fn upgrade(&self) -> Option<Task> {
        self.inner.upgrade().map(|inner| Task { inner })
    }
}

impl fmt::Debug for WeakTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakTask")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
