//! # Control: the top-level composite of tasks.
//!
//! A [`Control`] owns the root event bus and an ordered set of [`Task`]s. Its
//! start and stop sweep every task like any composite: tasks start in creation
//! order and stop in creation order, with rollback on a failed start.
//!
//! ## Event flow
//! ```text
//! DecoratedRunner bus ──► Task bus ──► Control bus ──► listener ──► SubscriberSet
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use plugvisor::{Config, Control, Options, Runner};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let control = Control::new(Config::default());
//! let edge = control.task("edge")?;
//! // edge.collect(...)?.publish(...)?;
//!
//! control.start(Options::default())?.await?;
//! edge.ping()?.await;
//! control.stop(Options::default())?.await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::StateError;
use crate::events::Bus;
use crate::lifecycle::{Completion, Options, Runner, State};
use crate::runners::{AddOptions, CompositeRunner};
use crate::subscribers::SubscriberSet;
use crate::task::Task;
use crate::util::lock;

use super::builder::ControlBuilder;

/// Bus listener feeding a [`SubscriberSet`].
struct Listener {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<SubscriberSet>,
}

impl Listener {
    /// Subscribes to `bus` and forwards events to `set` until stopped.
    fn spawn(bus: &Bus, set: SubscriberSet) -> Self {
        let mut rx = bus.subscribe();
        let (stop, mut stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    recv = rx.recv() => match recv {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "subscriber listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = &mut stopped => {
                        while let Ok(ev) = rx.try_recv() {
                            set.emit(&ev);
                        }
                        break;
                    }
                }
            }
            set
        });
        Self { stop, handle }
    }
}

/// Top-level runner owning every task.
pub struct Control {
    composite: CompositeRunner,
    config: Config,
    tasks: Mutex<Vec<Task>>,
    listener: Mutex<Option<Listener>>,
}

impl Control {
    /// Creates a control without subscribers.
    pub fn new(config: Config) -> Self {
        Self::with_name("control", config)
    }

    /// Returns a builder.
    pub fn builder(config: Config) -> ControlBuilder {
        ControlBuilder::new(config)
    }

    pub(super) fn with_name(name: impl Into<Arc<str>>, config: Config) -> Self {
        let composite = CompositeRunner::new(
            name,
            Bus::new(config.bus_capacity_clamped()),
            config.aggregate,
        );
        Self {
            composite,
            config,
            tasks: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
        }
    }

    pub(super) fn attach(&self, set: SubscriberSet) {
        let listener = Listener::spawn(self.composite.bus(), set);
        *lock(&self.listener) = Some(listener);
    }

    /// Creates a task sharing this control's configuration and registers it.
    ///
    /// Tasks start in creation order. Fails with [`StateError::CompositeStarted`]
    /// once the control has been started.
    pub fn task(&self, name: impl Into<Arc<str>>) -> Result<Task, StateError> {
        let task = Task::new(name, self.config.clone());
        self.composite
            .add_runner(Arc::new(task.clone()), AddOptions::default())?;
        debug!(control = %self.composite.name(), task = %task.name(), "task created");
        lock(&self.tasks).push(task.clone());
        Ok(task)
    }

    /// Tasks in creation order.
    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.tasks).clone()
    }

    /// Configuration shared by every task.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stops feeding subscribers and waits until they processed every queued event.
    ///
    /// Events already on the bus are delivered first. No-op without subscribers.
    pub async fn close_subscribers(&self) {
        let listener = lock(&self.listener).take();
        let Some(Listener { stop, handle }) = listener else {
            return;
        };
        let _ = stop.send(());
        match handle.await {
            Ok(set) => set.shutdown().await,
            Err(e) => warn!(error = %e, "subscriber listener did not finish"),
        }
    }
}

impl Runner for Control {
    fn name(&self) -> &str {
        self.composite.name()
    }

    fn state(&self) -> State {
        self.composite.state()
    }

    fn start(&self, opts: Options) -> Result<Completion, StateError> {
        self.composite.start(opts)
    }

    fn stop(&self, opts: Options) -> Result<Completion, StateError> {
        self.composite.stop(opts)
    }

    fn unref(&self) {
        self.composite.unref();
    }

    fn bus(&self) -> &Bus {
        self.composite.bus()
    }
}
