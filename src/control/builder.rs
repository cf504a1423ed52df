use std::sync::Arc;

use crate::config::Config;
use crate::lifecycle::Runner;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::control::Control;

/// Builder for constructing a [`Control`] with optional features.
pub struct ControlBuilder {
    cfg: Config,
    name: Arc<str>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ControlBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            name: Arc::from("control"),
            subscribers: Vec::new(),
        }
    }

    /// Sets the control's runner name (default `"control"`).
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive every runtime event of the control and its tasks
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the control.
    ///
    /// Must be called within a tokio runtime when subscribers are configured:
    /// their workers and the bus listener are spawned here.
    pub fn build(self) -> Control {
        let control = Control::with_name(self.name, self.cfg);
        if !self.subscribers.is_empty() {
            let set = SubscriberSet::new(self.subscribers, control.bus().clone());
            control.attach(set);
        }
        control
    }
}
