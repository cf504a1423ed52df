//! # One-time task assembly.
//!
//! Runs on the first start of a [`Task`](crate::Task), under the registration lock:
//!
//! ```text
//! Roles ──wrap──► Wrapped (name, pingable) ──► DecoratedRunner ──► CompositeRunner
//!                     │
//!                     └──route──► collectors → processor[0] → … → processor[n-1] → publishers → release
//! ```
//!
//! Wrapped names read `<task:role[i]:TypeName>`.

use std::sync::Arc;

use tracing::debug;

use crate::error::StateError;
use crate::events::Bus;
use crate::metric::MetricRef;
use crate::plugin::{Plugin, Role, Sink};
use crate::runners::{AddOptions, CompositeRunner, DecoratedRunner};

/// A registered, not yet wrapped plugin.
pub(super) struct Entry {
    pub(super) plugin: Arc<dyn Plugin>,
    pub(super) type_name: Arc<str>,
}

/// Registration lists, in registration order.
#[derive(Default)]
pub(super) struct Roles {
    pub(super) collectors: Vec<Entry>,
    pub(super) processors: Vec<Entry>,
    pub(super) publishers: Vec<Entry>,
    pub(super) schedules: Vec<Entry>,
}

impl Roles {
    pub(super) fn get_mut(&mut self, role: Role) -> &mut Vec<Entry> {
        match role {
            Role::Collector => &mut self.collectors,
            Role::Processor => &mut self.processors,
            Role::Publisher => &mut self.publishers,
            Role::Schedule => &mut self.schedules,
        }
    }
}

/// Plugin with its diagnostic name and ping capability.
pub(super) struct Wrapped {
    pub(super) plugin: Arc<dyn Plugin>,
    pub(super) name: Arc<str>,
    pub(super) pingable: bool,
}

/// Frozen pipeline.
pub(super) struct Pipeline {
    /// Ping order: collectors, processors, publishers.
    pub(super) targets: Vec<Wrapped>,
    pub(super) schedules: Vec<Wrapped>,
}

impl Pipeline {
    /// Every wrapped plugin in start order.
    pub(super) fn all(&self) -> impl Iterator<Item = &Wrapped> {
        self.targets.iter().chain(&self.schedules)
    }
}

/// Wraps, registers and routes `roles` into `composite`.
pub(super) fn assemble(
    task: &str,
    roles: Roles,
    composite: &CompositeRunner,
    bus_capacity: usize,
) -> Result<Pipeline, StateError> {
    let Roles {
        collectors,
        processors,
        publishers,
        schedules,
    } = roles;

    let collectors = wrap(task, Role::Collector, collectors);
    let processors = wrap(task, Role::Processor, processors);
    let publishers = wrap(task, Role::Publisher, publishers);
    let schedules = wrap(task, Role::Schedule, schedules);

    let adapt = |w: &Wrapped| -> Arc<DecoratedRunner> {
        Arc::new(DecoratedRunner::new(
            Arc::clone(&w.name),
            Arc::clone(&w.plugin),
            Bus::new(bus_capacity),
        ))
    };
    for w in collectors.iter().chain(&processors).chain(&publishers) {
        composite.add_runner(adapt(w), AddOptions::default())?;
    }
    for w in &schedules {
        composite.add_runner(adapt(w), AddOptions::stop_first())?;
    }

    route(&collectors, &processors, &publishers);
    debug!(
        task,
        collectors = collectors.len(),
        processors = processors.len(),
        publishers = publishers.len(),
        schedules = schedules.len(),
        "pipeline assembled"
    );

    let mut targets = collectors;
    targets.extend(processors);
    targets.extend(publishers);
    Ok(Pipeline { targets, schedules })
}

fn wrap(task: &str, role: Role, entries: Vec<Entry>) -> Vec<Wrapped> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| Wrapped {
            name: format!("<{task}:{role}[{i}]:{}>", e.type_name).into(),
            pingable: e.plugin.pinger().is_some(),
            plugin: e.plugin,
        })
        .collect()
}

/// Connects the metric graph. Built back to front so each stage subscribes
/// the already built downstream sink.
fn route(collectors: &[Wrapped], processors: &[Wrapped], publishers: &[Wrapped]) {
    let sinks: Arc<[Arc<dyn Plugin>]> = publishers.iter().map(|w| Arc::clone(&w.plugin)).collect();
    let mut feed: Sink<MetricRef> = Arc::new(move |metric: &MetricRef| {
        for plugin in sinks.iter() {
            if let Some(publisher) = plugin.publisher() {
                publisher.publish(metric);
            }
        }
        metric.release();
    });

    for stage in processors.iter().rev() {
        if let Some(out) = stage.plugin.metrics() {
            out.subscribe_sink(feed);
        }
        let plugin = Arc::clone(&stage.plugin);
        feed = Arc::new(move |metric: &MetricRef| {
            if let Some(processor) = plugin.processor() {
                processor.process(metric);
            }
        });
    }

    for source in collectors {
        if let Some(out) = source.plugin.metrics() {
            out.subscribe_sink(Arc::clone(&feed));
        }
    }
}
