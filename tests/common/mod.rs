#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use plugvisor::{
    Channel, Event, Factory, Metric, MetricRef, PingDone, Pinger, Plugin, PluginError,
    PluginOptions, Processor, Publisher, Role, WeakTask,
};
use tokio::sync::broadcast;

/// Shared, ordered log of plugin calls: `"start a"`, `"ping b"`, ...
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Journal::default()
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Journal entries starting with `prefix`.
pub fn entries_with(journal: &Journal, prefix: &str) -> Vec<String> {
    entries(journal)
        .into_iter()
        .filter(|e| e.starts_with(prefix))
        .collect()
}

/// Every event currently buffered in `rx`.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PingMode {
    /// No ping capability.
    Off,
    /// Completes before `ping` returns.
    Inline,
    /// Parks the handle; the test completes it.
    Deferred,
}

/// Plugin that records every call and exposes the capabilities of its role.
pub struct Recorder {
    pub label: &'static str,
    role: Role,
    journal: Journal,
    ping_mode: PingMode,
    factor: f64,
    fail_start: bool,
    fail_stop: bool,
    out: Channel<MetricRef>,
    errors: Channel<PluginError>,
    pending: Mutex<Vec<PingDone>>,
    received: Mutex<Vec<MetricRef>>,
    unrefs: AtomicUsize,
}

impl Recorder {
    fn new(label: &'static str, role: Role, journal: &Journal) -> Self {
        Self {
            label,
            role,
            journal: Arc::clone(journal),
            ping_mode: PingMode::Off,
            factor: 1.0,
            fail_start: false,
            fail_stop: false,
            out: Channel::new(),
            errors: Channel::new(),
            pending: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
            unrefs: AtomicUsize::new(0),
        }
    }

    pub fn collector(label: &'static str, journal: &Journal) -> Self {
        Self::new(label, Role::Collector, journal)
    }

    /// Processor multiplying every value by `factor`.
    pub fn processor(label: &'static str, journal: &Journal, factor: f64) -> Self {
        Self {
            factor,
            ..Self::new(label, Role::Processor, journal)
        }
    }

    pub fn publisher(label: &'static str, journal: &Journal) -> Self {
        Self::new(label, Role::Publisher, journal)
    }

    pub fn schedule(label: &'static str, journal: &Journal) -> Self {
        Self::new(label, Role::Schedule, journal)
    }

    pub fn pinging(mut self, mode: PingMode) -> Self {
        self.ping_mode = mode;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Emits on the outgoing metrics channel.
    pub fn emit(&self, metric: Metric) -> MetricRef {
        let metric = metric.into_ref();
        self.out.emit(&metric);
        metric
    }

    /// Emits an out-of-band error.
    pub fn report(&self, message: &str) {
        self.errors.emit(&PluginError::new(message));
    }

    /// Parked ping handles, oldest first.
    pub fn take_pending(&self) -> Vec<PingDone> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }

    /// Metrics received through `process` or `publish`.
    pub fn received(&self) -> Vec<MetricRef> {
        self.received.lock().unwrap().clone()
    }

    pub fn unrefs(&self) -> usize {
        self.unrefs.load(Ordering::SeqCst)
    }

    fn log(&self, what: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{what} {}", self.label));
    }
}

#[async_trait]
impl Plugin for Recorder {
    async fn start(&self) -> Result<(), PluginError> {
        self.log("start");
        if self.fail_start {
            return Err(PluginError::new(format!("{} refused to start", self.label)));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.log("stop");
        if self.fail_stop {
            return Err(PluginError::new(format!("{} refused to stop", self.label)));
        }
        Ok(())
    }

    fn unref(&self) {
        self.unrefs.fetch_add(1, Ordering::SeqCst);
    }

    fn pinger(&self) -> Option<&dyn Pinger> {
        (self.ping_mode != PingMode::Off).then_some(self as &dyn Pinger)
    }

    fn processor(&self) -> Option<&dyn Processor> {
        (self.role == Role::Processor).then_some(self as &dyn Processor)
    }

    fn publisher(&self) -> Option<&dyn Publisher> {
        (self.role == Role::Publisher).then_some(self as &dyn Publisher)
    }

    fn metrics(&self) -> Option<&Channel<MetricRef>> {
        matches!(self.role, Role::Collector | Role::Processor).then_some(&self.out)
    }

    fn errors(&self) -> Option<&Channel<PluginError>> {
        Some(&self.errors)
    }
}

impl Pinger for Recorder {
    fn ping(&self, done: PingDone) {
        self.log("ping");
        match self.ping_mode {
            PingMode::Deferred => self.pending.lock().unwrap().push(done),
            _ => done.complete(),
        }
    }
}

impl Processor for Recorder {
    fn process(&self, metric: &MetricRef) {
        self.received.lock().unwrap().push(Arc::clone(metric));
        let parent = Arc::clone(metric);
        let next = Metric::new(metric.name(), metric.value() * self.factor)
            .with_tags(metric.tags().clone())
            .with_tag("via", self.label)
            .on_release(move |_| {
                parent.release();
            });
        self.out.emit(&next.into_ref());
    }
}

impl Publisher for Recorder {
    fn publish(&self, metric: &MetricRef) {
        self.received.lock().unwrap().push(Arc::clone(metric));
    }
}

/// Factory handing out `plugin`, tagged with its label.
pub fn factory(plugin: &Arc<Recorder>) -> Factory {
    Factory::shared(plugin.label, Arc::clone(plugin))
}

/// Factory recording the options it was built with.
pub fn options_probe(
    label: &'static str,
    journal: &Journal,
    seen: &Arc<Mutex<Vec<PluginOptions>>>,
) -> Factory {
    let journal = Arc::clone(journal);
    let seen = Arc::clone(seen);
    Factory::new(label, move |opts, _task| {
        seen.lock().unwrap().push(opts.clone());
        Ok(Recorder::publisher(label, &journal))
    })
}

/// Schedule plugin holding a weak handle to its own task.
pub struct Ticker {
    pub task: WeakTask,
    journal: Journal,
}

impl Ticker {
    pub fn factory(journal: &Journal) -> (Factory, Arc<Mutex<Option<Arc<Ticker>>>>) {
        let slot: Arc<Mutex<Option<Arc<Ticker>>>> = Arc::default();
        let built = Arc::clone(&slot);
        let journal = Arc::clone(journal);
        let factory = Factory::new("Ticker", move |_, task| {
            Ok(TickerHandle(Arc::clone(built.lock().unwrap().get_or_insert_with(|| {
                Arc::new(Ticker {
                    task: task.downgrade(),
                    journal: Arc::clone(&journal),
                })
            }))))
        });
        (factory, slot)
    }
}

/// Plugin wrapper so the test keeps a handle to the built [`Ticker`].
pub struct TickerHandle(pub Arc<Ticker>);

#[async_trait]
impl Plugin for TickerHandle {
    async fn start(&self) -> Result<(), PluginError> {
        self.0.journal.lock().unwrap().push("start ticker".into());
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        self.0.journal.lock().unwrap().push("stop ticker".into());
        Ok(())
    }
}
