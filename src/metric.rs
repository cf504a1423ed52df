//! # Metric values flowing through a task pipeline.
//!
//! A [`Metric`] is opaque to the runtime beyond its name, value, tags and the
//! release operation. Stages receive a shared [`MetricRef`]; a stage that wants
//! to keep a metric past its publish step clones the `Arc`.
//!
//! ## Release
//! After the last publisher of a task handled a metric, the task calls
//! [`Metric::release`] exactly once. Release is idempotent and runs the
//! optional release hook the first time only, which lets collectors return
//! buffers to a pool.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use plugvisor::Metric;
//!
//! let released = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&released);
//! let m = Metric::new("cpu.load", 0.42)
//!     .with_tag("host", "edge-1")
//!     .on_release(move |_| { counter.fetch_add(1, Ordering::SeqCst); });
//!
//! assert!(m.release());
//! assert!(!m.release());
//! assert_eq!(released.load(Ordering::SeqCst), 1);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared handle passed between pipeline stages.
pub type MetricRef = Arc<Metric>;

type ReleaseHook = Box<dyn Fn(&Metric) + Send + Sync>;

/// A single measurement.
pub struct Metric {
    name: String,
    value: f64,
    tags: BTreeMap<String, String>,
    released: AtomicBool,
    on_release: Option<ReleaseHook>,
}

impl Metric {
    /// Creates an untagged metric.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            tags: BTreeMap::new(),
            released: AtomicBool::new(false),
            on_release: None,
        }
    }

    /// Adds a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Adds several tags.
    pub fn with_tags<K, V>(mut self, tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the hook run by the first [`release`](Metric::release).
    pub fn on_release(mut self, hook: impl Fn(&Metric) + Send + Sync + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Wraps the metric into a [`MetricRef`].
    pub fn into_ref(self) -> MetricRef {
        Arc::new(self)
    }

    /// Metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metric value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// All tags.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// A single tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Releases the metric. Returns `true` only for the first call.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(hook) = &self.on_release {
            hook(self);
        }
        true
    }

    /// True once released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("tags", &self.tags)
            .field("released", &self.is_released())
            .finish()
    }
}
