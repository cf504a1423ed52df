//! # Factories and registration shapes.
//!
//! A [`Factory`] builds one plugin instance from merged options. A
//! [`Registration`] is what the task registration calls accept:
//!
//! ```text
//! Registration
//!   ├─ Factory(f)                  → one plugin
//!   ├─ Configured(reg, options)    → reg, with options layered on top
//!   └─ List([reg, reg, ...])       → every element, in order
//! ```
//!
//! [`Preset`] covers the generic "apply" role: a function that registers an
//! arbitrary set of plugins on a task.

use std::fmt;
use std::sync::Arc;

use crate::error::{PluginError, RegisterError};
use crate::task::Task;

use super::contract::Plugin;
use super::options::PluginOptions;

type BuildFn =
    dyn Fn(&PluginOptions, &Task) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync;

/// Builds plugin instances.
///
/// The type name becomes the last segment of the wrapped plugin name
/// (`<task:role[i]:TypeName>`).
#[derive(Clone)]
pub struct Factory {
    type_name: Arc<str>,
    build: Arc<BuildFn>,
}

impl Factory {
    /// Creates a factory from a fallible constructor.
    pub fn new<P, F>(type_name: impl Into<Arc<str>>, build: F) -> Self
    where
        P: Plugin,
        F: Fn(&PluginOptions, &Task) -> Result<P, PluginError> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            build: Arc::new(move |opts, task| {
                build(opts, task).map(|p| Arc::new(p) as Arc<dyn Plugin>)
            }),
        }
    }

    /// Creates a factory that hands out an existing instance.
    ///
    /// Every registration through this factory shares the same plugin.
    pub fn shared<P: Plugin>(type_name: impl Into<Arc<str>>, plugin: Arc<P>) -> Self {
        Self {
            type_name: type_name.into(),
            build: Arc::new(move |_, _| Ok(Arc::clone(&plugin) as Arc<dyn Plugin>)),
        }
    }

    /// Type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn type_name_arc(&self) -> Arc<str> {
        Arc::clone(&self.type_name)
    }

    pub(crate) fn build(
        &self,
        opts: &PluginOptions,
        task: &Task,
    ) -> Result<Arc<dyn Plugin>, PluginError> {
        (self.build)(opts, task)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Factory").field(&self.type_name).finish()
    }
}

/// Argument of the task registration calls.
#[derive(Clone, Debug)]
pub enum Registration {
    /// A single factory.
    Factory(Factory),
    /// A registration with options layered on top.
    Configured(Box<Registration>, PluginOptions),
    /// Several registrations, kept in order.
    List(Vec<Registration>),
}

impl Registration {
    /// Layers `options` over this registration.
    pub fn with_options(self, options: PluginOptions) -> Self {
        Registration::Configured(Box::new(self), options)
    }

    /// Flattens into `(factory, merged options)` pairs in registration order.
    pub(crate) fn expand(&self, base: &PluginOptions) -> Vec<(Factory, PluginOptions)> {
        let mut out = Vec::new();
        self.expand_into(base, &mut out);
        out
    }

    fn expand_into(&self, base: &PluginOptions, out: &mut Vec<(Factory, PluginOptions)>) {
        match self {
            Registration::Factory(f) => out.push((f.clone(), base.clone())),
            Registration::Configured(inner, opts) => inner.expand_into(&base.merged(opts), out),
            Registration::List(items) => {
                for item in items {
                    item.expand_into(base, out);
                }
            }
        }
    }
}

impl From<Factory> for Registration {
    fn from(f: Factory) -> Self {
        Registration::Factory(f)
    }
}

impl<T: Into<Registration>> From<(T, PluginOptions)> for Registration {
    fn from((reg, opts): (T, PluginOptions)) -> Self {
        reg.into().with_options(opts)
    }
}

impl<T: Into<Registration>> From<Vec<T>> for Registration {
    fn from(items: Vec<T>) -> Self {
        Registration::List(items.into_iter().map(Into::into).collect())
    }
}

type ApplyFn = dyn Fn(&Task, &PluginOptions) -> Result<(), RegisterError> + Send + Sync;

/// Registers a bundle of plugins on a task.
///
/// ### Example
/// ```rust
/// use plugvisor::Preset;
///
/// let preset = Preset::new("console", |task, opts| {
///     let _ = (task, opts);
///     Ok(())
/// });
/// assert_eq!(preset.name(), "console");
/// ```
#[derive(Clone)]
pub struct Preset {
    name: Arc<str>,
    apply: Arc<ApplyFn>,
}

impl Preset {
    /// Creates a preset. `apply` receives the task and the merged options.
    pub fn new<F>(name: impl Into<Arc<str>>, apply: F) -> Self
    where
        F: Fn(&Task, &PluginOptions) -> Result<(), RegisterError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            apply: Arc::new(apply),
        }
    }

    /// Preset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn run(&self, task: &Task, opts: &PluginOptions) -> Result<(), RegisterError> {
        (self.apply)(task, opts)
    }
}

impl fmt::Debug for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Preset").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl Plugin for Noop {}

    fn noop(name: &str) -> Factory {
        Factory::new(name.to_string(), |_, _| Ok(Noop))
    }

    #[test]
    fn nested_options_innermost_wins() {
        let reg: Registration = (
            vec![
                Registration::from((noop("A"), PluginOptions::new().with("x", 3))),
                noop("B").into(),
            ],
            PluginOptions::new().with("x", 2).with("y", 2),
        )
            .into();

        let base = PluginOptions::new().with("x", 1).with("z", 1);
        let flat = reg.expand(&base);

        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].0.type_name(), "A");
        assert_eq!(flat[0].1.get("x"), Some(&json!(3)));
        assert_eq!(flat[0].1.get("y"), Some(&json!(2)));
        assert_eq!(flat[0].1.get("z"), Some(&json!(1)));
        assert_eq!(flat[1].0.type_name(), "B");
        assert_eq!(flat[1].1.get("x"), Some(&json!(2)));
    }

    #[test]
    fn list_keeps_order() {
        let reg: Registration = vec![noop("A"), noop("B"), noop("C")].into();
        let names: Vec<String> = reg
            .expand(&PluginOptions::new())
            .iter()
            .map(|(f, _)| f.type_name().to_string())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
