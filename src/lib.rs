//! # plugvisor
//!
//! **Plugvisor** is the orchestration core of a telemetry agent: it runs
//! independently authored plugins through a shared start/stop lifecycle, wires
//! their metric streams into a pipeline, and drives periodic work ("pings")
//! through them one plugin at a time.
//!
//! ## Architecture
//! ### Overview
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Control (composite of tasks, root bus, SubscriberSet)            │
//! └──────┬──────────────────────────┬─────────────────────────────────┘
//!        ▼                          ▼
//! ┌──────────────────┐       ┌──────────────────┐
//! │ Task "edge"      │       │ Task "audit"     │      each Task is a composite of
//! │  collectors      │       │  ...             │      DecoratedRunners, one per plugin
//! │  processors      │       └──────────────────┘
//! │  publishers      │
//! │  schedules       │
//! └──────┬───────────┘
//!        ▼
//!  DecoratedRunner ──► Plugin::start / Plugin::stop
//! ```
//!
//! ### Metric graph (per task)
//! ```text
//! collector ─┐
//! collector ─┼─► processor[0] ─► … ─► processor[n-1] ─┬─► publisher
//! collector ─┘                                        ├─► publisher
//!                                                     └─► metric.release()
//! ```
//!
//! ### Lifecycle
//! ```text
//! Stopped ──start──► Starting ──ok──► Started ──stop──► Stopping ──► Stopped
//!                        └──err──► Stopped
//! ```
//! Illegal ordering fails synchronously with a [`StateError`]; with
//! [`Options::grace`] calls join or replay in-flight transitions instead.
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Lifecycle**     | Guarded start/stop state machine with grace semantics.       | [`Runner`], [`Machine`], [`Options`]        |
//! | **Composition**   | Ordered children, rollback, stop-first, error aggregation.   | [`CompositeRunner`], [`AddOptions`]         |
//! | **Plugins**       | Optional hooks and capabilities, factories, presets.         | [`Plugin`], [`Factory`], [`Registration`]   |
//! | **Pipelines**     | Registration, wiring, ping cursor.                           | [`Task`], [`PingDone`], [`PingCompletion`]  |
//! | **Control**       | Top-level composite of tasks with subscribers.               | [`Control`], [`ControlBuilder`]             |
//! | **Errors**        | Typed synchronous and asynchronous errors.                   | [`StateError`], [`RunnerError`]             |
//! | **Events**        | Event bus and subscriber fan-out.                            | [`Event`], [`Subscribe`], [`SubscriberSet`] |
//! | **Configuration** | Bus capacity, aggregate policy, default options.             | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use plugvisor::{
//!     Channel, Config, Control, Factory, Metric, MetricRef, Options, PingDone, Pinger,
//!     Plugin, Publisher, Runner,
//! };
//!
//! struct Counter {
//!     out: Channel<MetricRef>,
//! }
//!
//! impl Pinger for Counter {
//!     fn ping(&self, done: PingDone) {
//!         self.out.emit(&Metric::new("ticks", 1.0).into_ref());
//!         done.complete();
//!     }
//! }
//!
//! #[async_trait]
//! impl Plugin for Counter {
//!     fn pinger(&self) -> Option<&dyn Pinger> { Some(self) }
//!     fn metrics(&self) -> Option<&Channel<MetricRef>> { Some(&self.out) }
//! }
//!
//! struct Stdout;
//!
//! impl Publisher for Stdout {
//!     fn publish(&self, metric: &MetricRef) {
//!         println!("{} = {}", metric.name(), metric.value());
//!     }
//! }
//!
//! #[async_trait]
//! impl Plugin for Stdout {
//!     fn publisher(&self) -> Option<&dyn Publisher> { Some(self) }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let control = Control::builder(Config::default()).build();
//!     let task = control.task("edge")?;
//!     task.collect(Factory::new("Counter", |_, _| Ok(Counter { out: Channel::new() })))?
//!         .publish(Factory::new("Stdout", |_, _| Ok(Stdout)))?;
//!
//!     control.start(Options::default())?.await?;
//!     task.ping()?.await;
//!     control.stop(Options::default())?.await?;
//!     Ok(())
//! }
//! ```

mod config;
mod control;
mod error;
mod lifecycle;
mod metric;
mod plugin;
mod runners;
mod task;
mod util;

pub mod events;
pub mod subscribers;

// ---- Public re-exports ----

pub use config::{AggregatePolicy, Config};
pub use control::{Control, ControlBuilder};
pub use error::{AggregateError, PluginError, RegisterError, RunnerError, StateError};
pub use events::{Bus, Event, EventKind};
pub use lifecycle::{Completion, Hooks, Machine, Options, Runner, RunnerRef, State};
pub use metric::{Metric, MetricRef};
pub use plugin::{
    Capabilities, Channel, Factory, Pinger, Plugin, PluginOptions, Preset, Processor, Publisher,
    Registration, Role, Sink,
};
pub use runners::{AddOptions, CompositeRunner, DecoratedRunner};
pub use subscribers::{Subscribe, SubscriberSet};
pub use task::{PingCompletion, PingDone, Task, WeakTask};

// Optional: built-in logging subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
