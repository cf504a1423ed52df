//! # Example: interval-driven metric pipeline
//!
//! Demonstrates a task with every role:
//! - `Counter` collector emits a growing counter on each ping
//! - `Scale` processor multiplies values by a configured factor
//! - `Stdout` publisher prints what reaches the end of the pipeline
//! - `Interval` schedule pings its own task on a timer until stopped
//!
//! ## Flow
//! ```text
//! Interval ──ping──► Counter ──metric──► Scale ──metric──► Stdout ──► release
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example pipeline
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use plugvisor::{
    Channel, Config, Control, Factory, Metric, MetricRef, Options, PingDone, Pinger, Plugin,
    PluginError, PluginOptions, Processor, Publisher, Runner, WeakTask,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

struct Counter {
    ticks: AtomicU64,
    out: Channel<MetricRef>,
}

impl Pinger for Counter {
    fn ping(&self, done: PingDone) {
        let n = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        self.out
            .emit(&Metric::new("demo.ticks", n as f64).with_tag("source", "counter").into_ref());
        done.complete();
    }
}

#[async_trait]
impl Plugin for Counter {
    fn pinger(&self) -> Option<&dyn Pinger> {
        Some(self)
    }

    fn metrics(&self) -> Option<&Channel<MetricRef>> {
        Some(&self.out)
    }
}

#[derive(Deserialize)]
struct ScaleOptions {
    factor: f64,
}

struct Scale {
    factor: f64,
    out: Channel<MetricRef>,
}

impl Processor for Scale {
    fn process(&self, metric: &MetricRef) {
        let parent = Arc::clone(metric);
        let scaled = Metric::new(metric.name(), metric.value() * self.factor)
            .with_tags(metric.tags().clone())
            .on_release(move |_| {
                parent.release();
            });
        self.out.emit(&scaled.into_ref());
    }
}

#[async_trait]
impl Plugin for Scale {
    fn processor(&self) -> Option<&dyn Processor> {
        Some(self)
    }

    fn metrics(&self) -> Option<&Channel<MetricRef>> {
        Some(&self.out)
    }
}

struct Stdout;

impl Publisher for Stdout {
    fn publish(&self, metric: &MetricRef) {
        println!("{} = {} {:?}", metric.name(), metric.value(), metric.tags());
    }
}

#[async_trait]
impl Plugin for Stdout {
    fn publisher(&self) -> Option<&dyn Publisher> {
        Some(self)
    }
}

struct Interval {
    task: WeakTask,
    every: Duration,
    token: std::sync::Mutex<Option<CancellationToken>>,
}

#[async_trait]
impl Plugin for Interval {
    async fn start(&self) -> Result<(), PluginError> {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = self.task.clone();
        let every = self.every;

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = tick.tick() => {
                        let Some(task) = task.upgrade() else { break };
                        match task.ping() {
                            Ok(done) => done.await,
                            Err(e) => tracing::warn!(error = %e, "skipping tick"),
                        }
                    }
                }
            }
        });

        *self.token.lock().map_err(|_| PluginError::new("interval state poisoned"))? = Some(token);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PluginError> {
        if let Some(token) = self
            .token
            .lock()
            .map_err(|_| PluginError::new("interval state poisoned"))?
            .take()
        {
            token.cancel();
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    #[cfg(feature = "logging")]
    let subs: Vec<Arc<dyn plugvisor::Subscribe>> = vec![Arc::new(plugvisor::LogWriter)];
    #[cfg(not(feature = "logging"))]
    let subs: Vec<Arc<dyn plugvisor::Subscribe>> = Vec::new();

    let control = Control::builder(Config::default())
        .with_subscribers(subs)
        .build();
    let task = control.task("demo")?;

    task.collect(Factory::new("Counter", |_, _| {
        Ok(Counter {
            ticks: AtomicU64::new(0),
            out: Channel::new(),
        })
    }))?
    .process_with(
        Factory::new("Scale", |opts, _| {
            let ScaleOptions { factor } = opts.deserialize()?;
            Ok(Scale {
                factor,
                out: Channel::new(),
            })
        }),
        PluginOptions::new().with("factor", 100.0),
    )?
    .publish(Factory::new("Stdout", |_, _| Ok(Stdout)))?
    .schedule(Factory::new("Interval", |_, task| {
        Ok(Interval {
            task: task.downgrade(),
            every: Duration::from_millis(250),
            token: std::sync::Mutex::new(None),
        })
    }))?;

    control.start(Options::default())?.await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    control.stop(Options::default())?.await?;
    control.close_subscribers().await;
    Ok(())
}
