//! # Ping cursor.
//!
//! A ping walks the task's pingable plugins one at a time, in order
//! collectors → processors → publishers, waiting for each [`PingDone`] before
//! moving on.
//!
//! ## Flow
//! ```text
//! ping() ── active? ──yes──► Err(PingInProgress)
//!              │no
//!              ▼
//!        ┌─► next pingable target ──none──► publish PingCompleted, resolve PingCompletion
//!        │          │
//!        │          ▼
//!        │   pinger.ping(done)
//!        │          │
//!        │   done.complete() ─ inline? ──yes──► loop (no recursion)
//!        │          │no
//!        └──────────┘ (completing thread drives the next step)
//! ```
//!
//! ## Rules
//! - One ping per task at a time
//! - Steps are strictly sequential
//! - A [`PingDone`] advances the cursor **at most once**; a second completion, or a
//!   completion from an earlier step, publishes [`EventKind::PingWarning`]

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{PluginError, StateError};
use crate::events::{Event, EventKind};
use crate::lifecycle::Runner;
use crate::util::lock;

use super::handle::TaskInner;
use super::wiring::Wrapped;

/// Cursor state, guarded by the task's cursor mutex.
#[derive(Default)]
pub(super) struct Cursor {
    active: bool,
    index: usize,
    step: u64,
    driving: bool,
    done_inline: bool,
    current: Option<Arc<str>>,
    waiter: Option<oneshot::Sender<()>>,
}

impl Cursor {
    pub(super) fn current(&self) -> Option<Arc<str>> {
        self.current.clone()
    }

    fn finish(&mut self) -> Option<oneshot::Sender<()>> {
        self.active = false;
        self.driving = false;
        self.current = None;
        self.waiter.take()
    }
}

/// Resolves once every pingable plugin completed its ping.
#[must_use = "a ping completion does nothing unless awaited"]
pub struct PingCompletion {
    rx: oneshot::Receiver<()>,
}

impl Future for PingCompletion {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // A dropped sender means the task went away mid-ping; nothing left to wait for.
        Pin::new(&mut self.rx).poll(cx).map(|_| ())
    }
}

impl fmt::Debug for PingCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PingCompletion").finish_non_exhaustive()
    }
}

/// Completion handle for one ping step.
///
/// Clones share the completed flag: only the first `complete`/`fail` across
/// all clones counts.
#[derive(Clone)]
pub struct PingDone {
    task: Weak<TaskInner>,
    step: u64,
    target: Arc<str>,
    fired: Arc<AtomicBool>,
}

impl PingDone {
    fn new(task: Weak<TaskInner>, step: u64, target: Arc<str>) -> Self {
        Self {
            task,
            step,
            target,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reports the step as done.
    pub fn complete(&self) {
        self.settle(None);
    }

    /// Reports a failed step. The error is published as a plugin error and
    /// the ping moves on.
    pub fn fail(&self, err: impl Into<PluginError>) {
        self.settle(Some(err.into()));
    }

    /// Wrapped name of the plugin being pinged.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// True once completed or failed.
    pub fn is_done(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    fn settle(&self, failure: Option<PluginError>) {
        let task = self.task.upgrade();
        if self.fired.swap(true, Ordering::AcqRel) {
            self.warn(task.as_ref(), "ping completed more than once");
            return;
        }
        let Some(inner) = task else {
            debug!(target_plugin = %self.target, "ping completed after its task was dropped");
            return;
        };

        if let Some(err) = failure {
            warn!(task = %inner.name, target_plugin = %self.target, error = %err, "ping failed");
            inner.composite.bus().publish(
                Event::new(EventKind::PluginError)
                    .with_runner(Arc::clone(&self.target))
                    .with_reason(err.to_string()),
            );
        }
        if !advance(&inner, self.step) {
            self.warn(Some(&inner), "stale ping completion");
        }
    }

    fn warn(&self, task: Option<&Arc<TaskInner>>, reason: &'static str) {
        warn!(target_plugin = %self.target, step = self.step, "{reason}");
        if let Some(inner) = task {
            inner.composite.bus().publish(
                Event::new(EventKind::PingWarning)
                    .with_runner(Arc::clone(&self.target))
                    .with_reason(reason),
            );
        }
    }
}

impl fmt::Debug for PingDone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PingDone")
            .field("target", &self.target)
            .field("step", &self.step)
            .field("done", &self.is_done())
            .finish()
    }
}

/// Starts a ping on `inner`.
pub(super) fn begin(inner: &Arc<TaskInner>) -> Result<PingCompletion, StateError> {
    let (tx, rx) = oneshot::channel();
    {
        let mut cursor = lock(&inner.cursor);
        if cursor.active {
            return Err(StateError::PingInProgress);
        }
        cursor.active = true;
        cursor.index = 0;
        cursor.waiter = Some(tx);
    }

    debug!(task = %inner.name, "ping started");
    inner
        .composite
        .bus()
        .publish(Event::new(EventKind::PingStarted).with_runner(Arc::clone(&inner.name)));
    drive(inner);
    Ok(PingCompletion { rx })
}

/// Runs steps until one completes asynchronously or the targets are exhausted.
fn drive(inner: &Arc<TaskInner>) {
    let targets: &[Wrapped] = inner
        .pipeline
        .get()
        .map(|p| p.targets.as_slice())
        .unwrap_or_default();

    loop {
        let (plugin, done) = {
            let mut cursor = lock(&inner.cursor);
            let next = targets
                .iter()
                .enumerate()
                .skip(cursor.index)
                .find(|(_, w)| w.pingable);

            let Some((index, target)) = next else {
                let waiter = cursor.finish();
                drop(cursor);
                debug!(task = %inner.name, "ping completed");
                inner.composite.bus().publish(
                    Event::new(EventKind::PingCompleted).with_runner(Arc::clone(&inner.name)),
                );
                if let Some(waiter) = waiter {
                    let _ = waiter.send(());
                }
                return;
            };

            cursor.index = index;
            cursor.step += 1;
            cursor.current = Some(Arc::clone(&target.name));
            cursor.driving = true;
            cursor.done_inline = false;
            let done = PingDone::new(Arc::downgrade(inner), cursor.step, Arc::clone(&target.name));
            (Arc::clone(&target.plugin), done)
        };

        debug!(task = %inner.name, target_plugin = %done.target(), "pinging");
        match plugin.pinger() {
            Some(pinger) => pinger.ping(done),
            None => done.complete(),
        }

        let mut cursor = lock(&inner.cursor);
        cursor.driving = false;
        if !cursor.done_inline {
            return;
        }
    }
}

/// Moves past the step `step`. Returns `false` for a stale completion.
fn advance(inner: &Arc<TaskInner>, step: u64) -> bool {
    let mut cursor = lock(&inner.cursor);
    if !cursor.active || cursor.step != step {
        return false;
    }
    cursor.index += 1;
    if cursor.driving {
        cursor.done_inline = true;
        return true;
    }
    drop(cursor);
    drive(inner);
    true
}
