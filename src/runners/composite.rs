//! # Ordered group of runners.
//!
//! [`CompositeRunner`] starts and stops its children as one unit, in order.
//!
//! ## Ordering
//! ```text
//! start order: registration order
//! stop order:  stop_first children (registration order), then the rest (registration order)
//! ```
//!
//! ## Start
//! ```text
//! for child in start order:
//!     child.start() ── Ok  → next
//!                   └─ Err → publish RollbackStarted
//!                            stop(grace) every started child, in stop order
//!                            fail with [start error, rollback errors...]
//! ```
//!
//! ## Stop
//! ```text
//! for child in stop order:
//!     child.stop(grace), collecting failures and continuing
//! fail with every collected error, if any
//! ```
//!
//! ## Rules
//! - Children are added only before the composite's first start
//! - Each child's bus is linked to the composite's bus
//! - `unref` reaches every child, including ones added afterwards

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::AggregatePolicy;
use crate::error::{AggregateError, RunnerError, StateError};
use crate::events::{Bus, Event, EventKind};
use crate::lifecycle::{Completion, Hooks, Machine, Options, Runner, RunnerRef, State};
use crate::util::lock;

/// Per-child options for [`CompositeRunner::add_runner`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Stop this child before every child added without the flag.
    pub stop_first: bool,
}

impl AddOptions {
    /// Options with `stop_first` set.
    pub const fn stop_first() -> Self {
        Self { stop_first: true }
    }
}

#[derive(Clone)]
struct Child {
    runner: RunnerRef,
    stop_first: bool,
}

struct Children {
    name: Arc<str>,
    bus: Bus,
    policy: AggregatePolicy,
    entries: Mutex<Vec<Child>>,
    sealed: AtomicBool,
    unref: AtomicBool,
}

impl Children {
    fn snapshot(&self) -> Vec<Child> {
        lock(&self.entries).clone()
    }

    fn stop_order(children: &[Child]) -> impl Iterator<Item = usize> + '_ {
        let first = children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.stop_first)
            .map(|(i, _)| i);
        let rest = children
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.stop_first)
            .map(|(i, _)| i);
        first.chain(rest)
    }

    async fn stop_child(child: &RunnerRef) -> Result<(), RunnerError> {
        child.stop(Options::grace())?.await
    }

    async fn rollback(
        &self,
        children: &[Child],
        started: &[bool],
        cause: RunnerError,
    ) -> RunnerError {
        warn!(runner = %self.name, error = %cause, "start failed, rolling back");
        self.bus.publish(
            Event::new(EventKind::RollbackStarted)
                .with_runner(Arc::clone(&self.name))
                .with_reason(cause.to_string()),
        );

        let mut errors = Vec::new();
        for i in Self::stop_order(children).filter(|&i| started[i]) {
            if let Err(e) = Self::stop_child(&children[i].runner).await {
                errors.push(e);
            }
        }
        AggregateError::with_cause(cause, errors, self.policy)
    }
}

#[async_trait]
impl Hooks for Children {
    async fn enter_started(&self) -> Result<(), RunnerError> {
        let children = self.snapshot();
        let mut started = vec![false; children.len()];

        for (i, child) in children.iter().enumerate() {
            debug!(runner = %self.name, child = %child.runner.name(), "starting child");
            let outcome = match child.runner.start(Options::default()) {
                Ok(done) => done.await,
                Err(e) => Err(e.into()),
            };
            match outcome {
                Ok(()) => started[i] = true,
                Err(cause) => return Err(self.rollback(&children, &started, cause).await),
            }
        }
        Ok(())
    }

    async fn enter_stopped(&self) -> Result<(), RunnerError> {
        let children = self.snapshot();
        let mut errors = Vec::new();

        for i in Self::stop_order(&children) {
            let child = &children[i].runner;
            debug!(runner = %self.name, child = %child.name(), "stopping child");
            if let Err(e) = Self::stop_child(child).await {
                warn!(
                    runner = %self.name,
                    child = %child.name(),
                    error = %e,
                    "child failed to stop"
                );
                errors.push(e);
            }
        }
        AggregateError::collect(errors, self.policy)
    }

    fn unref(&self) {
        let entries = lock(&self.entries);
        self.unref.store(true, Ordering::Release);
        for child in entries.iter() {
            child.runner.unref();
        }
    }
}

/// Runner made of ordered child runners.
///
/// Cheap to clone; clones share children and state.
#[derive(Clone)]
pub struct CompositeRunner {
    machine: Machine<Children>,
}

impl CompositeRunner {
    /// Creates an empty composite.
    pub fn new(name: impl Into<Arc<str>>, bus: Bus, policy: AggregatePolicy) -> Self {
        let name: Arc<str> = name.into();
        let children = Children {
            name: Arc::clone(&name),
            bus: bus.clone(),
            policy,
            entries: Mutex::new(Vec::new()),
            sealed: AtomicBool::new(false),
            unref: AtomicBool::new(false),
        };
        Self {
            machine: Machine::new(name, children, bus),
        }
    }

    /// Appends a child.
    ///
    /// Fails with [`StateError::CompositeStarted`] once `start` has been called.
    pub fn add_runner(&self, runner: RunnerRef, opts: AddOptions) -> Result<(), StateError> {
        let children = self.machine.hooks();
        let mut entries = lock(&children.entries);
        if children.sealed.load(Ordering::Acquire) {
            return Err(StateError::CompositeStarted);
        }
        if children.unref.load(Ordering::Acquire) {
            runner.unref();
        }
        runner.bus().forward_to(&children.bus);
        entries.push(Child {
            runner,
            stop_first: opts.stop_first,
        });
        Ok(())
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        lock(&self.machine.hooks().entries).len()
    }

    /// True if there are no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Child names in stop order.
    pub fn stop_order(&self) -> Vec<Arc<str>> {
        let children = self.machine.hooks().snapshot();
        Children::stop_order(&children)
            .map(|i| Arc::from(children[i].runner.name()))
            .collect()
    }

    fn seal(&self) {
        let children = self.machine.hooks();
        let _entries = lock(&children.entries);
        children.sealed.store(true, Ordering::Release);
    }
}

impl Runner for CompositeRunner {
    fn name(&self) -> &str {
        self.machine.name()
    }

    fn state(&self) -> State {
        self.machine.state()
    }

    fn start(&self, opts: Options) -> Result<Completion, StateError> {
        self.seal();
        self.machine.start(opts)
    }

    fn stop(&self, opts: Options) -> Result<Completion, StateError> {
        self.machine.stop(opts)
    }

    fn unref(&self) {
        self.machine.unref();
    }

    fn bus(&self) -> &Bus {
        self.machine.bus()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use std::sync::atomic::AtomicUsize;

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Child that records its calls into a shared journal.
    struct Leaf {
        name: &'static str,
        journal: Journal,
        fail_start: bool,
        fail_stop: bool,
        unrefs: AtomicUsize,
    }

    #[async_trait]
    impl Hooks for Leaf {
        async fn enter_started(&self) -> Result<(), RunnerError> {
            lock(&self.journal).push(format!("start {}", self.name));
            if self.fail_start {
                return Err(RunnerError::Start {
                    origin: self.name.into(),
                    source: PluginError::new("refused"),
                });
            }
            Ok(())
        }

        async fn enter_stopped(&self) -> Result<(), RunnerError> {
            lock(&self.journal).push(format!("stop {}", self.name));
            if self.fail_stop {
                return Err(RunnerError::Stop {
                    origin: self.name.into(),
                    source: PluginError::new("stuck"),
                });
            }
            Ok(())
        }

        fn unref(&self) {
            self.unrefs.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn leaf(
        name: &'static str,
        journal: &Journal,
        fail_start: bool,
        fail_stop: bool,
    ) -> Machine<Leaf> {
        Machine::new(
            name,
            Leaf {
                name,
                journal: Arc::clone(journal),
                fail_start,
                fail_stop,
                unrefs: AtomicUsize::new(0),
            },
            Bus::new(16),
        )
    }

    fn composite(policy: AggregatePolicy) -> CompositeRunner {
        CompositeRunner::new("group", Bus::new(64), policy)
    }

    fn entries(journal: &Journal) -> Vec<String> {
        lock(journal).clone()
    }

    #[tokio::test]
    async fn starts_in_order_stops_with_stop_first_leading() {
        let journal = Journal::default();
        let group = composite(AggregatePolicy::Always);
        group
            .add_runner(Arc::new(leaf("a", &journal, false, false)), AddOptions::default())
            .unwrap();
        group
            .add_runner(Arc::new(leaf("s", &journal, false, false)), AddOptions::stop_first())
            .unwrap();
        group
            .add_runner(Arc::new(leaf("b", &journal, false, false)), AddOptions::default())
            .unwrap();

        group.start(Options::default()).unwrap().await.unwrap();
        group.stop(Options::default()).unwrap().await.unwrap();

        assert_eq!(
            entries(&journal),
            vec!["start a", "start s", "start b", "stop s", "stop a", "stop b"]
        );
        let order: Vec<String> = group.stop_order().iter().map(|n| n.to_string()).collect();
        assert_eq!(order, vec!["s", "a", "b"]);
    }

    #[tokio::test]
    async fn failed_start_rolls_back_started_children() {
        let journal = Journal::default();
        let group = composite(AggregatePolicy::Always);
        let a = Arc::new(leaf("a", &journal, false, false));
        let b = Arc::new(leaf("b", &journal, true, false));
        let c = Arc::new(leaf("c", &journal, false, false));
        group
            .add_runner(a.clone(), AddOptions::default())
            .unwrap();
        group
            .add_runner(b.clone(), AddOptions::default())
            .unwrap();
        group
            .add_runner(c.clone(), AddOptions::default())
            .unwrap();

        let mut rx = group.bus().subscribe();
        let err = group.start(Options::default()).unwrap().await.unwrap_err();

        assert_eq!(entries(&journal), vec!["start a", "start b", "stop a"]);
        let agg = err.as_aggregate().expect("aggregate");
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.errors()[0].origin(), Some("b"));
        assert_eq!(group.state(), State::Stopped);
        assert_eq!(a.state(), State::Stopped);
        assert_eq!(c.state(), State::Stopped);

        let mut saw_rollback = false;
        while let Ok(ev) = rx.try_recv() {
            saw_rollback |= ev.kind == EventKind::RollbackStarted;
        }
        assert!(saw_rollback);
    }

    #[tokio::test]
    async fn rollback_failures_follow_the_cause() {
        let journal = Journal::default();
        let group = composite(AggregatePolicy::Always);
        group
            .add_runner(Arc::new(leaf("a", &journal, false, true)), AddOptions::default())
            .unwrap();
        group
            .add_runner(Arc::new(leaf("b", &journal, true, false)), AddOptions::default())
            .unwrap();

        let err = group.start(Options::default()).unwrap().await.unwrap_err();
        let origins: Vec<_> = err
            .as_aggregate()
            .expect("aggregate")
            .errors()
            .iter()
            .map(|e| e.origin().map(str::to_string))
            .collect();
        assert_eq!(origins, vec![Some("b".to_string()), Some("a".to_string())]);
    }

    #[tokio::test]
    async fn unwrap_single_policy_returns_bare_cause() {
        let journal = Journal::default();
        let group = composite(AggregatePolicy::UnwrapSingle);
        group
            .add_runner(Arc::new(leaf("a", &journal, true, false)), AddOptions::default())
            .unwrap();

        let err = group.start(Options::default()).unwrap().await.unwrap_err();
        assert!(matches!(err, RunnerError::Start { .. }));
    }

    #[tokio::test]
    async fn stop_continues_past_failures_and_aggregates() {
        let journal = Journal::default();
        let group = composite(AggregatePolicy::Always);
        group
            .add_runner(Arc::new(leaf("a", &journal, false, true)), AddOptions::default())
            .unwrap();
        group
            .add_runner(Arc::new(leaf("b", &journal, false, false)), AddOptions::default())
            .unwrap();
        group
            .add_runner(Arc::new(leaf("c", &journal, false, true)), AddOptions::default())
            .unwrap();

        group.start(Options::default()).unwrap().await.unwrap();
        let err = group.stop(Options::default()).unwrap().await.unwrap_err();

        assert_eq!(
            entries(&journal)[3..],
            ["stop a".to_string(), "stop b".to_string(), "stop c".to_string()]
        );
        assert_eq!(err.as_aggregate().map(AggregateError::len), Some(2));
        assert_eq!(group.state(), State::Stopped);
    }

    #[tokio::test]
    async fn empty_composite_starts_and_stops() {
        let group = composite(AggregatePolicy::Always);
        assert!(group.is_empty());
        group.start(Options::default()).unwrap().await.unwrap();
        group.stop(Options::default()).unwrap().await.unwrap();
    }

    #[tokio::test]
    async fn add_after_start_is_rejected() {
        let journal = Journal::default();
        let group = composite(AggregatePolicy::Always);
        group.start(Options::default()).unwrap().await.unwrap();

        let late = group.add_runner(
            Arc::new(leaf("late", &journal, false, false)),
            AddOptions::default(),
        );
        assert_eq!(late, Err(StateError::CompositeStarted));
        assert_eq!(group.len(), 0);
    }

    #[tokio::test]
    async fn child_events_reach_the_composite_bus() {
        let journal = Journal::default();
        let group = composite(AggregatePolicy::Always);
        group
            .add_runner(Arc::new(leaf("a", &journal, false, false)), AddOptions::default())
            .unwrap();

        let mut rx = group.bus().subscribe();
        group.start(Options::default()).unwrap().await.unwrap();

        let mut origins = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::RunnerStarted {
                origins.push(ev.runner.as_deref().map(str::to_string));
            }
        }
        assert_eq!(origins, vec![Some("a".to_string()), Some("group".to_string())]);
    }

    #[test]
    fn unref_propagates_to_current_and_later_children() {
        let journal = Journal::default();
        let group = composite(AggregatePolicy::Always);
        let early = Arc::new(leaf("early", &journal, false, false));
        group
            .add_runner(early.clone(), AddOptions::default())
            .unwrap();

        group.unref();
        let late = Arc::new(leaf("late", &journal, false, false));
        group
            .add_runner(late.clone(), AddOptions::default())
            .unwrap();

        assert_eq!(early.hooks().unrefs.load(Ordering::SeqCst), 1);
        assert_eq!(late.hooks().unrefs.load(Ordering::SeqCst), 1);
    }
}
