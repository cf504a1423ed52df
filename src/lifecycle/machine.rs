//! # Generic start/stop state machine.
//!
//! [`Machine`] owns a runner's [`State`] and drives its [`Hooks`] through every
//! transition, publishing lifecycle events to a [`Bus`].
//!
//! ## Transition flow
//!
//! ```text
//! start():
//!   Stopped  → Starting → publish RunnerStarting → spawn enter_started()
//!              ├─ Ok  → Started → publish RunnerStarted
//!              └─ Err → Stopped → publish RunnerStartFailed
//!
//! stop():
//!   Started  → Stopping → publish RunnerStopping → spawn enter_stopped()
//!              ├─ Ok  → Stopped → publish RunnerStopped
//!              └─ Err → Stopped → publish RunnerStopFailed
//! ```
//!
//! ## Rules
//! - State checks happen **synchronously** in `start`/`stop`; illegal ordering is a [`StateError`]
//! - Each hook runs **exactly once** per transition, on a spawned task
//! - A panicking hook settles the machine with [`RunnerError::Panicked`]
//! - Grace callers subscribe to the settle notification **under the state lock**,
//!   so they can never miss the transition they join

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{RunnerError, StateError};
use crate::events::{Bus, Event, EventKind};
use crate::util::{join_info, lock, panic_info};

use super::runner::{Completion, Runner};
use super::state::{Options, State};

/// Capacity of the internal settle channel. Grace waiters only need the next
/// settle after they subscribed.
const SETTLE_CAPACITY: usize = 16;

/// # Transition hooks of a concrete runner.
///
/// `enter_started` runs on `Starting`, `enter_stopped` on `Stopping`. The
/// returned `Result` is the transition's single completion signal.
#[async_trait]
pub trait Hooks: Send + Sync + 'static {
    /// Brings the runner up. An error sends the machine back to `Stopped`.
    async fn enter_started(&self) -> Result<(), RunnerError>;

    /// Brings the runner down. The machine ends in `Stopped` either way.
    async fn enter_stopped(&self) -> Result<(), RunnerError>;

    /// Keep-alive hint. No effect by default.
    fn unref(&self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

impl Direction {
    fn source(self) -> State {
        match self {
            Direction::Up => State::Stopped,
            Direction::Down => State::Started,
        }
    }

    fn pending(self) -> State {
        match self {
            Direction::Up => State::Starting,
            Direction::Down => State::Stopping,
        }
    }

    fn target(self) -> State {
        match self {
            Direction::Up => State::Started,
            Direction::Down => State::Stopped,
        }
    }

    fn refusal(self, current: State) -> StateError {
        match (self, current) {
            (Direction::Up, State::Stopping) => StateError::StopInProgress,
            (Direction::Up, _) => StateError::AlreadyStarted,
            (Direction::Down, State::Starting) => StateError::StartInProgress,
            (Direction::Down, _) => StateError::AlreadyStopped,
        }
    }

    fn pending_event(self) -> EventKind {
        match self {
            Direction::Up => EventKind::RunnerStarting,
            Direction::Down => EventKind::RunnerStopping,
        }
    }
}

struct Shared<H> {
    name: Arc<str>,
    hooks: H,
    bus: Bus,
    state: Mutex<State>,
    settled: broadcast::Sender<Result<(), RunnerError>>,
    unref: AtomicBool,
}

/// # Lifecycle state machine.
///
/// Cheap to clone; clones share state and hooks.
///
/// ### Grace semantics
/// With [`Options::grace`]:
/// - `start` while `Started` → `Ok` immediately
/// - `start` while `Starting` → joins the in-flight start
/// - `start` while `Stopping` → waits for the stop, then starts again
///
/// `stop` mirrors these rules.
pub struct Machine<H> {
    shared: Arc<Shared<H>>,
}

impl<H> Clone for Machine<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: Hooks> Machine<H> {
    /// Creates a stopped machine.
    pub fn new(name: impl Into<Arc<str>>, hooks: H, bus: Bus) -> Self {
        let (settled, _rx) = broadcast::channel(SETTLE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                hooks,
                bus,
                state: Mutex::new(State::Stopped),
                settled,
                unref: AtomicBool::new(false),
            }),
        }
    }

    /// Runner name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Runner name as a shared string.
    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.shared.name)
    }

    /// Concrete hooks.
    pub fn hooks(&self) -> &H {
        &self.shared.hooks
    }

    /// Current state.
    pub fn state(&self) -> State {
        *lock(&self.shared.state)
    }

    /// Event bus.
    pub fn bus(&self) -> &Bus {
        &self.shared.bus
    }

    /// True once `unref` has been called.
    pub fn is_unref(&self) -> bool {
        self.shared.unref.load(Ordering::Acquire)
    }

    /// Requests `Stopped → Started`.
    pub fn start(&self, opts: Options) -> Result<Completion, StateError> {
        self.transition(Direction::Up, opts)
    }

    /// Requests `Started → Stopped`.
    pub fn stop(&self, opts: Options) -> Result<Completion, StateError> {
        self.transition(Direction::Down, opts)
    }

    /// Marks the machine and forwards the hint to the hooks.
    pub fn unref(&self) {
        self.shared.unref.store(true, Ordering::Release);
        self.shared.hooks.unref();
    }

    fn transition(&self, dir: Direction, opts: Options) -> Result<Completion, StateError> {
        let mut state = lock(&self.shared.state);
        let current = *state;

        if current == dir.source() {
            *state = dir.pending();
            drop(state);

            debug!(runner = %self.shared.name, state = %dir.pending(), "transition begins");
            self.shared.bus.publish(
                Event::new(dir.pending_event())
                    .with_runner(self.name_arc())
                    .with_state(dir.pending()),
            );

            let handle = tokio::spawn(drive(Arc::clone(&self.shared), dir));
            return Ok(self.await_handle(handle));
        }

        if !opts.grace {
            return Err(dir.refusal(current));
        }
        if current == dir.target() {
            return Ok(Box::pin(future::ready(Ok(()))));
        }

        let mut rx = self.shared.settled.subscribe();
        drop(state);

        if current == dir.pending() {
            let me = self.clone();
            return Ok(Box::pin(async move {
                match rx.recv().await {
                    Ok(outcome) => outcome,
                    Err(_) => me.resting_outcome(dir),
                }
            }));
        }

        // Opposite transition in flight: replay once it settles.
        let me = self.clone();
        let handle = tokio::spawn(async move {
            let _ = rx.recv().await;
            me.transition(dir, opts)?.await
        });
        Ok(self.await_handle(handle))
    }

    fn await_handle(
        &self,
        handle: tokio::task::JoinHandle<Result<(), RunnerError>>,
    ) -> Completion {
        let origin = self.name_arc();
        Box::pin(async move {
            handle.await.unwrap_or_else(|e| {
                Err(RunnerError::Panicked {
                    origin,
                    info: join_info(e),
                })
            })
        })
    }

    // Used when a waiter lagged behind the settle channel.
    fn resting_outcome(&self, dir: Direction) -> Result<(), RunnerError> {
        let current = self.state();
        if current == dir.target() {
            Ok(())
        } else {
            Err(dir.refusal(current).into())
        }
    }
}

async fn drive<H: Hooks>(shared: Arc<Shared<H>>, dir: Direction) -> Result<(), RunnerError> {
    let hook = match dir {
        Direction::Up => shared.hooks.enter_started(),
        Direction::Down => shared.hooks.enter_stopped(),
    };
    let outcome = match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(RunnerError::Panicked {
            origin: Arc::clone(&shared.name),
            info: panic_info(&*payload),
        }),
    };

    let entered = match (dir, &outcome) {
        (Direction::Up, Ok(())) => State::Started,
        _ => State::Stopped,
    };
    {
        let mut state = lock(&shared.state);
        *state = entered;
        let _ = shared.settled.send(outcome.clone());
    }

    let kind = match (dir, &outcome) {
        (Direction::Up, Ok(())) => EventKind::RunnerStarted,
        (Direction::Up, Err(_)) => EventKind::RunnerStartFailed,
        (Direction::Down, Ok(())) => EventKind::RunnerStopped,
        (Direction::Down, Err(_)) => EventKind::RunnerStopFailed,
    };
    let mut ev = Event::new(kind)
        .with_runner(Arc::clone(&shared.name))
        .with_state(entered);
    match &outcome {
        Ok(()) => debug!(runner = %shared.name, state = %entered, "transition settled"),
        Err(e) => {
            warn!(runner = %shared.name, state = %entered, error = %e, "transition failed");
            ev = ev.with_reason(e.to_string());
        }
    }
    shared.bus.publish(ev);
    outcome
}

impl<H: Hooks> Runner for Machine<H> {
    fn name(&self) -> &str {
        Machine::name(self)
    }

    fn state(&self) -> State {
        Machine::state(self)
    }

    fn start(&self, opts: Options) -> Result<Completion, StateError> {
        Machine::start(self, opts)
    }

    fn stop(&self, opts: Options) -> Result<Completion, StateError> {
        Machine::stop(self, opts)
    }

    fn unref(&self) {
        Machine::unref(self)
    }

    fn bus(&self) -> &Bus {
        Machine::bus(self)
    }
}
