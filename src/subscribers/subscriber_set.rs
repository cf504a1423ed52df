//! # Non-blocking event fan-out to multiple subscribers.
//!
//! Provides [`SubscriberSet`], which distributes events to every subscriber
//! without blocking the publisher.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     │    (bounded)
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//!          (bounded)
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N while B processes N+5
//! - **Overflow**: event dropped for that subscriber only, `SubscriberOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Isolation**: a slow or panicking subscriber doesn't affect others
//! - **Per-subscriber FIFO**: each subscriber sees events in order
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber panics while holding a lock.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::{Bus, Event, EventKind};
use crate::util::panic_info;

use super::subscribe::Subscribe;

/// One subscriber: its queue, its worker and how many events it missed.
struct Slot {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
    worker: JoinHandle<()>,
    dropped: AtomicU64,
}

impl Slot {
    fn spawn(sub: Arc<dyn Subscribe>, bus: Bus) -> Self {
        let name = sub.name();
        let (sender, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

        let worker = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                if let Err(payload) = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await {
                    let info = panic_info(&*payload);
                    warn!(subscriber = name, %info, "subscriber panicked");
                    bus.publish(Event::subscriber_panicked(name, info));
                }
            }
        });
        Self {
            name,
            sender,
            worker,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queues `event`, returning the drop reason if the queue refused it.
    fn offer(&self, event: &Arc<Event>) -> Result<(), &'static str> {
        match self.sender.try_send(Arc::clone(event)) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(match err {
                    TrySendError::Full(_) => "full",
                    TrySendError::Closed(_) => "closed",
                })
            }
        }
    }
}

/// Fan-out coordinator for event subscribers.
pub struct SubscriberSet {
    slots: Vec<Slot>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber.
    ///
    /// Must be called within a tokio runtime. Queue capacity is at least 1.
    /// Panics and overflows are reported on `bus`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let slots = subs
            .into_iter()
            .map(|sub| Slot::spawn(sub, bus.clone()))
            .collect();
        Self { slots, bus }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Events dropped so far, summed over every subscriber.
    pub fn dropped(&self) -> u64 {
        self.slots
            .iter()
            .map(|slot| slot.dropped.load(Ordering::Relaxed))
            .sum()
    }

    /// Emits an event to all subscribers (clones the event once).
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a shared event to all subscribers.
    ///
    /// Overflow events that themselves overflow are not re-published.
    pub fn emit_arc(&self, event: Arc<Event>) {
        for slot in &self.slots {
            let Err(reason) = slot.offer(&event) else {
                continue;
            };
            debug!(subscriber = slot.name, kind = ?event.kind, reason, "event dropped");
            if event.kind != EventKind::SubscriberOverflow {
                self.bus.publish(Event::subscriber_overflow(slot.name, reason));
            }
        }
    }

    /// Closes every queue and waits until the workers drained them.
    pub async fn shutdown(self) {
        for Slot { sender, worker, .. } in self.slots {
            drop(sender);
            let _ = worker.await;
        }
    }
}
