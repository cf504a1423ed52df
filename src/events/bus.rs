//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing. Every runner owns one bus; a composite links
//! each child's bus to its own so events travel upward to the [`Control`](crate::Control).
//!
//! ## Architecture
//! ```text
//!   DecoratedRunner bus ──┐
//!   DecoratedRunner bus ──┼──► Task bus ──┐
//!   DecoratedRunner bus ──┘               ├──► Control bus ──► SubscriberSet
//!                         other Task bus ─┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Upward only**: an event published on a child is re-published on every ancestor.
//! - **Origin preserved**: forwarding never rewrites [`Event::runner`].
//! - **No persistence**: events are lost if there are no active receivers at send time.

use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast;

use super::event::Event;

#[derive(Debug)]
struct Inner {
    tx: broadcast::Sender<Event>,
    upstream: OnceLock<Bus>,
}

/// Broadcast channel for runtime events.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (`Arc`-backed); clones share the channel and upstream link.
#[derive(Clone, Debug)]
pub struct Bus {
    inner: Arc<Inner>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                tx,
                upstream: OnceLock::new(),
            }),
        }
    }

    /// Publishes an event locally and on every ancestor bus.
    pub fn publish(&self, ev: Event) {
        if let Some(up) = self.inner.upstream.get() {
            up.publish(ev.clone());
        }
        let _ = self.inner.tx.send(ev);
    }

    /// Creates a new receiver that observes subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.tx.subscribe()
    }

    /// Links this bus to `parent`; later events are forwarded to it.
    ///
    /// Returns `false` if the bus already has a parent or `parent` is this bus.
    pub fn forward_to(&self, parent: &Bus) -> bool {
        if self.same_channel(parent) {
            return false;
        }
        self.inner.upstream.set(parent.clone()).is_ok()
    }

    /// True if both handles refer to the same channel.
    pub fn same_channel(&self, other: &Bus) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
