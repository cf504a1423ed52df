//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by runners, tasks and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast` with upward forwarding
//!
//! ## Quick reference
//! - **Publishers**: `Machine` (lifecycle), `CompositeRunner` (rollback),
//!   `DecoratedRunner` (plugin errors), `Task` (ping), `SubscriberSet` workers.
//! - **Consumers**: the `Control` listener feeding its `SubscriberSet`, and any
//!   caller holding a receiver from `Runner::bus().subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
