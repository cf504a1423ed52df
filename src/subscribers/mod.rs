//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! DecoratedRunner ─┐
//! Task ────────────┼── publish(Event) ──► Control bus ──► listener ──► SubscriberSet::emit
//! Control ─────────┘                                                     │
//!                                                        ┌───────────────┼──────────────┐
//!                                                        ▼               ▼              ▼
//!                                                    LogWriter        Custom          ...
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
