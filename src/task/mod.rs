//! Task pipeline: registration, one-time wiring and the ping cursor.
//!
//! Internal modules:
//! - [`handle`]: [`Task`], [`WeakTask`] and registration;
//! - [`wiring`]: wrapping, runner registration and metric routing, run once on first start;
//! - [`ping`]: the ping cursor, [`PingDone`] and [`PingCompletion`].

mod handle;
mod ping;
mod wiring;

pub use handle::{Task, WeakTask};
pub use ping::{PingCompletion, PingDone};
