//! Lifecycle core: states, the [`Runner`] contract and the generic [`Machine`].
//!
//! Internal modules:
//! - [`state`]: [`State`] and call [`Options`];
//! - [`runner`]: the object-safe [`Runner`] trait and [`Completion`];
//! - [`machine`]: [`Machine`], the state machine every runner is built on, and its [`Hooks`].

mod machine;
mod runner;
mod state;

pub use machine::{Hooks, Machine};
pub use runner::{Completion, Runner, RunnerRef};
pub use state::{Options, State};
