//! Concrete runners built on [`Machine`](crate::lifecycle::Machine).
//!
//! - [`DecoratedRunner`]: one plugin with lifecycle guards and error tagging;
//! - [`CompositeRunner`]: ordered children with rollback and error aggregation.

mod composite;
mod decorated;

pub use composite::{AddOptions, CompositeRunner};
pub use decorated::DecoratedRunner;
