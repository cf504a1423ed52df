//! Control and its builder.
//!
//! - [`Control`]: composite of tasks, root of the event bus tree;
//! - [`ControlBuilder`]: attaches subscribers before the control is used.

mod builder;
#[allow(clippy::module_inception)]
mod control;

pub use builder::ControlBuilder;
pub use control::Control;
