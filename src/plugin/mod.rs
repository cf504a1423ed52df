//! Plugin-facing API: the [`Plugin`] contract, capability traits, option
//! layering and registration shapes.
//!
//! Internal modules:
//! - [`contract`]: [`Plugin`], [`Pinger`], [`Processor`], [`Publisher`], [`Capabilities`];
//! - [`channel`]: [`Channel`], the subscribe/notify stream a plugin owns;
//! - [`options`]: [`PluginOptions`];
//! - [`factory`]: [`Factory`], [`Registration`], [`Preset`].

mod channel;
mod contract;
mod factory;
mod options;

use std::fmt;

pub use channel::{Channel, Sink};
pub use contract::{Capabilities, Pinger, Plugin, Processor, Publisher};
pub use factory::{Factory, Preset, Registration};
pub use options::PluginOptions;

/// Slot a plugin is registered into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Produces metrics.
    Collector,
    /// Transforms metrics between collectors and publishers.
    Processor,
    /// Receives the final metrics.
    Publisher,
    /// Drives pings; not part of the metric graph.
    Schedule,
}

impl Role {
    /// Lower-case label, used in wrapped plugin names.
    pub fn as_label(&self) -> &'static str {
        match self {
            Role::Collector => "collector",
            Role::Processor => "processor",
            Role::Publisher => "publisher",
            Role::Schedule => "schedule",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
