//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for a [`Control`](crate::Control)
//! and every [`Task`](crate::Task) it mints.
//!
//! Config is used in two ways:
//! 1. **Control creation**: `Control::builder(config).build()`
//! 2. **Registration defaults**: `Config::defaults` sits under every plugin's merged options
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1

use crate::plugin::PluginOptions;

/// How a sweep that collected exactly one error reports it.
///
/// Composite runners collect every failure of a rollback or stop sweep. When
/// the sweep yields more than one error the result is always an
/// [`AggregateError`](crate::AggregateError); this policy only decides the
/// single-error case.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AggregatePolicy {
    /// Always wrap, even a single error.
    #[default]
    Always,
    /// Return a single error as-is.
    UnwrapSingle,
}

/// Global configuration for the orchestration runtime.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size per runner (min 1)
/// - `aggregate`: Single-error aggregate policy for composite sweeps
/// - `defaults`: Options merged under every registration (lowest precedence)
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of each runner's event bus broadcast ring buffer.
    ///
    /// Slow receivers that lag more than `bus_capacity` events skip older items.
    pub bus_capacity: usize,

    /// Single-error aggregate policy.
    pub aggregate: AggregatePolicy,

    /// Options every plugin factory sees unless overridden at registration.
    pub defaults: PluginOptions,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `aggregate = AggregatePolicy::Always`
    /// - `defaults = {}`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            aggregate: AggregatePolicy::default(),
            defaults: PluginOptions::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.bus_capacity, 1024);
        assert_eq!(cfg.aggregate, AggregatePolicy::Always);
        assert!(cfg.defaults.is_empty());
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
