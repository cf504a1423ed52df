//! # Plugin options.
//!
//! [`PluginOptions`] is a JSON object handed to a plugin factory. Options are
//! layered at registration time, the innermost layer winning:
//!
//! ```text
//! Config::defaults  <  call defaults  <  list options  <  element options
//! ```
//!
//! Merging is shallow: a key present in the upper layer replaces the whole
//! value of the lower one.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PluginError;

/// Factory options, a JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginOptions(Map<String, Value>);

impl PluginOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value for `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Deserializes a single key.
    ///
    /// Absent keys yield `Ok(None)`.
    pub fn parse<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PluginError> {
        self.0
            .get(key)
            .map(|v| T::deserialize(v).map_err(PluginError::from_error))
            .transpose()
    }

    /// Deserializes the whole object into a typed configuration.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, PluginError> {
        T::deserialize(Value::Object(self.0.clone())).map_err(PluginError::from_error)
    }

    /// Returns `self` overlaid with `over`; keys of `over` win.
    pub fn merged(&self, over: &PluginOptions) -> PluginOptions {
        let mut out = self.0.clone();
        for (k, v) in &over.0 {
            out.insert(k.clone(), v.clone());
        }
        PluginOptions(out)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Converts a JSON value; non-objects yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for PluginOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PluginOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
