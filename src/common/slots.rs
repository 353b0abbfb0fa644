//! Slot storage: the key/value context a session accumulates while walking
//! its scenario graph.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named context data owned by a single session.
///
/// Slots are written by `setSlot` nodes, form submissions, slot-filling
/// answers and API/LLM response mapping, and read by condition evaluation and
/// template interpolation. The map is insertion-order preserving only as far
/// as `serde_json::Map` is; ordering is never relied upon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slots(Map<String, Value>);

impl Slots {
    /// Create an empty slot map.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Look up a slot by its exact key.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a slot, replacing any previous value.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.set(key, value);
        self
    }

    /// Merge every entry of `other` into this map, overwriting on collision.
    pub fn merge(
        &mut self,
        other: &Slots,
    ) {
        for (k, v) in other.0.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn contains_key(
        &self,
        key: &str,
    ) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.0.iter()
    }

    /// Borrow the underlying JSON map (used by the path resolver).
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Slots {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Slots> for Value {
    fn from(slots: Slots) -> Self {
        Value::Object(slots.0)
    }
}

impl From<Value> for Slots {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self(Map::new()),
        }
    }
}

impl FromIterator<(String, Value)> for Slots {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
