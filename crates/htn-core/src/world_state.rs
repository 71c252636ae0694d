//! Bounded key/value world model.
//!
//! Conditions read it, effects write it. The planner forward-simulates on
//! private clones; the executor mutates the host's live instance.

use std::collections::BTreeMap;

use contracts::{OpaqueRef, Value, ValueKind, WorldStateLimits};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldStateError {
    #[error("world state key must not be empty")]
    EmptyKey,
    #[error("world state key {key:?} is longer than {max_len} bytes")]
    KeyTooLong { key: String, max_len: usize },
    #[error("world state is full ({capacity} entries), rejected new key {key:?}")]
    CapacityExceeded { key: String, capacity: usize },
    #[error("cannot increment {key:?}: {kind:?} is not numeric")]
    NotNumeric { key: String, kind: ValueKind },
}

/// Capacity-bounded mapping from keys to [`Value`]s.
///
/// A missing key is distinct from a key holding a zero-like value: `has`
/// tells them apart, while the typed getters return zero for both.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    entries: BTreeMap<String, Value>,
    limits: WorldStateLimits,
}

impl PartialEq for WorldState {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: WorldStateLimits) -> Self {
        Self {
            entries: BTreeMap::new(),
            limits,
        }
    }

    pub fn limits(&self) -> WorldStateLimits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Raw probe; `None` when the key is absent.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.entries.get(key).copied()
    }

    /// Stores `value` under `key`. Overwriting an existing key always
    /// succeeds; inserting a new key fails once the state is full.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), WorldStateError> {
        let value = value.into();
        if let Some(slot) = self.entries.get_mut(key) {
            *slot = value;
            return Ok(());
        }
        self.check_new_key(key)?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    pub fn set_int(&mut self, key: &str, value: i32) -> Result<(), WorldStateError> {
        self.set(key, Value::Int(value))
    }

    pub fn set_float(&mut self, key: &str, value: f32) -> Result<(), WorldStateError> {
        self.set(key, Value::Float(value))
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<(), WorldStateError> {
        self.set(key, Value::Bool(value))
    }

    pub fn set_ref(&mut self, key: &str, value: OpaqueRef) -> Result<(), WorldStateError> {
        self.set(key, Value::Ref(value))
    }

    pub fn get_int(&self, key: &str) -> i32 {
        self.value(key).map(|v| v.as_i32()).unwrap_or(0)
    }

    pub fn get_float(&self, key: &str) -> f32 {
        self.value(key).map(|v| v.as_f32()).unwrap_or(0.0)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.value(key).map(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn get_ref(&self, key: &str) -> OpaqueRef {
        self.value(key).map(|v| v.as_ref_handle()).unwrap_or_default()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Adds `amount` to a numeric entry, keeping the entry's own kind. An
    /// absent key is created holding `amount`.
    ///
    /// A `Float` amount added to an `Int` entry is truncated toward zero
    /// first, so `4 + 1.9` stores `5`. Integer sums saturate.
    pub fn increment(&mut self, key: &str, amount: Value) -> Result<Value, WorldStateError> {
        if !amount.is_numeric() {
            return Err(WorldStateError::NotNumeric {
                key: key.to_string(),
                kind: amount.kind(),
            });
        }
        let next = match self.entries.get(key) {
            None => amount,
            Some(Value::Int(current)) => Value::Int(current.saturating_add(amount.as_i32())),
            Some(Value::Float(current)) => Value::Float(current + amount.as_f32()),
            Some(other) => {
                return Err(WorldStateError::NotNumeric {
                    key: key.to_string(),
                    kind: other.kind(),
                })
            }
        };
        self.set(key, next)?;
        Ok(next)
    }

    pub fn increment_int(&mut self, key: &str, amount: i32) -> Result<i32, WorldStateError> {
        self.increment(key, Value::Int(amount)).map(|v| v.as_i32())
    }

    pub fn increment_float(&mut self, key: &str, amount: f32) -> Result<f32, WorldStateError> {
        self.increment(key, Value::Float(amount)).map(|v| v.as_f32())
    }

    /// Merges this state into `dest`: every entry here overwrites or creates
    /// the same key there, keys only `dest` holds are left alone. Nothing is
    /// written unless the whole merge fits within `dest`'s limits.
    pub fn copy_into(&self, dest: &mut WorldState) -> Result<(), WorldStateError> {
        let mut new_keys = 0;
        for key in self.entries.keys() {
            if dest.entries.contains_key(key) {
                continue;
            }
            dest.check_key(key)?;
            new_keys += 1;
            if dest.entries.len() + new_keys > dest.limits.max_entries {
                return Err(WorldStateError::CapacityExceeded {
                    key: key.clone(),
                    capacity: dest.limits.max_entries,
                });
            }
        }
        for (key, value) in &self.entries {
            dest.entries.insert(key.clone(), *value);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    fn check_key(&self, key: &str) -> Result<(), WorldStateError> {
        if key.is_empty() {
            return Err(WorldStateError::EmptyKey);
        }
        if key.len() > self.limits.max_key_len {
            return Err(WorldStateError::KeyTooLong {
                key: key.to_string(),
                max_len: self.limits.max_key_len,
            });
        }
        Ok(())
    }

    fn check_new_key(&self, key: &str) -> Result<(), WorldStateError> {
        self.check_key(key)?;
        if self.entries.len() >= self.limits.max_entries {
            return Err(WorldStateError::CapacityExceeded {
                key: key.to_string(),
                capacity: self.limits.max_entries,
            });
        }
        Ok(())
    }
}
