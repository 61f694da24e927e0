//! Per-invocation state bag
//!
//! A [`ResourceData`] carries the declared configuration of one resource and
//! the state persisted by the previous invocation. Reconcilers read through
//! it, write observed values back with [`ResourceData::set`], and report which
//! declared keys were actually applied when running in partial mode.

use crate::error::{CloudError, Result};
use crate::state::ResourceState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub type Attributes = Map<String, Value>;

/// Whether a value is the zero value of its type
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    /// Declared configuration
    config: Attributes,
    /// State persisted by the previous invocation
    state: Attributes,
    /// Values written during this invocation
    written: Attributes,
    partial: bool,
    synced: BTreeSet<String>,
    created_at: Option<DateTime<Utc>>,
}

impl ResourceData {
    /// Bag for a resource with no prior state
    pub fn new(config: Attributes) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Bag for a resource known from a previous invocation
    pub fn from_state(state: &ResourceState, config: Attributes) -> Self {
        Self {
            id: state.id.clone(),
            config,
            state: state.attributes.clone(),
            created_at: Some(state.created_at),
            ..Default::default()
        }
    }

    /// Bag addressing an existing entity by id only (import)
    pub fn with_id(id: impl Into<String>, config: Attributes) -> Self {
        Self {
            id: id.into(),
            config,
            ..Default::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set the resource id. An empty id marks the resource as gone.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Current value of a key: written this invocation, else declared, else
    /// persisted
    pub fn get(&self, key: &str) -> Option<&Value> {
        non_null(self.written.get(key))
            .or_else(|| non_null(self.config.get(key)))
            .or_else(|| non_null(self.state.get(key)))
    }

    /// Like [`ResourceData::get`] but zero values count as unset
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !is_zero(v))
    }

    /// `(persisted, declared)` pair for a key. A key missing from the
    /// declaration yields `Null` as the new value.
    pub fn get_change(&self, key: &str) -> (Value, Value) {
        let old = self.state.get(key).cloned().unwrap_or(Value::Null);
        let new = self.config.get(key).cloned().unwrap_or(Value::Null);
        (old, new)
    }

    /// Whether the declared value differs from the persisted one, treating
    /// zero values as unset
    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        match (is_zero(&old), is_zero(&new)) {
            (true, true) => false,
            (false, false) => old != new,
            _ => true,
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.written.insert(key.to_string(), value.into());
    }

    pub fn set_as<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| CloudError::InvalidAttribute {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.set(key, value);
        Ok(())
    }

    /// Enter or leave partial mode. In partial mode only keys reported
    /// through [`ResourceData::set_partial`] are taken from the declaration
    /// when the bag is committed.
    pub fn partial(&mut self, on: bool) {
        self.partial = on;
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Mark a declared key as applied
    pub fn set_partial(&mut self, key: &str) {
        self.synced.insert(key.to_string());
    }

    pub fn get_i64(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn get_u64(&self, key: &str) -> u64 {
        u64::try_from(self.get_i64(key)).unwrap_or(0)
    }

    pub fn get_str(&self, key: &str) -> &str {
        match self.get(key) {
            Some(Value::String(s)) => s.as_str(),
            _ => "",
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    pub fn get_list(&self, key: &str) -> Vec<Value> {
        match self.get(key) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Typed view of a key
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| CloudError::InvalidAttribute {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    /// Typed view of a declared-vs-persisted pair
    pub fn get_change_as<T: DeserializeOwned + Default>(&self, key: &str) -> Result<(T, T)> {
        let (old, new) = self.get_change(key);
        let parse = |v: Value| -> Result<T> {
            if v.is_null() {
                return Ok(T::default());
            }
            serde_json::from_value(v).map_err(|e| CloudError::InvalidAttribute {
                key: key.to_string(),
                message: e.to_string(),
            })
        };
        Ok((parse(old)?, parse(new)?))
    }

    pub fn config(&self) -> &Attributes {
        &self.config
    }

    /// Persisted attributes as seen at the start of this invocation
    pub fn prior(&self) -> &Attributes {
        &self.state
    }

    /// Declared keys not yet applied
    pub fn pending(&self) -> Vec<String> {
        if !self.partial {
            return Vec::new();
        }
        self.config
            .keys()
            .filter(|k| !self.synced.contains(*k))
            .cloned()
            .collect()
    }

    /// Fold the invocation into the state to persist. Returns `None` when the
    /// resource no longer exists.
    ///
    /// Persisted keys start from the prior state, take declared values that
    /// were applied (all of them outside partial mode), and finally the
    /// values observed during this invocation.
    pub fn commit(self, resource_type: &str) -> Option<ResourceState> {
        if self.id.is_empty() {
            return None;
        }

        let pending = self.pending();
        let mut attributes = self.state;
        for (key, value) in self.config {
            if !self.partial || self.synced.contains(&key) {
                attributes.insert(key, value);
            }
        }
        for (key, value) in self.written {
            attributes.insert(key, value);
        }

        let mut state = ResourceState::new(self.id, resource_type);
        if let Some(created_at) = self.created_at {
            state.created_at = created_at;
        }
        state.attributes = attributes;
        state.set_pending(pending);
        Some(state)
    }
}
