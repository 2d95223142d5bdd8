//! Extension options with change tracking
//!
//! Options are JSON values keyed by name. The values an extension was built
//! with are kept as its initial options so a manager can be recreated from
//! them, and keys marked static reject every later change.

use crate::core::{EditorError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Option values of one extension
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionOptions {
    values: BTreeMap<String, Value>,
    initial: BTreeMap<String, Value>,
    static_keys: BTreeSet<String>,
}

impl ExtensionOptions {
    /// Options of an extension that declares none
    pub const EMPTY: Self = Self {
        values: BTreeMap::new(),
        initial: BTreeMap::new(),
        static_keys: BTreeSet::new(),
    };

    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value that is part of the initial options
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        self.initial.insert(key.clone(), value.clone());
        self.values.insert(key, value);
        self
    }

    /// Add a value that can never change after creation
    pub fn with_static(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        self.static_keys.insert(key.clone());
        self.with(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn is_static(&self, key: &str) -> bool {
        self.static_keys.contains(key)
    }

    /// Options holding the initial values and the same static keys
    pub fn initial_options(&self) -> Self {
        Self {
            values: self.initial.clone(),
            initial: self.initial.clone(),
            static_keys: self.static_keys.clone(),
        }
    }

    /// Merge a JSON object into the options
    ///
    /// Nothing is written when any key in the update is static and differs
    /// from its current value.
    pub fn update(&mut self, extension: &str, update: Value) -> Result<OptionChanges> {
        let Value::Object(entries) = update else {
            return Err(EditorError::extension(
                extension,
                "option updates must be JSON objects",
            ));
        };

        if let Some((key, _)) = entries
            .iter()
            .find(|(key, value)| self.is_static(key) && self.values.get(*key) != Some(*value))
        {
            return Err(EditorError::StaticOption {
                extension: extension.to_string(),
                key: key.clone(),
            });
        }

        let mut changes = OptionChanges::default();
        for (key, value) in entries {
            let previous = self.values.get(&key).cloned();
            if previous.as_ref() == Some(&value) {
                continue;
            }
            self.values.insert(key.clone(), value.clone());
            changes.entries.insert(key, OptionChange { previous, value });
        }
        Ok(changes)
    }

    /// Restore the initial values
    pub fn reset(&mut self) -> OptionChanges {
        let mut changes = OptionChanges::default();
        for (key, value) in &self.initial {
            let previous = self.values.get(key).cloned();
            if previous.as_ref() != Some(value) {
                changes.entries.insert(
                    key.clone(),
                    OptionChange {
                        previous,
                        value: value.clone(),
                    },
                );
            }
        }
        let added: Vec<String> = self
            .values
            .keys()
            .filter(|key| !self.initial.contains_key(*key))
            .cloned()
            .collect();
        for key in added {
            if let Some(previous) = self.values.remove(&key) {
                changes.entries.insert(
                    key,
                    OptionChange {
                        previous: Some(previous),
                        value: Value::Null,
                    },
                );
            }
        }
        self.values = self.initial.clone();
        changes
    }
}

/// One changed option
#[derive(Debug, Clone, PartialEq)]
pub struct OptionChange {
    pub previous: Option<Value>,
    pub value: Value,
}

/// Options that changed in one update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionChanges {
    entries: BTreeMap<String, OptionChange>,
}

impl OptionChanges {
    pub fn changed(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&OptionChange> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
