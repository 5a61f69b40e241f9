//! Process-wide registry of driver capabilities.
//!
//! Written exactly once per plugin name during registration and read many
//! times afterwards. A duplicate name is a typed, recoverable error — the
//! first registration stays intact — and every read accessor hands out deep
//! copies so callers cannot mutate shared state.

use std::collections::HashMap;

use sqlward_types::{DriverMetas, OptionalModule, Params, Rule};

use crate::error::DriverError;

/// Insertion-ordered, write-once map from plugin name to capabilities.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    names: Vec<String>,
    metas: HashMap<String, DriverMetas>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a plugin's capabilities under its declared name.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::DuplicatePlugin`] when the name is taken; the
    /// existing entry is untouched.
    pub fn insert(&mut self, metas: DriverMetas) -> Result<(), DriverError> {
        let name = metas.plugin_name().to_owned();
        if self.metas.contains_key(&name) {
            return Err(DriverError::DuplicatePlugin { name });
        }
        self.names.push(name.clone());
        self.metas.insert(name, metas);
        Ok(())
    }

    /// Returns the capabilities registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DriverMetas> {
        self.metas.get(name)
    }

    /// Returns `true` when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.metas.contains_key(name)
    }

    /// Returns the registered plugin names in registration order.
    #[must_use]
    pub fn driver_names(&self) -> Vec<String> {
        self.names.clone()
    }

    /// Returns a deep copy of every plugin's capability descriptor, in
    /// registration order.
    #[must_use]
    pub fn all_metas(&self) -> Vec<DriverMetas> {
        self.names
            .iter()
            .filter_map(|name| self.metas.get(name))
            .cloned()
            .collect()
    }

    /// Returns a deep copy of every plugin's rule list.
    #[must_use]
    pub fn all_rules(&self) -> HashMap<String, Vec<Rule>> {
        self.metas
            .iter()
            .map(|(name, metas)| (name.clone(), metas.rules().to_vec()))
            .collect()
    }

    /// Returns a deep copy of every plugin's additional-parameter schema.
    #[must_use]
    pub fn all_additional_params(&self) -> HashMap<String, Params> {
        self.metas
            .iter()
            .map(|(name, metas)| (name.clone(), metas.database_additional_params().clone()))
            .collect()
    }

    /// Returns `true` when the named plugin enables the given module.
    /// Unknown plugins enable nothing.
    #[must_use]
    pub fn is_optional_module_enabled(&self, name: &str, module: OptionalModule) -> bool {
        self.metas
            .get(name)
            .is_some_and(|metas| metas.is_optional_module_enabled(module))
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` when no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
