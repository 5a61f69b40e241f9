//! Per-plugin capability descriptors.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::params::Params;
use crate::rule::Rule;

/// A named, independently enable-able driver capability.
///
/// V2 plugins declare their enabled modules in their metadata reply; for V1
/// plugins the host derives the set by probing the optional services at
/// registration time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OptionalModule {
    /// Generating rollback SQL for an audited statement.
    GenRollbackSql,
    /// Read-only query execution.
    Query,
    /// Execution-plan rendering.
    Explain,
    /// Table schema introspection.
    GetTableMeta,
    /// Extracting table references from SQL text.
    ExtractTableFromSql,
    /// Estimating how many rows a statement would touch.
    EstimateSqlAffectRows,
    /// Killing an in-flight connection process on the database side.
    KillProcess,
    /// Executing several statements in one batch call.
    ExecBatch,
}

/// Capability descriptor a plugin produces once at registration.
///
/// Immutable thereafter; the registry hands out deep copies so no caller
/// can mutate shared state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverMetas {
    plugin_name: String,
    database_default_port: u16,
    rules: Vec<Rule>,
    database_additional_params: Params,
    enabled_optional_modules: Vec<OptionalModule>,
}

impl DriverMetas {
    /// Creates a descriptor for the named plugin.
    #[must_use]
    pub fn new(plugin_name: impl Into<String>, database_default_port: u16) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            database_default_port,
            rules: Vec::new(),
            database_additional_params: Params::new(),
            enabled_optional_modules: Vec::new(),
        }
    }

    /// Attaches the plugin's declared rules.
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    /// Attaches the schema of extra connection parameters.
    #[must_use]
    pub fn with_additional_params(mut self, params: Params) -> Self {
        self.database_additional_params = params;
        self
    }

    /// Declares the enabled optional modules.
    #[must_use]
    pub fn with_enabled_modules(mut self, modules: Vec<OptionalModule>) -> Self {
        self.enabled_optional_modules = modules;
        self
    }

    /// Returns the plugin name.
    #[must_use]
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Returns the database's conventional port.
    #[must_use]
    pub const fn database_default_port(&self) -> u16 {
        self.database_default_port
    }

    /// Returns the declared rules.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns the schema of extra connection parameters.
    #[must_use]
    pub const fn database_additional_params(&self) -> &Params {
        &self.database_additional_params
    }

    /// Returns the enabled optional modules.
    #[must_use]
    pub fn enabled_optional_modules(&self) -> &[OptionalModule] {
        &self.enabled_optional_modules
    }

    /// Returns `true` when the plugin enables the given module.
    #[must_use]
    pub fn is_optional_module_enabled(&self, module: OptionalModule) -> bool {
        self.enabled_optional_modules.contains(&module)
    }
}
