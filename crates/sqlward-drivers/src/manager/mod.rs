//! Plugin lifecycle management.
//!
//! The manager is the subsystem's composition root: it registers built-in
//! drivers, walks the plugin directory, launches each executable, installs
//! the adapter matching the negotiated protocol version, and populates the
//! registry. Startup is synchronous and loud — a plugin that fails to
//! negotiate aborts [`PluginManager::start`] rather than degrading
//! silently, so misconfiguration is visible immediately.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use sqlward_types::{DriverConfig, DriverMetas, OptionalModule, Params, Rule};
use sqlward_wire::handshake;

use crate::adapter::{AdapterV1, AdapterV2, PluginAdapter};
use crate::builtin::DriverFactory;
use crate::config::HostConfig;
use crate::error::DriverError;
use crate::facade::Driver;
use crate::process::{ExecutableLauncher, Launcher};
use crate::registry::DriverRegistry;

/// Log target for manager operations.
const MANAGER_TARGET: &str = "sqlward_drivers::manager";

/// Owns every installed adapter and the process-wide registry.
#[derive(Debug)]
pub struct PluginManager {
    config: HostConfig,
    registry: DriverRegistry,
    adapters: HashMap<String, PluginAdapter>,
}

impl PluginManager {
    /// Creates a manager with the given host configuration.
    #[must_use]
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            registry: DriverRegistry::new(),
            adapters: HashMap::new(),
        }
    }

    /// Registers built-in drivers, then discovers and registers every
    /// plugin executable in the configured directory.
    ///
    /// # Errors
    ///
    /// Returns the first registration failure: a plugin that cannot be
    /// launched or negotiated, or a duplicate plugin name. Plugins
    /// registered before the failure stay installed.
    pub fn start(
        &mut self,
        builtins: Vec<Arc<dyn DriverFactory>>,
    ) -> Result<(), DriverError> {
        for factory in builtins {
            self.install(PluginAdapter::BuiltIn(factory))?;
        }

        let Some(dir) = self.config.plugin_dir.clone() else {
            return Ok(());
        };
        for path in discover_executables(&dir)? {
            let launcher: Arc<dyn Launcher> = Arc::new(ExecutableLauncher::new(
                path,
                self.config.call_timeout(),
            ));
            self.install_plugin(launcher)?;
        }

        info!(
            target: MANAGER_TARGET,
            plugins = self.registry.len(),
            "plugin startup complete"
        );
        Ok(())
    }

    /// Launches one plugin through `launcher`, negotiates its protocol
    /// version, and installs the matching adapter.
    ///
    /// [`PluginManager::start`] calls this per discovered executable; it is
    /// public so hosts and tests can register plugins from other sources.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when launching, negotiation, registration
    /// probing, or the registry insert fails.
    pub fn install_plugin(&mut self, launcher: Arc<dyn Launcher>) -> Result<(), DriverError> {
        let mut process = launcher.launch()?;
        debug!(
            target: MANAGER_TARGET,
            plugin = %launcher.describe(),
            version = process.version(),
            "plugin negotiated"
        );

        let adapter = match process.version() {
            handshake::PROTOCOL_V1 => {
                PluginAdapter::V1(AdapterV1::register(Arc::clone(&launcher), process)?)
            }
            handshake::PROTOCOL_V2 => {
                PluginAdapter::V2(AdapterV2::register(Arc::clone(&launcher), process)?)
            }
            version => {
                process.kill();
                return Err(DriverError::UnsupportedProtocol {
                    plugin: launcher.describe(),
                    version,
                });
            }
        };
        self.install(adapter)
    }

    fn install(&mut self, adapter: PluginAdapter) -> Result<(), DriverError> {
        let metas = adapter.metas();
        let name = metas.plugin_name().to_owned();
        if let Err(err) = self.registry.insert(metas) {
            if let Err(stop_err) = adapter.stop() {
                warn!(
                    target: MANAGER_TARGET,
                    plugin = %name,
                    error = %stop_err,
                    "failed to stop rejected plugin"
                );
            }
            return Err(err);
        }
        info!(target: MANAGER_TARGET, plugin = %name, "plugin registered");
        self.adapters.insert(name, adapter);
        Ok(())
    }

    /// Opens a driver on the named plugin.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::PluginNotFound`] for unknown names, or any
    /// failure from the adapter's open.
    pub fn open(&self, name: &str, config: &DriverConfig) -> Result<Box<dyn Driver>, DriverError> {
        let adapter = self
            .adapters
            .get(name)
            .ok_or_else(|| DriverError::PluginNotFound {
                name: name.to_owned(),
            })?;
        adapter.open(config)
    }

    /// Stops every installed adapter, logging individual failures so one
    /// misbehaving plugin cannot block shutdown of the others. Idempotent.
    pub fn stop(&self) {
        for (name, adapter) in &self.adapters {
            if let Err(err) = adapter.stop() {
                warn!(
                    target: MANAGER_TARGET,
                    plugin = %name,
                    error = %err,
                    "failed to stop plugin"
                );
            }
        }
    }

    /// Returns the registry of declared capabilities.
    #[must_use]
    pub const fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Returns the registered plugin names in registration order.
    #[must_use]
    pub fn driver_names(&self) -> Vec<String> {
        self.registry.driver_names()
    }

    /// Returns a deep copy of every plugin's rule list.
    #[must_use]
    pub fn all_rules(&self) -> HashMap<String, Vec<Rule>> {
        self.registry.all_rules()
    }

    /// Returns a deep copy of every plugin's additional-parameter schema.
    #[must_use]
    pub fn all_additional_params(&self) -> HashMap<String, Params> {
        self.registry.all_additional_params()
    }

    /// Returns a deep copy of every plugin's capability descriptor.
    #[must_use]
    pub fn all_metas(&self) -> Vec<DriverMetas> {
        self.registry.all_metas()
    }

    /// Returns `true` when the named plugin enables the given module.
    #[must_use]
    pub fn is_optional_module_enabled(&self, name: &str, module: OptionalModule) -> bool {
        self.registry.is_optional_module_enabled(name, module)
    }
}

/// Lists the executable files directly inside `dir`, sorted by path so
/// registration order is deterministic.
pub(crate) fn discover_executables(dir: &Path) -> Result<Vec<PathBuf>, DriverError> {
    let entries = fs::read_dir(dir).map_err(|err| DriverError::Discovery {
        dir: dir.to_path_buf(),
        source: Arc::new(err),
    })?;

    let mut executables = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| DriverError::Discovery {
            dir: dir.to_path_buf(),
            source: Arc::new(err),
        })?;
        let metadata = entry.metadata().map_err(|err| DriverError::Discovery {
            dir: dir.to_path_buf(),
            source: Arc::new(err),
        })?;
        if metadata.is_dir() || !is_executable(&metadata) {
            continue;
        }
        executables.push(entry.path());
    }
    executables.sort();
    Ok(executables)
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

#[cfg(test)]
mod tests;
