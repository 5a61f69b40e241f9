//! Host-side driver errors.
//!
//! Variants separate the failures callers are expected to branch on: a
//! missing plugin, a duplicate registration, an absent optional module, and
//! the V2 crash-recovery outcomes ([`DriverError::SessionReset`] after a
//! successful respawn, [`DriverError::Reconnect`] when respawning itself
//! failed). I/O sources are wrapped in `Arc` so errors stay cheap to move.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use sqlward_types::OptionalModule;
use sqlward_wire::WireError;

/// Errors raised by plugin lifecycle management and driver calls.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The requested plugin is not registered.
    #[error("plugin '{name}' not found")]
    PluginNotFound {
        /// Name that was looked up.
        name: String,
    },

    /// A second plugin declared an already-registered name.
    #[error("duplicated plugin name '{name}'")]
    DuplicatePlugin {
        /// The contested name. The first registration stays intact.
        name: String,
    },

    /// The plugin does not implement the requested optional module.
    #[error("plugin '{plugin}' does not implement module {module}")]
    ModuleNotImplemented {
        /// Plugin name.
        plugin: String,
        /// The absent module.
        module: OptionalModule,
    },

    /// The plugin executable does not exist or is not runnable.
    #[error("plugin executable not found: {path}")]
    ExecutableNotFound {
        /// Path that was launched.
        path: PathBuf,
    },

    /// The plugin process could not be spawned.
    #[error("failed to spawn plugin '{path}': {message}")]
    SpawnFailed {
        /// Path that was launched.
        path: PathBuf,
        /// Description of the spawn failure.
        message: String,
        /// Underlying I/O error, when one exists.
        #[source]
        source: Option<Arc<io::Error>>,
    },

    /// The handshake with a freshly launched plugin failed.
    #[error("handshake with plugin '{plugin}' failed: {message}")]
    Handshake {
        /// Plugin name or executable path when the name is not yet known.
        plugin: String,
        /// Description of the failure.
        message: String,
    },

    /// The plugin negotiated a protocol version this adapter cannot drive.
    #[error("plugin '{plugin}' negotiated unsupported protocol version {version}")]
    UnsupportedProtocol {
        /// Plugin name or executable path.
        plugin: String,
        /// The negotiated version.
        version: u32,
    },

    /// The plugin process was replaced; the session this call carried is
    /// permanently invalid and the caller must open a fresh driver.
    #[error("plugin '{plugin}' was restarted; session is invalid, open the driver again")]
    SessionReset {
        /// Plugin name.
        plugin: String,
    },

    /// The plugin process exited and could not be relaunched.
    #[error("plugin '{plugin}' exited and respawn failed: {message}")]
    Reconnect {
        /// Plugin name.
        plugin: String,
        /// Why the respawn failed.
        message: String,
    },

    /// Walking the plugin directory failed.
    #[error("failed to scan plugin directory '{dir}': {source}")]
    Discovery {
        /// The directory being scanned.
        dir: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A wire-level failure on an individual call, propagated unmodified.
    #[error(transparent)]
    Wire(#[from] WireError),
}
