//! Host-side plugin lifecycle and the unified driver facade.
//!
//! Database-specific logic lives in out-of-process plugins. This crate owns
//! everything the host needs to use them safely: discovering and launching
//! plugin executables, negotiating which protocol version each one speaks,
//! wrapping both wire protocols behind the one [`Driver`] facade the rest
//! of the host programs against, keeping the process-wide
//! [`DriverRegistry`] of declared rules and capabilities, and recovering
//! from plugin crashes without ever destabilising the host process.
//!
//! The composition root constructs one [`PluginManager`], calls
//! [`PluginManager::start`] before serving, and opens per-task drivers via
//! [`PluginManager::open`]. A misbehaving plugin degrades the operation
//! that touched it; it never takes the host or its sibling plugins down.

pub mod adapter;
mod builtin;
mod config;
mod error;
mod facade;
mod manager;
mod process;
mod registry;

#[cfg(any(test, feature = "test-support"))]
pub mod testkit;

#[cfg(test)]
mod tests;

pub use self::builtin::DriverFactory;
pub use self::config::HostConfig;
pub use self::error::DriverError;
pub use self::facade::Driver;
pub use self::manager::PluginManager;
pub use self::process::{ExecutableLauncher, Launcher, PluginProcess, ProcessControl};
pub use self::registry::DriverRegistry;
