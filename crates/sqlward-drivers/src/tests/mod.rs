//! Crate-level behaviour tests against scripted in-memory plugins.

use std::sync::Arc;

use sqlward_types::DriverConfig;
use sqlward_wire::testkit::{FakePluginSpec, demo_rules};

use crate::config::HostConfig;
use crate::manager::PluginManager;
use crate::process::Launcher;
use crate::testkit::FakeLauncher;

mod behaviour;

/// A manager with one fake plugin installed, plus the launcher handle for
/// observing launch counts.
fn manager_with_fake(spec: FakePluginSpec) -> (PluginManager, Arc<FakeLauncher>) {
    let mut manager = PluginManager::new(HostConfig::default());
    let launcher = Arc::new(FakeLauncher::new(spec));
    manager
        .install_plugin(Arc::clone(&launcher) as Arc<dyn Launcher>)
        .expect("install fake plugin");
    (manager, launcher)
}

/// The offline-audit configuration used by the audit scenarios.
fn demo_config() -> DriverConfig {
    DriverConfig::offline(demo_rules())
}
