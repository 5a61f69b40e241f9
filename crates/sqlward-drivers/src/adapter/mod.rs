//! Protocol adapters behind the unified facade.
//!
//! The protocol a plugin speaks is decided once, at load time, by the
//! handshake; afterwards the installed adapter never changes. The closed
//! [`PluginAdapter`] variant keeps that decision explicit: a plugin is
//! driven by the V1 adapter, the V2 adapter, or an in-process factory, and
//! nothing else.

mod v1;
mod v2;

use std::sync::Arc;

use sqlward_types::{DriverConfig, DriverMetas};

pub use self::v1::AdapterV1;
pub use self::v2::AdapterV2;

use crate::builtin::DriverFactory;
use crate::error::DriverError;
use crate::facade::Driver;

/// Log target shared by the adapters.
pub(crate) const ADAPTER_TARGET: &str = "sqlward_drivers::adapter";

/// The installed backend for one registered plugin.
pub enum PluginAdapter {
    /// Legacy three-service plugin.
    V1(AdapterV1),
    /// Session-scoped single-service plugin.
    V2(AdapterV2),
    /// In-process driver compiled into the host.
    BuiltIn(Arc<dyn DriverFactory>),
}

impl PluginAdapter {
    /// Returns a copy of the capability descriptor captured at
    /// registration.
    #[must_use]
    pub fn metas(&self) -> DriverMetas {
        match self {
            Self::V1(adapter) => adapter.metas().clone(),
            Self::V2(adapter) => adapter.metas().clone(),
            Self::BuiltIn(factory) => factory.metas(),
        }
    }

    /// Opens a driver for one task.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the open fails.
    pub fn open(&self, config: &DriverConfig) -> Result<Box<dyn Driver>, DriverError> {
        match self {
            Self::V1(adapter) => adapter.open(config),
            Self::V2(adapter) => adapter.open(config),
            Self::BuiltIn(factory) => factory.open(config),
        }
    }

    /// Releases adapter-wide resources at host shutdown. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when teardown fails; the manager logs and
    /// continues with the remaining plugins.
    pub fn stop(&self) -> Result<(), DriverError> {
        match self {
            Self::V1(_) => Ok(()),
            Self::V2(adapter) => {
                adapter.stop();
                Ok(())
            }
            Self::BuiltIn(factory) => factory.stop(),
        }
    }
}

impl std::fmt::Debug for PluginAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1(adapter) => f.debug_tuple("V1").field(adapter).finish(),
            Self::V2(adapter) => f.debug_tuple("V2").field(adapter).finish(),
            Self::BuiltIn(_) => f.debug_tuple("BuiltIn").finish(),
        }
    }
}
