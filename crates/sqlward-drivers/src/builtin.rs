//! In-process driver support.
//!
//! Some drivers ship compiled into the host rather than as subprocesses.
//! They register through the same manager and registry as plugins, before
//! any plugin directory is scanned, and serve opens without any wire
//! round trip.

use sqlward_types::{DriverConfig, DriverMetas};

use crate::error::DriverError;
use crate::facade::Driver;

/// Factory for an in-process driver.
pub trait DriverFactory: Send + Sync {
    /// Produces the driver's capability descriptor. Called once at
    /// registration; the result is immutable thereafter.
    fn metas(&self) -> DriverMetas;

    /// Opens a driver for one task.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the driver cannot be opened, e.g. the
    /// configured database is unreachable.
    fn open(&self, config: &DriverConfig) -> Result<Box<dyn Driver>, DriverError>;

    /// Releases factory-wide resources at host shutdown.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when teardown fails; the manager logs and
    /// continues.
    fn stop(&self) -> Result<(), DriverError> {
        Ok(())
    }
}
