//! Fake launchers backed by in-memory plugins.
//!
//! [`FakeLauncher`] satisfies the [`Launcher`] seam with processes that are
//! really threads speaking the wire protocol over an in-memory duplex. The
//! fake's exit is scripted (`exit_after_calls`), which makes crash-recovery
//! behaviour testable without race-prone real subprocesses.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use sqlward_wire::Connection;
use sqlward_wire::testkit::{FakePluginSpec, spawn_fake_plugin};

use crate::error::DriverError;
use crate::process::{Launcher, PluginProcess, ProcessControl};

/// Process control whose exit is observed from the fake plugin thread.
struct FakeControl {
    exited: Arc<AtomicBool>,
}

impl ProcessControl for FakeControl {
    fn has_exited(&mut self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    fn kill(&mut self) {
        self.exited.store(true, Ordering::SeqCst);
    }

    fn pid(&self) -> Option<u32> {
        None
    }
}

/// Launches scripted in-memory plugins instead of real executables.
pub struct FakeLauncher {
    spec: FakePluginSpec,
    call_timeout: Duration,
    max_launches: Option<u64>,
    launches: AtomicU64,
}

impl FakeLauncher {
    /// Creates a launcher serving instances of `spec`.
    #[must_use]
    pub const fn new(spec: FakePluginSpec) -> Self {
        Self {
            spec,
            call_timeout: Duration::from_secs(5),
            max_launches: None,
            launches: AtomicU64::new(0),
        }
    }

    /// Overrides the per-call deadline used by launched connections.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Fails every launch after the first `max` ones, for testing the
    /// respawn-also-failed path.
    #[must_use]
    pub const fn with_max_launches(mut self, max: u64) -> Self {
        self.max_launches = Some(max);
        self
    }

    /// Returns how many times this launcher has been asked to launch.
    #[must_use]
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self) -> Result<PluginProcess, DriverError> {
        let launch = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.max_launches.is_some_and(|max| launch > max) {
            return Err(DriverError::SpawnFailed {
                path: PathBuf::from(self.describe()),
                message: "launch budget exhausted".to_owned(),
                source: None,
            });
        }

        let (host_end, handle) = spawn_fake_plugin(self.spec.clone());
        let (reader, writer) = host_end.split();
        let (conn, version) =
            Connection::establish(reader, writer, self.call_timeout).map_err(|err| {
                DriverError::Handshake {
                    plugin: self.spec.name.clone(),
                    message: err.to_string(),
                }
            })?;

        Ok(PluginProcess::new(
            Box::new(FakeControl {
                exited: handle.exited,
            }),
            conn,
            version,
        ))
    }

    fn describe(&self) -> String {
        format!("fake://{}", self.spec.name)
    }
}
