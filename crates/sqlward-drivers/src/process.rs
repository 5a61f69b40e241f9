//! Plugin subprocess ownership and launching.
//!
//! A [`PluginProcess`] pairs one OS process with its negotiated wire
//! connection. The [`Launcher`] trait is the seam between the adapters and
//! process creation: production code launches real executables via
//! [`ExecutableLauncher`]; tests inject launchers that connect to scripted
//! in-memory plugins instead.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use sqlward_wire::Connection;

use crate::error::DriverError;

/// Log target for process operations.
const PROCESS_TARGET: &str = "sqlward_drivers::process";

/// Minimal control surface over a plugin's OS process.
///
/// Split out of [`PluginProcess`] so tests can substitute a fake process
/// whose exit is scripted rather than observed from the kernel.
pub trait ProcessControl: Send {
    /// Returns `true` once the process has exited.
    fn has_exited(&mut self) -> bool;

    /// Terminates the process. Idempotent.
    fn kill(&mut self);

    /// Returns the OS pid, when one exists.
    fn pid(&self) -> Option<u32>;
}

/// [`ProcessControl`] over a real child process.
struct ChildControl {
    child: Child,
    killed: bool,
}

impl ProcessControl for ChildControl {
    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    fn kill(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;
        if let Err(err) = self.child.kill() {
            debug!(
                target: PROCESS_TARGET,
                pid = self.child.id(),
                error = %err,
                "kill failed, process likely already exited"
            );
        }
        if let Err(err) = self.child.wait() {
            warn!(
                target: PROCESS_TARGET,
                pid = self.child.id(),
                error = %err,
                "failed to reap plugin process"
            );
        }
    }

    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }
}

/// One plugin process plus its negotiated connection.
pub struct PluginProcess {
    control: Box<dyn ProcessControl>,
    conn: Connection,
    version: u32,
}

impl PluginProcess {
    /// Assembles a process from its control handle and connection.
    #[must_use]
    pub fn new(control: Box<dyn ProcessControl>, conn: Connection, version: u32) -> Self {
        Self {
            control,
            conn,
            version,
        }
    }

    /// Returns the connection to the process.
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Returns the negotiated protocol version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns `true` once the process is gone or its connection died.
    pub fn has_exited(&mut self) -> bool {
        self.control.has_exited() || !self.conn.is_alive()
    }

    /// Terminates the process. Idempotent.
    pub fn kill(&mut self) {
        self.control.kill();
    }
}

impl Drop for PluginProcess {
    fn drop(&mut self) {
        self.control.kill();
    }
}

impl std::fmt::Debug for PluginProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginProcess")
            .field("pid", &self.control.pid())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Creates plugin processes on demand.
///
/// Adapters hold a launcher rather than a path: the V1 adapter launches a
/// fresh process per open, and the V2 adapter relaunches after a crash.
pub trait Launcher: Send + Sync {
    /// Launches a process and completes the handshake.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when spawning or negotiation fails.
    fn launch(&self) -> Result<PluginProcess, DriverError>;

    /// Human-readable identity for logs and errors.
    fn describe(&self) -> String;
}

/// Launches a plugin executable with piped stdio.
pub struct ExecutableLauncher {
    path: PathBuf,
    call_timeout: Duration,
}

impl ExecutableLauncher {
    /// Creates a launcher for the executable at `path`.
    #[must_use]
    pub const fn new(path: PathBuf, call_timeout: Duration) -> Self {
        Self { path, call_timeout }
    }
}

impl Launcher for ExecutableLauncher {
    fn launch(&self) -> Result<PluginProcess, DriverError> {
        debug!(
            target: PROCESS_TARGET,
            executable = %self.path.display(),
            "spawning plugin process"
        );

        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    DriverError::ExecutableNotFound {
                        path: self.path.clone(),
                    }
                } else {
                    DriverError::SpawnFailed {
                        path: self.path.clone(),
                        message: "failed to start plugin process".to_owned(),
                        source: Some(Arc::new(err)),
                    }
                }
            })?;

        let stdin = child.stdin.take().ok_or_else(|| DriverError::SpawnFailed {
            path: self.path.clone(),
            message: "failed to capture stdin".to_owned(),
            source: None,
        })?;
        let stdout = child.stdout.take().ok_or_else(|| DriverError::SpawnFailed {
            path: self.path.clone(),
            message: "failed to capture stdout".to_owned(),
            source: None,
        })?;

        let established = Connection::establish(stdout, stdin, self.call_timeout);
        let (conn, version) = match established {
            Ok(pair) => pair,
            Err(err) => {
                // The executable is not speaking the protocol; reap it
                // before surfacing the failure.
                drop(child.kill());
                drop(child.wait());
                return Err(DriverError::Handshake {
                    plugin: self.path.display().to_string(),
                    message: err.to_string(),
                });
            }
        };

        debug!(
            target: PROCESS_TARGET,
            executable = %self.path.display(),
            pid = child.id(),
            version,
            "plugin process spawned"
        );

        Ok(PluginProcess::new(
            Box::new(ChildControl {
                child,
                killed: false,
            }),
            conn,
            version,
        ))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
