//! Handshake and protocol version negotiation.
//!
//! The first frames on a fresh connection are `hello` (host → plugin) and
//! `welcome` (plugin → host). The hello carries a shared magic cookie —
//! proof that the child process really is a sqlward plugin and not some
//! unrelated executable that happened to be in the plugin directory — plus
//! the protocol versions the host speaks. The plugin picks the highest
//! version both sides support and echoes it in the welcome. Any mismatch
//! aborts the connection before a single service call is made.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::framing::{FrameReader, FrameWriter};

/// Name of the shared cookie field.
pub const MAGIC_COOKIE_KEY: &str = "SQLWARD_DRIVER_PLUGIN";
/// Value a genuine plugin must present.
pub const MAGIC_COOKIE_VALUE: &str = "5b1f74ade2c8430f";

/// The legacy three-service protocol.
pub const PROTOCOL_V1: u32 = 1;
/// The session-scoped single-service protocol.
pub const PROTOCOL_V2: u32 = 2;
/// Every protocol version this host can drive, ascending.
pub const SUPPORTED_PROTOCOLS: [u32; 2] = [PROTOCOL_V1, PROTOCOL_V2];

/// First frame sent by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    /// Cookie field name.
    pub cookie_key: String,
    /// Cookie field value.
    pub cookie_value: String,
    /// Protocol versions the host speaks, ascending.
    pub supported_versions: Vec<u32>,
}

impl Hello {
    /// Creates the hello this host sends.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cookie_key: MAGIC_COOKIE_KEY.to_owned(),
            cookie_value: MAGIC_COOKIE_VALUE.to_owned(),
            supported_versions: SUPPORTED_PROTOCOLS.to_vec(),
        }
    }

    /// Validates the cookie, as a plugin would on receipt.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Handshake`] when either cookie field differs
    /// from the shared values.
    pub fn check_cookie(&self) -> Result<(), WireError> {
        if self.cookie_key != MAGIC_COOKIE_KEY || self.cookie_value != MAGIC_COOKIE_VALUE {
            return Err(WireError::Handshake {
                message: "magic cookie mismatch".to_owned(),
            });
        }
        Ok(())
    }
}

impl Default for Hello {
    fn default() -> Self {
        Self::new()
    }
}

/// Reply frame carrying the negotiated version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Welcome {
    /// The protocol version both sides will speak.
    pub version: u32,
}

/// Runs the host side of the handshake on a fresh connection.
///
/// Sends [`Hello`], reads [`Welcome`], and validates that the offered
/// version is one the host supports.
///
/// # Errors
///
/// Returns [`WireError::Handshake`] when the plugin replies with an
/// unsupported version, or the underlying framing/codec error when the
/// exchange itself fails.
pub fn negotiate<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
) -> Result<u32, WireError> {
    let hello = serde_json::to_vec(&Hello::new())?;
    writer.send(&hello)?;

    let frame = reader.receive()?;
    let welcome: Welcome = serde_json::from_slice(&frame)?;
    if !SUPPORTED_PROTOCOLS.contains(&welcome.version) {
        return Err(WireError::Handshake {
            message: format!("plugin negotiated unsupported protocol version {}", welcome.version),
        });
    }
    Ok(welcome.version)
}

/// Runs the plugin side of the handshake.
///
/// Reads [`Hello`], checks the cookie, and answers with the highest
/// version present in both the hello and `offered`.
///
/// # Errors
///
/// Returns [`WireError::Handshake`] on a cookie mismatch or when no common
/// version exists, or the underlying framing/codec error.
pub fn accept<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    offered: &[u32],
) -> Result<u32, WireError> {
    let frame = reader.receive()?;
    let hello: Hello = serde_json::from_slice(&frame)?;
    hello.check_cookie()?;

    let version = offered
        .iter()
        .filter(|v| hello.supported_versions.contains(v))
        .max()
        .copied()
        .ok_or_else(|| WireError::Handshake {
            message: "no common protocol version".to_owned(),
        })?;

    let welcome = serde_json::to_vec(&Welcome { version })?;
    writer.send(&welcome)?;
    Ok(version)
}
