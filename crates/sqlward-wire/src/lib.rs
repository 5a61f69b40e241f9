//! Wire protocol between the sqlward host and its driver plugins.
//!
//! Plugins are separate OS processes reached over their stdio. Every
//! exchange is a length-prefixed JSON frame; the first exchange is the
//! handshake (magic cookie plus protocol version negotiation), after which
//! the host issues numbered requests addressed to a named service and the
//! plugin answers with matching responses.
//!
//! Two mutually unintelligible protocol versions exist. V1 plugins expose
//! three independently addressable services (audit, query, analysis) with
//! flat, non-localised message shapes. V2 plugins expose a single
//! session-scoped `driver` service with localised shapes. The [`v1`] and
//! [`v2`] modules define the message shapes and their conversions to the
//! `sqlward-types` model; [`Connection`] provides concurrency-safe call
//! dispatch with a bounded wait per call.

mod conn;
mod envelope;
mod error;
mod framing;
pub mod handshake;
pub mod v1;
pub mod v2;

#[cfg(any(test, feature = "test-support"))]
pub mod testkit;

pub use self::conn::{Connection, DEFAULT_CALL_TIMEOUT, ServiceClient};
pub use self::envelope::{
    CODE_INTERNAL, CODE_UNKNOWN_SERVICE, CODE_UNKNOWN_SESSION, Empty, Request, Response,
    RpcFailure,
};
pub use self::error::WireError;
pub use self::framing::{FrameReader, FrameWriter};
