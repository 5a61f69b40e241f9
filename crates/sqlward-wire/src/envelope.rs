//! Request and response envelopes.
//!
//! Every call names a `service` and a `method`. Service routing is how a
//! single connection multiplexes the V1 sub-services; V2 plugins expose
//! exactly one service. Responses echo the request id, carrying either a
//! `result` value or a `{code, message}` failure, never both.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure code: the addressed service is not provided by this plugin.
pub const CODE_UNKNOWN_SERVICE: i64 = -32601;
/// Failure code: the call carried a session id the plugin does not know.
pub const CODE_UNKNOWN_SESSION: i64 = -32002;
/// Failure code: any other plugin-side failure.
pub const CODE_INTERNAL: i64 = -32000;

/// A call addressed to one service of a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Connection-unique request id.
    pub id: u64,
    /// Addressed service, e.g. `"driver"` or `"audit-driver"`.
    pub service: String,
    /// Method to invoke on the service.
    pub method: String,
    /// Method parameters; `null` for parameterless calls.
    #[serde(default)]
    pub params: Value,
}

impl Request {
    /// Creates a request.
    #[must_use]
    pub fn new(id: u64, service: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            service: service.into(),
            method: method.into(),
            params,
        }
    }
}

/// The plugin's answer to one [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request being answered.
    pub id: u64,
    /// Result value on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcFailure>,
}

impl Response {
    /// Creates a success response.
    #[must_use]
    pub const fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates a failure response.
    #[must_use]
    pub fn failure(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcFailure {
                code,
                message: message.into(),
            }),
        }
    }
}

/// A structured failure carried in a [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcFailure {
    /// Protocol error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Parameter or result shape for calls that carry nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}
