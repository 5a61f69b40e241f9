//! Results of statement execution.

use serde::{Deserialize, Serialize};

/// Outcome of executing one statement.
///
/// Mirrors what database drivers report: either counter may be unavailable
/// on a given engine, in which case the corresponding error message is set
/// and the counter value is meaningless.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    /// Rows affected by the statement.
    pub rows_affected: i64,
    /// Error reported when the affected-row count is unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected_error: Option<String>,
    /// Identifier generated for an inserted row.
    pub last_insert_id: i64,
    /// Error reported when the insert identifier is unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_insert_id_error: Option<String>,
}

impl ExecResult {
    /// Creates a result with both counters available.
    #[must_use]
    pub const fn new(rows_affected: i64, last_insert_id: i64) -> Self {
        Self {
            rows_affected,
            rows_affected_error: None,
            last_insert_id,
            last_insert_id_error: None,
        }
    }
}

/// Estimated number of rows a statement would touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedAffectRows {
    /// Estimated row count.
    pub count: i64,
    /// Error reported by the plugin when estimation failed.
    #[serde(default)]
    pub err_message: String,
}
