//! Parsed SQL statements as returned by a plugin's parser.

use serde::{Deserialize, Serialize};

/// Statement kind marker for data manipulation statements.
pub const SQL_KIND_DML: &str = "dml";
/// Statement kind marker for data definition statements.
pub const SQL_KIND_DDL: &str = "ddl";
/// Statement kind marker for pure queries.
pub const SQL_KIND_DQL: &str = "dql";

/// One parsed statement.
///
/// The fingerprint is a normalised signature: statements that differ only
/// in literal values share a fingerprint, which is what deduplication keys
/// on. Kinds are open-ended strings because each plugin classifies its own
/// dialect; the `SQL_KIND_*` constants cover the common cases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Raw SQL text of the statement.
    pub text: String,
    /// Statement kind, e.g. [`SQL_KIND_DML`].
    pub kind: String,
    /// Normalised signature of the statement.
    pub fingerprint: String,
    /// One-based line where the statement starts in the submitted text.
    #[serde(default)]
    pub start_line: u64,
}

impl Node {
    /// Creates a node with the given text, kind, and fingerprint.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        kind: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            kind: kind.into(),
            fingerprint: fingerprint.into(),
            start_line: 0,
        }
    }
}
