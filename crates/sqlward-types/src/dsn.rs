//! Connection descriptors and per-open driver configuration.

use serde::{Deserialize, Serialize};

use crate::params::Params;
use crate::rule::Rule;

/// Descriptor of one live database connection.
///
/// A missing DSN is meaningful: it signals an offline audit where the
/// driver parses and audits without ever connecting anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dsn {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Default database to open.
    pub database: String,
    /// Driver-specific extra connection parameters.
    #[serde(default)]
    pub additional_params: Params,
}

impl Dsn {
    /// Creates a DSN for the given endpoint; credentials default to empty.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the login credentials, returning `self`.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Sets the default database, returning `self`.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }
}

/// Configuration passed by value into every driver open.
///
/// The subsystem never mutates a config; adapters copy what they need into
/// wire shapes. `dsn == None` with non-empty rules is the offline-audit
/// case; a DSN with no rules opens a plain connection for queries and
/// metadata only.
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    /// Target connection, absent for offline audits.
    pub dsn: Option<Dsn>,
    /// Rules the plugin should evaluate during audits.
    pub rules: Vec<Rule>,
}

impl DriverConfig {
    /// Creates a config from a connection descriptor and ruleset.
    #[must_use]
    pub const fn new(dsn: Option<Dsn>, rules: Vec<Rule>) -> Self {
        Self { dsn, rules }
    }

    /// Creates an offline-audit config carrying only rules.
    #[must_use]
    pub const fn offline(rules: Vec<Rule>) -> Self {
        Self { dsn: None, rules }
    }
}
