//! The unified driver facade.

use sqlward_types::{
    AuditResults, EstimatedAffectRows, ExecResult, ExplainResult, I18nStr, Node, QueryResult,
    TableMetaItem,
};

use crate::error::DriverError;

/// One opened driver, version-agnostic.
///
/// This is the only interface the rest of the host depends on; whether the
/// plugin behind it speaks the legacy three-service protocol or the
/// session-scoped one is invisible here. Every return shape is the
/// localised model — legacy plugins have their flat shapes lifted by the
/// adapter.
///
/// Optional operations return [`DriverError::ModuleNotImplemented`] when
/// the plugin does not provide the module, rather than hanging or failing
/// opaquely.
pub trait Driver: Send {
    /// Releases the driver's resources. Idempotent; never panics or hangs
    /// when called twice.
    fn close(&mut self);

    /// Splits `sql` (one statement or a batch) into parsed statements.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the plugin call fails.
    fn parse(&self, sql: &str) -> Result<Vec<Node>, DriverError>;

    /// Audits a batch of statements, one [`AuditResults`] per statement in
    /// submission order. Order is preserved end-to-end because rule
    /// handlers may look ahead at later statements in the batch.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the plugin call fails.
    fn audit(&self, sqls: &[String]) -> Result<Vec<AuditResults>, DriverError>;

    /// Generates the rollback statement for `sql`, with a localised reason
    /// when none (or only a partial one) could be generated.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the plugin call fails.
    fn gen_rollback_sql(&self, sql: &str) -> Result<(String, I18nStr), DriverError>;

    /// Checks connectivity to the configured database.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the plugin call fails.
    fn ping(&self) -> Result<(), DriverError>;

    /// Executes one statement.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the plugin call fails.
    fn exec(&self, sql: &str) -> Result<ExecResult, DriverError>;

    /// Executes a batch of statements in one plugin call.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::ModuleNotImplemented`] on plugins without the
    /// batch module, or any plugin call failure.
    fn exec_batch(&self, sqls: &[String]) -> Result<Vec<ExecResult>, DriverError>;

    /// Executes statements inside one transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the plugin call fails.
    fn tx(&self, sqls: &[String]) -> Result<Vec<ExecResult>, DriverError>;

    /// Runs a read-only query. `timeout_seconds` of 0 uses the plugin's
    /// default server-side limit.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::ModuleNotImplemented`] on plugins without the
    /// query module, or any plugin call failure.
    fn query(&self, sql: &str, timeout_seconds: u32) -> Result<QueryResult, DriverError>;

    /// Renders the execution plan of one statement.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::ModuleNotImplemented`] on plugins without the
    /// explain module, or any plugin call failure.
    fn explain(&self, sql: &str) -> Result<ExplainResult, DriverError>;

    /// Lists schemas visible to the connection.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the plugin call fails.
    fn schemas(&self) -> Result<Vec<String>, DriverError>;

    /// Returns metadata for every table referenced by `sql`.
    ///
    /// A composed operation: session-scoped plugins answer via table
    /// extraction followed by one metadata call per table; legacy plugins
    /// answer with a single direct RPC.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::ModuleNotImplemented`] on plugins without the
    /// metadata modules, or any plugin call failure.
    fn get_table_meta_by_sql(&self, sql: &str) -> Result<Vec<TableMetaItem>, DriverError>;

    /// Estimates how many rows `sql` would touch.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::ModuleNotImplemented`] on plugins without the
    /// estimation module, or any plugin call failure.
    fn estimate_sql_affect_rows(&self, sql: &str) -> Result<EstimatedAffectRows, DriverError>;

    /// Kills the database-side process serving this driver's connection.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::ModuleNotImplemented`] on plugins without the
    /// kill module, or any plugin call failure.
    fn kill_process(&self) -> Result<(), DriverError>;
}
