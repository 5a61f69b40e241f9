//! Message shapes of the session-scoped single-service protocol.
//!
//! A V2 plugin exposes one `driver` service. `Init` binds a session; every
//! later call carries the session id so the plugin can multiplex many open
//! drivers over one process. Shapes are localised: rules and findings carry
//! per-language text keyed by language tag, with the default language
//! mandatory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sqlward_types::{
    AuditResult, AuditResults, DriverMetas, Dsn, EstimatedAffectRows, ExecResult, ExplainResult,
    I18nStr, Node, OptionalModule, Params, QueryResult, Rule, RuleInfo, RuleLevel, Table,
    TableMeta,
};

/// The single V2 service.
pub const SERVICE_DRIVER: &str = "driver";

/// Metadata fetch; the only call that needs no session.
pub const METHOD_METAS: &str = "Metas";
/// Session establishment.
pub const METHOD_INIT: &str = "Init";
/// Session teardown.
pub const METHOD_CLOSE: &str = "Close";
/// Connectivity check.
pub const METHOD_PING: &str = "Ping";
/// Statement execution.
pub const METHOD_EXEC: &str = "Exec";
/// Batched statement execution.
pub const METHOD_EXEC_BATCH: &str = "ExecBatch";
/// Transactional execution.
pub const METHOD_TX: &str = "Tx";
/// Statement splitting.
pub const METHOD_PARSE: &str = "Parse";
/// Batch audit.
pub const METHOD_AUDIT: &str = "Audit";
/// Rollback generation.
pub const METHOD_GEN_ROLLBACK_SQL: &str = "GenRollbackSQL";
/// Database listing.
pub const METHOD_GET_DATABASES: &str = "GetDatabases";
/// Table schema introspection.
pub const METHOD_GET_TABLE_META: &str = "GetTableMeta";
/// Table reference extraction.
pub const METHOD_EXTRACT_TABLE_FROM_SQL: &str = "ExtractTableFromSQL";
/// Read-only query.
pub const METHOD_QUERY: &str = "Query";
/// Plan rendering.
pub const METHOD_EXPLAIN: &str = "Explain";
/// Affected-row estimation.
pub const METHOD_ESTIMATE_SQL_AFFECT_ROWS: &str = "EstimateSQLAffectRows";
/// Database-side process kill.
pub const METHOD_KILL_PROCESS: &str = "KillProcess";

/// Opaque token binding calls to one initialised driver context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Plugin-assigned session id.
    pub id: String,
}

impl Session {
    /// Wraps a plugin-assigned id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Localised descriptive fields of a rule, one entry per language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleInfoSpec {
    /// One-line description.
    #[serde(default)]
    pub desc: String,
    /// Longer explanatory annotation.
    #[serde(default)]
    pub annotation: String,
    /// Display category.
    #[serde(default)]
    pub category: String,
}

/// Localised rule shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Rule name.
    pub name: String,
    /// Severity.
    pub level: RuleLevel,
    /// Configurable parameters.
    #[serde(default)]
    pub params: Params,
    /// Descriptive fields keyed by language tag.
    #[serde(default)]
    pub info: BTreeMap<String, RuleInfoSpec>,
}

impl RuleSpec {
    /// Converts a rule into its wire shape, keeping every language.
    #[must_use]
    pub fn from_rule(rule: &Rule) -> Self {
        let info = rule
            .info_by_lang()
            .map(|(lang, info)| {
                (
                    lang.to_owned(),
                    RuleInfoSpec {
                        desc: info.desc().to_owned(),
                        annotation: info.annotation().to_owned(),
                        category: info.category().to_owned(),
                    },
                )
            })
            .collect();
        Self {
            name: rule.name().to_owned(),
            level: rule.level(),
            params: rule.params().clone(),
            info,
        }
    }

    /// Converts the wire shape back into the driver model.
    #[must_use]
    pub fn into_rule(self) -> Rule {
        let mut rule = Rule::new(self.name, self.level).with_params(self.params);
        for (lang, spec) in self.info {
            rule = rule.with_info(
                lang,
                RuleInfo::new(spec.desc, spec.category).with_annotation(spec.annotation),
            );
        }
        rule
    }
}

/// Localised audit finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResultSpec {
    /// Severity of the finding.
    pub level: RuleLevel,
    /// Name of the rule that fired, empty for anonymous findings.
    #[serde(default)]
    pub rule_name: String,
    /// Localised finding message.
    #[serde(default)]
    pub message: I18nStr,
}

impl AuditResultSpec {
    /// Converts a finding into its wire shape.
    #[must_use]
    pub fn from_result(result: &AuditResult) -> Self {
        Self {
            level: result.level(),
            rule_name: result.rule_name().to_owned(),
            message: result.message().clone(),
        }
    }
}

/// Findings for one statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditResultsSpec {
    /// The statement's findings.
    #[serde(default)]
    pub results: Vec<AuditResultSpec>,
}

impl AuditResultsSpec {
    /// Converts the wire shape into the ranked aggregate.
    #[must_use]
    pub fn into_results(self) -> AuditResults {
        AuditResults::from_results(
            self.results
                .into_iter()
                .map(|spec| AuditResult::new(spec.level, spec.rule_name, spec.message)),
        )
    }
}

/// Reply to [`METHOD_METAS`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetasReply {
    /// Plugin name.
    pub plugin_name: String,
    /// The database's conventional port.
    #[serde(default)]
    pub database_default_port: u16,
    /// Declared rules.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Schema of extra connection parameters.
    #[serde(default)]
    pub additional_params: Params,
    /// Modules this plugin implements.
    #[serde(default)]
    pub enabled_optional_modules: Vec<OptionalModule>,
}

impl MetasReply {
    /// Converts the reply into the registry's capability descriptor.
    #[must_use]
    pub fn into_metas(self) -> DriverMetas {
        DriverMetas::new(self.plugin_name, self.database_default_port)
            .with_rules(self.rules.into_iter().map(RuleSpec::into_rule).collect())
            .with_additional_params(self.additional_params)
            .with_enabled_modules(self.enabled_optional_modules)
    }
}

/// Parameters of [`METHOD_INIT`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitRequest {
    /// Target connection, absent for offline audits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsn: Option<Dsn>,
    /// Rules the session should evaluate during audits.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// Reply to [`METHOD_INIT`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitReply {
    /// The established session.
    pub session: Session,
}

/// Parameters of calls that carry only the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRequest {
    /// The session scope.
    pub session: Session,
}

/// Parameters of calls that carry one statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlRequest {
    /// The session scope.
    pub session: Session,
    /// The statement text.
    pub sql: String,
}

/// Parameters of calls that carry a statement batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlBatchRequest {
    /// The session scope.
    pub session: Session,
    /// Statement texts in submission order.
    pub sqls: Vec<String>,
}

/// Parameters of [`METHOD_QUERY`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The session scope.
    pub session: Session,
    /// The query text.
    pub sql: String,
    /// Server-side timeout in seconds, 0 for the plugin default.
    #[serde(default)]
    pub timeout_seconds: u32,
}

/// Parameters of [`METHOD_GET_TABLE_META`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTableMetaRequest {
    /// The session scope.
    pub session: Session,
    /// The table to describe.
    pub table: Table,
}

/// Reply to [`METHOD_PARSE`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseReply {
    /// Parsed statements in input order.
    pub nodes: Vec<Node>,
}

/// Reply to [`METHOD_AUDIT`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditReply {
    /// Findings per statement, in submission order.
    pub results: Vec<AuditResultsSpec>,
}

/// Reply to [`METHOD_GEN_ROLLBACK_SQL`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackReply {
    /// Generated rollback statement, empty when none can be generated.
    pub sql: String,
    /// Localised reason when no (or only a partial) rollback was generated.
    #[serde(default)]
    pub reason: I18nStr,
}

/// Reply to [`METHOD_EXEC`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecReply {
    /// Execution outcome.
    pub result: ExecResult,
}

/// Reply to [`METHOD_EXEC_BATCH`] and [`METHOD_TX`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecBatchReply {
    /// Per-statement outcomes in submission order.
    pub results: Vec<ExecResult>,
}

/// Reply to [`METHOD_GET_DATABASES`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetDatabasesReply {
    /// Database names visible to the connection.
    pub databases: Vec<String>,
}

/// Reply to [`METHOD_GET_TABLE_META`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTableMetaReply {
    /// The table's schema metadata.
    pub meta: TableMeta,
}

/// Reply to [`METHOD_EXTRACT_TABLE_FROM_SQL`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractTableReply {
    /// Tables referenced by the statement.
    pub tables: Vec<Table>,
}

/// Reply to [`METHOD_QUERY`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryReply {
    /// The result set.
    pub result: QueryResult,
}

/// Reply to [`METHOD_EXPLAIN`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplainReply {
    /// The rendered plan.
    pub result: ExplainResult,
}

/// Reply to [`METHOD_ESTIMATE_SQL_AFFECT_ROWS`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimateReply {
    /// The estimation outcome.
    pub result: EstimatedAffectRows,
}

/// Reply to [`METHOD_KILL_PROCESS`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KillProcessReply {
    /// Error reported by the plugin, empty on success.
    #[serde(default)]
    pub err_message: String,
}
