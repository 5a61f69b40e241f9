//! Message shapes of the legacy three-service protocol.
//!
//! V1 plugins expose up to three independently addressable services on one
//! connection. Only the audit service is mandatory; the host discovers the
//! other two by trying to initialise them. All V1 shapes are flat and
//! non-localised; converting upward into the `sqlward-types` model lifts
//! every string into the default language.

use serde::{Deserialize, Serialize};

use sqlward_types::{
    AuditResult, AuditResults, Dsn, ExecResult, ExplainResult, I18nStr, Node, Params, QueryResult,
    Rule, RuleInfo, RuleLevel, TableMetaItem, DEFAULT_LANG,
};

/// The mandatory parse/audit/execute service.
pub const SERVICE_AUDIT: &str = "audit-driver";
/// The optional read-only query service.
pub const SERVICE_QUERY: &str = "query-driver";
/// The optional schema/explain analysis service.
pub const SERVICE_ANALYSIS: &str = "analysis-driver";

/// Metadata fetch, audit service only.
pub const METHOD_METAS: &str = "Metas";
/// Service initialisation, all three services.
pub const METHOD_INIT: &str = "Init";
/// Resource teardown, audit service.
pub const METHOD_CLOSE: &str = "Close";
/// Connectivity check, audit service.
pub const METHOD_PING: &str = "Ping";
/// Statement splitting, audit service.
pub const METHOD_PARSE: &str = "Parse";
/// Single-statement audit, audit service.
pub const METHOD_AUDIT: &str = "Audit";
/// Rollback generation, audit service.
pub const METHOD_GEN_ROLLBACK_SQL: &str = "GenRollbackSQL";
/// Statement execution, audit service.
pub const METHOD_EXEC: &str = "Exec";
/// Transactional execution, audit service.
pub const METHOD_TX: &str = "Tx";
/// Schema listing, audit service.
pub const METHOD_SCHEMAS: &str = "Schemas";
/// Read-only query, query service.
pub const METHOD_QUERY: &str = "Query";
/// Plan rendering, analysis service.
pub const METHOD_EXPLAIN: &str = "Explain";
/// Table metadata by SQL, analysis service.
pub const METHOD_GET_TABLE_META_BY_SQL: &str = "GetTableMetaBySQL";

/// Flat, non-localised rule shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Rule name.
    pub name: String,
    /// One-line description.
    #[serde(default)]
    pub desc: String,
    /// Longer explanatory annotation.
    #[serde(default)]
    pub annotation: String,
    /// Display category.
    #[serde(default)]
    pub category: String,
    /// Severity.
    pub level: RuleLevel,
    /// Configurable parameters.
    #[serde(default)]
    pub params: Params,
}

impl RuleSpec {
    /// Flattens a rule into the V1 shape using its default-language info.
    #[must_use]
    pub fn from_rule(rule: &Rule) -> Self {
        let info = rule.default_info();
        Self {
            name: rule.name().to_owned(),
            desc: info.map(RuleInfo::desc).unwrap_or_default().to_owned(),
            annotation: info.map(RuleInfo::annotation).unwrap_or_default().to_owned(),
            category: info.map(RuleInfo::category).unwrap_or_default().to_owned(),
            level: rule.level(),
            params: rule.params().clone(),
        }
    }

    /// Lifts the flat shape into the localised model under [`DEFAULT_LANG`].
    #[must_use]
    pub fn into_rule(self) -> Rule {
        let info = RuleInfo::new(self.desc, self.category).with_annotation(self.annotation);
        Rule::new(self.name, self.level)
            .with_params(self.params)
            .with_info(DEFAULT_LANG, info)
    }
}

/// Flat audit finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResultSpec {
    /// Severity of the finding.
    pub level: RuleLevel,
    /// Finding message.
    pub message: String,
}

/// Lifts a V1 finding list into the localised aggregate.
#[must_use]
pub fn audit_results_from_specs(specs: Vec<AuditResultSpec>) -> AuditResults {
    AuditResults::from_results(specs.into_iter().map(|spec| {
        AuditResult::new(spec.level, "", I18nStr::from_default(spec.message))
    }))
}

/// Reply to [`METHOD_METAS`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetasReply {
    /// Plugin name.
    pub name: String,
    /// Declared rules, flat.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Schema of extra connection parameters.
    #[serde(default)]
    pub additional_params: Params,
}

/// Parameters of [`METHOD_INIT`] on any V1 service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitRequest {
    /// Target connection, absent for offline audits and capability probes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsn: Option<Dsn>,
    /// Rules the audit service should evaluate.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// Parameters of calls that carry one statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlRequest {
    /// The statement text.
    pub sql: String,
}

/// Parameters of calls that carry a statement batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlBatchRequest {
    /// Statement texts in submission order.
    pub sqls: Vec<String>,
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
    /// Findings for the audited statement.
    pub results: Vec<AuditResultSpec>,
}

/// Reply to [`METHOD_GEN_ROLLBACK_SQL`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackReply {
    /// Generated rollback statement, empty when none can be generated.
    pub sql: String,
    /// Why no (or only a partial) rollback was generated.
    #[serde(default)]
    pub reason: String,
}

/// Reply to [`METHOD_EXEC`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecReply {
    /// Execution outcome.
    pub result: ExecResult,
}

/// Reply to [`METHOD_TX`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxReply {
    /// Per-statement outcomes in submission order.
    pub results: Vec<ExecResult>,
}

/// Reply to [`METHOD_SCHEMAS`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemasReply {
    /// Schema names visible to the connection.
    pub schemas: Vec<String>,
}

/// Parameters of [`METHOD_QUERY`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The query text.
    pub sql: String,
    /// Server-side timeout in seconds, 0 for the plugin default.
    #[serde(default)]
    pub timeout_seconds: u32,
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

/// Reply to [`METHOD_GET_TABLE_META_BY_SQL`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableMetaBySqlReply {
    /// Metadata for every table referenced by the statement.
    pub table_metas: Vec<TableMetaItem>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use sqlward_types::{Param, ParamKind};

    use super::*;

    #[rstest]
    fn rule_flattens_and_lifts_losslessly() {
        let params: Params = [Param::new("max_column_count", "50", ParamKind::Int)]
            .into_iter()
            .collect();
        let rule = Rule::new("rule_too_many_columns", RuleLevel::Warn)
            .with_params(params.clone())
            .with_info(
                DEFAULT_LANG,
                RuleInfo::new("too many columns", "ddl").with_annotation("wide tables hurt"),
            );

        let spec = RuleSpec::from_rule(&rule);
        assert_eq!(spec.desc, "too many columns");
        assert_eq!(spec.category, "ddl");

        let lifted = spec.into_rule();
        assert_eq!(lifted.name(), "rule_too_many_columns");
        assert_eq!(lifted.level(), RuleLevel::Warn);
        assert_eq!(lifted.params(), &params);
        let info = lifted.default_info().expect("default info");
        assert_eq!(info.desc(), "too many columns");
        assert_eq!(info.annotation(), "wide tables hurt");
    }

    #[rstest]
    fn findings_lift_into_default_lang() {
        let results = audit_results_from_specs(vec![
            AuditResultSpec {
                level: RuleLevel::Error,
                message: "select star is forbidden".to_owned(),
            },
            AuditResultSpec {
                level: RuleLevel::Null,
                message: "dropped".to_owned(),
            },
        ]);

        assert_eq!(results.results().len(), 1);
        assert_eq!(results.level(), RuleLevel::Error);
        let first = results.results().first().expect("one finding");
        assert_eq!(first.message().default_text(), "select star is forbidden");
    }
}
