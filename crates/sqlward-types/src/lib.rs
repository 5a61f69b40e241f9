//! Shared data model for the sqlward driver subsystem.
//!
//! This crate defines the vocabulary that the host, the wire protocol, and
//! the protocol adapters all speak: rule severity levels and their total
//! order, audit rules with localised descriptions, the audit-result
//! aggregator, connection descriptors, parsed statements, tabular results,
//! and the per-plugin capability descriptor ([`DriverMetas`]).
//!
//! Everything here is plain data. Process management and wire encoding live
//! in the `sqlward-drivers` and `sqlward-wire` crates respectively; both
//! depend on this crate and never the other way around.

mod audit;
mod dsn;
mod exec;
mod i18n;
mod level;
mod metas;
mod params;
mod rule;
mod statement;
mod tabular;

pub use self::audit::{AuditResult, AuditResults};
pub use self::dsn::{DriverConfig, Dsn};
pub use self::exec::{EstimatedAffectRows, ExecResult};
pub use self::i18n::{DEFAULT_LANG, I18nStr};
pub use self::level::{ParseRuleLevelError, RuleLevel};
pub use self::metas::{DriverMetas, OptionalModule};
pub use self::params::{Param, ParamKind, Params};
pub use self::rule::{Rule, RuleInfo};
pub use self::statement::{Node, SQL_KIND_DDL, SQL_KIND_DML, SQL_KIND_DQL};
pub use self::tabular::{
    ExplainResult, QueryResult, Table, TableMeta, TableMetaItem, TabularData, TabularDataHead,
};
