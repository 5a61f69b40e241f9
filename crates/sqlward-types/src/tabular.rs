//! Tabular metadata and result shapes.

use serde::{Deserialize, Serialize};

use crate::i18n::I18nStr;

/// One column header of a tabular result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularDataHead {
    /// Column name.
    pub name: String,
    /// Localised column description.
    #[serde(default)]
    pub desc: I18nStr,
}

impl TabularDataHead {
    /// Creates a header with the given column name and no description.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: I18nStr::new(),
        }
    }
}

/// Column headers plus rows; row values align positionally with headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularData {
    /// Column headers.
    pub columns: Vec<TabularDataHead>,
    /// Row values, one inner vector per row.
    pub rows: Vec<Vec<String>>,
}

/// Schema description of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Column metadata.
    pub columns: TabularData,
    /// Index metadata.
    pub indexes: TabularData,
    /// The table's `CREATE TABLE` statement.
    pub create_table_sql: String,
    /// Plugin-supplied note, e.g. why part of the metadata is missing.
    #[serde(default)]
    pub message: String,
}

/// A table reference extracted from SQL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Owning schema, empty when unqualified.
    #[serde(default)]
    pub schema: String,
}

impl Table {
    /// Creates a reference to a table in a schema.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
        }
    }
}

/// A table reference paired with its schema metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetaItem {
    /// The table the metadata describes.
    pub table: Table,
    /// The table's schema metadata.
    pub meta: TableMeta,
}

/// Result set of a read-only query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column headers.
    pub columns: Vec<TabularDataHead>,
    /// Row values, aligned positionally with `columns`.
    pub rows: Vec<Vec<String>>,
}

/// Execution-plan output for one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainResult {
    /// The classic tabular plan rendering.
    pub classic: TabularData,
}
