//! Raw catalog types matching the JSON catalog file (see `catalog/f1.json`).

use serde::{Deserialize, Serialize};

/// Column storage type. Drives DDL, parameter casts and request validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Date,
    Interval,
    Boolean,
}

impl ColumnType {
    /// PostgreSQL type name used in casts (`$1::date`).
    pub fn pg_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "double precision",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::Interval => "interval",
            ColumnType::Boolean => "boolean",
        }
    }

    /// Types that sqlx cannot decode into a JSON-friendly value are selected as text.
    pub fn select_as_text(self) -> bool {
        matches!(self, ColumnType::Interval)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForeignKeyConfig {
    pub table: String,
    pub column: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Value assigned by the database (SERIAL primary keys).
    #[serde(default)]
    pub generated: bool,
    /// Hashed on insert, never returned, filtered on or updated through PUT.
    #[serde(default)]
    pub secret: bool,
    #[serde(default)]
    pub references: Option<ForeignKeyConfig>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    /// Route segment; defaults to the lowercased table name.
    #[serde(default)]
    pub path_segment: Option<String>,
    pub primary_key: String,
    /// When false every method, GET included, requires an admin session.
    #[serde(default = "default_true")]
    pub public_read: bool,
    pub columns: Vec<ColumnConfig>,
}

impl TableConfig {
    pub fn path_segment(&self) -> String {
        self.path_segment
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }
}

/// Whole catalog as loaded from JSON.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub tables: Vec<TableConfig>,
}
