//! Resolved table model: catalog validated and flattened for runtime use.

use crate::config::{ColumnType, ValidationRule};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub generated: bool,
    pub secret: bool,
    pub references: Option<ForeignKey>,
    pub validation: Option<ValidationRule>,
}

#[derive(Clone, Debug)]
pub struct ResolvedTable {
    pub name: String,
    pub path_segment: String,
    /// Primary-key column name (the table's entry in the primary-key map).
    pub pk: String,
    pub public_read: bool,
    pub columns: Vec<ColumnInfo>,
}

impl ResolvedTable {
    /// Column lookup, case-insensitive so query strings may use any case.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn pk_column(&self) -> &ColumnInfo {
        // resolve() guarantees the primary key is a declared column
        self.columns
            .iter()
            .find(|c| c.name == self.pk)
            .unwrap_or(&self.columns[0])
    }

    /// Columns that may appear in responses.
    pub fn visible_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| !c.secret)
    }

    pub fn secret_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| c.secret)
    }

    /// Whether an insert must supply this column.
    pub fn is_required(&self, col: &ColumnInfo) -> bool {
        if col.generated {
            return false;
        }
        !col.nullable || col.name == self.pk
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub tables: Vec<Arc<ResolvedTable>>,
    pub table_by_path: HashMap<String, Arc<ResolvedTable>>,
}

impl ResolvedModel {
    /// Table served at `/<path>`, matched ignoring ASCII case. Keys are stored lowercased.
    pub fn table_by_path(&self, path: &str) -> Option<&Arc<ResolvedTable>> {
        self.table_by_path.get(&path.to_ascii_lowercase())
    }

    /// Table lookup by name, case-insensitive.
    pub fn table(&self, name: &str) -> Option<&Arc<ResolvedTable>> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .or_else(|| self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    /// Tables served under the public CRUD routes (GET open to everyone).
    pub fn public_tables(&self) -> impl Iterator<Item = &Arc<ResolvedTable>> {
        self.tables.iter().filter(|t| t.public_read)
    }
}
