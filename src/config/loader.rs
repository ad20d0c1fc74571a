//! Load the table catalog (built-in or from a JSON file) and resolve it into the runtime model.

use crate::config::resolved::{ColumnInfo, ForeignKey, ResolvedModel, ResolvedTable};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/f1.json");

/// The Formula 1 catalog shipped with the crate.
pub fn builtin_catalog() -> Result<CatalogConfig, ConfigError> {
    serde_json::from_str(BUILTIN_CATALOG).map_err(|e| ConfigError::Load(format!("built-in catalog: {}", e)))
}

/// Read a catalog from a JSON file with the same shape as the built-in one.
pub async fn load_catalog_file(path: &Path) -> Result<CatalogConfig, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Catalog from `path` when given, otherwise the built-in one.
pub async fn load_catalog(path: Option<&Path>) -> Result<CatalogConfig, ConfigError> {
    match path {
        Some(p) => {
            tracing::info!(path = %p.display(), "loading catalog from file");
            load_catalog_file(p).await
        }
        None => builtin_catalog(),
    }
}

/// Build resolved model from catalog (validates first).
pub fn resolve(config: &CatalogConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut tables = Vec::with_capacity(config.tables.len());
    let mut table_by_path = HashMap::new();

    for t in &config.tables {
        let columns: Vec<ColumnInfo> = t
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                ty: c.type_,
                nullable: c.nullable && c.name != t.primary_key,
                generated: c.generated,
                secret: c.secret,
                references: c.references.as_ref().map(|fk| ForeignKey {
                    table: canonical_table_name(config, &fk.table),
                    column: fk.column.clone(),
                }),
                validation: c.validation.clone(),
            })
            .collect();

        let table = Arc::new(ResolvedTable {
            name: t.name.clone(),
            path_segment: t.path_segment(),
            pk: t.primary_key.clone(),
            public_read: t.public_read,
            columns,
        });
        table_by_path.insert(table.path_segment.to_ascii_lowercase(), table.clone());
        tables.push(table);
    }

    Ok(ResolvedModel { tables, table_by_path })
}

fn canonical_table_name(config: &CatalogConfig, name: &str) -> String {
    config
        .tables
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(name))
        .map(|t| t.name.clone())
        .unwrap_or_else(|| name.to_string())
}
