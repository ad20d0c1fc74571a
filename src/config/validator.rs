//! Catalog validation: identifiers, primary keys, references and route uniqueness.

use crate::config::CatalogConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"))
}

/// True when `s` is usable as a quoted SQL identifier and a route segment.
pub fn is_identifier(s: &str) -> bool {
    identifier_re().is_match(s)
}

pub fn validate(config: &CatalogConfig) -> Result<(), ConfigError> {
    if config.tables.is_empty() {
        return Err(ConfigError::Validation("catalog declares no tables".into()));
    }

    let mut table_names = HashSet::new();
    let mut path_segments = HashSet::new();
    // table name (lowercased) -> declared column names, in declaration order so far
    let mut declared: Vec<(String, HashSet<&str>)> = Vec::new();

    for t in &config.tables {
        if !is_identifier(&t.name) {
            return Err(ConfigError::InvalidIdentifier(t.name.clone()));
        }
        if !table_names.insert(t.name.to_lowercase()) {
            return Err(ConfigError::DuplicateTable(t.name.clone()));
        }
        let segment = t.path_segment();
        if !is_identifier(&segment) {
            return Err(ConfigError::InvalidIdentifier(segment));
        }
        if !path_segments.insert(segment.to_lowercase()) {
            return Err(ConfigError::DuplicatePathSegment(segment));
        }
        if t.columns.is_empty() {
            return Err(ConfigError::Validation(format!("table {} has no columns", t.name)));
        }

        let mut columns = HashSet::new();
        for c in &t.columns {
            if !is_identifier(&c.name) {
                return Err(ConfigError::InvalidIdentifier(format!("{}.{}", t.name, c.name)));
            }
            if !columns.insert(c.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate column {} in table {}",
                    c.name, t.name
                )));
            }
            if let Some(rule) = &c.validation {
                if let Some(pattern) = &rule.pattern {
                    Regex::new(pattern).map_err(|e| {
                        ConfigError::Validation(format!("invalid pattern for {}.{}: {}", t.name, c.name, e))
                    })?;
                }
            }
            if c.secret && c.name == t.primary_key {
                return Err(ConfigError::Validation(format!(
                    "primary key {}.{} cannot be secret",
                    t.name, c.name
                )));
            }
        }

        if !columns.contains(t.primary_key.as_str()) {
            return Err(ConfigError::InvalidPrimaryKey {
                table: t.name.clone(),
                column: t.primary_key.clone(),
            });
        }

        for c in &t.columns {
            let Some(fk) = &c.references else { continue };
            // referenced tables must be declared earlier (or be this table) so DDL applies in order
            let target = if fk.table.eq_ignore_ascii_case(&t.name) {
                Some(&columns)
            } else {
                declared
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&fk.table))
                    .map(|(_, cols)| cols)
            };
            let Some(target_cols) = target else {
                return Err(ConfigError::MissingReference {
                    kind: "table",
                    id: fk.table.clone(),
                });
            };
            if !target_cols.contains(fk.column.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", fk.table, fk.column),
                });
            }
        }

        declared.push((t.name.clone(), columns));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_catalog, ColumnConfig, ColumnType, ForeignKeyConfig, TableConfig};

    fn column(name: &str, ty: ColumnType) -> ColumnConfig {
        ColumnConfig {
            name: name.into(),
            type_: ty,
            nullable: true,
            generated: false,
            secret: false,
            references: None,
            validation: None,
        }
    }

    fn table(name: &str, pk: &str, columns: Vec<ColumnConfig>) -> TableConfig {
        TableConfig {
            name: name.into(),
            path_segment: None,
            primary_key: pk.into(),
            public_read: true,
            columns,
        }
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = builtin_catalog().unwrap();
        validate(&catalog).unwrap();
        assert_eq!(catalog.tables.len(), 12);
    }

    #[test]
    fn primary_key_must_be_a_column() {
        let config = CatalogConfig {
            tables: vec![table("Circuit", "Track_ID", vec![column("Circuit_ID", ColumnType::Integer)])],
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPrimaryKey { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_route_segments() {
        let mut second = table("Track", "Id", vec![column("Id", ColumnType::Integer)]);
        second.path_segment = Some("Circuit".into());
        let config = CatalogConfig {
            tables: vec![table("Circuit", "Id", vec![column("Id", ColumnType::Integer)]), second],
        };
        assert!(matches!(validate(&config), Err(ConfigError::DuplicatePathSegment(_))));
    }

    #[test]
    fn foreign_keys_must_point_backwards() {
        let mut fk = column("Driver_ID", ColumnType::Integer);
        fk.references = Some(ForeignKeyConfig {
            table: "Driver".into(),
            column: "Driver_ID".into(),
        });
        let config = CatalogConfig {
            tables: vec![
                table("PitStop", "PitStop_ID", vec![column("PitStop_ID", ColumnType::Integer), fk]),
                table("Driver", "Driver_ID", vec![column("Driver_ID", ColumnType::Integer)]),
            ],
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingReference { kind: "table", .. })
        ));
    }

    #[test]
    fn rejects_identifiers_with_sql() {
        let config = CatalogConfig {
            tables: vec![table("Circuit; DROP", "Id", vec![column("Id", ColumnType::Integer)])],
        };
        assert!(matches!(validate(&config), Err(ConfigError::InvalidIdentifier(_))));
        assert!(is_identifier("Country_of_Birth"));
        assert!(!is_identifier("1abc"));
    }
}
