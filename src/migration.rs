//! Apply the catalog to the database: one CREATE TABLE IF NOT EXISTS per table, in declaration order,
//! so foreign-key targets always exist first.

use crate::config::{ColumnInfo, ColumnType, ResolvedModel, ResolvedTable};
use crate::error::AppError;
use crate::sql::quoted;
use sqlx::PgPool;

pub async fn apply_schema(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    for table in &model.tables {
        let sql = create_table_sql(table);
        tracing::debug!(sql = %sql, "apply schema");
        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| AppError::db("creating", &table.name, e))?;
    }
    tracing::info!(tables = model.tables.len(), "schema applied");
    Ok(())
}

fn column_def(table: &ResolvedTable, c: &ColumnInfo) -> String {
    let typ = if c.generated && c.ty == ColumnType::Integer {
        "SERIAL"
    } else {
        c.ty.pg_name()
    };
    let mut def = format!("{} {}", quoted(&c.name), typ);
    if !c.nullable && c.name != table.pk {
        def.push_str(" NOT NULL");
    }
    if let Some(ref fk) = c.references {
        def.push_str(&format!(" REFERENCES {} ({})", quoted(&fk.table), quoted(&fk.column)));
    }
    def
}

pub fn create_table_sql(table: &ResolvedTable) -> String {
    let mut col_defs: Vec<String> = table.columns.iter().map(|c| column_def(table, c)).collect();
    col_defs.push(format!("PRIMARY KEY ({})", quoted(&table.pk)));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quoted(&table.name),
        col_defs.join(",\n  ")
    )
}
