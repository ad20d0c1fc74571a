//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from resolved tables.
//! Identifiers come from the catalog only and are always quoted; values are always bound.

use crate::config::{ColumnInfo, ResolvedTable};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Rows returned by a list query are capped at this many.
pub const MAX_LIMIT: u32 = 1000;

/// Quote identifier for PostgreSQL (safe: only from catalog).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified(table: &ResolvedTable, column: &ColumnInfo) -> String {
    format!("{}.{}", quoted(&table.name), quoted(&column.name))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Bind `v` and return its placeholder cast to the column type, e.g. `$2::date`.
    fn placeholder(&mut self, column: &ColumnInfo, v: Value) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, column.ty.pg_name())
    }
}

/// A column of a table that is in scope for a query.
#[derive(Clone, Copy, Debug)]
pub struct ColumnRef<'a> {
    pub table: &'a ResolvedTable,
    pub column: &'a ColumnInfo,
}

impl ColumnRef<'_> {
    fn sql(&self) -> String {
        qualified(self.table, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Case-insensitive LIKE.
    Like,
}

impl CompareOp {
    fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "ILIKE",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Condition<'a> {
    pub column: ColumnRef<'a>,
    pub op: CompareOp,
    /// `Value::Null` renders as IS NULL / IS NOT NULL.
    pub value: Value,
}

#[derive(Clone, Debug)]
pub struct Join<'a> {
    pub table: &'a ResolvedTable,
    pub left: ColumnRef<'a>,
    pub right: ColumnRef<'a>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// Validated GET request against one table: joins, filters, ordering and paging.
#[derive(Clone, Debug)]
pub struct ListQuery<'a> {
    pub base: &'a ResolvedTable,
    pub joins: Vec<Join<'a>>,
    pub conditions: Vec<Condition<'a>>,
    pub order_by: Vec<(ColumnRef<'a>, SortDir)>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl<'a> ListQuery<'a> {
    pub fn new(base: &'a ResolvedTable) -> Self {
        ListQuery {
            base,
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

fn render_condition(q: &mut QueryBuf, cond: &Condition<'_>) -> String {
    let lhs = cond.column.sql();
    if cond.value.is_null() {
        return match cond.op {
            CompareOp::Ne => format!("{} IS NOT NULL", lhs),
            _ => format!("{} IS NULL", lhs),
        };
    }
    if cond.op == CompareOp::Like {
        let n = q.push_param(cond.value.clone());
        return format!("{}::text ILIKE ${}::text", lhs, n);
    }
    let ph = q.placeholder(cond.column.column, cond.value.clone());
    format!("{} {} {}", lhs, cond.op.sql(), ph)
}

fn where_clause(q: &mut QueryBuf, conditions: &[Condition<'_>]) -> String {
    if conditions.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = conditions.iter().map(|c| render_condition(q, c)).collect();
    format!(" WHERE {}", parts.join(" AND "))
}

/// SELECT list: base columns then each joined table's columns not already selected (first name wins).
/// Secret columns are never selected; interval columns are selected as text.
fn select_column_list(query: &ListQuery<'_>) -> String {
    let mut seen = HashSet::new();
    let mut parts = Vec::new();
    let tables = std::iter::once(query.base).chain(query.joins.iter().map(|j| j.table));
    for table in tables {
        for c in table.visible_columns() {
            if !seen.insert(c.name.as_str()) {
                continue;
            }
            let expr = if c.ty.select_as_text() {
                format!("{}::text", qualified(table, c))
            } else {
                qualified(table, c)
            };
            parts.push(format!("{} AS {}", expr, quoted(&c.name)));
        }
    }
    parts.join(", ")
}

/// SELECT with joins, AND-combined conditions, ORDER BY, LIMIT (capped at MAX_LIMIT) and OFFSET.
pub fn select_list(query: &ListQuery<'_>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sql = format!(
        "SELECT {} FROM {}",
        select_column_list(query),
        quoted(&query.base.name)
    );
    for join in &query.joins {
        sql.push_str(&format!(
            " JOIN {} ON {} = {}",
            quoted(&join.table.name),
            join.left.sql(),
            join.right.sql()
        ));
    }
    sql.push_str(&where_clause(&mut q, &query.conditions));
    if !query.order_by.is_empty() {
        let order: Vec<String> = query
            .order_by
            .iter()
            .map(|(col, dir)| match dir {
                SortDir::Asc => format!("{} ASC", col.sql()),
                SortDir::Desc => format!("{} DESC", col.sql()),
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }
    if let Some(n) = query.limit {
        sql.push_str(&format!(" LIMIT {}", n.min(MAX_LIMIT)));
    }
    if let Some(n) = query.offset {
        sql.push_str(&format!(" OFFSET {}", n));
    }
    q.sql = sql;
    q
}

/// INSERT without RETURNING. Column set is taken from the first row in catalog order;
/// callers ensure every row carries the same keys.
fn insert_head(table: &ResolvedTable, rows: &[Map<String, Value>]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let columns: Vec<&ColumnInfo> = match rows.first() {
        Some(first) => table
            .columns
            .iter()
            .filter(|c| first.contains_key(&c.name))
            .collect(),
        None => Vec::new(),
    };

    if columns.is_empty() {
        // nothing supplied: let every row take its defaults
        let tuples = vec!["(DEFAULT)"; rows.len().max(1)];
        q.sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quoted(&table.name),
            quoted(&table.pk),
            tuples.join(", ")
        );
        return q;
    }

    let col_list: Vec<String> = columns.iter().map(|c| quoted(&c.name)).collect();
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let placeholders: Vec<String> = columns
            .iter()
            .map(|c| {
                let v = row.get(&c.name).cloned().unwrap_or(Value::Null);
                q.placeholder(c, v)
            })
            .collect();
        tuples.push(format!("({})", placeholders.join(", ")));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        quoted(&table.name),
        col_list.join(", "),
        tuples.join(", ")
    );
    q
}

/// Multi-row INSERT ... RETURNING pk.
pub fn insert_rows(table: &ResolvedTable, rows: &[Map<String, Value>]) -> QueryBuf {
    let mut q = insert_head(table, rows);
    q.sql.push_str(&format!(" RETURNING {}", quoted(&table.pk)));
    q
}

/// UPDATE one row by primary key. `sets` must not contain the primary key.
pub fn update_by_pk(table: &ResolvedTable, pk_value: &Value, sets: &[(&ColumnInfo, Value)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let assignments: Vec<String> = sets
        .iter()
        .map(|(c, v)| format!("{} = {}", quoted(&c.name), q.placeholder(c, v.clone())))
        .collect();
    let id_ph = q.placeholder(table.pk_column(), pk_value.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quoted(&table.name),
        assignments.join(", "),
        quoted(&table.pk),
        id_ph
    );
    q
}

/// SELECT 1 for an existence check on the primary key.
pub fn exists_by_pk(table: &ResolvedTable, pk_value: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(table.pk_column(), pk_value.clone());
    q.sql = format!(
        "SELECT 1 FROM {} WHERE {} = {} LIMIT 1",
        quoted(&table.name),
        quoted(&table.pk),
        ph
    );
    q
}

/// DELETE rows matching every condition. Callers reject an empty condition list.
pub fn delete_where(table: &ResolvedTable, conditions: &[Condition<'_>]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let clause = where_clause(&mut q, conditions);
    q.sql = format!("DELETE FROM {}{}", quoted(&table.name), clause);
    q
}

/// SELECT a single (possibly secret) column by primary key.
pub fn select_column_by_pk(table: &ResolvedTable, column: &ColumnInfo, pk_value: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(table.pk_column(), pk_value.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        quoted(&column.name),
        quoted(&table.name),
        quoted(&table.pk),
        ph
    );
    q
}

/// INSERT or, on primary-key conflict, overwrite the supplied columns.
pub fn upsert_by_pk(table: &ResolvedTable, row: &Map<String, Value>) -> QueryBuf {
    let mut q = insert_head(table, std::slice::from_ref(row));
    let updates: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.name != table.pk && row.contains_key(&c.name))
        .map(|c| format!("{} = EXCLUDED.{}", quoted(&c.name), quoted(&c.name)))
        .collect();
    if updates.is_empty() {
        q.sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", quoted(&table.pk)));
    } else {
        q.sql.push_str(&format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            quoted(&table.pk),
            updates.join(", ")
        ));
    }
    q.sql.push_str(&format!(" RETURNING {}", quoted(&table.pk)));
    q
}
