//! Parse GET query-string parameters (`join`, `where`, `orderBy`, `limit`, `offset`, column filters)
//! into a validated [`ListQuery`]. Every table and column reference is resolved against the catalog.

use crate::config::{ResolvedModel, ResolvedTable};
use crate::error::AppError;
use crate::service::validation::query_value_for_column;
use crate::sql::{ColumnRef, CompareOp, Condition, Join, ListQuery, SortDir};
use serde_json::Value;

fn bad(msg: impl Into<String>) -> AppError {
    AppError::BadRequest(msg.into())
}

/// Strip one layer of identifier quoting (`"Name"` or `` `Name` ``).
fn unquote_ident(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '`'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Strip one layer of value quoting. Returns (value, was_quoted).
fn unquote_value(s: &str) -> (&str, bool) {
    let s = s.trim();
    for q in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return (&s[1..s.len() - 1], true);
        }
    }
    (s, false)
}

/// Resolve `Table.Column` or a bare `Column` against the tables in scope.
/// A bare name prefers the base table, otherwise it must be unique among joined tables.
fn resolve_column<'a>(scope: &[&'a ResolvedTable], raw: &str) -> Result<ColumnRef<'a>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(bad("empty column reference"));
    }
    if let Some((t, c)) = raw.split_once('.') {
        let t = unquote_ident(t);
        let c = unquote_ident(c);
        let table = scope
            .iter()
            .copied()
            .find(|s| s.name.eq_ignore_ascii_case(t))
            .ok_or_else(|| bad(format!("table {} is not part of the query", t)))?;
        let column = table
            .column(c)
            .filter(|col| !col.secret)
            .ok_or_else(|| bad(format!("unknown column {}.{}", t, c)))?;
        return Ok(ColumnRef { table, column });
    }

    let c = unquote_ident(raw);
    let mut found = scope
        .iter()
        .copied()
        .filter_map(|table| table.column(c).filter(|col| !col.secret).map(|column| ColumnRef { table, column }));
    let first = found.next().ok_or_else(|| bad(format!("unknown column {}", c)))?;
    if std::ptr::eq(first.table, scope[0]) {
        return Ok(first);
    }
    if found.next().is_some() {
        return Err(bad(format!("column {} is ambiguous; qualify it as Table.{}", c, c)));
    }
    Ok(first)
}

/// Position of `needle` in `haystack`, ignoring ASCII case.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
}

/// `Table` (joined via a catalog foreign key) or `Table ON a = b`.
fn parse_join<'a>(
    model: &'a ResolvedModel,
    scope: &[&'a ResolvedTable],
    raw: &str,
) -> Result<Join<'a>, AppError> {
    let (table_part, on_part) = match find_ignore_case(raw, " on ") {
        Some(i) => (&raw[..i], Some(&raw[i + 4..])),
        None => (raw, None),
    };
    let name = unquote_ident(table_part);
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(bad(format!("invalid join: {}", raw.trim())));
    }
    let table: &'a ResolvedTable = model
        .table(name)
        .filter(|t| t.public_read)
        .ok_or_else(|| bad(format!("unknown table {}", name)))?;
    if scope.iter().any(|s| std::ptr::eq(*s, table)) {
        return Err(bad(format!("table {} is already part of the query", table.name)));
    }

    match on_part {
        Some(cond) => {
            let (l, r) = cond
                .split_once('=')
                .ok_or_else(|| bad(format!("join condition must be an equality: {}", cond.trim())))?;
            let mut with_new: Vec<&'a ResolvedTable> = scope.to_vec();
            with_new.push(table);
            let left = resolve_column(&with_new, l)?;
            let right = resolve_column(&with_new, r)?;
            let left_new = std::ptr::eq(left.table, table);
            let right_new = std::ptr::eq(right.table, table);
            if left_new == right_new {
                return Err(bad(format!(
                    "join condition must link {} to a table already in the query",
                    table.name
                )));
            }
            Ok(Join { table, left, right })
        }
        None => foreign_key_join(scope, table)
            .ok_or_else(|| bad(format!("no foreign key links {} to the query; use '{} ON a = b'", table.name, table.name))),
    }
}

/// Join condition from the first catalog foreign key between `table` and a table in scope.
fn foreign_key_join<'a>(scope: &[&'a ResolvedTable], table: &'a ResolvedTable) -> Option<Join<'a>> {
    for existing in scope.iter().copied() {
        // existing.fk -> table.pk
        for col in existing.visible_columns() {
            let Some(fk) = &col.references else { continue };
            if fk.table == table.name {
                let target = table.column(&fk.column)?;
                return Some(Join {
                    table,
                    left: ColumnRef { table: existing, column: col },
                    right: ColumnRef { table, column: target },
                });
            }
        }
        // table.fk -> existing.pk
        for col in table.visible_columns() {
            let Some(fk) = &col.references else { continue };
            if fk.table == existing.name {
                let target = existing.column(&fk.column)?;
                return Some(Join {
                    table,
                    left: ColumnRef { table: existing, column: target },
                    right: ColumnRef { table, column: col },
                });
            }
        }
    }
    None
}

const OPERATORS: &[(&str, CompareOp)] = &[
    (">=", CompareOp::Ge),
    ("<=", CompareOp::Le),
    ("!=", CompareOp::Ne),
    ("<>", CompareOp::Ne),
    ("=", CompareOp::Eq),
    ("<", CompareOp::Lt),
    (">", CompareOp::Gt),
    ("~", CompareOp::Like),
];

/// `<column><op><value>`, e.g. `Position<=3`, `Driver.Name~%Ham%`, `DOD=null`.
fn parse_where<'a>(scope: &[&'a ResolvedTable], raw: &str) -> Result<Condition<'a>, AppError> {
    let start = raw
        .find(|c| matches!(c, '=' | '!' | '<' | '>' | '~'))
        .ok_or_else(|| bad(format!("where clause needs an operator: {}", raw.trim())))?;
    let rest = &raw[start..];
    let (token, op) = OPERATORS
        .iter()
        .find(|(token, _)| rest.starts_with(token))
        .ok_or_else(|| bad(format!("unsupported operator in where clause: {}", raw.trim())))?;
    let column = resolve_column(scope, &raw[..start])?;
    let (text, quoted) = unquote_value(&rest[token.len()..]);

    if !quoted && text.eq_ignore_ascii_case("null") {
        if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
            return Err(bad("null can only be compared with = or !="));
        }
        return Ok(Condition { column, op: *op, value: Value::Null });
    }
    let value = if *op == CompareOp::Like {
        Value::String(text.to_string())
    } else {
        query_value_for_column(column.column, text)?
    };
    Ok(Condition { column, op: *op, value })
}

/// `Col [ASC|DESC], Other.Col DESC`.
fn parse_order_by<'a>(scope: &[&'a ResolvedTable], raw: &str) -> Result<Vec<(ColumnRef<'a>, SortDir)>, AppError> {
    let mut out = Vec::new();
    for item in raw.split(',') {
        let mut parts = item.split_whitespace();
        let col = parts.next().ok_or_else(|| bad("empty orderBy entry"))?;
        let dir = match parts.next() {
            None => SortDir::Asc,
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDir::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDir::Desc,
            Some(d) => return Err(bad(format!("invalid sort direction: {}", d))),
        };
        if parts.next().is_some() {
            return Err(bad(format!("invalid orderBy entry: {}", item.trim())));
        }
        out.push((resolve_column(scope, col)?, dir));
    }
    Ok(out)
}

fn parse_count(key: &str, raw: &str) -> Result<u32, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| bad(format!("{} must be a non-negative integer", key)))
}

fn is_key(k: &str, name: &str) -> bool {
    k.eq_ignore_ascii_case(name)
}

/// Build a [`ListQuery`] for `base` from raw query pairs. Joins are applied first so that
/// `where` and `orderBy` may reference joined tables regardless of parameter order.
/// Keys that are neither recognized parameters nor base-table columns are ignored.
pub fn parse_list_query<'a>(
    model: &'a ResolvedModel,
    base: &'a ResolvedTable,
    params: &[(String, String)],
) -> Result<ListQuery<'a>, AppError> {
    let mut query = ListQuery::new(base);
    let mut scope: Vec<&'a ResolvedTable> = vec![base];

    for (k, v) in params {
        if is_key(k, "join") {
            let join = parse_join(model, &scope, v)?;
            scope.push(join.table);
            query.joins.push(join);
        }
    }

    for (k, v) in params {
        if is_key(k, "join") {
            continue;
        } else if is_key(k, "where") {
            query.conditions.push(parse_where(&scope, v)?);
        } else if is_key(k, "orderBy") || is_key(k, "order_by") {
            query.order_by.extend(parse_order_by(&scope, v)?);
        } else if is_key(k, "limit") {
            query.limit = Some(parse_count("limit", v)?);
        } else if is_key(k, "offset") {
            query.offset = Some(parse_count("offset", v)?);
        } else if let Some(column) = base.column(k).filter(|c| !c.secret) {
            let value = query_value_for_column(column, v)?;
            query.conditions.push(Condition {
                column: ColumnRef { table: base, column },
                op: CompareOp::Eq,
                value,
            });
        } else {
            tracing::debug!(param = %k, table = %base.name, "ignoring unknown query parameter");
        }
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_catalog, resolve};
    use crate::sql::select_list;
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&builtin_catalog().unwrap()).unwrap()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn column_filter_by_primary_key() {
        let model = model();
        let circuit = model.table("Circuit").unwrap();
        let q = parse_list_query(&model, circuit, &pairs(&[("Circuit_ID", "7")])).unwrap();
        let sql = select_list(&q);
        assert!(sql.sql.ends_with(r#"WHERE "Circuit"."Circuit_ID" = $1::integer"#));
        assert_eq!(sql.params, vec![json!(7)]);
    }

    #[test]
    fn full_query_with_foreign_key_join() {
        let model = model();
        let results = model.table("RaceResult").unwrap();
        let q = parse_list_query(
            &model,
            results,
            &pairs(&[
                ("where", "Position<=3"),
                ("orderBy", "Driver.Name DESC, Position"),
                ("join", "Driver"),
                ("where", "Country_of_Birth='UK'"),
                ("limit", "10"),
                ("offset", "20"),
            ]),
        )
        .unwrap();
        assert_eq!(q.joins.len(), 1);
        let sql = select_list(&q);
        assert!(sql.sql.contains(r#"JOIN "Driver" ON "RaceResult"."Driver_ID" = "Driver"."Driver_ID""#));
        assert!(sql.sql.contains(
            r#"WHERE "RaceResult"."Position" <= $1::integer AND "Driver"."Country_of_Birth" = $2::text"#
        ));
        assert!(sql
            .sql
            .ends_with(r#"ORDER BY "Driver"."Name" DESC, "RaceResult"."Position" ASC LIMIT 10 OFFSET 20"#));
        assert_eq!(sql.params, vec![json!(3), json!("UK")]);
    }

    #[test]
    fn reverse_foreign_key_and_explicit_on() {
        let model = model();
        let driver = model.table("Driver").unwrap();
        let q = parse_list_query(&model, driver, &pairs(&[("join", "PitStop")])).unwrap();
        let sql = select_list(&q);
        assert!(sql.sql.contains(r#"JOIN "PitStop" ON "Driver"."Driver_ID" = "PitStop"."Driver_ID""#));

        let season = model.table("Season").unwrap();
        let q = parse_list_query(
            &model,
            season,
            &pairs(&[("join", "Driver on Season.Driver_Winner = Driver.Driver_ID")]),
        )
        .unwrap();
        let sql = select_list(&q);
        assert!(sql.sql.contains(r#"JOIN "Driver" ON "Season"."Driver_Winner" = "Driver"."Driver_ID""#));
    }

    #[test]
    fn injection_attempts_are_rejected() {
        let model = model();
        let circuit = model.table("Circuit").unwrap();
        let attempts = [
            ("where", "1=1; DROP TABLE Circuit"),
            ("where", "Name"),
            ("join", "Admin"),
            ("join", "Circuit"),
            ("join", "Driver ON 1 = 1"),
            ("orderBy", "Name; DELETE FROM Circuit"),
            ("orderBy", "(SELECT password FROM Admin)"),
            ("limit", "5 UNION SELECT 1"),
            ("Circuit_ID", "1 OR 1=1"),
        ];
        for (k, v) in attempts {
            let res = parse_list_query(&model, circuit, &pairs(&[(k, v)]));
            assert!(matches!(res, Err(AppError::BadRequest(_)) | Err(AppError::Validation(_))), "{}={}", k, v);
        }
    }

    #[test]
    fn null_comparisons_and_like() {
        let model = model();
        let driver = model.table("Driver").unwrap();
        let q = parse_list_query(&model, driver, &pairs(&[("where", "DOD=null"), ("where", "Name~%ham%")])).unwrap();
        assert!(q.conditions[0].value.is_null());
        assert_eq!(q.conditions[1].op, CompareOp::Like);
        assert!(parse_list_query(&model, driver, &pairs(&[("where", "DOD<null")])).is_err());
        // quoted null is a literal string, rejected for a date column
        assert!(parse_list_query(&model, driver, &pairs(&[("where", "DOD='null'")])).is_err());
    }

    #[test]
    fn ambiguous_bare_column_needs_qualification() {
        let model = model();
        let pit = model.table("PitStop").unwrap();
        // Name exists on both joined tables, neither is the base
        let res = parse_list_query(
            &model,
            pit,
            &pairs(&[("join", "Driver"), ("join", "MainRace"), ("join", "GrandPrix"), ("where", "Name=x")]),
        );
        assert!(res.is_err());
        // Driver_ID resolves to the base table
        let q = parse_list_query(&model, pit, &pairs(&[("join", "Driver"), ("where", "Driver_ID=1")])).unwrap();
        assert_eq!(q.conditions[0].column.table.name, "PitStop");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let model = model();
        let circuit = model.table("Circuit").unwrap();
        let q = parse_list_query(&model, circuit, &pairs(&[("_", "123"), ("cacheBust", "x")])).unwrap();
        assert!(q.conditions.is_empty());
    }
}
