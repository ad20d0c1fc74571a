//! Request validation against the catalog: column allow-list, value types and per-column rules.

use crate::config::{ColumnInfo, ColumnType, ResolvedTable, ValidationRule};
use crate::error::AppError;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub struct RequestValidator;

impl RequestValidator {
    /// Map body keys onto catalog column names (case-insensitive) and check every value.
    /// Unknown keys, duplicates after normalization and non-scalar values are rejected.
    pub fn normalize(table: &ResolvedTable, body: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
        let mut out = Map::with_capacity(body.len());
        for (key, value) in body {
            let col = table
                .column(&key)
                .ok_or_else(|| AppError::Validation(format!("unknown column {} for {}", key, table.name)))?;
            let value = match value {
                Value::Number(n) if col.ty == ColumnType::Interval => Value::String(n.to_string()),
                v => v,
            };
            check_value(col, &value)?;
            if out.insert(col.name.clone(), value).is_some() {
                return Err(AppError::Validation(format!("{} given more than once", col.name)));
            }
        }
        Ok(out)
    }

    /// Drop explicit nulls for generated columns so the column default applies.
    pub fn strip_generated_nulls(table: &ResolvedTable, row: &mut Map<String, Value>) {
        row.retain(|name, v| !(v.is_null() && table.column(name).is_some_and(|c| c.generated)));
    }

    /// Validate a full row for insert: required columns must be present and non-null.
    pub fn validate_insert(table: &ResolvedTable, row: &Map<String, Value>) -> Result<(), AppError> {
        for col in &table.columns {
            let val = row.get(&col.name);
            if table.is_required(col) && (val.is_none() || val == Some(&Value::Null)) {
                return Err(AppError::Validation(format!("{} is required", col.name)));
            }
            if let Some(v) = val {
                validate_field(col, v)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (for PUT). Required is not enforced for missing fields.
    pub fn validate_partial(table: &ResolvedTable, row: &Map<String, Value>) -> Result<(), AppError> {
        for (name, v) in row {
            let Some(col) = table.column(name) else { continue };
            if v.is_null() && !col.nullable {
                return Err(AppError::Validation(format!("{} cannot be null", col.name)));
            }
            validate_field(col, v)?;
        }
        Ok(())
    }
}

/// Parse a query-string value for `column` into a JSON value of the matching kind.
pub fn query_value_for_column(col: &ColumnInfo, s: &str) -> Result<Value, AppError> {
    let invalid = || AppError::Validation(format!("invalid value for {}: {}", col.name, s));
    Ok(match col.ty {
        ColumnType::Integer => Value::Number(s.trim().parse::<i32>().map_err(|_| invalid())?.into()),
        ColumnType::Real => {
            let f = s.trim().parse::<f64>().map_err(|_| invalid())?;
            serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(invalid)?
        }
        ColumnType::Boolean => {
            if s.eq_ignore_ascii_case("true") || s == "1" {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") || s == "0" {
                Value::Bool(false)
            } else {
                return Err(invalid());
            }
        }
        ColumnType::Date => {
            if !is_date(s) {
                return Err(invalid());
            }
            Value::String(s.to_string())
        }
        ColumnType::Interval => {
            if !is_interval(s) {
                return Err(invalid());
            }
            Value::String(s.to_string())
        }
        ColumnType::Text => Value::String(s.to_string()),
    })
}

/// Postgres interval input: `30`, `1 day 02:03:04`, `90 seconds ago`, `00:00:23.456`, `PT1M30S`.
/// The year-month `Y-M` shorthand is not accepted.
fn is_interval(s: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        let num = r"[+-]?(?:\d+(?:\.\d*)?|\.\d+)";
        let unit = r"(?:microseconds?|usecs?|us|milliseconds?|msecs?|ms|seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|w|months?|mons?|years?|yrs?|y|decades?|centur(?:y|ies)|millenni(?:um|a))";
        let time = r"[+-]?\d+:\d{1,2}(?::\d{1,2}(?:\.\d+)?)?";
        let iso = r"P(?:\d+(?:\.\d+)?[YMWD])*(?:T(?:\d+(?:\.\d+)?[HMS])+)?";
        let pattern = format!(
            r"(?i)^\s*(?:{num}|{iso}|@?\s*(?:{num}\s*{unit}\b\s*)*(?:{time})?\s*(?:ago)?)\s*$"
        );
        Regex::new(&pattern).expect("interval regex")
    });
    s.chars().any(|c| c.is_ascii_digit()) && re.is_match(s)
}

fn is_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

/// Type check a body value against the column type. Null is accepted here; nullability is checked by callers.
fn check_value(col: &ColumnInfo, v: &Value) -> Result<(), AppError> {
    let ok = match (col.ty, v) {
        (_, Value::Null) => true,
        (_, Value::Array(_)) | (_, Value::Object(_)) => false,
        (ColumnType::Integer, Value::Number(n)) => n.as_i64().is_some_and(|i| i32::try_from(i).is_ok()),
        (ColumnType::Integer, Value::String(s)) => s.trim().parse::<i32>().is_ok(),
        (ColumnType::Real, Value::Number(_)) => true,
        (ColumnType::Real, Value::String(s)) => s.trim().parse::<f64>().is_ok(),
        (ColumnType::Boolean, Value::Bool(_)) => true,
        (ColumnType::Boolean, Value::String(s)) => s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false"),
        (ColumnType::Date, Value::String(s)) => is_date(s),
        (ColumnType::Text, Value::String(_) | Value::Number(_)) => true,
        (ColumnType::Interval, Value::String(s)) => is_interval(s),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} must be a valid {} value",
            col.name,
            col.ty.pg_name()
        )))
    }
}

fn validate_field(col: &ColumnInfo, v: &Value) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    let Some(rule) = &col.validation else {
        return Ok(());
    };
    check_rule(&col.name, v, rule)
}

fn check_rule(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    let numeric = v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()));
    if let Some(min) = rule.minimum {
        if let Some(n) = numeric {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = numeric {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}
