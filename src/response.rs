//! Response helpers: insert ids and plain-text status messages.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

/// Body of a successful POST: the first generated key plus all of them in insert order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertedIds {
    pub insert_id: Value,
    pub insert_ids: Vec<Value>,
}

pub fn created(ids: Vec<Value>) -> (StatusCode, Json<InsertedIds>) {
    (
        StatusCode::CREATED,
        Json(InsertedIds {
            insert_id: ids.first().cloned().unwrap_or(Value::Null),
            insert_ids: ids,
        }),
    )
}

pub fn message(text: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::OK, text.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inserted_ids_use_camel_case() {
        let (status, Json(body)) = created(vec![json!(7), json!(8)]);
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"insertId": 7, "insertIds": [7, 8]})
        );
    }
}
