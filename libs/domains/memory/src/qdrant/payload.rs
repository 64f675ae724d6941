//! JSON ↔ Qdrant payload conversions for the `{document, metadata}` schema.

use std::collections::HashMap;

use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{ListValue, Struct, Value as QdrantValue};

use crate::error::{MemoryError, MemoryResult};
use crate::models::{PointPayload, PAYLOAD_DOCUMENT, PAYLOAD_METADATA};

pub fn json_to_qdrant(val: serde_json::Value) -> QdrantValue {
    let kind = match val {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(b) => Kind::BoolValue(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Kind::IntegerValue(i)
            } else {
                Kind::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Kind::StringValue(s),
        serde_json::Value::Array(items) => Kind::ListValue(ListValue {
            values: items.into_iter().map(json_to_qdrant).collect(),
        }),
        serde_json::Value::Object(map) => Kind::StructValue(Struct {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, json_to_qdrant(v)))
                .collect(),
        }),
    };

    QdrantValue { kind: Some(kind) }
}

pub fn qdrant_to_json(val: QdrantValue) -> serde_json::Value {
    match val.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
        Some(Kind::DoubleValue(f)) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(qdrant_to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_to_json(v)))
                .collect(),
        ),
    }
}

/// Encode a point payload as the persisted `{document, metadata}` map.
pub fn payload_to_qdrant(payload: &PointPayload) -> HashMap<String, QdrantValue> {
    let mut map = HashMap::new();
    map.insert(
        PAYLOAD_DOCUMENT.to_string(),
        json_to_qdrant(serde_json::Value::String(payload.document.clone())),
    );
    map.insert(
        PAYLOAD_METADATA.to_string(),
        json_to_qdrant(serde_json::Value::Object(payload.metadata.clone())),
    );
    map
}

/// Decode a persisted payload map back into the domain shape.
pub fn payload_from_qdrant(mut map: HashMap<String, QdrantValue>) -> MemoryResult<PointPayload> {
    let document = match map.remove(PAYLOAD_DOCUMENT).map(qdrant_to_json) {
        Some(serde_json::Value::String(s)) => s,
        _ => {
            return Err(MemoryError::Internal(
                "point payload is missing a document field".to_string(),
            ));
        }
    };

    let metadata = match map.remove(PAYLOAD_METADATA).map(qdrant_to_json) {
        Some(serde_json::Value::Object(m)) => m,
        _ => serde_json::Map::new(),
    };

    Ok(PointPayload { document, metadata })
}
