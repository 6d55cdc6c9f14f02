//! Firestore REST API wire types.
//!
//! Only the subset the video repository needs: documents, field values and
//! the structured-query DSL used for upload-ID lookups and keyset
//! pagination.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FirestoreError, FirestoreResult};

/// Firestore document value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    // Firestore sends integers as strings
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ReferenceValue(String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::StringValue(s.into())
    }

    pub fn integer(i: i64) -> Self {
        Value::IntegerValue(i.to_string())
    }

    pub fn timestamp(t: DateTime<Utc>) -> Self {
        Value::TimestampValue(t.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringValue(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(d) => Some(*d as i64),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }
}

/// Firestore document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            fields: Some(fields),
            ..Default::default()
        }
    }

    /// Document ID — the last path segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }

    /// Required string field.
    pub fn get_str(&self, field: &str) -> FirestoreResult<String> {
        self.try_str(field)?
            .ok_or_else(|| FirestoreError::decode_error(format!("missing field `{}`", field)))
    }

    /// Optional string field.
    pub fn try_str(&self, field: &str) -> FirestoreResult<Option<String>> {
        match self.fields.as_ref().and_then(|f| f.get(field)) {
            None | Some(Value::NullValue(())) => Ok(None),
            Some(v) => v
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| not_a(field, "string")),
        }
    }

    /// Optional integer field.
    pub fn try_i64(&self, field: &str) -> FirestoreResult<Option<i64>> {
        match self.fields.as_ref().and_then(|f| f.get(field)) {
            None | Some(Value::NullValue(())) => Ok(None),
            Some(v) => v.as_i64().map(Some).ok_or_else(|| not_a(field, "integer")),
        }
    }

    /// Required timestamp field.
    pub fn get_timestamp(&self, field: &str) -> FirestoreResult<DateTime<Utc>> {
        match self.fields.as_ref().and_then(|f| f.get(field)) {
            Some(v) => v.as_timestamp().ok_or_else(|| not_a(field, "timestamp")),
            None => Err(FirestoreError::decode_error(format!(
                "missing field `{}`",
                field
            ))),
        }
    }
}

fn not_a(field: &str, kind: &str) -> FirestoreError {
    FirestoreError::decode_error(format!("field `{}` is not a {}", field, kind))
}

// =============================================================================
// Structured query
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_descendants: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

/// Field comparison operators we use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum FieldOp {
    #[serde(rename = "EQUAL")]
    Equal,
    #[serde(rename = "GREATER_THAN_OR_EQUAL")]
    GreaterThanOrEqual,
    #[serde(rename = "LESS_THAN")]
    LessThan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldFilter {
    pub field: FieldReference,
    pub op: FieldOp,
    pub value: Value,
}

/// A filter node; we only compose conjunctions of field filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    FieldFilter(FieldFilter),
    CompositeFilter(CompositeFilter),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeFilter {
    pub op: String,
    pub filters: Vec<Filter>,
}

impl Filter {
    /// Field equality.
    pub fn eq(field: &str, value: Value) -> Filter {
        Filter::FieldFilter(FieldFilter {
            field: FieldReference {
                field_path: field.to_string(),
            },
            op: FieldOp::Equal,
            value,
        })
    }

    /// Field comparison.
    pub fn cmp(field: &str, op: FieldOp, value: Value) -> Filter {
        Filter::FieldFilter(FieldFilter {
            field: FieldReference {
                field_path: field.to_string(),
            },
            op,
            value,
        })
    }

    /// Conjunction of filters; collapses a single filter to itself.
    pub fn and(mut filters: Vec<Filter>) -> Option<Filter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::CompositeFilter(CompositeFilter {
                op: "AND".to_string(),
                filters,
            })),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub field: FieldReference,
    pub direction: String,
}

impl Order {
    pub fn desc(field: &str) -> Self {
        Self {
            field: FieldReference {
                field_path: field.to_string(),
            },
            direction: "DESCENDING".to_string(),
        }
    }
}

/// Query cursor (`startAt`): values for each `orderBy` field, positioned
/// just after the given row when `before` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCursor {
    pub values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<Order>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<QueryCursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub structured_query: StructuredQuery,
}

/// One element of the `runQuery` streaming response array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResult {
    #[serde(default)]
    pub document: Option<Document>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_serialization_shape() {
        let v = serde_json::to_value(Value::string("hi")).unwrap();
        assert_eq!(v, serde_json::json!({"stringValue": "hi"}));

        let v = serde_json::to_value(Value::integer(42)).unwrap();
        assert_eq!(v, serde_json::json!({"integerValue": "42"}));
    }

    #[test]
    fn test_timestamp_round_trip() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let v = Value::timestamp(t);
        assert_eq!(v.as_timestamp(), Some(t));
    }

    #[test]
    fn test_document_id_from_name() {
        let doc = Document {
            name: Some("projects/p/databases/(default)/documents/videos/vid_1".into()),
            ..Default::default()
        };
        assert_eq!(doc.id(), Some("vid_1"));
    }

    #[test]
    fn test_filter_and_collapses_singletons() {
        assert!(Filter::and(vec![]).is_none());
        let single = Filter::and(vec![Filter::eq("a", Value::string("x"))]).unwrap();
        assert!(matches!(single, Filter::FieldFilter(_)));
        let pair = Filter::and(vec![
            Filter::eq("a", Value::string("x")),
            Filter::eq("b", Value::string("y")),
        ])
        .unwrap();
        assert!(matches!(pair, Filter::CompositeFilter(_)));
    }
}
