//! JSON <-> BSON bridging shared by the reconstructor, renderers and collaborators.

use bson::{Bson, Document};
use serde_json::Value;

/// Convert a JSON value that must be an object into a `bson::Document`.
///
/// # Errors
/// Returns a human-readable reason when the value is not an object or holds invalid
/// Extended JSON.
pub fn value_to_document(val: Value) -> Result<Document, String> {
    match val {
        Value::Object(map) => Document::try_from(map).map_err(|e| e.to_string()),
        other => Err(format!("expected JSON object, found {}", type_name(&other))),
    }
}

/// Relaxed Extended JSON form of a document.
#[must_use]
pub fn document_to_json(doc: &Document) -> Value {
    Bson::Document(doc.clone()).into_relaxed_extjson()
}

/// A result set as a JSON array, in order.
#[must_use]
pub fn records_to_json(records: &[Document]) -> Value {
    Value::Array(records.iter().map(document_to_json).collect())
}

/// Compact relaxed-JSON text for a single BSON value.
#[must_use]
pub fn bson_to_compact(value: &Bson) -> String {
    value.clone().into_relaxed_extjson().to_string()
}

pub(crate) const fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
