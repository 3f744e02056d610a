use bson::{Bson, Document, doc};
use serde_json::Value;

use crate::reconstruct::StructuredQuery;

/// Caller-supplied identifier that confines a query to one entity's records.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeId(Bson);

impl ScopeId {
    pub fn new(value: impl Into<Bson>) -> Self {
        Self(value.into())
    }

    /// Parse caller text: a JSON scalar when it is one (`7`, `"abc"`, `true`), the raw text
    /// otherwise. Blank input means no scope.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(v @ (Value::Number(_) | Value::String(_) | Value::Bool(_))) => {
                Bson::try_from(v).ok().map(Self).or_else(|| Some(Self(Bson::String(raw.to_owned()))))
            }
            _ => Some(Self(Bson::String(raw.to_owned()))),
        }
    }

    #[must_use]
    pub const fn as_bson(&self) -> &Bson {
        &self.0
    }

    #[must_use]
    pub fn into_bson(self) -> Bson {
        self.0
    }
}

impl From<i32> for ScopeId {
    fn from(v: i32) -> Self {
        Self(Bson::Int32(v))
    }
}

impl From<i64> for ScopeId {
    fn from(v: i64) -> Self {
        Self(Bson::Int64(v))
    }
}

impl From<&str> for ScopeId {
    fn from(v: &str) -> Self {
        Self(Bson::String(v.to_owned()))
    }
}

/// Match stage that restricts a pipeline to `scope`.
#[must_use]
pub fn scope_stage(id_field: &str, scope: &ScopeId) -> Document {
    let mut inner = Document::new();
    inner.insert(id_field, scope.as_bson().clone());
    doc! { "$match": inner }
}

/// Constrain `query` to `scope`. The caller's scope always wins over an identifier the
/// generated query carried.
#[must_use]
pub fn apply_scope(mut query: StructuredQuery, scope: Option<&ScopeId>, id_field: &str) -> StructuredQuery {
    let Some(scope) = scope else {
        return query;
    };
    match &mut query {
        StructuredQuery::Aggregate { pipeline } => pipeline.insert(0, scope_stage(id_field, scope)),
        StructuredQuery::Find { filter, .. }
        | StructuredQuery::FindOne { filter, .. }
        | StructuredQuery::CountDocuments { filter } => {
            filter.insert(id_field, scope.as_bson().clone());
        }
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefers_json_scalars() {
        assert!(matches!(ScopeId::parse("7").unwrap().as_bson(), Bson::Int32(7) | Bson::Int64(7)));
        assert_eq!(ScopeId::parse("\"P-7\"").unwrap().as_bson(), &Bson::String("P-7".into()));
        assert_eq!(ScopeId::parse("P-7").unwrap().as_bson(), &Bson::String("P-7".into()));
        assert_eq!(ScopeId::parse("{\"a\":1}").unwrap().as_bson(), &Bson::String("{\"a\":1}".into()));
        assert!(ScopeId::parse("   ").is_none());
    }

    #[test]
    fn absent_scope_is_a_no_op() {
        let q = StructuredQuery::CountDocuments { filter: doc! {"id": 3} };
        assert_eq!(apply_scope(q.clone(), None, "id"), q);
    }
}
