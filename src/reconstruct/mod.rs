//! Rebuilds typed store queries from the raw argument text of a directive.

use bson::Document;
use serde_json::Value;

use crate::directive::{Directive, OperationKind};
use crate::errors::QaError;
use crate::json::{type_name, value_to_document};

/// A validated store operation. Only ever built from a fully parsed argument span.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredQuery {
    Aggregate { pipeline: Vec<Document> },
    Find { filter: Document, projection: Option<Document> },
    FindOne { filter: Document, projection: Option<Document> },
    CountDocuments { filter: Document },
}

impl StructuredQuery {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Aggregate { .. } => OperationKind::Aggregate,
            Self::Find { .. } => OperationKind::Find,
            Self::FindOne { .. } => OperationKind::FindOne,
            Self::CountDocuments { .. } => OperationKind::CountDocuments,
        }
    }

    /// The filter document, for the forms that carry one.
    #[must_use]
    pub const fn filter(&self) -> Option<&Document> {
        match self {
            Self::Aggregate { .. } => None,
            Self::Find { filter, .. }
            | Self::FindOne { filter, .. }
            | Self::CountDocuments { filter } => Some(filter),
        }
    }

    pub const fn filter_mut(&mut self) -> Option<&mut Document> {
        match self {
            Self::Aggregate { .. } => None,
            Self::Find { filter, .. }
            | Self::FindOne { filter, .. }
            | Self::CountDocuments { filter } => Some(filter),
        }
    }
}

/// # Errors
/// Returns `MalformedArgument` when the span is not valid JSON of the shape the operation
/// requires.
pub fn reconstruct(directive: &Directive<'_>) -> Result<StructuredQuery, QaError> {
    let kind = directive.kind;
    let span = directive.span;
    match kind {
        OperationKind::Aggregate => {
            let pipeline = parse_array(kind, span)?
                .into_iter()
                .enumerate()
                .map(|(i, stage)| {
                    value_to_document(stage)
                        .map_err(|e| QaError::malformed(kind, format!("stage {i}: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(StructuredQuery::Aggregate { pipeline })
        }
        OperationKind::Find => {
            let (filter, projection) = parse_filter_projection(kind, span)?;
            Ok(StructuredQuery::Find { filter, projection })
        }
        OperationKind::FindOne => {
            let (filter, projection) = parse_filter_projection(kind, span)?;
            Ok(StructuredQuery::FindOne { filter, projection })
        }
        OperationKind::CountDocuments => {
            if span.is_empty() {
                return Err(QaError::malformed(kind, "empty filter"));
            }
            let value: Value =
                serde_json::from_str(span).map_err(|e| QaError::malformed(kind, e.to_string()))?;
            let filter =
                value_to_document(value).map_err(|e| QaError::malformed(kind, format!("filter: {e}")))?;
            Ok(StructuredQuery::CountDocuments { filter })
        }
    }
}

/// The call syntax lists documents comma-separated without an enclosing array, so the span is
/// re-wrapped before parsing.
fn parse_array(kind: OperationKind, span: &str) -> Result<Vec<Value>, QaError> {
    let wrapped = format!("[{span}]");
    match serde_json::from_str::<Value>(&wrapped) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(QaError::malformed(kind, format!("expected array, found {}", type_name(&other)))),
        Err(e) => Err(QaError::malformed(kind, e.to_string())),
    }
}

fn parse_filter_projection(
    kind: OperationKind,
    span: &str,
) -> Result<(Document, Option<Document>), QaError> {
    if span.is_empty() {
        return Ok((Document::new(), None));
    }
    let mut items = parse_array(kind, span)?.into_iter();
    let filter = match items.next() {
        Some(v) => value_to_document(v).map_err(|e| QaError::malformed(kind, format!("filter: {e}")))?,
        None => Document::new(),
    };
    let projection = match items.next() {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            value_to_document(v).map_err(|e| QaError::malformed(kind, format!("projection: {e}")))?,
        ),
    };
    let extra = items.count();
    if extra > 0 {
        log::warn!("{kind}: ignoring {extra} trailing argument(s)");
    }
    Ok((filter, projection))
}
