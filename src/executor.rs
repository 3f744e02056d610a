//! Runs a generated query string against a document store.

use bson::{Bson, Document};
use std::sync::Arc;
use std::time::Instant;

use crate::directive::DirectiveParser;
use crate::errors::QaError;
use crate::reconstruct::{StructuredQuery, reconstruct};
use crate::scope::{ScopeId, apply_scope};
use crate::store::DocumentStore;

/// Records returned by one query, in store order.
pub type ResultSet = Vec<Document>;

/// Dispatch a structured query to the matching store operation.
///
/// # Errors
/// Propagates the store's error.
pub fn execute(store: &dyn DocumentStore, query: &StructuredQuery) -> Result<ResultSet, QaError> {
    match query {
        StructuredQuery::Aggregate { pipeline } => store.aggregate(pipeline),
        StructuredQuery::Find { filter, projection } => store.find(filter, projection.as_ref()),
        StructuredQuery::FindOne { filter, projection } => {
            Ok(store.find_one(filter, projection.as_ref())?.into_iter().collect())
        }
        StructuredQuery::CountDocuments { filter } => {
            let n = store.count_documents(filter)?;
            let mut out = Document::new();
            out.insert("count", Bson::Int64(i64::try_from(n).unwrap_or(i64::MAX)));
            Ok(vec![out])
        }
    }
}

/// Result of a query run that never fails outright: failures become an empty result set with
/// the cause kept for diagnostics.
#[derive(Debug, Default)]
pub struct QueryOutcome {
    pub records: ResultSet,
    pub failure: Option<QaError>,
}

impl QueryOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct Executor {
    store: Arc<dyn DocumentStore>,
    parser: DirectiveParser,
    id_field: String,
}

impl Executor {
    pub fn new(store: Arc<dyn DocumentStore>, parser: DirectiveParser, id_field: impl Into<String>) -> Self {
        Self { store, parser, id_field: id_field.into() }
    }

    #[must_use]
    pub const fn parser(&self) -> &DirectiveParser {
        &self.parser
    }

    #[must_use]
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Parse, rebuild, scope and run `query`.
    ///
    /// # Errors
    /// Any `UnsupportedOperation`, `MalformedArgument` or `StoreFailure` along the way.
    pub fn plan(&self, query: &str, scope: Option<&ScopeId>) -> Result<StructuredQuery, QaError> {
        let directive = self.parser.parse(query)?;
        let structured = reconstruct(&directive)?;
        Ok(apply_scope(structured, scope, &self.id_field))
    }

    /// # Errors
    /// Same as [`Executor::plan`], plus store failures.
    pub fn try_run(&self, query: &str, scope: Option<&ScopeId>) -> Result<ResultSet, QaError> {
        let structured = self.plan(query, scope)?;
        execute(self.store.as_ref(), &structured)
    }

    /// Like [`Executor::try_run`], but failures are logged, counted and downgraded to an empty
    /// result.
    pub fn run(&self, query: &str, scope: Option<&ScopeId>) -> QueryOutcome {
        let start = Instant::now();
        let outcome = match self.try_run(query, scope) {
            Ok(records) => QueryOutcome { records, failure: None },
            Err(e) => {
                log::warn!("query failed ({}): {e}", e.label());
                crate::telemetry::record_failure(&e);
                QueryOutcome { records: Vec::new(), failure: Some(e) }
            }
        };
        crate::diag!(
            "{{\"bench\":\"execute\",\"scoped\":{},\"duration_ms\":{},\"result_count\":{},\"failure\":{:?}}}",
            scope.is_some(),
            start.elapsed().as_millis(),
            outcome.records.len(),
            outcome.failure.as_ref().map_or("none", QaError::label)
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bson::doc;

    fn executor() -> Executor {
        let store = MemoryStore::with_documents(
            "patients",
            vec![doc! {"id": 1, "name": "Ann"}, doc! {"id": 2, "name": "Bob"}],
        );
        Executor::new(Arc::new(store), DirectiveParser::new("patients"), "id")
    }

    #[test]
    fn count_yields_single_record() {
        let out = executor().try_run("db.patients.countDocuments({})", None).unwrap();
        assert_eq!(out, vec![doc! {"count": 2_i64}]);
    }

    #[test]
    fn scope_overrides_generated_identifier() {
        let ex = executor();
        let out = ex.try_run("db.patients.find({\"id\": 1})", Some(&ScopeId::from(2))).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get_str("name").unwrap(), "Bob");
    }

    #[test]
    fn failures_downgrade_to_empty() {
        let ex = executor();
        let out = ex.run("db.patients.drop()", None);
        assert!(out.is_empty());
        assert!(matches!(out.failure, Some(QaError::UnsupportedOperation(_))));
        let out = ex.run("db.patients.find({\"id\": {\"$where\": 1}})", None);
        assert!(matches!(out.failure, Some(QaError::StoreFailure(_))));
    }
}
