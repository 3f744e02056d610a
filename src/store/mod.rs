//! Document-store seam and the in-memory reference store.

mod eval;
mod filter;
pub mod import;
mod memory;
pub(crate) mod path;
mod pipeline;
mod project;

pub use eval::{bson_equal, compare_bson, eval_filter};
pub use filter::{CmpOp, Filter, compile_filter};
pub use memory::MemoryStore;
pub use pipeline::run_pipeline;
pub use project::apply_projection;

use bson::Document;

use crate::errors::QaError;

/// The four read operations the executor needs from a document store.
///
/// Implementations report connectivity problems and rejected filters as
/// `QaError::StoreFailure`.
pub trait DocumentStore: Send + Sync {
    /// # Errors
    /// Store-defined; see the trait docs.
    fn find(&self, filter: &Document, projection: Option<&Document>) -> Result<Vec<Document>, QaError>;

    /// # Errors
    /// Store-defined; see the trait docs.
    fn find_one(
        &self,
        filter: &Document,
        projection: Option<&Document>,
    ) -> Result<Option<Document>, QaError>;

    /// # Errors
    /// Store-defined; see the trait docs.
    fn aggregate(&self, pipeline: &[Document]) -> Result<Vec<Document>, QaError>;

    /// # Errors
    /// Store-defined; see the trait docs.
    fn count_documents(&self, filter: &Document) -> Result<u64, QaError>;
}

pub(crate) fn rejected(reason: impl Into<String>) -> QaError {
    QaError::StoreFailure(reason.into())
}
