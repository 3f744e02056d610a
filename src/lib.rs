//! Answers questions about records in a document store.
//!
//! A question is translated into a query string such as `db.patients.findOne({"id": 7})`,
//! which is parsed ([`directive`]), rebuilt into a typed query ([`reconstruct`]), confined to
//! the caller's scope ([`scope`]), run against a [`store::DocumentStore`] ([`executor`]) and
//! finally rendered ([`render`]) either as a structured report or through a summarizer.

pub mod cli;
pub mod config;
pub mod diag;
pub mod directive;
pub mod errors;
pub mod executor;
pub mod json;
pub mod logger;
pub mod models;
pub mod pipeline;
pub mod reconstruct;
pub mod render;
pub mod scope;
pub mod store;
pub mod telemetry;

pub use config::QaConfig;
pub use directive::{Directive, DirectiveParser, OperationKind, SpanMode};
pub use errors::QaError;
pub use executor::{Executor, QueryOutcome, ResultSet};
pub use models::Models;
pub use pipeline::{Answer, Assistant, AudioSlot};
pub use reconstruct::{StructuredQuery, reconstruct};
pub use render::RenderMode;
pub use scope::ScopeId;
pub use store::{DocumentStore, MemoryStore};

use std::path::Path;
use std::sync::Arc;

use store::import::ImportOptions;

/// Build an assistant over an in-memory store, loading `cfg.data_file` when set.
///
/// # Errors
/// Invalid configuration or an unreadable data file.
pub fn memory_assistant(cfg: QaConfig, models: Arc<Models>) -> Result<Assistant, QaError> {
    let store = MemoryStore::new(cfg.collection.clone());
    if let Some(path) = cfg.data_file.as_deref() {
        load_into(&store, path)?;
    }
    Assistant::new(cfg, Arc::new(store), models)
}

fn load_into(store: &MemoryStore, path: &Path) -> Result<(), QaError> {
    let report = store.load_path(path, &ImportOptions::default())?;
    if report.skipped > 0 {
        log::warn!("{} records skipped while loading {}", report.skipped, path.display());
    }
    Ok(())
}
