use bson::Document;
use parking_lot::RwLock;
use std::path::Path;
use std::time::Instant;

use super::import::{ImportOptions, ImportReport, read_records};
use super::{DocumentStore, apply_projection, compile_filter, eval_filter, run_pipeline};
use crate::errors::QaError;

/// Upper bound on records a single `find` returns.
pub(crate) const MAX_RESULTS: usize = 10_000;

/// Reference `DocumentStore` holding one collection in memory, in insertion order.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    docs: RwLock<Vec<Document>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), docs: RwLock::new(Vec::new()) }
    }

    pub fn with_documents(name: impl Into<String>, docs: Vec<Document>) -> Self {
        Self { name: name.into(), docs: RwLock::new(docs) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&self, doc: Document) {
        self.docs.write().push(doc);
    }

    pub fn insert_many(&self, docs: impl IntoIterator<Item = Document>) {
        self.docs.write().extend(docs);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Load NDJSON or JSON-array records from a file and append them.
    ///
    /// # Errors
    /// Returns `Io` when the file cannot be read or a record is invalid.
    pub fn load_path(&self, path: &Path, opts: &ImportOptions) -> Result<ImportReport, QaError> {
        let file = std::fs::File::open(path)
            .map_err(|e| QaError::Io(format!("{}: {e}", path.display())))?;
        let mut report = ImportReport::default();
        let docs = read_records(file, opts, &mut report)?;
        self.insert_many(docs);
        log::info!(
            "loaded {} records into '{}' from {} ({} skipped)",
            report.inserted,
            self.name,
            path.display(),
            report.skipped
        );
        Ok(report)
    }

    fn bench(&self, op: &str, start: Instant, result_count: usize) {
        crate::diag!(
            "{{\"bench\":\"store\",\"op\":\"{}\",\"collection\":\"{}\",\"duration_ms\":{},\"result_count\":{}}}",
            op,
            self.name,
            start.elapsed().as_millis(),
            result_count
        );
    }
}

impl DocumentStore for MemoryStore {
    fn find(&self, filter: &Document, projection: Option<&Document>) -> Result<Vec<Document>, QaError> {
        let start = Instant::now();
        let f = compile_filter(filter)?;
        let docs = self.docs.read();
        let mut out = Vec::new();
        for d in docs.iter().filter(|d| eval_filter(d, &f)) {
            if out.len() == MAX_RESULTS {
                log::warn!("find on '{}' truncated at {MAX_RESULTS} records", self.name);
                break;
            }
            out.push(match projection {
                Some(p) => apply_projection(d, p)?,
                None => d.clone(),
            });
        }
        drop(docs);
        self.bench("find", start, out.len());
        Ok(out)
    }

    fn find_one(&self, filter: &Document, projection: Option<&Document>) -> Result<Option<Document>, QaError> {
        let start = Instant::now();
        let f = compile_filter(filter)?;
        let found = self.docs.read().iter().find(|d| eval_filter(d, &f)).cloned();
        let out = match (found, projection) {
            (Some(d), Some(p)) => Some(apply_projection(&d, p)?),
            (found, _) => found,
        };
        self.bench("find_one", start, usize::from(out.is_some()));
        Ok(out)
    }

    fn aggregate(&self, pipeline: &[Document]) -> Result<Vec<Document>, QaError> {
        let start = Instant::now();
        let snapshot = self.docs.read().clone();
        let out = run_pipeline(snapshot, pipeline)?;
        self.bench("aggregate", start, out.len());
        Ok(out)
    }

    fn count_documents(&self, filter: &Document) -> Result<u64, QaError> {
        let start = Instant::now();
        let f = compile_filter(filter)?;
        let n = self.docs.read().iter().filter(|d| eval_filter(d, &f)).count();
        self.bench("count", start, 1);
        Ok(n as u64)
    }
}
