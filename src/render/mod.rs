//! Chooses how a result set is presented, and the renderers that present it.

pub mod canned;
pub mod report;

pub use canned::canned_reply;
pub use report::{Item, ReportFormat, ReportRenderer, ReportSchema, Section};

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::json::records_to_json;

/// Result sets larger than this (in serialized bytes) skip the summarizer.
pub const DEFAULT_SIZE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    NotFound,
    NeedsDisambiguation,
    Structured,
    NaturalLanguage,
}

impl RenderMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NeedsDisambiguation => "needs_disambiguation",
            Self::Structured => "structured",
            Self::NaturalLanguage => "natural_language",
        }
    }
}

/// Byte length of the compact JSON form of the whole result set.
#[must_use]
pub fn payload_size(results: &[Document]) -> usize {
    records_to_json(results).to_string().len()
}

/// First match wins: empty, then unscoped multiple records, then size.
#[must_use]
pub fn select_mode(results: &[Document], scope_present: bool, threshold: usize) -> RenderMode {
    if results.is_empty() {
        RenderMode::NotFound
    } else if results.len() > 1 && !scope_present {
        RenderMode::NeedsDisambiguation
    } else if payload_size(results) > threshold {
        RenderMode::Structured
    } else {
        RenderMode::NaturalLanguage
    }
}
