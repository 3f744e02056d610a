//! Request entry point: question in, rendered answer out.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::QaConfig;
use crate::directive::DirectiveParser;
use crate::errors::QaError;
use crate::executor::{Executor, QueryOutcome};
use crate::models::{self, Models};
use crate::render::{RenderMode, ReportRenderer, ReportSchema, canned_reply, select_mode};
use crate::scope::ScopeId;
use crate::store::DocumentStore;
use crate::telemetry::{self, RequestRecord};

/// Fixed audio files an answer can be spoken into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSlot {
    DefaultResponse,
    Error,
    MultipleFound,
    Detailed,
    NaturalLanguage,
}

impl AudioSlot {
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::DefaultResponse => "default_response.mp3",
            Self::Error => "error.mp3",
            Self::MultipleFound => "multiple_patients.mp3",
            Self::Detailed => "detailed_response.mp3",
            Self::NaturalLanguage => "response.mp3",
        }
    }

    #[must_use]
    pub fn audio_url(self) -> String {
        format!("/audio/{}", self.file_name())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub request_id: Uuid,
    pub text: String,
    pub slot: AudioSlot,
    /// `None` for canned replies.
    pub mode: Option<RenderMode>,
    pub query: Option<String>,
    pub result_count: usize,
    /// Why the answer degraded, when it did.
    pub diagnostic: Option<String>,
}

impl Answer {
    #[must_use]
    pub fn audio_url(&self) -> String {
        self.slot.audio_url()
    }
}

pub struct Assistant {
    config: QaConfig,
    executor: Executor,
    models: Arc<Models>,
    renderer: ReportRenderer,
    /// Held while a slot file is written; slots are shared, so the last answer wins.
    speech_lock: Mutex<()>,
}

impl Assistant {
    /// # Errors
    /// Invalid configuration, or a report schema file that cannot be read.
    pub fn new(config: QaConfig, store: Arc<dyn DocumentStore>, models: Arc<Models>) -> Result<Self, QaError> {
        config.validate()?;
        let schema = match &config.report.schema_file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| QaError::Io(format!("{}: {e}", path.display())))?;
                toml::from_str::<ReportSchema>(&text)?
            }
            None => ReportSchema::default(),
        };
        let renderer = ReportRenderer::new(schema, config.report.format, config.report.missing_marker.clone());
        let parser = DirectiveParser::new(&config.collection).with_mode(config.span_mode);
        let executor = Executor::new(store, parser, config.id_field.clone());
        Ok(Self { config, executor, models, renderer, speech_lock: Mutex::new(()) })
    }

    /// Build with the process-wide models.
    ///
    /// # Errors
    /// `QaError::Config` when no models were installed, or anything [`Assistant::new`] reports.
    pub fn from_installed(config: QaConfig, store: Arc<dyn DocumentStore>) -> Result<Self, QaError> {
        let models = models::installed().ok_or_else(|| QaError::Config("models not installed".into()))?;
        Self::new(config, store, models)
    }

    #[must_use]
    pub const fn config(&self) -> &QaConfig {
        &self.config
    }

    #[must_use]
    pub const fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Run a query string without rendering.
    pub fn query(&self, query: &str, scope: Option<&ScopeId>) -> QueryOutcome {
        self.executor.run(query, scope)
    }

    /// Answer a natural-language question.
    pub fn ask(&self, question: &str, scope: Option<&ScopeId>) -> Answer {
        let start = Instant::now();
        let request_id = Uuid::new_v4();
        if self.config.canned_replies
            && let Some(reply) = canned_reply(question)
        {
            telemetry::record_canned();
            let answer = Answer {
                request_id,
                text: reply.to_owned(),
                slot: AudioSlot::DefaultResponse,
                mode: None,
                query: None,
                result_count: 0,
                diagnostic: None,
            };
            return self.finish(answer, start);
        }
        match self.models.translator.translate(question) {
            Ok(query) => self.respond(request_id, query, scope, start),
            Err(e) => {
                log::warn!("translation failed: {e}");
                telemetry::record_translator_failure();
                telemetry::record_mode(RenderMode::NotFound);
                let answer = Answer {
                    request_id,
                    text: self.config.messages.not_found.clone(),
                    slot: AudioSlot::Error,
                    mode: Some(RenderMode::NotFound),
                    query: None,
                    result_count: 0,
                    diagnostic: Some(e.to_string()),
                };
                self.finish(answer, start)
            }
        }
    }

    /// Answer an already generated query string.
    pub fn answer_query(&self, query: &str, scope: Option<&ScopeId>) -> Answer {
        self.respond(Uuid::new_v4(), query.to_owned(), scope, Instant::now())
    }

    fn respond(&self, request_id: Uuid, query: String, scope: Option<&ScopeId>, start: Instant) -> Answer {
        let outcome = self.executor.run(&query, scope);
        let records = outcome.records;
        let mut diagnostic = outcome.failure.map(|e| e.to_string());
        let mut mode = select_mode(&records, scope.is_some(), self.config.size_threshold_bytes);
        let (text, slot) = match mode {
            RenderMode::NotFound => (self.config.messages.not_found.clone(), AudioSlot::Error),
            RenderMode::NeedsDisambiguation => {
                telemetry::log_disambiguation(request_id, &query, records.len());
                (self.config.messages.multiple_found.clone(), AudioSlot::MultipleFound)
            }
            RenderMode::Structured => (self.renderer.render(&records), AudioSlot::Detailed),
            RenderMode::NaturalLanguage => {
                let summary = match &self.models.summarizer {
                    Some(s) => s.summarize(&records),
                    None => Err(QaError::Model("no summarizer configured".into())),
                };
                match summary {
                    Ok(text) => (text, AudioSlot::NaturalLanguage),
                    Err(e) => {
                        log::info!("summarizer unavailable, rendering structured: {e}");
                        telemetry::record_summarizer_fallback();
                        diagnostic = Some(e.to_string());
                        mode = RenderMode::Structured;
                        (self.renderer.render(&records), AudioSlot::Detailed)
                    }
                }
            }
        };
        telemetry::record_mode(mode);
        let answer = Answer {
            request_id,
            text,
            slot,
            mode: Some(mode),
            query: Some(query),
            result_count: records.len(),
            diagnostic,
        };
        self.finish(answer, start)
    }

    fn finish(&self, answer: Answer, start: Instant) -> Answer {
        if let Some(speech) = &self.models.speech {
            let _slot = self.speech_lock.lock();
            if let Err(e) = speech.synthesize(&answer.text, answer.slot.file_name()) {
                log::warn!("speech synthesis failed for {}: {e}", answer.slot.file_name());
            }
        }
        telemetry::log_request(&RequestRecord {
            request_id: answer.request_id,
            query: answer.query.as_deref(),
            result_count: answer.result_count,
            duration_ms: start.elapsed().as_millis(),
            mode: answer.mode,
            failure: answer.diagnostic.as_ref().map(|_| "degraded"),
        });
        answer
    }
}
