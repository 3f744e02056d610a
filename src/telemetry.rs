//! Process-wide request counters plus structured request and audit lines.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

use crate::errors::QaError;
use crate::render::RenderMode;

/// Log target for one JSON line per answered request.
pub const METRICS_TARGET: &str = "recordqa::metrics";
/// Log target for disambiguation audit lines.
pub const AUDIT_TARGET: &str = "recordqa::audit";

#[derive(Default)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub canned_total: AtomicU64,
    pub translator_failures_total: AtomicU64,
    pub unsupported_total: AtomicU64,
    pub malformed_total: AtomicU64,
    pub store_failures_total: AtomicU64,
    pub not_found_total: AtomicU64,
    pub disambiguation_total: AtomicU64,
    pub structured_total: AtomicU64,
    pub natural_language_total: AtomicU64,
    pub summarizer_fallback_total: AtomicU64,
}

#[derive(Default)]
struct Telemetry {
    metrics: Metrics,
    // tests capture audit lines here
    audit_sink: RwLock<Option<Arc<RwLock<Vec<String>>>>>,
}

static TELEMETRY: LazyLock<Telemetry> = LazyLock::new(Telemetry::default);

#[must_use]
pub fn metrics() -> &'static Metrics {
    &TELEMETRY.metrics
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_canned() {
    bump(&TELEMETRY.metrics.canned_total);
}

pub fn record_translator_failure() {
    bump(&TELEMETRY.metrics.translator_failures_total);
}

pub fn record_summarizer_fallback() {
    bump(&TELEMETRY.metrics.summarizer_fallback_total);
}

/// Count a pipeline failure under its kind. Collaborator and config errors are counted by
/// their own call sites.
pub fn record_failure(err: &QaError) {
    let m = &TELEMETRY.metrics;
    match err {
        QaError::UnsupportedOperation(_) => bump(&m.unsupported_total),
        QaError::MalformedArgument { .. } => bump(&m.malformed_total),
        QaError::StoreFailure(_) => bump(&m.store_failures_total),
        _ => {}
    }
}

pub fn record_mode(mode: RenderMode) {
    let m = &TELEMETRY.metrics;
    bump(match mode {
        RenderMode::NotFound => &m.not_found_total,
        RenderMode::NeedsDisambiguation => &m.disambiguation_total,
        RenderMode::Structured => &m.structured_total,
        RenderMode::NaturalLanguage => &m.natural_language_total,
    });
}

pub fn set_audit_sink_for_tests(sink: Arc<RwLock<Vec<String>>>) {
    *TELEMETRY.audit_sink.write() = Some(sink);
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[must_use]
pub fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut h = Sha256::new();
    h.update(input.as_bytes());
    hex::encode(h.finalize())
}

/// One answered request, as logged to the metrics target.
#[derive(Debug, Clone)]
pub struct RequestRecord<'a> {
    pub request_id: Uuid,
    pub query: Option<&'a str>,
    pub result_count: usize,
    pub duration_ms: u128,
    pub mode: Option<RenderMode>,
    pub failure: Option<&'static str>,
}

/// Count the request and emit its JSON line. The query text itself is only logged as a hash.
pub fn log_request(rec: &RequestRecord<'_>) -> String {
    bump(&TELEMETRY.metrics.requests_total);
    let line = serde_json::json!({
        "ts": now_ts(),
        "request_id": rec.request_id.to_string(),
        "query_hash": rec.query.map(sha256_hex),
        "result_count": rec.result_count,
        "duration_ms": u64::try_from(rec.duration_ms).unwrap_or(u64::MAX),
        "mode": rec.mode.map(RenderMode::label),
        "failure": rec.failure,
    })
    .to_string();
    log::info!(target: METRICS_TARGET, "{line}");
    line
}

/// Audit a request that matched several records without a scope.
pub fn log_disambiguation(request_id: Uuid, query: &str, result_count: usize) {
    let line = serde_json::json!({
        "ts": now_ts(),
        "event": "disambiguation",
        "request_id": request_id.to_string(),
        "query_hash": sha256_hex(query),
        "result_count": result_count,
    })
    .to_string();
    let sink = TELEMETRY.audit_sink.read().clone();
    if let Some(sink) = sink {
        sink.write().push(line.clone());
    }
    log::info!(target: AUDIT_TARGET, "{line}");
}

/// OpenMetrics-style counter lines.
#[must_use]
pub fn metrics_text() -> String {
    let m = &TELEMETRY.metrics;
    let rows: [(&str, &AtomicU64); 11] = [
        ("recordqa_requests_total", &m.requests_total),
        ("recordqa_canned_total", &m.canned_total),
        ("recordqa_translator_failures_total", &m.translator_failures_total),
        ("recordqa_unsupported_total", &m.unsupported_total),
        ("recordqa_malformed_total", &m.malformed_total),
        ("recordqa_store_failures_total", &m.store_failures_total),
        ("recordqa_not_found_total", &m.not_found_total),
        ("recordqa_disambiguation_total", &m.disambiguation_total),
        ("recordqa_structured_total", &m.structured_total),
        ("recordqa_natural_language_total", &m.natural_language_total),
        ("recordqa_summarizer_fallback_total", &m.summarizer_fallback_total),
    ];
    rows.iter().map(|(name, c)| format!("{name} {}\n", c.load(Ordering::Relaxed))).collect()
}
