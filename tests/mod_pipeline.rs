use bson::{Document, doc};
use parking_lot::{Mutex, RwLock};
use recordqa::models::{PassthroughTranslator, QueryTranslator, SpeechSynthesizer, Summarizer};
use recordqa::{Assistant, AudioSlot, MemoryStore, Models, QaConfig, QaError, RenderMode, ScopeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

struct FailingTranslator;

impl QueryTranslator for FailingTranslator {
    fn translate(&self, _question: &str) -> Result<String, QaError> {
        Err(QaError::Model("translator offline".into()))
    }
}

struct CountingSummarizer;

impl Summarizer for CountingSummarizer {
    fn summarize(&self, records: &[Document]) -> Result<String, QaError> {
        Ok(format!("{} record(s) summarized", records.len()))
    }
}

struct FailingSummarizer;

impl Summarizer for FailingSummarizer {
    fn summarize(&self, _records: &[Document]) -> Result<String, QaError> {
        Err(QaError::Model("summarizer offline".into()))
    }
}

#[derive(Default)]
struct RecordingSpeech {
    spoken: Mutex<Vec<(String, String)>>,
}

impl SpeechSynthesizer for RecordingSpeech {
    fn synthesize(&self, text: &str, file_name: &str) -> Result<(), QaError> {
        self.spoken.lock().push((text.to_owned(), file_name.to_owned()));
        Ok(())
    }
}

#[derive(Default)]
struct OverlapSpeech {
    in_flight: AtomicUsize,
    overlapped: AtomicBool,
    calls: AtomicUsize,
}

impl SpeechSynthesizer for OverlapSpeech {
    fn synthesize(&self, _text: &str, _file_name: &str) -> Result<(), QaError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_millis(5));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn records() -> Vec<Document> {
    vec![
        doc! {"id": 1, "name": {"first": "Ann", "last": "Lee"}, "ward": "A"},
        doc! {"id": 2, "name": {"first": "Bob", "last": "Ray"}, "ward": "A"},
        doc! {"id": 3, "name": {"first": "Cid", "last": "Fox"}, "ward": "A"},
        doc! {"id": 4, "name": {"first": "Dee", "last": "Orr"}, "ward": "B", "notes": "z".repeat(20_000)},
    ]
}

fn models(summarizer: Option<Arc<dyn Summarizer>>) -> Models {
    Models { translator: Arc::new(PassthroughTranslator), summarizer, speech: None }
}

fn assistant(models: Models) -> Assistant {
    let store = MemoryStore::with_documents("patients", records());
    Assistant::new(QaConfig::default(), Arc::new(store), Arc::new(models)).unwrap()
}

#[test]
fn missing_record_is_not_found() {
    let a = assistant(models(Some(Arc::new(CountingSummarizer))));
    let ans = a.ask(r#"db.patients.findOne({"id": 7})"#, None);
    assert_eq!(ans.text, "Patient not found.");
    assert_eq!(ans.mode, Some(RenderMode::NotFound));
    assert_eq!(ans.slot, AudioSlot::Error);
    assert_eq!(ans.audio_url(), "/audio/error.mp3");
    assert_eq!(ans.result_count, 0);
}

#[test]
fn several_unscoped_records_ask_for_an_id_and_are_audited() {
    let sink = Arc::new(RwLock::new(Vec::new()));
    recordqa::telemetry::set_audit_sink_for_tests(sink.clone());
    let a = assistant(models(Some(Arc::new(CountingSummarizer))));
    let ans = a.ask(r#"db.patients.find({"ward": "A"})"#, None);
    assert_eq!(ans.mode, Some(RenderMode::NeedsDisambiguation));
    assert_eq!(ans.text, "Multiple patients found. Please provide the patient ID.");
    assert_eq!(ans.slot, AudioSlot::MultipleFound);
    assert_eq!(ans.result_count, 3);
    let id = ans.request_id.to_string();
    let lines = sink.read();
    let line = lines.iter().find(|l| l.contains(&id)).expect("audit line for request");
    assert!(line.contains("\"event\":\"disambiguation\""));
    assert!(!line.contains("ward"));
}

#[test]
fn scope_lifts_disambiguation() {
    let a = assistant(models(Some(Arc::new(CountingSummarizer))));
    let scope = ScopeId::from(2);
    let ans = a.ask(r#"db.patients.find({"ward": "A"})"#, Some(&scope));
    assert_eq!(ans.mode, Some(RenderMode::NaturalLanguage));
    assert_eq!(ans.text, "1 record(s) summarized");
    assert_eq!(ans.slot, AudioSlot::NaturalLanguage);
}

#[test]
fn oversized_result_is_rendered_structured() {
    let a = assistant(models(Some(Arc::new(CountingSummarizer))));
    let ans = a.ask(r#"db.patients.findOne({"id": 4})"#, None);
    assert_eq!(ans.mode, Some(RenderMode::Structured));
    assert_eq!(ans.slot, AudioSlot::Detailed);
    assert!(ans.text.starts_with("Patient ID: 4\n"));
    assert!(ans.text.contains("Name: Dee Orr"));
}

#[test]
fn small_result_goes_through_the_summarizer() {
    let a = assistant(models(Some(Arc::new(CountingSummarizer))));
    let ans = a.ask(r#"db.patients.findOne({"id": 1})"#, None);
    assert_eq!(ans.mode, Some(RenderMode::NaturalLanguage));
    assert_eq!(ans.text, "1 record(s) summarized");
    assert!(ans.diagnostic.is_none());
}

#[test]
fn summarizer_failure_falls_back_to_structured() {
    let a = assistant(models(Some(Arc::new(FailingSummarizer))));
    let ans = a.ask(r#"db.patients.findOne({"id": 1})"#, None);
    assert_eq!(ans.mode, Some(RenderMode::Structured));
    assert_eq!(ans.slot, AudioSlot::Detailed);
    assert!(ans.text.contains("Name: Ann Lee"));
    assert!(ans.diagnostic.as_deref().unwrap_or_default().contains("summarizer offline"));

    let a = assistant(models(None));
    let ans = a.ask(r#"db.patients.findOne({"id": 1})"#, None);
    assert_eq!(ans.mode, Some(RenderMode::Structured));
}

#[test]
fn canned_reply_skips_the_translator() {
    let m = Models { translator: Arc::new(FailingTranslator), summarizer: None, speech: None };
    let a = assistant(m);
    let ans = a.ask("Hello", None);
    assert_eq!(ans.text, "Hello! How can I assist you today?");
    assert_eq!(ans.slot, AudioSlot::DefaultResponse);
    assert_eq!(ans.mode, None);
    assert!(ans.query.is_none());
}

#[test]
fn canned_replies_can_be_disabled() {
    let m = Models { translator: Arc::new(FailingTranslator), summarizer: None, speech: None };
    let cfg = QaConfig { canned_replies: false, ..QaConfig::default() };
    let a = Assistant::new(cfg, Arc::new(MemoryStore::new("patients")), Arc::new(m)).unwrap();
    let ans = a.ask("Hello", None);
    assert_eq!(ans.mode, Some(RenderMode::NotFound));
    assert_eq!(ans.slot, AudioSlot::Error);
    assert!(ans.diagnostic.as_deref().unwrap_or_default().contains("translator offline"));
}

#[test]
fn unsupported_query_degrades_to_not_found() {
    let a = assistant(models(None));
    let ans = a.answer_query("db.patients.drop()", None);
    assert_eq!(ans.mode, Some(RenderMode::NotFound));
    assert_eq!(ans.text, "Patient not found.");
    assert!(ans.diagnostic.is_some());
}

#[test]
fn count_answers_are_single_records() {
    let a = assistant(models(Some(Arc::new(CountingSummarizer))));
    let ans = a.answer_query(r#"db.patients.countDocuments({"ward": "A"})"#, None);
    assert_eq!(ans.mode, Some(RenderMode::NaturalLanguage));
    assert_eq!(ans.result_count, 1);
}

#[test]
fn every_answer_is_spoken_into_its_slot() {
    let speech = Arc::new(RecordingSpeech::default());
    let m = Models {
        translator: Arc::new(PassthroughTranslator),
        summarizer: Some(Arc::new(CountingSummarizer)),
        speech: Some(speech.clone()),
    };
    let a = assistant(m);
    a.ask("hi", None);
    a.ask(r#"db.patients.findOne({"id": 99})"#, None);
    let spoken = speech.spoken.lock();
    assert_eq!(spoken.len(), 2);
    assert_eq!(spoken[0].1, "default_response.mp3");
    assert_eq!(spoken[1], ("Patient not found.".to_owned(), "error.mp3".to_owned()));
}

#[test]
fn custom_messages_are_used() {
    let mut cfg = QaConfig::default();
    cfg.messages.not_found = "No such record.".into();
    let a = Assistant::new(cfg, Arc::new(MemoryStore::new("patients")), Arc::new(models(None))).unwrap();
    assert_eq!(a.ask("db.patients.find({})", None).text, "No such record.");
}

#[test]
fn report_schema_can_come_from_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.toml");
    std::fs::write(
        &path,
        r#"
title = "Ward {ward}"

[[sections]]
items = [{ kind = "line", label = "Patient", template = "{name.first}" }]
"#,
    )
    .unwrap();
    let mut cfg = QaConfig::default();
    cfg.report.schema_file = Some(path);
    let store = MemoryStore::with_documents("patients", records());
    let a = Assistant::new(cfg, Arc::new(store), Arc::new(models(None))).unwrap();
    let ans = a.ask(r#"db.patients.findOne({"id": 2})"#, None);
    assert!(ans.text.starts_with("Ward A\n  Patient: Bob"), "{}", ans.text);
}

#[test]
fn group_keys_survive_structured_rendering() {
    let store = MemoryStore::with_documents("patients", vec![doc! {"id": 7, "gender": "Female"}]);
    let a = Assistant::new(QaConfig::default(), Arc::new(store), Arc::new(models(None))).unwrap();
    let ans = a.answer_query(
        r#"db.patients.aggregate([{"$group": {"_id": "$gender", "n": {"$sum": 1}}}])"#,
        Some(&ScopeId::from(7)),
    );
    assert_eq!(ans.mode, Some(RenderMode::Structured));
    assert!(ans.text.contains("_id: Female"), "{}", ans.text);
    assert!(ans.text.contains("n: 1"), "{}", ans.text);
}

#[test]
fn malformed_query_is_not_found_with_a_reason() {
    let a = assistant(models(Some(Arc::new(CountingSummarizer))));
    let ans = a.answer_query(r#"db.patients.find({"name": "Ann})"#, None);
    assert_eq!(ans.mode, Some(RenderMode::NotFound));
    assert_eq!(ans.text, "Patient not found.");
    assert_eq!(ans.result_count, 0);
    let diagnostic = ans.diagnostic.unwrap_or_default();
    assert!(diagnostic.starts_with("Malformed find argument"), "{diagnostic}");
}

#[test]
fn concurrent_answers_never_write_slots_at_once() {
    let speech = Arc::new(OverlapSpeech::default());
    let m = Models { translator: Arc::new(PassthroughTranslator), summarizer: None, speech: Some(speech.clone()) };
    let a = assistant(m);
    std::thread::scope(|s| {
        for i in 0..8 {
            let a = &a;
            s.spawn(move || a.ask(&format!("db.patients.findOne({{\"id\": {}}})", i % 4 + 1), None));
        }
    });
    assert_eq!(speech.calls.load(Ordering::SeqCst), 8);
    assert!(!speech.overlapped.load(Ordering::SeqCst));
}
