use serde_json::{Value, json};
use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use crate::json::document_to_json;
use crate::pipeline::{Answer, Assistant};
use crate::reconstruct::StructuredQuery;
use crate::scope::ScopeId;
use crate::telemetry;

use super::command::Command;
use super::util::read_questions;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Plain,
    Json,
}

/// Run a command with human-readable output on stdout.
///
/// # Errors
/// See [`run_with_format`].
pub fn run(assistant: &Arc<Assistant>, cmd: Command) -> Result<(), Box<dyn Error>> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    run_with_format(assistant, cmd, OutputMode::Human, &mut lock)
}

/// # Errors
/// Write failures, an unreadable batch file, a failed batch worker, or (for `parse`) a query
/// string that does not parse.
pub fn run_with_format(
    assistant: &Arc<Assistant>,
    cmd: Command,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Ask { question, scope } => {
            let scope = scope.as_deref().and_then(ScopeId::parse);
            let answer = assistant.ask(&question, scope.as_ref());
            write_answer(out, mode, &answer, None)
        }
        Command::Exec { query, scope } => {
            let scope = scope.as_deref().and_then(ScopeId::parse);
            let answer = assistant.answer_query(&query, scope.as_ref());
            write_answer(out, mode, &answer, None)
        }
        Command::Parse { query, scope } => {
            let scope = scope.as_deref().and_then(ScopeId::parse);
            let plan = assistant.executor().plan(&query, scope.as_ref())?;
            let value = query_json(&plan);
            match mode {
                OutputMode::Json | OutputMode::Plain => writeln!(out, "{value}")?,
                OutputMode::Human => writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?,
            }
            Ok(())
        }
        Command::Batch { file, scope, workers, metrics } => {
            let questions = read_questions(&file)?;
            let scope = scope.as_deref().and_then(ScopeId::parse);
            let answers = answer_all(assistant, questions.clone(), scope, workers)?;
            for (question, answer) in questions.iter().zip(&answers) {
                write_answer(out, mode, answer, Some(question))?;
            }
            if metrics {
                write_metrics(out, mode)?;
            }
            Ok(())
        }
    }
}

/// Answer questions concurrently; answers come back in input order.
fn answer_all(
    assistant: &Arc<Assistant>,
    questions: Vec<String>,
    scope: Option<ScopeId>,
    workers: usize,
) -> Result<Vec<Answer>, Box<dyn Error>> {
    let workers = workers.max(1);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .max_blocking_threads(workers)
        .enable_all()
        .build()?;
    let answers = rt.block_on(async {
        let handles: Vec<_> = questions
            .into_iter()
            .map(|q| {
                let assistant = Arc::clone(assistant);
                let scope = scope.clone();
                tokio::task::spawn_blocking(move || assistant.ask(&q, scope.as_ref()))
            })
            .collect();
        let mut answers = Vec::with_capacity(handles.len());
        for h in handles {
            answers.push(h.await?);
        }
        Ok::<_, tokio::task::JoinError>(answers)
    })?;
    Ok(answers)
}

fn write_answer(
    out: &mut dyn Write,
    mode: OutputMode,
    answer: &Answer,
    question: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    match mode {
        OutputMode::Json => {
            let mut v = json!({
                "request_id": answer.request_id.to_string(),
                "response": answer.text,
                "audio_url": answer.audio_url(),
                "mode": answer.mode.map(|m| m.label()),
                "result_count": answer.result_count,
                "diagnostic": answer.diagnostic,
            });
            if let Some(q) = question {
                v["question"] = Value::String(q.to_owned());
            }
            writeln!(out, "{v}")?;
        }
        OutputMode::Plain => writeln!(out, "{}", answer.text)?,
        OutputMode::Human => {
            if let Some(q) = question {
                writeln!(out, "Q: {q}")?;
            }
            writeln!(out, "{}", answer.text)?;
            let mode = answer.mode.map_or("canned", |m| m.label());
            write!(out, "[mode={mode} audio={}", answer.audio_url())?;
            if let Some(d) = &answer.diagnostic {
                write!(out, " note={d}")?;
            }
            writeln!(out, "]")?;
        }
    }
    Ok(())
}

/// Counters are process-local, so they are only meaningful after work done in this process.
fn write_metrics(out: &mut dyn Write, mode: OutputMode) -> Result<(), Box<dyn Error>> {
    let text = telemetry::metrics_text();
    match mode {
        OutputMode::Json => {
            let counters: serde_json::Map<String, Value> = text
                .lines()
                .filter_map(|l| l.split_once(' '))
                .filter_map(|(name, n)| Some((name.to_owned(), Value::from(n.parse::<u64>().ok()?))))
                .collect();
            writeln!(out, "{}", json!({"metrics": counters}))?;
        }
        OutputMode::Plain | OutputMode::Human => write!(out, "{text}")?,
    }
    Ok(())
}

/// JSON view of a structured query, for `parse`.
#[must_use]
pub fn query_json(query: &StructuredQuery) -> Value {
    let kind = query.kind().method_name();
    match query {
        StructuredQuery::Aggregate { pipeline } => {
            json!({"kind": kind, "pipeline": pipeline.iter().map(document_to_json).collect::<Vec<_>>()})
        }
        StructuredQuery::Find { filter, projection } | StructuredQuery::FindOne { filter, projection } => json!({
            "kind": kind,
            "filter": document_to_json(filter),
            "projection": projection.as_ref().map(document_to_json),
        }),
        StructuredQuery::CountDocuments { filter } => json!({"kind": kind, "filter": document_to_json(filter)}),
    }
}
