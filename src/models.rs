//! Collaborator seams (translator, summarizer, speech) and the process-wide model registry.

use bson::Document;
use once_cell::sync::OnceCell;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::config::{ModelCommand, QaConfig};
use crate::errors::QaError;
use crate::json::records_to_json;

/// Turns a natural-language question into a query string.
pub trait QueryTranslator: Send + Sync {
    /// # Errors
    /// `QaError::Model` when the translator cannot produce a query.
    fn translate(&self, question: &str) -> Result<String, QaError>;
}

/// Summarizes a result set into prose.
pub trait Summarizer: Send + Sync {
    /// # Errors
    /// `QaError::Model` when no summary could be produced.
    fn summarize(&self, records: &[Document]) -> Result<String, QaError>;
}

/// Speaks an answer into an audio file.
///
/// File names are fixed per slot, not per request. An `Assistant` never runs two calls at
/// once, and the most recent answer for a slot is the one left on disk.
pub trait SpeechSynthesizer: Send + Sync {
    /// # Errors
    /// `QaError::Model` or `QaError::Io` on synthesis failure.
    fn synthesize(&self, text: &str, file_name: &str) -> Result<(), QaError>;
}

/// Treats the question as an already generated query string.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranslator;

impl QueryTranslator for PassthroughTranslator {
    fn translate(&self, question: &str) -> Result<String, QaError> {
        Ok(question.trim().to_owned())
    }
}

/// A collaborator backed by an external program: input on stdin, output on stdout.
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: String,
    args: Vec<String>,
}

impl CommandModel {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    fn run(&self, extra: Option<&str>, input: &str) -> Result<String, QaError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(arg) = extra {
            cmd.arg(arg);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| QaError::Model(format!("{}: {e}", self.program)))?;
        // stdin must be fed while stdout is drained, or a full pipe stalls both ends.
        let writer = child.stdin.take().map(|mut stdin| {
            let bytes = input.as_bytes().to_vec();
            std::thread::spawn(move || stdin.write_all(&bytes))
        });
        let output = child.wait_with_output()?;
        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    log::debug!("{} closed stdin early", self.program);
                }
                Ok(Err(e)) => return Err(QaError::Model(format!("{}: writing input: {e}", self.program))),
                Err(_) => return Err(QaError::Model(format!("{}: input writer panicked", self.program))),
            }
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(QaError::Model(format!("{} exited with {}: {}", self.program, output.status, stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    fn invoke(&self, input: &str) -> Result<String, QaError> {
        let text = self.run(None, input)?;
        if text.is_empty() {
            return Err(QaError::Model(format!("{} produced no output", self.program)));
        }
        Ok(text)
    }
}

impl From<&ModelCommand> for CommandModel {
    fn from(c: &ModelCommand) -> Self {
        Self::new(c.program.clone(), c.args.clone())
    }
}

impl QueryTranslator for CommandModel {
    fn translate(&self, question: &str) -> Result<String, QaError> {
        self.invoke(question)
    }
}

impl Summarizer for CommandModel {
    fn summarize(&self, records: &[Document]) -> Result<String, QaError> {
        self.invoke(&records_to_json(records).to_string())
    }
}

impl SpeechSynthesizer for CommandModel {
    /// The target file name is passed as the last argument.
    fn synthesize(&self, text: &str, file_name: &str) -> Result<(), QaError> {
        self.run(Some(file_name), text).map(|_| ())
    }
}

/// The collaborators one process answers with.
#[derive(Clone)]
pub struct Models {
    pub translator: Arc<dyn QueryTranslator>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl Default for Models {
    fn default() -> Self {
        Self { translator: Arc::new(PassthroughTranslator), summarizer: None, speech: None }
    }
}

impl std::fmt::Debug for Models {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Models")
            .field("summarizer", &self.summarizer.is_some())
            .field("speech", &self.speech.is_some())
            .finish_non_exhaustive()
    }
}

impl Models {
    /// Build from configured programs; an unconfigured translator passes questions through.
    #[must_use]
    pub fn from_config(cfg: &QaConfig) -> Self {
        let translator: Arc<dyn QueryTranslator> = match &cfg.translator {
            Some(c) => Arc::new(CommandModel::from(c)),
            None => Arc::new(PassthroughTranslator),
        };
        Self {
            translator,
            summarizer: cfg.summarizer.as_ref().map(|c| Arc::new(CommandModel::from(c)) as Arc<dyn Summarizer>),
            speech: cfg.speech.as_ref().map(|c| Arc::new(CommandModel::from(c)) as Arc<dyn SpeechSynthesizer>),
        }
    }
}

static MODELS: OnceCell<Arc<Models>> = OnceCell::new();

/// Install the process-wide models. Only the first call succeeds.
///
/// # Errors
/// `QaError::Config` when models were already installed.
pub fn install(models: Models) -> Result<Arc<Models>, QaError> {
    let models = Arc::new(models);
    MODELS.set(Arc::clone(&models)).map_err(|_| QaError::Config("models already installed".into()))?;
    log::info!("models installed: {models:?}");
    Ok(models)
}

#[must_use]
pub fn installed() -> Option<Arc<Models>> {
    MODELS.get().cloned()
}
