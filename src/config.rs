//! `recordqa.toml` configuration.
//!
//! Precedence: CLI flags > environment > first config file found > defaults. Config files are
//! looked up at the explicit path, `$RECORDQA_CONFIG`, `<config dir>/recordqa.toml` and
//! `./recordqa.toml`, in that order.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::directive::SpanMode;
use crate::errors::QaError;
use crate::render::{DEFAULT_SIZE_THRESHOLD, ReportFormat};
use crate::render::report::DEFAULT_MISSING_MARKER;

pub const CONFIG_FILE_NAME: &str = "recordqa.toml";

/// An external program used as a collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub missing_marker: String,
    /// Optional TOML file holding a custom report schema.
    pub schema_file: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { format: ReportFormat::Text, missing_marker: DEFAULT_MISSING_MARKER.into(), schema_file: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub not_found: String,
    pub multiple_found: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            not_found: "Patient not found.".into(),
            multiple_found: "Multiple patients found. Please provide the patient ID.".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: PathBuf,
    pub level: String,
    pub retention: u32,
    pub diag: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from("logs"), level: "info".into(), retention: 7, diag: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    pub collection: String,
    pub id_field: String,
    pub size_threshold_bytes: usize,
    pub span_mode: SpanMode,
    pub canned_replies: bool,
    pub data_file: Option<PathBuf>,
    pub report: ReportConfig,
    pub messages: Messages,
    pub translator: Option<ModelCommand>,
    pub summarizer: Option<ModelCommand>,
    pub speech: Option<ModelCommand>,
    pub log: LogConfig,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            collection: "patients".into(),
            id_field: "id".into(),
            size_threshold_bytes: DEFAULT_SIZE_THRESHOLD,
            span_mode: SpanMode::Lexical,
            canned_replies: true,
            data_file: None,
            report: ReportConfig::default(),
            messages: Messages::default(),
            translator: None,
            summarizer: None,
            speech: None,
            log: LogConfig::default(),
        }
    }
}

impl QaConfig {
    /// # Errors
    /// `QaError::Toml` on invalid TOML or mistyped fields.
    pub fn from_toml_str(s: &str) -> Result<Self, QaError> {
        Ok(toml::from_str(s)?)
    }

    /// # Errors
    /// `QaError::Io` when the file cannot be read, `QaError::Toml` when it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, QaError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| QaError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Candidate config files, most specific first.
    #[must_use]
    pub fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(p) = explicit {
            paths.push(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("RECORDQA_CONFIG") {
            paths.push(PathBuf::from(p));
        }
        if let Some(dir) = dirs_next::config_dir() {
            paths.push(dir.join(CONFIG_FILE_NAME));
        }
        if let Ok(cur) = std::env::current_dir() {
            paths.push(cur.join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Load the first existing config file (or defaults), then apply environment overrides and
    /// validate.
    ///
    /// # Errors
    /// An explicit path that does not exist, an unreadable or invalid file, or a failed
    /// validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self, QaError> {
        if let Some(p) = explicit
            && !p.exists()
        {
            return Err(QaError::Config(format!("config file not found: {}", p.display())));
        }
        let mut cfg = match Self::search_paths(explicit).into_iter().find(|p| p.is_file()) {
            Some(path) => {
                log::debug!("loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// `QaError::Config` when `RECORDQA_SIZE_THRESHOLD` is not a number.
    pub fn apply_env(&mut self) -> Result<(), QaError> {
        self.apply_overrides(|k| std::env::var(k).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), QaError> {
        if let Some(v) = var("RECORDQA_COLLECTION") {
            self.collection = v;
        }
        if let Some(v) = var("RECORDQA_ID_FIELD") {
            self.id_field = v;
        }
        if let Some(v) = var("RECORDQA_SIZE_THRESHOLD") {
            self.size_threshold_bytes = v
                .trim()
                .parse()
                .map_err(|_| QaError::Config(format!("RECORDQA_SIZE_THRESHOLD is not a number: {v}")))?;
        }
        if let Some(v) = var("RECORDQA_DATA") {
            self.data_file = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// # Errors
    /// `QaError::Config` naming the first invalid value.
    pub fn validate(&self) -> Result<(), QaError> {
        let ident = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !ident(&self.collection) {
            return Err(QaError::Config(format!("invalid collection name: {:?}", self.collection)));
        }
        if self.id_field.trim().is_empty() || self.id_field.starts_with('$') {
            return Err(QaError::Config(format!("invalid id_field: {:?}", self.id_field)));
        }
        if self.size_threshold_bytes == 0 {
            return Err(QaError::Config("size_threshold_bytes must be positive".into()));
        }
        for (name, model) in [("translator", &self.translator), ("summarizer", &self.summarizer), ("speech", &self.speech)] {
            if let Some(m) = model
                && m.program.trim().is_empty()
            {
                return Err(QaError::Config(format!("[{name}] program is empty")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let cfg = QaConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.size_threshold_bytes, 10_000);
        assert_eq!(cfg.messages.not_found, "Patient not found.");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = QaConfig::from_toml_str(
            r#"
            span_mode = "balanced"
            [report]
            format = "html"
            [summarizer]
            program = "summarize"
            args = ["--short"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.span_mode, SpanMode::Balanced);
        assert_eq!(cfg.report.format, ReportFormat::Html);
        assert_eq!(cfg.report.missing_marker, "N/A");
        assert_eq!(cfg.summarizer.unwrap().args, vec!["--short".to_owned()]);
        assert_eq!(cfg.collection, "patients");
    }

    #[test]
    fn overrides_apply_and_are_checked() {
        let env: HashMap<&str, &str> =
            [("RECORDQA_COLLECTION", "doctors"), ("RECORDQA_SIZE_THRESHOLD", "2048")].into_iter().collect();
        let mut cfg = QaConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| (*v).to_owned())).unwrap();
        assert_eq!(cfg.collection, "doctors");
        assert_eq!(cfg.size_threshold_bytes, 2048);

        let mut cfg = QaConfig::default();
        let bad = cfg.apply_overrides(|k| (k == "RECORDQA_SIZE_THRESHOLD").then(|| "lots".to_owned()));
        assert!(matches!(bad, Err(QaError::Config(_))));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cfg = QaConfig { size_threshold_bytes: 0, ..QaConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = QaConfig { collection: "pa tients".into(), ..QaConfig::default() };
        assert!(cfg.validate().is_err());
        let cfg = QaConfig { id_field: String::new(), ..QaConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(QaConfig::load(Some(&missing)), Err(QaError::Config(_))));
    }
}
