use crate::directive::OperationKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QaError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Malformed {kind} argument: {reason}")]
    MalformedArgument { kind: OperationKind, reason: String },

    #[error("Store failure: {0}")]
    StoreFailure(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<std::io::Error> for QaError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl QaError {
    pub(crate) fn malformed(kind: OperationKind, reason: impl Into<String>) -> Self {
        Self::MalformedArgument { kind, reason: reason.into() }
    }

    /// Short stable label used in metrics and diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::UnsupportedOperation(_) => "unsupported_operation",
            Self::MalformedArgument { .. } => "malformed_argument",
            Self::StoreFailure(_) => "store_failure",
            Self::Model(_) => "model",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Toml(_) => "toml",
        }
    }
}
