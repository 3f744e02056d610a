use serde::{Deserialize, Serialize};
use std::fmt;

/// The four store operations a generated query string may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Aggregate,
    Find,
    FindOne,
    CountDocuments,
}

impl OperationKind {
    pub const ALL: [Self; 4] = [Self::Aggregate, Self::Find, Self::FindOne, Self::CountDocuments];

    /// Method name as it appears after `db.<collection>.` in a query string.
    #[must_use]
    pub const fn method_name(self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::Find => "find",
            Self::FindOne => "findOne",
            Self::CountDocuments => "countDocuments",
        }
    }

    /// Opening and closing delimiters that enclose the argument span.
    #[must_use]
    pub const fn delimiters(self) -> (char, char) {
        match self {
            Self::Aggregate => ('[', ']'),
            Self::Find | Self::FindOne | Self::CountDocuments => ('(', ')'),
        }
    }

    /// Exact match on the method name; `findOneAndUpdate` is not `findOne`.
    #[must_use]
    pub fn from_method(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.method_name() == name)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// How the argument span is cut out of the query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanMode {
    /// First opening delimiter to the last closing delimiter, no nesting awareness.
    #[default]
    Lexical,
    /// Depth-aware scan that ignores delimiters inside JSON strings.
    Balanced,
}

/// A recognized operation with its raw (trimmed) argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive<'q> {
    pub kind: OperationKind,
    pub span: &'q str,
}
