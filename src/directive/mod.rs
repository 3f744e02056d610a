// Submodules for separation of concerns
mod parse;
mod types;

// Public API re-exports
pub use parse::{DirectiveParser, extract_span};
pub use types::{Directive, OperationKind, SpanMode};
