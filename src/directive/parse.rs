use crate::errors::QaError;

use super::types::{Directive, OperationKind, SpanMode};

const PREVIEW_CHARS: usize = 80;

/// Recognizes `db.<collection>.<operation>(...)` query strings.
#[derive(Debug, Clone)]
pub struct DirectiveParser {
    prefix: String,
    mode: SpanMode,
}

impl DirectiveParser {
    #[must_use]
    pub fn new(collection: &str) -> Self {
        Self { prefix: format!("db.{collection}."), mode: SpanMode::default() }
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: SpanMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn mode(&self) -> SpanMode {
        self.mode
    }

    /// Full literal prefix for an operation, e.g. `db.patients.findOne`.
    #[must_use]
    pub fn prefix(&self, kind: OperationKind) -> String {
        format!("{}{}", self.prefix, kind.method_name())
    }

    /// # Errors
    /// `UnsupportedOperation` when no operation prefix matches, `MalformedArgument` when the
    /// argument delimiters cannot be located.
    pub fn parse<'q>(&self, query: &'q str) -> Result<Directive<'q>, QaError> {
        let query = query.trim();
        let Some(rest) = query.strip_prefix(self.prefix.as_str()) else {
            return Err(unsupported(query));
        };
        // The operation name ends at the first non-identifier character, so `find` never
        // swallows `findOne` and vice versa.
        let name_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let (name, tail) = rest.split_at(name_len);
        let kind = OperationKind::from_method(name).ok_or_else(|| unsupported(query))?;
        let span = extract_span(tail, kind, self.mode)?;
        log::debug!("directive kind={kind} span_len={}", span.len());
        Ok(Directive { kind, span })
    }
}

fn unsupported(query: &str) -> QaError {
    QaError::UnsupportedOperation(query.chars().take(PREVIEW_CHARS).collect())
}

/// Cut the argument span for `kind` out of `tail` (the text after the operation name).
///
/// The returned span is trimmed; adjacent delimiters give an empty span.
///
/// # Errors
/// Returns `MalformedArgument` when the delimiters are missing or out of order.
pub fn extract_span(tail: &str, kind: OperationKind, mode: SpanMode) -> Result<&str, QaError> {
    let (open, close) = kind.delimiters();
    let start = tail
        .find(open)
        .ok_or_else(|| QaError::malformed(kind, format!("missing opening '{open}'")))?;
    let inner_start = start + open.len_utf8();
    let end = match mode {
        SpanMode::Lexical => tail.rfind(close).filter(|&e| e >= inner_start),
        SpanMode::Balanced => balanced_end(&tail[start..], open, close).map(|e| start + e),
    }
    .ok_or_else(|| QaError::malformed(kind, format!("missing closing '{close}'")))?;
    Ok(tail[inner_start..end].trim())
}

/// Byte offset of the delimiter closing the opener at offset 0 of `s`.
fn balanced_end(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> DirectiveParser {
        DirectiveParser::new("patients")
    }

    #[test]
    fn find_one_is_not_find() {
        let d = parser().parse(r#"db.patients.findOne({"id": 7})"#).unwrap();
        assert_eq!(d.kind, OperationKind::FindOne);
        assert_eq!(d.span, r#"{"id": 7}"#);
        let d = parser().parse(r#"db.patients.find({"age": 40})"#).unwrap();
        assert_eq!(d.kind, OperationKind::Find);
    }

    #[test]
    fn longer_method_names_are_unsupported() {
        let e = parser().parse("db.patients.findOneAndUpdate({}, {})").unwrap_err();
        assert!(matches!(e, QaError::UnsupportedOperation(_)));
        let e = parser().parse("db.patients.Find({})").unwrap_err();
        assert!(matches!(e, QaError::UnsupportedOperation(_)));
        let e = parser().parse("db.doctors.find({})").unwrap_err();
        assert!(matches!(e, QaError::UnsupportedOperation(_)));
    }

    #[test]
    fn aggregate_span_uses_square_brackets() {
        let d = parser().parse(r#"db.patients.aggregate([{"$match": {"age": 3}}])"#).unwrap();
        assert_eq!(d.kind, OperationKind::Aggregate);
        assert_eq!(d.span, r#"{"$match": {"age": 3}}"#);
    }

    #[test]
    fn adjacent_and_blank_spans_are_empty() {
        assert_eq!(parser().parse("db.patients.find()").unwrap().span, "");
        assert_eq!(parser().parse("db.patients.find(   )").unwrap().span, "");
        assert_eq!(parser().parse("db.patients.aggregate([])").unwrap().span, "");
    }

    #[test]
    fn lexical_span_runs_to_last_closer() {
        let d = parser().parse(r#"db.patients.find({"a": 1}).limit(5)"#).unwrap();
        assert_eq!(d.span, r#"{"a": 1}).limit(5"#);
    }

    #[test]
    fn balanced_span_stops_at_matching_closer() {
        let p = parser().with_mode(SpanMode::Balanced);
        let d = p.parse(r#"db.patients.find({"note": "x)y"}).limit(5)"#).unwrap();
        assert_eq!(d.span, r#"{"note": "x)y"}"#);
        let e = p.parse(r#"db.patients.find({"a": 1}"#).unwrap_err();
        assert!(matches!(e, QaError::MalformedArgument { kind: OperationKind::Find, .. }));
    }

    #[test]
    fn missing_delimiters_are_malformed() {
        let e = parser().parse("db.patients.countDocuments").unwrap_err();
        assert!(matches!(e, QaError::MalformedArgument { kind: OperationKind::CountDocuments, .. }));
        let e = parser().parse("db.patients.find)(").unwrap_err();
        assert!(matches!(e, QaError::MalformedArgument { .. }));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let d = parser().parse("  db.patients.countDocuments({})\n").unwrap();
        assert_eq!(d.kind, OperationKind::CountDocuments);
        assert_eq!(d.span, "{}");
    }
}
