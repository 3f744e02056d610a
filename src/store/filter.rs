use bson::{Bson, Document};

use super::rejected;
use crate::errors::QaError;

// Safety limits to prevent resource abuse
pub(crate) const MAX_IN_SET: usize = 1000;
const MAX_FILTER_DEPTH: usize = 64;

/// Field name used to evaluate operator-only `$elemMatch` clauses against scalar elements.
pub(crate) const ELEM_KEY: &str = "__elem";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Compiled form of a Mongo-shaped filter document.
#[derive(Debug, Clone)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    ElemMatch { path: String, filter: Box<Filter>, scalar: bool },
    #[cfg(feature = "regex")]
    Regex { path: String, regex: regex::Regex },
}

/// # Errors
/// Returns `StoreFailure` for unknown operators or malformed operator arguments.
pub fn compile_filter(doc: &Document) -> Result<Filter, QaError> {
    compile_doc(doc, 0)
}

fn compile_doc(doc: &Document, depth: usize) -> Result<Filter, QaError> {
    if depth > MAX_FILTER_DEPTH {
        return Err(rejected("filter nesting too deep"));
    }
    let mut parts = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        let f = match key.as_str() {
            "$and" => Filter::And(compile_list(key, value, depth)?),
            "$or" => Filter::Or(compile_list(key, value, depth)?),
            "$nor" => Filter::Nor(compile_list(key, value, depth)?),
            k if k.starts_with('$') => {
                return Err(rejected(format!("unknown top-level operator {k}")));
            }
            path => compile_field(path, value, depth)?,
        };
        parts.push(f);
    }
    Ok(combine(parts))
}

fn combine(mut parts: Vec<Filter>) -> Filter {
    match parts.len() {
        0 => Filter::True,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    }
}

fn compile_list(op: &str, value: &Bson, depth: usize) -> Result<Vec<Filter>, QaError> {
    let Bson::Array(items) = value else {
        return Err(rejected(format!("{op} requires an array")));
    };
    if items.is_empty() {
        return Err(rejected(format!("{op} requires a non-empty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => compile_doc(d, depth + 1),
            _ => Err(rejected(format!("{op} entries must be documents"))),
        })
        .collect()
}

fn is_operator_doc(d: &Document) -> bool {
    !d.is_empty() && d.keys().all(|k| k.starts_with('$'))
}

fn is_logical_doc(d: &Document) -> bool {
    d.keys().any(|k| matches!(k.as_str(), "$and" | "$or" | "$nor"))
}

fn compile_field(path: &str, value: &Bson, depth: usize) -> Result<Filter, QaError> {
    match value {
        Bson::Document(ops) if is_operator_doc(ops) => compile_ops(path, ops, depth),
        other => Ok(Filter::Cmp { path: path.to_owned(), op: CmpOp::Eq, value: other.clone() }),
    }
}

fn compile_ops(path: &str, ops: &Document, depth: usize) -> Result<Filter, QaError> {
    if depth > MAX_FILTER_DEPTH {
        return Err(rejected("filter nesting too deep"));
    }
    let cmp = |op: CmpOp, value: &Bson| Filter::Cmp { path: path.to_owned(), op, value: value.clone() };
    let mut parts = Vec::with_capacity(ops.len());
    for (op, arg) in ops {
        let f = match op.as_str() {
            "$eq" => cmp(CmpOp::Eq, arg),
            "$ne" => cmp(CmpOp::Ne, arg),
            "$gt" => cmp(CmpOp::Gt, arg),
            "$gte" => cmp(CmpOp::Gte, arg),
            "$lt" => cmp(CmpOp::Lt, arg),
            "$lte" => cmp(CmpOp::Lte, arg),
            "$in" => Filter::In { path: path.to_owned(), values: as_set(op, arg)? },
            "$nin" => Filter::Nin { path: path.to_owned(), values: as_set(op, arg)? },
            "$exists" => Filter::Exists { path: path.to_owned(), exists: truthy(arg) },
            "$not" => match arg {
                Bson::Document(inner) if is_operator_doc(inner) => {
                    Filter::Not(Box::new(compile_ops(path, inner, depth + 1)?))
                }
                _ => return Err(rejected("$not requires an operator document")),
            },
            "$elemMatch" => match arg {
                Bson::Document(inner) if is_operator_doc(inner) && !is_logical_doc(inner) => {
                    Filter::ElemMatch {
                        path: path.to_owned(),
                        filter: Box::new(compile_ops(ELEM_KEY, inner, depth + 1)?),
                        scalar: true,
                    }
                }
                Bson::Document(inner) => Filter::ElemMatch {
                    path: path.to_owned(),
                    filter: Box::new(compile_doc(inner, depth + 1)?),
                    scalar: false,
                },
                _ => return Err(rejected("$elemMatch requires a document")),
            },
            "$regex" => compile_regex(path, arg, ops)?,
            // consumed by $regex
            "$options" => continue,
            other => return Err(rejected(format!("unknown operator {other}"))),
        };
        parts.push(f);
    }
    Ok(combine(parts))
}

fn as_set(op: &str, arg: &Bson) -> Result<Vec<Bson>, QaError> {
    match arg {
        Bson::Array(values) => Ok(values.iter().take(MAX_IN_SET).cloned().collect()),
        _ => Err(rejected(format!("{op} requires an array"))),
    }
}

fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

#[cfg(feature = "regex")]
fn compile_regex(path: &str, arg: &Bson, ops: &Document) -> Result<Filter, QaError> {
    let Bson::String(pattern) = arg else {
        return Err(rejected("$regex requires a string pattern"));
    };
    if pattern.len() > 512 {
        return Err(rejected("$regex pattern too long"));
    }
    let options = ops.get_str("$options").unwrap_or("");
    let regex = regex::RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
        .map_err(|e| rejected(format!("invalid $regex: {e}")))?;
    Ok(Filter::Regex { path: path.to_owned(), regex })
}

#[cfg(not(feature = "regex"))]
fn compile_regex(_path: &str, _arg: &Bson, _ops: &Document) -> Result<Filter, QaError> {
    Err(rejected("$regex requires the 'regex' feature"))
}
