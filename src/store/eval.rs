use bson::{Bson, Document};
use std::cmp::Ordering;

use super::filter::{CmpOp, ELEM_KEY, Filter, MAX_IN_SET};
use super::path::candidates;

/// Evaluate a compiled filter against one document.
#[must_use]
pub fn eval_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => !candidates(doc, path).is_empty() == *exists,
        Filter::In { path, values } => in_set(doc, path, values),
        Filter::Nin { path, values } => !in_set(doc, path, values),
        Filter::Cmp { path, op: CmpOp::Ne, value } => !matches_eq(doc, path, value),
        Filter::Cmp { path, op: CmpOp::Eq, value } => matches_eq(doc, path, value),
        Filter::Cmp { path, op, value } => any_candidate(doc, path, |v| ordered(v, *op, value)),
        Filter::ElemMatch { path, filter, scalar } => candidates(doc, path).into_iter().any(|v| {
            let Bson::Array(items) = v else { return false };
            items.iter().any(|item| match item {
                Bson::Document(d) if !*scalar => eval_filter(d, filter),
                other if *scalar => {
                    let mut wrapped = Document::new();
                    wrapped.insert(ELEM_KEY, other.clone());
                    eval_filter(&wrapped, filter)
                }
                _ => false,
            })
        }),
        #[cfg(feature = "regex")]
        Filter::Regex { path, regex } => {
            any_candidate(doc, path, |v| matches!(v, Bson::String(s) if regex.is_match(s)))
        }
    }
}

/// True when the predicate holds for any reached value, or for any element of a reached array.
fn any_candidate(doc: &Document, path: &str, pred: impl Fn(&Bson) -> bool) -> bool {
    candidates(doc, path).into_iter().any(|v| {
        pred(v) || matches!(v, Bson::Array(items) if items.iter().any(&pred))
    })
}

fn matches_eq(doc: &Document, path: &str, value: &Bson) -> bool {
    // null matches a missing field
    if matches!(value, Bson::Null) && candidates(doc, path).is_empty() {
        return true;
    }
    any_candidate(doc, path, |v| bson_equal(v, value))
}

fn in_set(doc: &Document, path: &str, values: &[Bson]) -> bool {
    values.iter().take(MAX_IN_SET).any(|x| matches_eq(doc, path, x))
}

fn ordered(v: &Bson, op: CmpOp, value: &Bson) -> bool {
    let Some(ord) = compare_same_class(v, value) else {
        return false;
    };
    match op {
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Gte => ord != Ordering::Less,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Lte => ord != Ordering::Greater,
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
    }
}

fn as_f64(x: &Bson) -> Option<f64> {
    match x {
        Bson::Int32(i) => Some(f64::from(*i)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

/// Equality that treats numbers of different BSON widths as the same value.
#[must_use]
pub fn bson_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Int32(x), Bson::Int64(y)) | (Bson::Int64(y), Bson::Int32(x)) => i64::from(*x) == *y,
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Ordering defined only between values of the same comparable class.
fn compare_same_class(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return Some(x.total_cmp(&y));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Total order used for sorting: same-class values compare naturally, different classes by
/// type rank.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    compare_same_class(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 255,
        _ => 200,
    }
}
