use bson::{Bson, Document};
use std::cmp::Ordering;

use super::eval::{bson_equal, compare_bson, eval_filter};
use super::filter::compile_filter;
use super::path::{path_value, set_path};
use super::project::{apply_projection, flag};
use super::rejected;
use crate::errors::QaError;

const MAX_SORT_FIELDS: usize = 16;

/// Run an aggregation pipeline over `docs`, stage by stage.
///
/// # Errors
/// Returns `StoreFailure` for unknown stages or malformed stage arguments.
pub fn run_pipeline(mut docs: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>, QaError> {
    for (i, stage) in pipeline.iter().enumerate() {
        let mut entries = stage.iter();
        let (Some((name, arg)), None) = (entries.next(), entries.next()) else {
            return Err(rejected(format!("stage {i} must have exactly one key")));
        };
        docs = match name.as_str() {
            "$match" => {
                let f = compile_filter(as_doc(name, arg)?)?;
                docs.into_iter().filter(|d| eval_filter(d, &f)).collect()
            }
            "$project" => project_stage(docs, as_doc(name, arg)?)?,
            "$sort" => sort_stage(docs, as_doc(name, arg)?)?,
            "$skip" => docs.into_iter().skip(as_count(name, arg, true)?).collect(),
            "$limit" => docs.into_iter().take(as_count(name, arg, false)?).collect(),
            "$count" => count_stage(&docs, name, arg)?,
            "$unwind" => unwind_stage(docs, arg)?,
            "$group" => group_stage(&docs, as_doc(name, arg)?)?,
            other => return Err(rejected(format!("unsupported pipeline stage {other}"))),
        };
    }
    Ok(docs)
}

fn as_doc<'a>(stage: &str, arg: &'a Bson) -> Result<&'a Document, QaError> {
    arg.as_document().ok_or_else(|| rejected(format!("{stage} requires a document")))
}

fn as_count(stage: &str, arg: &Bson, allow_zero: bool) -> Result<usize, QaError> {
    let n = match arg {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(f) if f.fract() == 0.0 => *f as i64,
        _ => return Err(rejected(format!("{stage} requires an integer"))),
    };
    if n < 0 || (!allow_zero && n == 0) {
        return Err(rejected(format!("{stage} out of range: {n}")));
    }
    usize::try_from(n).map_err(|_| rejected(format!("{stage} out of range: {n}")))
}

fn project_stage(docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>, QaError> {
    let computed: Vec<(&String, &Bson)> = spec.iter().filter(|(_, v)| flag(v).is_none()).collect();
    if computed.is_empty() {
        return docs.iter().map(|d| apply_projection(d, spec)).collect();
    }
    let excludes = spec.iter().any(|(k, v)| k != "_id" && flag(v) == Some(false));
    if excludes {
        return Err(rejected("$project cannot mix exclusion with computed fields"));
    }
    let flags: Document =
        spec.iter().filter(|(_, v)| flag(v).is_some()).map(|(k, v)| (k.clone(), v.clone())).collect();
    let only_id_flag = flags.keys().all(|k| k == "_id");
    docs.into_iter()
        .map(|d| -> Result<Document, QaError> {
            let mut out = if only_id_flag {
                let mut base = Document::new();
                if flags.get("_id").and_then(flag) != Some(false)
                    && let Some(id) = d.get("_id")
                {
                    base.insert("_id", id.clone());
                }
                base
            } else {
                apply_projection(&d, &flags)?
            };
            for (path, expr) in &computed {
                if let Some(v) = eval_expr(&d, expr)? {
                    set_path(&mut out, path, v);
                }
            }
            Ok(out)
        })
        .collect()
}

/// Evaluate a `$project`/`$group` expression: `"$path"` references, nested documents, or
/// literals.
fn eval_expr(doc: &Document, expr: &Bson) -> Result<Option<Bson>, QaError> {
    match expr {
        Bson::String(s) if s.starts_with('$') => Ok(path_value(doc, &s[1..])),
        Bson::Document(d) => {
            let mut out = Document::new();
            for (k, v) in d {
                if k.starts_with('$') {
                    return Err(rejected(format!("unsupported expression operator {k}")));
                }
                if let Some(v) = eval_expr(doc, v)? {
                    out.insert(k.clone(), v);
                }
            }
            Ok(Some(Bson::Document(out)))
        }
        other => Ok(Some(other.clone())),
    }
}

fn sort_stage(mut docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>, QaError> {
    if spec.is_empty() || spec.len() > MAX_SORT_FIELDS {
        return Err(rejected("$sort requires 1 to 16 fields"));
    }
    let keys = spec
        .iter()
        .map(|(k, v)| match v {
            Bson::Int32(1) | Bson::Int64(1) => Ok((k.as_str(), false)),
            Bson::Int32(-1) | Bson::Int64(-1) => Ok((k.as_str(), true)),
            Bson::Double(f) if *f == 1.0 => Ok((k.as_str(), false)),
            Bson::Double(f) if *f == -1.0 => Ok((k.as_str(), true)),
            _ => Err(rejected(format!("$sort direction for {k} must be 1 or -1"))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    docs.sort_by(|a, b| {
        for (path, desc) in &keys {
            let ord = match (path_value(a, path), path_value(b, path)) {
                (Some(x), Some(y)) => compare_bson(&x, &y),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return if *desc { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    });
    Ok(docs)
}

fn count_stage(docs: &[Document], stage: &str, arg: &Bson) -> Result<Vec<Document>, QaError> {
    let Bson::String(field) = arg else {
        return Err(rejected(format!("{stage} requires a field name")));
    };
    if field.is_empty() || field.starts_with('$') || field.contains('.') {
        return Err(rejected(format!("{stage} field name is invalid: {field:?}")));
    }
    if docs.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Document::new();
    out.insert(field.clone(), count_value(docs.len()));
    Ok(vec![out])
}

fn count_value(n: usize) -> Bson {
    match i32::try_from(n) {
        Ok(v) => Bson::Int32(v),
        Err(_) => Bson::Int64(i64::try_from(n).unwrap_or(i64::MAX)),
    }
}

fn unwind_stage(docs: Vec<Document>, arg: &Bson) -> Result<Vec<Document>, QaError> {
    let (path, preserve) = match arg {
        Bson::String(p) => (p.as_str(), false),
        Bson::Document(d) => {
            let p = d.get_str("path").map_err(|_| rejected("$unwind requires a path"))?;
            let keep = d.get("preserveNullAndEmptyArrays").and_then(flag).unwrap_or(false);
            (p, keep)
        }
        _ => return Err(rejected("$unwind requires a path")),
    };
    let Some(field) = path.strip_prefix('$') else {
        return Err(rejected("$unwind path must start with '$'"));
    };
    let mut out = Vec::with_capacity(docs.len());
    for d in docs {
        match path_value(&d, field) {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = d.clone();
                    set_path(&mut copy, field, item);
                    out.push(copy);
                }
            }
            Some(Bson::Array(_)) | Some(Bson::Null) | None => {
                if preserve {
                    out.push(d);
                }
            }
            Some(_) => out.push(d),
        }
    }
    Ok(out)
}

#[derive(Debug)]
enum Acc {
    Sum(Bson),
    Avg { total: f64, n: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    First(Option<Bson>),
    Last(Option<Bson>),
    Push(Vec<Bson>),
    AddToSet(Vec<Bson>),
}

impl Acc {
    fn new(op: &str) -> Result<Self, QaError> {
        Ok(match op {
            "$sum" => Self::Sum(Bson::Int32(0)),
            "$avg" => Self::Avg { total: 0.0, n: 0 },
            "$min" => Self::Min(None),
            "$max" => Self::Max(None),
            "$first" => Self::First(None),
            "$last" => Self::Last(None),
            "$push" => Self::Push(Vec::new()),
            "$addToSet" => Self::AddToSet(Vec::new()),
            other => return Err(rejected(format!("unsupported accumulator {other}"))),
        })
    }

    fn feed(&mut self, value: Option<Bson>) {
        match self {
            Self::Sum(total) => {
                if let Some(v) = value {
                    *total = add_numbers(total, &v);
                }
            }
            Self::Avg { total, n } => {
                if let Some(x) = value.as_ref().and_then(number) {
                    *total += x;
                    *n += 1;
                }
            }
            Self::Min(cur) => pick(cur, value, Ordering::Less),
            Self::Max(cur) => pick(cur, value, Ordering::Greater),
            Self::First(cur) => {
                if cur.is_none() {
                    *cur = Some(value.unwrap_or(Bson::Null));
                }
            }
            Self::Last(cur) => *cur = Some(value.unwrap_or(Bson::Null)),
            Self::Push(items) => {
                if let Some(v) = value {
                    items.push(v);
                }
            }
            Self::AddToSet(items) => {
                if let Some(v) = value
                    && !items.iter().any(|x| bson_equal(x, &v))
                {
                    items.push(v);
                }
            }
        }
    }

    fn finish(self) -> Bson {
        match self {
            Self::Sum(total) => total,
            #[allow(clippy::cast_precision_loss)]
            Self::Avg { total, n } => {
                if n == 0 {
                    Bson::Null
                } else {
                    Bson::Double(total / n as f64)
                }
            }
            Self::Min(v) | Self::Max(v) | Self::First(v) | Self::Last(v) => v.unwrap_or(Bson::Null),
            Self::Push(items) | Self::AddToSet(items) => Bson::Array(items),
        }
    }
}

fn number(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// Integer sums stay integral while they fit; anything else widens to a double.
fn add_numbers(total: &Bson, v: &Bson) -> Bson {
    let as_int = |b: &Bson| match b {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    };
    match (as_int(total), as_int(v)) {
        (Some(a), Some(b)) => match a.checked_add(b) {
            Some(s) => i32::try_from(s).map_or(Bson::Int64(s), Bson::Int32),
            #[allow(clippy::cast_precision_loss)]
            None => Bson::Double(a as f64 + b as f64),
        },
        _ => match (number(total), number(v)) {
            (Some(a), Some(b)) => Bson::Double(a + b),
            // non-numeric values are ignored
            _ => total.clone(),
        },
    }
}

fn pick(cur: &mut Option<Bson>, value: Option<Bson>, want: Ordering) {
    let Some(v) = value else { return };
    if matches!(v, Bson::Null) {
        return;
    }
    let replace = cur.as_ref().is_none_or(|c| compare_bson(&v, c) == want);
    if replace {
        *cur = Some(v);
    }
}

fn group_stage(docs: &[Document], spec: &Document) -> Result<Vec<Document>, QaError> {
    let Some(id_expr) = spec.get("_id") else {
        return Err(rejected("$group requires an _id"));
    };
    let mut fields = Vec::new();
    for (name, acc) in spec.iter().filter(|(k, _)| k.as_str() != "_id") {
        let Some(acc_doc) = acc.as_document() else {
            return Err(rejected(format!("$group field {name} must be an accumulator")));
        };
        let mut entries = acc_doc.iter();
        let (Some((op, expr)), None) = (entries.next(), entries.next()) else {
            return Err(rejected(format!("$group field {name} needs exactly one accumulator")));
        };
        Acc::new(op)?;
        fields.push((name.clone(), op.as_str(), expr));
    }

    let mut groups: Vec<(Bson, Vec<Acc>)> = Vec::new();
    for d in docs {
        let key = eval_expr(d, id_expr)?.unwrap_or(Bson::Null);
        let idx = match groups.iter().position(|(k, _)| bson_equal(k, &key)) {
            Some(i) => i,
            None => {
                let accs = fields.iter().map(|(_, op, _)| Acc::new(op)).collect::<Result<Vec<_>, _>>()?;
                groups.push((key, accs));
                groups.len() - 1
            }
        };
        for ((_, _, expr), acc) in fields.iter().zip(groups[idx].1.iter_mut()) {
            acc.feed(eval_expr(d, expr)?);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accs)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for ((name, _, _), acc) in fields.iter().zip(accs) {
                out.insert(name.clone(), acc.finish());
            }
            out
        })
        .collect())
}
