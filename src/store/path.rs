use bson::{Bson, Document};

pub(crate) const MAX_PATH_DEPTH: usize = 32;
const MAX_PATH_LEN: usize = 1024;

fn segments(path: &str) -> Option<Vec<&str>> {
    if path.is_empty() || path.len() > MAX_PATH_LEN {
        return None;
    }
    let segs: Vec<&str> = path.split('.').collect();
    (segs.len() <= MAX_PATH_DEPTH).then_some(segs)
}

/// Every value a dotted path reaches, fanning out through arrays of sub-documents.
pub(crate) fn candidates<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut out = Vec::new();
    let Some(segs) = segments(path) else { return out };
    if let Some((head, rest)) = segs.split_first()
        && let Some(v) = doc.get(*head)
    {
        descend(v, rest, &mut out);
    }
    out
}

fn descend<'a>(cur: &'a Bson, rest: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, tail)) = rest.split_first() else {
        out.push(cur);
        return;
    };
    match cur {
        Bson::Document(d) => {
            if let Some(v) = d.get(*head) {
                descend(v, tail, out);
            }
        }
        Bson::Array(items) => {
            if let Ok(i) = head.parse::<usize>()
                && let Some(v) = items.get(i)
            {
                descend(v, tail, out);
            }
            for item in items {
                if let Bson::Document(d) = item
                    && let Some(v) = d.get(*head)
                {
                    descend(v, tail, out);
                }
            }
        }
        _ => {}
    }
}

/// Plain traversal through sub-documents (and numeric array indexes); no fan-out.
pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let segs = segments(path)?;
    let (head, rest) = segs.split_first()?;
    let mut cur = doc.get(*head)?;
    for seg in rest {
        cur = match cur {
            Bson::Document(d) => d.get(*seg)?,
            Bson::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Expression-style lookup: crossing an array of sub-documents yields an array of the
/// reached values.
pub(crate) fn path_value(doc: &Document, path: &str) -> Option<Bson> {
    let segs = segments(path)?;
    let (head, rest) = segs.split_first()?;
    value_at(doc.get(*head)?, rest)
}

fn value_at(cur: &Bson, rest: &[&str]) -> Option<Bson> {
    let Some((head, tail)) = rest.split_first() else {
        return Some(cur.clone());
    };
    match cur {
        Bson::Document(d) => value_at(d.get(*head)?, tail),
        Bson::Array(items) => {
            if let Ok(i) = head.parse::<usize>() {
                return value_at(items.get(i)?, tail);
            }
            let reached: Vec<Bson> = items
                .iter()
                .filter_map(Bson::as_document)
                .filter_map(|d| d.get(*head).and_then(|v| value_at(v, tail)))
                .collect();
            Some(Bson::Array(reached))
        }
        _ => None,
    }
}

/// Set a dotted path, creating intermediate documents. Returns false when a non-document
/// value is in the way.
pub(crate) fn set_path(doc: &mut Document, path: &str, val: Bson) -> bool {
    let Some(parts) = segments(path) else { return false };
    let Some((last, parents)) = parts.split_last() else { return false };
    let mut cur = doc;
    for key in parents {
        if !matches!(cur.get(*key), Some(Bson::Document(_))) {
            if cur.contains_key(*key) {
                return false;
            }
            cur.insert(*key, Document::new());
        }
        match cur.get_mut(*key) {
            Some(Bson::Document(d)) => cur = d,
            _ => return false,
        }
    }
    cur.insert(*last, val);
    true
}
