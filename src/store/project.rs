use bson::{Bson, Document};

use super::rejected;
use crate::errors::QaError;

/// Interpret a projection flag: numbers and booleans only.
pub(crate) fn flag(v: &Bson) -> Option<bool> {
    match v {
        Bson::Boolean(b) => Some(*b),
        Bson::Int32(i) => Some(*i != 0),
        Bson::Int64(i) => Some(*i != 0),
        Bson::Double(f) => Some(*f != 0.0),
        _ => None,
    }
}

/// Apply an inclusion or exclusion projection. `_id` is kept unless excluded explicitly.
///
/// # Errors
/// Returns `StoreFailure` when the projection mixes inclusion and exclusion or holds a
/// non-flag value.
pub fn apply_projection(doc: &Document, projection: &Document) -> Result<Document, QaError> {
    if projection.is_empty() {
        return Ok(doc.clone());
    }
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut keep_id = true;
    for (path, v) in projection {
        let on = flag(v).ok_or_else(|| rejected(format!("projection value for {path} must be 0/1")))?;
        if path == "_id" {
            keep_id = on;
        } else if on {
            include.push(path.as_str());
        } else {
            exclude.push(path.as_str());
        }
    }
    if !include.is_empty() && !exclude.is_empty() {
        return Err(rejected("projection cannot mix inclusion and exclusion"));
    }
    if include.is_empty() {
        let mut out = doc.clone();
        if !keep_id {
            out.remove("_id");
        }
        for path in exclude {
            exclude_path(&mut out, path);
        }
        return Ok(out);
    }
    let mut out = Document::new();
    if keep_id && let Some(id) = doc.get("_id") {
        out.insert("_id", id.clone());
    }
    for path in include {
        include_path(doc, &mut out, path);
    }
    Ok(out)
}

/// Copy `path` from `src` into `dst`, keeping array shape when the path crosses an array of
/// sub-documents.
pub(crate) fn include_path(src: &Document, dst: &mut Document, path: &str) {
    let (head, rest) = match path.split_once('.') {
        Some((h, r)) => (h, Some(r)),
        None => (path, None),
    };
    let Some(value) = src.get(head) else { return };
    let Some(rest) = rest else {
        dst.insert(head, value.clone());
        return;
    };
    match value {
        Bson::Document(sub) => {
            let mut inner = match dst.remove(head) {
                Some(Bson::Document(d)) => d,
                _ => Document::new(),
            };
            include_path(sub, &mut inner, rest);
            if !inner.is_empty() {
                dst.insert(head, inner);
            }
        }
        Bson::Array(items) => {
            let mut existing = match dst.remove(head) {
                Some(Bson::Array(a)) => a,
                _ => Vec::new(),
            }
            .into_iter();
            let merged: Vec<Bson> = items
                .iter()
                .filter_map(Bson::as_document)
                .map(|sub| {
                    let mut inner = match existing.next() {
                        Some(Bson::Document(d)) => d,
                        _ => Document::new(),
                    };
                    include_path(sub, &mut inner, rest);
                    Bson::Document(inner)
                })
                .collect();
            dst.insert(head, merged);
        }
        _ => {}
    }
}

/// Remove `path` from `doc`, descending through sub-documents and arrays of sub-documents.
pub(crate) fn exclude_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(sub)) => exclude_path(sub, rest),
            Some(Bson::Array(items)) => {
                for item in items {
                    if let Bson::Document(sub) = item {
                        exclude_path(sub, rest);
                    }
                }
            }
            _ => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn patient() -> Document {
        doc! {
            "_id": 1,
            "id": 7,
            "name": "Ann",
            "contact": {"phone": "555", "email": "a@x"},
            "appointments": [{"date": "2024-01-01", "doctor": {"name": "Lee"}}, {"date": "2024-02-01", "doctor": {"name": "Kim"}}],
        }
    }

    #[test]
    fn inclusion_keeps_id_unless_excluded() {
        let out = apply_projection(&patient(), &doc! {"name": 1}).unwrap();
        assert_eq!(out, doc! {"_id": 1, "name": "Ann"});
        let out = apply_projection(&patient(), &doc! {"name": 1, "_id": 0}).unwrap();
        assert_eq!(out, doc! {"name": "Ann"});
    }

    #[test]
    fn nested_inclusion_through_arrays() {
        let out = apply_projection(&patient(), &doc! {"_id": 0, "appointments.date": 1, "contact.phone": 1}).unwrap();
        assert_eq!(
            out,
            doc! {
                "appointments": [{"date": "2024-01-01"}, {"date": "2024-02-01"}],
                "contact": {"phone": "555"},
            }
        );
    }

    #[test]
    fn multiple_paths_into_same_array_merge() {
        let out = apply_projection(&patient(), &doc! {"_id": 0, "appointments.date": 1, "appointments.doctor.name": 1}).unwrap();
        let appts = out.get_array("appointments").unwrap();
        assert_eq!(appts.len(), 2);
        assert_eq!(appts[1], Bson::Document(doc! {"date": "2024-02-01", "doctor": {"name": "Kim"}}));
    }

    #[test]
    fn exclusion_and_mixing() {
        let out = apply_projection(&patient(), &doc! {"contact.email": 0, "appointments": 0}).unwrap();
        assert_eq!(out.get_document("contact").unwrap(), &doc! {"phone": "555"});
        assert!(!out.contains_key("appointments"));
        assert!(apply_projection(&patient(), &doc! {"name": 1, "contact": 0}).is_err());
    }
}
