//! Record loading from NDJSON or JSON-array text.

use bson::Document;
use serde_json::Value;
use std::io::{BufRead, BufReader, Read};

use crate::errors::QaError;
use crate::json::value_to_document;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Count and skip unparseable NDJSON lines instead of failing the load.
    pub skip_errors: bool,
    pub progress_every: Option<usize>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { skip_errors: false, progress_every: Some(1000) }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: u64,
    pub skipped: u64,
}

/// Read records from `reader`. Input whose first non-blank byte is `[` is parsed as one JSON
/// array; anything else as NDJSON with blank lines ignored.
///
/// # Errors
/// Returns `Io` on read failure and `Json`/`Io` on invalid records unless `skip_errors` is set
/// (array input is always strict).
pub fn read_records<R: Read>(
    reader: R,
    opts: &ImportOptions,
    report: &mut ImportReport,
) -> Result<Vec<Document>, QaError> {
    let mut reader = BufReader::new(reader);
    let is_array = loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(Vec::new());
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(i) => break buf[i] == b'[',
            None => {
                let n = buf.len();
                reader.consume(n);
            }
        }
    };
    if is_array {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let Value::Array(items) = serde_json::from_str::<Value>(&text)? else {
            return Err(QaError::Io("expected JSON array".into()));
        };
        let docs = items
            .into_iter()
            .enumerate()
            .map(|(i, v)| value_to_document(v).map_err(|e| QaError::Io(format!("record {i}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        report.inserted += docs.len() as u64;
        return Ok(docs);
    }

    let mut docs = Vec::new();
    let mut line_no = 0usize;
    let mut buf = String::with_capacity(8 * 1024);
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<Value>(line)
            .map_err(|e| e.to_string())
            .and_then(value_to_document);
        match parsed {
            Ok(d) => {
                docs.push(d);
                report.inserted += 1;
                if let Some(n) = opts.progress_every
                    && n > 0
                    && line_no % n == 0
                {
                    log::info!("loaded {} records (ndjson)", report.inserted);
                }
            }
            Err(e) if opts.skip_errors => {
                log::warn!("skipping line {line_no}: {e}");
                report.skipped += 1;
            }
            Err(e) => return Err(QaError::Io(format!("line {line_no}: {e}"))),
        }
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_skips_blank_lines() {
        let input = "{\"id\": 1}\n\n  \n{\"id\": 2}\n";
        let mut report = ImportReport::default();
        let docs = read_records(input.as_bytes(), &ImportOptions::default(), &mut report).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(report, ImportReport { inserted: 2, skipped: 0 });
    }

    #[test]
    fn array_input_is_detected() {
        let input = "\n  [{\"id\": 1}, {\"id\": 2}, {\"id\": 3}]";
        let mut report = ImportReport::default();
        let docs = read_records(input.as_bytes(), &ImportOptions::default(), &mut report).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(report.inserted, 3);
    }

    #[test]
    fn bad_lines_fail_or_skip() {
        let input = "{\"id\": 1}\nnot json\n[1]\n{\"id\": 2}";
        let mut report = ImportReport::default();
        assert!(read_records(input.as_bytes(), &ImportOptions::default(), &mut report).is_err());

        let opts = ImportOptions { skip_errors: true, ..ImportOptions::default() };
        let mut report = ImportReport::default();
        let docs = read_records(input.as_bytes(), &opts, &mut report).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(report.skipped, 2);
    }
}
