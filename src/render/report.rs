//! Deterministic field-by-field rendering of result records.
//!
//! A [`ReportSchema`] lists every field a record layout is expected to carry. Each field is
//! printed whether or not the record has it, with the missing marker standing in for absent
//! values, and top-level keys the schema does not mention are appended at the end.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::json::bson_to_compact;
use crate::store::path::get_path;

pub const DEFAULT_MISSING_MARKER: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Html,
}

/// A line or a repeated group inside a report.
///
/// Templates reference fields as `{dotted.path}`, resolved against the current record (or
/// against the current list element inside a `List`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Item {
    Line {
        label: String,
        template: String,
    },
    List {
        label: String,
        path: String,
        template: String,
        #[serde(default)]
        children: Vec<Item>,
    },
}

impl Item {
    pub fn line(label: &str, template: &str) -> Self {
        Self::Line { label: label.to_owned(), template: template.to_owned() }
    }

    pub fn list(label: &str, path: &str, template: &str) -> Self {
        Self::List { label: label.to_owned(), path: path.to_owned(), template: template.to_owned(), children: Vec::new() }
    }

    #[must_use]
    pub fn with_children(mut self, items: Vec<Self>) -> Self {
        if let Self::List { children, .. } = &mut self {
            *children = items;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub heading: Option<String>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSchema {
    pub title: String,
    pub sections: Vec<Section>,
}

impl ReportSchema {
    /// Layout of a patient health record.
    #[must_use]
    pub fn patient() -> Self {
        let address = |p: &str| format!("{{{p}.street}}, {{{p}.city}}, {{{p}.state}} {{{p}.zip}}, {{{p}.country}}");
        let results = || vec![Item::line("Findings", "{results.findings}"), Item::line("Conclusion", "{results.conclusion}")];
        Self {
            title: "Patient ID: {id}".into(),
            sections: vec![
                Section {
                    heading: None,
                    items: vec![
                        Item::line("Name", "{name.first} {name.last}"),
                        Item::line("Age", "{age}"),
                        Item::line("Date of Birth", "{dob}"),
                        Item::line("Gender", "{gender}"),
                        Item::line("Blood Group", "{blood_group}"),
                        Item::line("Weight", "{weight}"),
                        Item::line("Contact Phone", "{contact.phone}"),
                        Item::line("Address", &address("contact.address")),
                        Item::line(
                            "Emergency Contact",
                            "{emergency_contact.name} ({emergency_contact.relationship}) - {emergency_contact.phone}",
                        ),
                    ],
                },
                Section {
                    heading: Some("Insurance".into()),
                    items: vec![
                        Item::line("Provider", "{insurance.provider}"),
                        Item::line("Policy Number", "{insurance.policy_number}"),
                        Item::line("Group Number", "{insurance.group_number}"),
                        Item::line("Policy Effective Date", "{insurance.effective_date}"),
                        Item::line("Policy Expiration Date", "{insurance.expiration_date}"),
                        Item::line(
                            "Nominee",
                            "{insurance.nominee.name} ({insurance.nominee.relationship}) - {insurance.nominee.contact}",
                        ),
                        Item::list(
                            "Claimed Insurance",
                            "insurance.claimed_insurance",
                            "Claim ID: {claim_id}, Date: {date}, Amount: {amount}, Status: {status}",
                        ),
                    ],
                },
                Section {
                    heading: Some("Medical History".into()),
                    items: vec![
                        Item::line("Allergies", "{medical_history.allergies}"),
                        Item::list(
                            "Conditions",
                            "medical_history.conditions",
                            "{name} (Diagnosed on: {diagnosed_date}, Status: {status})",
                        ),
                        Item::list("Surgeries", "medical_history.surgeries", "{name} (Date: {date}, Outcome: {outcome})"),
                        Item::list(
                            "Medications",
                            "medical_history.medications",
                            "{name} (Dose: {dose}, Frequency: {frequency}, Start Date: {start_date})",
                        ),
                    ],
                },
                Section {
                    heading: None,
                    items: vec![
                        Item::list("Appointments", "appointments", "Date: {date}, Type: {type}").with_children(vec![
                            Item::line("Doctor", "{doctor.name} (Specialty: {doctor.specialty})"),
                            Item::line(
                                "Contact",
                                &format!("{{doctor.contact.phone}}, Address: {}", address("doctor.contact.address")),
                            ),
                            Item::line("Notes", "{notes}"),
                            Item::list("Lab Tests", "lab_tests", "Test: {test_name} (Date: {date})")
                                .with_children(results()),
                        ]),
                        Item::list("Test Results", "test_results", "Test: {test_name} (Date: {date})")
                            .with_children(results()),
                        Item::list(
                            "Daily Vitals",
                            "health_monitoring.daily_vitals",
                            "Date: {date}, Blood Pressure: {blood_pressure}, Heart Rate: {heart_rate}, Temperature: {temperature}°F",
                        ),
                    ],
                },
            ],
        }
    }

    /// Top-level keys the schema renders itself.
    fn covered_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        collect_placeholders(&self.title, &mut keys);
        for item in self.sections.iter().flat_map(|s| &s.items) {
            match item {
                Item::Line { template, .. } => collect_placeholders(template, &mut keys),
                Item::List { path, .. } => {
                    keys.insert(first_segment(path).to_owned());
                }
            }
        }
        keys
    }
}

impl Default for ReportSchema {
    fn default() -> Self {
        Self::patient()
    }
}

fn first_segment(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

fn collect_placeholders(template: &str, keys: &mut BTreeSet<String>) {
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else { break };
        keys.insert(first_segment(&after[..close]).to_owned());
        rest = &after[close + 1..];
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Accumulates one record's output in the chosen format.
struct Sheet {
    format: ReportFormat,
    buf: String,
}

impl Sheet {
    fn title(&mut self, text: &str) {
        match self.format {
            ReportFormat::Text => self.buf.push_str(text),
            ReportFormat::Html => {
                let _ = write!(self.buf, "<section><h2>{}</h2>", escape_html(text));
            }
        }
    }

    fn line(&mut self, depth: usize, label: &str, value: Option<&str>) {
        match self.format {
            ReportFormat::Text => {
                let _ = write!(self.buf, "\n{:width$}{label}:", "", width = depth * 2);
                if let Some(v) = value {
                    let _ = write!(self.buf, " {v}");
                }
            }
            ReportFormat::Html => {
                let _ = write!(self.buf, "<p class=\"d{depth}\"><strong>{}:</strong>", escape_html(label));
                if let Some(v) = value {
                    let _ = write!(self.buf, " {}", escape_html(v));
                }
                self.buf.push_str("</p>");
            }
        }
    }

    fn bullet(&mut self, depth: usize, text: &str) {
        match self.format {
            ReportFormat::Text => {
                let _ = write!(self.buf, "\n{:width$}- {text}", "", width = depth * 2);
            }
            ReportFormat::Html => {
                let _ = write!(self.buf, "<p class=\"d{depth}\">- {}</p>", escape_html(text));
            }
        }
    }

    fn finish(mut self) -> String {
        if self.format == ReportFormat::Html {
            self.buf.push_str("</section>");
        }
        self.buf
    }
}

/// Renders result records against a schema.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    schema: ReportSchema,
    format: ReportFormat,
    missing: String,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new(ReportSchema::default(), ReportFormat::default(), DEFAULT_MISSING_MARKER)
    }
}

impl ReportRenderer {
    pub fn new(schema: ReportSchema, format: ReportFormat, missing: impl Into<String>) -> Self {
        Self { schema, format, missing: missing.into() }
    }

    #[must_use]
    pub const fn format(&self) -> ReportFormat {
        self.format
    }

    /// All records, separated by a blank line.
    #[must_use]
    pub fn render(&self, records: &[Document]) -> String {
        let covered = self.schema.covered_keys();
        records.iter().map(|d| self.render_record(d, &covered)).collect::<Vec<_>>().join("\n\n")
    }

    fn render_record(&self, doc: &Document, covered: &BTreeSet<String>) -> String {
        let mut sheet = Sheet { format: self.format, buf: String::new() };
        sheet.title(&self.fill(&self.schema.title, doc));
        for section in &self.schema.sections {
            let depth = match &section.heading {
                Some(h) => {
                    sheet.line(1, h, None);
                    2
                }
                None => 1,
            };
            for item in &section.items {
                self.render_item(&mut sheet, depth, item, doc);
            }
        }
        // Generated ObjectIds are noise; any other `_id` (a group key) is data.
        let extra: Vec<(&String, &Bson)> = doc
            .iter()
            .filter(|(k, v)| !covered.contains(k.as_str()) && !(k.as_str() == "_id" && matches!(v, Bson::ObjectId(_))))
            .collect();
        if !extra.is_empty() {
            sheet.line(1, "Additional fields", None);
            for (k, v) in extra {
                sheet.line(2, k, Some(&self.value_text(Some(v))));
            }
        }
        sheet.finish()
    }

    fn render_item(&self, sheet: &mut Sheet, depth: usize, item: &Item, doc: &Document) {
        match item {
            Item::Line { label, template } => sheet.line(depth, label, Some(&self.fill(template, doc))),
            Item::List { label, path, template, children } => {
                let elements: Vec<&Document> = match get_path(doc, path) {
                    Some(Bson::Array(items)) => items.iter().filter_map(Bson::as_document).collect(),
                    Some(Bson::Document(d)) => vec![d],
                    _ => Vec::new(),
                };
                if elements.is_empty() {
                    sheet.line(depth, label, Some(&self.missing));
                    return;
                }
                sheet.line(depth, label, None);
                for el in elements {
                    sheet.bullet(depth + 1, &self.fill(template, el));
                    for child in children {
                        self.render_item(sheet, depth + 2, child, el);
                    }
                }
            }
        }
    }

    /// Substitute `{path}` placeholders from `doc`.
    fn fill(&self, template: &str, doc: &Document) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            out.push_str(&self.value_text(get_path(doc, &after[..close])));
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }

    fn value_text(&self, value: Option<&Bson>) -> String {
        match value {
            None | Some(Bson::Null | Bson::Undefined) => self.missing.clone(),
            Some(Bson::String(s)) if s.is_empty() => self.missing.clone(),
            Some(Bson::String(s)) => s.clone(),
            Some(Bson::Array(items)) if items.is_empty() => self.missing.clone(),
            Some(Bson::Array(items)) => {
                items.iter().map(|v| self.value_text(Some(v))).collect::<Vec<_>>().join(", ")
            }
            Some(other) => bson_to_compact(other),
        }
    }
}
