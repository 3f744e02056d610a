use std::path::Path;

use super::runner::OutputMode;

pub fn parse_output_mode(s: &str) -> Option<OutputMode> {
    match s.to_ascii_lowercase().as_str() {
        "human" => Some(OutputMode::Human),
        "plain" => Some(OutputMode::Plain),
        "json" => Some(OutputMode::Json),
        _ => None,
    }
}

/// Non-blank lines of a questions file, trimmed.
pub fn read_questions(path: &Path) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_owned).collect())
}
