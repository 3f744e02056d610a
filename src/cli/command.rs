use std::path::PathBuf;

/// Programmatic CLI commands; the binary maps its subcommands onto these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Answer a natural-language question.
    Ask { question: String, scope: Option<String> },
    /// Run an already generated query string and render the answer.
    Exec { query: String, scope: Option<String> },
    /// Show the structured query a query string turns into, without running it.
    Parse { query: String, scope: Option<String> },
    /// Answer every non-blank line of a file as a question; `metrics` appends this run's counters.
    Batch { file: PathBuf, scope: Option<String>, workers: usize, metrics: bool },
}
