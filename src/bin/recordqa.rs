use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use recordqa::cli::{self, Command};
use recordqa::{Models, QaConfig, logger, models};

#[derive(Parser, Debug)]
#[command(name = "recordqa", version, about = "Answer questions about records in a document store", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Path to a config file (TOML). Falls back to RECORDQA_CONFIG and recordqa.toml lookups.")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "NDJSON or JSON-array records file to load (overrides config/env)")]
    data: Option<PathBuf>,
    #[arg(long, global = true, default_value = "human", help = "Output format: human|plain|json")]
    format: String,
    #[arg(long, global = true, help = "Scoping identifier; confines every query to this record id")]
    scope: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Answer a natural-language question")]
    Ask {
        #[arg(help = "The question, quoted")]
        question: String,
    },
    #[command(about = "Run a generated query string, e.g. db.patients.findOne({\"id\": 7})")]
    Exec {
        #[arg(help = "Query string, quoted")]
        query: String,
    },
    #[command(about = "Show the structured query a query string becomes, without running it")]
    Parse {
        #[arg(help = "Query string, quoted")]
        query: String,
    },
    #[command(about = "Answer every non-blank line of a file as a question")]
    Batch {
        #[arg(help = "Questions file, one per line")]
        file: PathBuf,
        #[arg(long, default_value_t = 4, help = "Concurrent workers")]
        workers: usize,
        #[arg(long, help = "Print request counters for this run after the answers")]
        metrics: bool,
    },
}

fn init_logging(cfg: &QaConfig) {
    let res = if std::env::var_os("RECORDQA_LOG_DIR").is_some() {
        logger::configure_from_env()
    } else {
        logger::configure_logging(
            Some(cfg.log.dir.as_path()),
            Some(cfg.log.level.as_str()),
            Some(cfg.log.retention),
            cfg.log.diag,
        )
    };
    if let Err(e) = res {
        eprintln!("warning: logging disabled: {e}");
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = real_main(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mode = cli::parse_output_mode(&cli.format).ok_or_else(|| format!("unknown format: {}", cli.format))?;
    let mut cfg = QaConfig::load(cli.config.as_deref())?;
    if let Some(data) = cli.data {
        cfg.data_file = Some(data);
    }
    init_logging(&cfg);

    let installed = models::install(Models::from_config(&cfg))?;
    let assistant = Arc::new(recordqa::memory_assistant(cfg, installed)?);

    let scope = cli.scope;
    let cmd = match cli.command {
        Commands::Ask { question } => Command::Ask { question, scope },
        Commands::Exec { query } => Command::Exec { query, scope },
        Commands::Parse { query } => Command::Parse { query, scope },
        Commands::Batch { file, workers, metrics } => Command::Batch { file, scope, workers, metrics },
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    cli::run_with_format(&assistant, cmd, mode, &mut out)
}
