//! log4rs setup: size-rolled `app.log`, plus dedicated `audit.log`, `metrics.log` and optional
//! `diag.log` files for their targets.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::error::Error;
use std::path::{Path, PathBuf};

use crate::diag::DIAG_TARGET;
use crate::telemetry::{AUDIT_TARGET, METRICS_TARGET};

const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
pub const DEFAULT_RETENTION: u32 = 7;

#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn Error>> {
    let roller =
        FixedWindowRoller::builder().build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Configure process-wide logging under `dir` (current directory when `None`).
///
/// A second call in the same process leaves the first configuration in place.
///
/// # Errors
/// Returns an error if the directory cannot be created or an appender cannot be built.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    persist_diag: bool,
) -> Result<(), Box<dyn Error>> {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = retention.unwrap_or(DEFAULT_RETENTION).max(1);
    let lvl = parse_level(level.unwrap_or("info"));

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, LevelFilter::Info))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, LevelFilter::Info));

    builder = if persist_diag {
        builder
            .appender(Appender::builder().build("diag", Box::new(rolling(&base, "diag", keep)?)))
            .logger(Logger::builder().appender("diag").additive(false).build(DIAG_TARGET, LevelFilter::Debug))
    } else {
        builder.logger(Logger::builder().additive(false).build(DIAG_TARGET, LevelFilter::Off))
    };

    let config = builder.build(Root::builder().appender("app").build(lvl))?;
    if log4rs::init_config(config).is_err() {
        log::debug!("logger already initialized; keeping existing configuration");
    }
    Ok(())
}

/// Configure logging from `RECORDQA_LOG_DIR`, `RECORDQA_LOG_LEVEL`, `RECORDQA_LOG_RETENTION`
/// and `RECORDQA_DIAG`.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), Box<dyn Error>> {
    let dir = std::env::var("RECORDQA_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("RECORDQA_LOG_LEVEL").ok();
    let retention = std::env::var("RECORDQA_LOG_RETENTION").ok().and_then(|s| s.parse::<u32>().ok());
    let diag = std::env::var("RECORDQA_DIAG")
        .is_ok_and(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    configure_logging(dir.as_deref(), level.as_deref(), retention, diag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("warn"), LevelFilter::Warn);
        assert_eq!(parse_level("bogus"), LevelFilter::Info);
    }

    #[test]
    fn configure_creates_log_files() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        configure_logging(Some(&logs), Some("info"), Some(2), true).unwrap();
        assert!(logs.is_dir());
    }
}
