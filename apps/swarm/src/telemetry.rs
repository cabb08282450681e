//! Logging setup for the fleet client.
//!
//! Configured from the environment so the CLI surface stays minimal:
//! `SWARM_LOG` picks the level, `SWARM_LOG_FILE` appends to a file instead
//! of stderr, and `SWARM_LOG_FILTER` overrides the whole tracing filter.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
}

impl LogConfig {
    pub fn from_env() -> Self {
        let level = std::env::var("SWARM_LOG")
            .ok()
            .and_then(|v| LogLevel::parse(&v))
            .unwrap_or_default();
        let file = std::env::var("SWARM_LOG_FILE").ok().map(PathBuf::from);
        Self { level, file }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

static INIT: OnceLock<()> = OnceLock::new();
static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn init(config: &LogConfig) -> Result<(), InitError> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(config.level))
        .with_level(true)
        .with_target(config.level >= LogLevel::Debug)
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| InitError::Configure(err.to_string()))?;

    let _ = GUARD.set(guard);
    INIT.set(()).ok();
    Ok(())
}

fn build_env_filter(level: LogLevel) -> EnvFilter {
    if let Ok(filter) = std::env::var("SWARM_LOG_FILTER") {
        return EnvFilter::new(filter);
    }
    EnvFilter::new(default_filter_for(level))
}

fn default_filter_for(level: LogLevel) -> String {
    let base = match level {
        LogLevel::Trace => "info,swarm=trace,swarm_core=trace",
        LogLevel::Debug => "info,swarm=debug,swarm_core=debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    };
    // The websocket stack is chatty at debug and below; keep it at info
    // unless SWARM_LOG_FILTER says otherwise.
    if level >= LogLevel::Debug {
        format!("{base},tungstenite=info,tokio_tungstenite=info")
    } else {
        base.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_is_case_insensitive() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warn"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn debug_filter_throttles_the_websocket_stack() {
        let filter = default_filter_for(LogLevel::Debug);
        assert!(filter.contains("tungstenite=info"));
        assert!(!default_filter_for(LogLevel::Info).contains("tungstenite"));
    }
}
