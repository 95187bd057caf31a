use chrono::Local;
use std::fmt::Display;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the log level
pub const LOG_LEVEL_ENV: &str = "TFMONGO_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Parse a user-supplied level, falling back to `Info` for unknown values
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Local-time timestamps, same layout as the stderr log lines have always used
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Default directive set for a level: our crate at `level`, the driver quieter
pub fn default_filter(level: LogLevel) -> String {
    format!("tfmongo={},mongodb=warn", level.as_filter())
}

/// Install the global tracing subscriber. Logs go to stderr so stdout stays
/// machine-readable. `RUST_LOG` takes precedence over `TFMONGO_LOG_LEVEL`.
pub fn init() {
    let level = std::env::var(LOG_LEVEL_ENV)
        .map(|value| LogLevel::parse(&value))
        .unwrap_or(LogLevel::Info);

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(LocalTimer),
        )
        .try_init();
}

/// Log debug level message
pub fn debug(message: &str) {
    tracing::debug!("{}", message);
}

/// Log info level message
pub fn info(message: &str) {
    tracing::info!("{}", message);
}

/// Log warning level message
pub fn warn(message: &str) {
    tracing::warn!("{}", message);
}

/// Log error level message
pub fn error(message: &str) {
    tracing::error!("{}", message);
}
