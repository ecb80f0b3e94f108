//! Logging setup and MCP-forwarding logger.
//!
//! [`init_tracing`] installs the process-wide `tracing` subscriber chosen by
//! the `--log` flag. [`Logger`] writes a line to `tracing` and, when a client
//! is connected, mirrors it as an MCP `notifications/message`, gated by the
//! level the client picked through `logging/setLevel`.

use anyhow::Result;
use rmcp::{
    RoleServer,
    model::{LoggingLevel, LoggingMessageNotificationParam},
    service::Peer,
};
use serde_json::{Value, json};
use std::fs::OpenOptions;
use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Where log output goes, parsed from `--log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    File(String),
}

impl LogTarget {
    /// `0`/`off`, `1`/`stdout`, `2`/`stderr`, anything else is a file path.
    pub fn parse(value: &str) -> Self {
        match value {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" => LogTarget::Stderr,
            path => LogTarget::File(path.to_string()),
        }
    }
}

/// Install the global subscriber. Stdout is the MCP transport when serving,
/// so the default target is stderr.
pub fn init_tracing(target: &LogTarget, verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder().with_max_level(level);
    match target {
        LogTarget::Off => {}
        LogTarget::Stdout => {
            tracing::subscriber::set_global_default(builder.with_writer(std::io::stdout).finish())?
        }
        LogTarget::Stderr => {
            tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish())?
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing::subscriber::set_global_default(
                builder.with_writer(file).with_ansi(false).finish(),
            )?
        }
    }
    Ok(())
}

/// MCP levels from least to most severe.
const LEVELS: [LoggingLevel; 8] = [
    LoggingLevel::Debug,
    LoggingLevel::Info,
    LoggingLevel::Notice,
    LoggingLevel::Warning,
    LoggingLevel::Error,
    LoggingLevel::Critical,
    LoggingLevel::Alert,
    LoggingLevel::Emergency,
];

fn severity(level: LoggingLevel) -> u8 {
    LEVELS.iter().position(|l| *l == level).unwrap_or(0) as u8
}

/// Minimum level for client notifications, adjustable at runtime.
pub struct LogLevelFilter(AtomicU8);

impl LogLevelFilter {
    pub fn new(level: LoggingLevel) -> Self {
        Self(AtomicU8::new(severity(level)))
    }

    pub fn get(&self) -> LoggingLevel {
        LEVELS
            .get(self.0.load(Ordering::Relaxed) as usize)
            .copied()
            .unwrap_or(LoggingLevel::Debug)
    }

    pub fn set(&self, level: LoggingLevel) {
        self.0.store(severity(level), Ordering::Relaxed);
    }

    pub fn should_log(&self, level: LoggingLevel) -> bool {
        severity(level) >= self.0.load(Ordering::Relaxed)
    }
}

impl Default for LogLevelFilter {
    fn default() -> Self {
        Self::new(LoggingLevel::Info)
    }
}

/// Map an MCP level onto the nearest `tracing` level.
pub fn logging_level_to_tracing(level: LoggingLevel) -> Level {
    match level {
        LoggingLevel::Debug => Level::DEBUG,
        LoggingLevel::Info | LoggingLevel::Notice => Level::INFO,
        LoggingLevel::Warning => Level::WARN,
        _ => Level::ERROR,
    }
}

/// Per-request logger.
#[derive(Clone)]
pub struct Logger {
    peer: Option<Peer<RoleServer>>,
    level_filter: Arc<LogLevelFilter>,
    name: String,
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            peer: None,
            level_filter: Arc::new(LogLevelFilter::default()),
            name: name.into(),
        }
    }

    pub fn with_peer(mut self, peer: Peer<RoleServer>) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn with_level_filter(mut self, filter: Arc<LogLevelFilter>) -> Self {
        self.level_filter = filter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log to tracing, and to the client if the level passes the filter.
    pub fn log(&self, level: LoggingLevel, message: &str, data: Option<Value>) {
        let name = self.name.as_str();
        match logging_level_to_tracing(level) {
            Level::ERROR => tracing::error!(logger = name, "{}", message),
            Level::WARN => tracing::warn!(logger = name, "{}", message),
            Level::INFO => tracing::info!(logger = name, "{}", message),
            _ => tracing::debug!(logger = name, "{}", message),
        }

        if let Some(peer) = &self.peer
            && self.level_filter.should_log(level)
        {
            let param = LoggingMessageNotificationParam {
                level,
                logger: Some(self.name.clone()),
                data: data.unwrap_or_else(|| json!({ "message": message })),
            };
            let peer = peer.clone();
            tokio::spawn(async move {
                let _ = peer.notify_logging_message(param).await;
            });
        }
    }

    pub fn debug(&self, msg: &str) {
        self.log(LoggingLevel::Debug, msg, None);
    }

    pub fn info(&self, msg: &str) {
        self.log(LoggingLevel::Info, msg, None);
    }

    /// Info line carrying structured data for the client.
    pub fn info_with(&self, msg: &str, data: Value) {
        self.log(LoggingLevel::Info, msg, Some(data));
    }

    pub fn warning(&self, msg: &str) {
        self.log(LoggingLevel::Warning, msg, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_target_parsing() {
        assert_eq!(LogTarget::parse("0"), LogTarget::Off);
        assert_eq!(LogTarget::parse("stdout"), LogTarget::Stdout);
        assert_eq!(LogTarget::parse("2"), LogTarget::Stderr);
        assert_eq!(
            LogTarget::parse("taskzen.log"),
            LogTarget::File("taskzen.log".into())
        );
    }

    #[test]
    fn filter_gates_lower_levels() {
        let filter = LogLevelFilter::new(LoggingLevel::Warning);
        assert!(!filter.should_log(LoggingLevel::Info));
        assert!(filter.should_log(LoggingLevel::Warning));
        assert!(filter.should_log(LoggingLevel::Emergency));

        filter.set(LoggingLevel::Debug);
        assert!(filter.should_log(LoggingLevel::Debug));
        assert_eq!(filter.get(), LoggingLevel::Debug);
    }

    #[test]
    fn every_level_survives_the_filter_roundtrip() {
        for level in LEVELS {
            assert_eq!(LogLevelFilter::new(level).get(), level);
        }
    }

    #[test]
    fn tracing_mapping_collapses_severe_levels() {
        assert_eq!(logging_level_to_tracing(LoggingLevel::Notice), Level::INFO);
        assert_eq!(logging_level_to_tracing(LoggingLevel::Alert), Level::ERROR);
    }

    #[test]
    fn logging_without_peer_is_local_only() {
        let logger = Logger::new("tool:panic");
        logger.info("no client attached");
        assert_eq!(logger.name(), "tool:panic");
    }
}
