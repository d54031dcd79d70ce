//! Structured logging with optional external sinks.
//!
//! The engine reports what it did through a [`RunnerLogger`] so callers can
//! forward records to their own infrastructure while still getting a sensible
//! default console output.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Verbosity;

/// Convenience alias for external logging callbacks.
pub type LogCallback = Arc<dyn Fn(&LogRecord) + Send + Sync + 'static>;

/// High-level logging configuration shared across the engine.
#[derive(Clone)]
pub struct LogConfig {
    pub verbose: Verbosity,
    pub external_logger: Option<LogCallback>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            verbose: Verbosity::Medium,
            external_logger: None,
        }
    }
}

impl LogConfig {
    pub fn new(verbose: Verbosity) -> Self {
        Self {
            verbose,
            ..Default::default()
        }
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level == LogLevel::Error || level.as_u8() <= self.verbose.as_u8()
    }
}

/// Log severity used across the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Info = 1,
    Debug = 2,
}

impl LogLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Structured log entry shared with external callbacks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary: Option<Value>,
}

impl LogRecord {
    pub fn new(
        message: impl Into<String>,
        level: LogLevel,
        category: Option<String>,
        auxiliary: Option<Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            level,
            category,
            auxiliary,
        }
    }
}

/// Default console printer used when no external logger is configured.
pub fn default_log_handler(record: &LogRecord) {
    let timestamp = record
        .timestamp
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    if let Some(category) = &record.category {
        println!(
            "[{}] {:<5} [{}] {}",
            timestamp,
            record.level.label(),
            category,
            record.message
        );
    } else {
        println!(
            "[{}] {:<5} {}",
            timestamp,
            record.level.label(),
            record.message
        );
    }
    if let Some(aux) = &record.auxiliary {
        if !aux.is_null() {
            println!("    {}", aux);
        }
    }
}

/// Logger shared by the engine, the batch runner, and the live-page surface.
pub struct RunnerLogger {
    config: LogConfig,
    default_handler: LogCallback,
}

impl fmt::Debug for RunnerLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerLogger")
            .field("verbosity", &self.config.verbose)
            .field("external_logger", &self.config.external_logger.is_some())
            .finish()
    }
}

impl RunnerLogger {
    pub fn with_config(config: LogConfig) -> Self {
        Self {
            config,
            default_handler: Arc::new(default_log_handler),
        }
    }

    pub fn new(verbose: Verbosity) -> Self {
        Self::with_config(LogConfig::new(verbose))
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn set_verbose(&mut self, verbose: Verbosity) {
        self.config.verbose = verbose;
    }

    pub fn set_external_logger(&mut self, logger: Option<LogCallback>) {
        self.config.external_logger = logger;
    }

    pub fn log(
        &self,
        message: impl Into<String>,
        level: LogLevel,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        if !self.config.should_log(level) {
            return;
        }

        let record = LogRecord::new(message, level, category.map(|c| c.to_string()), auxiliary);

        if let Some(callback) = &self.config.external_logger {
            callback(&record);
        } else {
            (self.default_handler)(&record);
        }
    }

    pub fn error(
        &self,
        message: impl Into<String>,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        self.log(message, LogLevel::Error, category, auxiliary);
    }

    pub fn info(
        &self,
        message: impl Into<String>,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        self.log(message, LogLevel::Info, category, auxiliary);
    }

    pub fn debug(
        &self,
        message: impl Into<String>,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        self.log(message, LogLevel::Debug, category, auxiliary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn respects_verbosity() {
        let logger = RunnerLogger::new(Verbosity::Minimal);
        assert!(logger.config.should_log(LogLevel::Error));
        assert!(!logger.config.should_log(LogLevel::Debug));
    }

    #[test]
    fn external_logger_is_invoked() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&records);
        let callback: LogCallback = Arc::new(move |record| {
            capture.lock().unwrap().push(record.clone());
        });

        let mut config = LogConfig::default();
        config.verbose = Verbosity::Detailed;
        config.external_logger = Some(callback);
        let logger = RunnerLogger::with_config(config);

        logger.info("hello", Some("test"), None);

        let values = records.lock().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].message, "hello");
        assert_eq!(values[0].category.as_deref(), Some("test"));
        assert_eq!(values[0].level, LogLevel::Info);
    }

    #[test]
    fn debug_records_are_dropped_at_medium() {
        let records = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&records);
        let callback: LogCallback = Arc::new(move |record| {
            capture.lock().unwrap().push(record.clone());
        });

        let mut logger = RunnerLogger::new(Verbosity::Medium);
        logger.set_external_logger(Some(callback));

        logger.debug("noise", None, None);
        logger.error("boom", None, None);

        let values = records.lock().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].message, "boom");
    }
}
