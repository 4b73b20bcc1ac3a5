//! Log sink boundary.
//!
//! The recorder only knows how to hand `(level, message, context)` triples
//! to a [`LogSink`]; where they end up is the host's business. The default
//! sink bridges to the `tracing` ecosystem.

use std::sync::Mutex;

use serde_json::Value as JsonValue;

/// Structured context attached to every emitted line.
pub type LogContext = serde_json::Map<String, JsonValue>;

/// Severity of an emitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Destination for timing log lines.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext);
}

/// Default sink: emits through `tracing` at the matching level, with the
/// JSON context rendered into a `context` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        let context = JsonValue::Object(context.clone());
        match level {
            LogLevel::Info => {
                tracing::info!(target: "sea_orm_querylog", context = %context, "{message}")
            }
            LogLevel::Warning => {
                tracing::warn!(target: "sea_orm_querylog", context = %context, "{message}")
            }
            LogLevel::Error => {
                tracing::error!(target: "sea_orm_querylog", context = %context, "{message}")
            }
        }
    }
}

/// One entry captured by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub context: LogContext,
}

/// Sink that keeps every entry in memory. Useful for asserting on emitted
/// lines in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(LogRecord {
                level,
                message: message.to_owned(),
                context: context.clone(),
            });
    }
}
