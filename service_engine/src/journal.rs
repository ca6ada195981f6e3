//! Structured supervision journal
//!
//! Logging is explicit and structured: the engine appends entries to an
//! in-memory journal the embedder drains and renders, rather than writing
//! through a global logger facade.

use std::fmt;

/// Severity of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One journal entry, attributed to a service where applicable
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub level: LogLevel,
    pub service: Option<String>,
    pub message: String,
}

impl JournalEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            service: None,
            message: message.into(),
        }
    }

    pub fn for_service(level: LogLevel, service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            service: Some(service.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for JournalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service {
            Some(service) => write!(f, "[{}] {}: {}", self.level, service, self.message),
            None => write!(f, "[{}] {}", self.level, self.message),
        }
    }
}
