//! Structured logging for govclient
//!
//! A clean, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-module debug control via the GOVCLIENT_DEBUG environment variable
//!   (comma-separated tag keys, or "all")
//! - Minimum level via GOVCLIENT_LOG (error/warning/info/debug/verbose)
//! - Colored console output
//!
//! ## Usage
//!
//! ```ignore
//! use govclient::logger::{self, LogTag};
//!
//! logger::error(LogTag::Provider, "Connection failed");
//! logger::warning(LogTag::Governor, "Rate limit approaching");
//! logger::info(LogTag::Governance, "Proposal created");
//! logger::debug(LogTag::Cache, "Entry expired"); // Only if GOVCLIENT_DEBUG=cache
//! ```

mod format;
mod levels;
mod tags;

pub use levels::LogLevel;
pub use tags::LogTag;

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Logger configuration resolved once from the environment
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub debug_tags: HashSet<String>,
    pub debug_all: bool,
}

static LOGGER_CONFIG: Lazy<LoggerConfig> = Lazy::new(|| {
    let min_level = std::env::var("GOVCLIENT_LOG")
        .ok()
        .and_then(|v| LogLevel::parse(&v))
        .unwrap_or(LogLevel::Info);

    let raw = std::env::var("GOVCLIENT_DEBUG").unwrap_or_default();
    let debug_all = raw.trim() == "all";
    let debug_tags: HashSet<String> = raw
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    LoggerConfig {
        min_level,
        debug_tags,
        debug_all,
    }
});

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Check against minimum log level threshold
/// 3. Debug level additionally requires the tag in GOVCLIENT_DEBUG
fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    let config = &*LOGGER_CONFIG;

    if level == LogLevel::Error {
        return true;
    }

    if level == LogLevel::Debug {
        return config.min_level >= LogLevel::Debug
            || config.debug_all
            || config.debug_tags.contains(tag.to_debug_key());
    }

    level <= config.min_level
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }
    format::format_and_log(tag, level.as_str(), message);
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics, gated by GOVCLIENT_DEBUG)
pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (very detailed tracing)
pub fn verbose(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Verbose, message);
}
