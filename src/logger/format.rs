//! Log formatting and output with ANSI colors
//!
//! Colorized console output with aligned tag and level columns. Write
//! failures (broken pipes when output is piped) are swallowed.

use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 7;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, level: &str, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let prefix = format!("{} ", time).dimmed().to_string();

    let tag_str = format_tag(&tag);
    let level_str = format_level(level);

    let line = format!("{}[{}] [{}] {}", prefix, tag_str, level_str, message);
    print_stdout_safe(&line);
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    let padded = format!("{:<width$}", tag.as_str(), width = TAG_WIDTH);
    match tag {
        LogTag::System => padded.bright_yellow().bold(),
        LogTag::Rpc => padded.bright_blue().bold(),
        LogTag::Governor => padded.bright_cyan().bold(),
        LogTag::Cache => padded.bright_green().bold(),
        LogTag::Breaker => padded.bright_red().bold(),
        LogTag::Governance => padded.bright_magenta().bold(),
        LogTag::Provider => padded.bright_white().bold(),
        LogTag::Session => padded.yellow().bold(),
    }
}

/// Format a level string with appropriate color
fn format_level(level: &str) -> ColoredString {
    let padded = format!("{:<width$}", level, width = LEVEL_WIDTH);
    match level {
        "ERROR" => padded.bright_red().bold(),
        "WARNING" => padded.bright_yellow(),
        "INFO" => padded.bright_white(),
        "DEBUG" => padded.bright_black(),
        _ => padded.dimmed(),
    }
}

/// Print to stdout, ignoring broken-pipe errors
fn print_stdout_safe(line: &str) {
    let mut out = stdout();
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() != ErrorKind::BrokenPipe {
            // Nothing sensible to do; stderr may be gone too
        }
    }
}
