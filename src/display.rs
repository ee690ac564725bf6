//! Colored terminal output for streamed chunks.
//!
//! Text goes to stdout so it can be piped. Reasoning, usage and errors go
//! to stderr.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::adapter::{ApiStreamChunk, UsageChunk};

/// Format a usage record as a one-line summary.
#[must_use]
pub fn format_usage(usage: &UsageChunk) -> String {
    let mut summary = format!("in={} out={}", usage.input_tokens, usage.output_tokens);
    if usage.cache_read_tokens > 0 || usage.cache_write_tokens > 0 {
        summary.push_str(&format!(
            " cache_read={} cache_write={}",
            usage.cache_read_tokens, usage.cache_write_tokens
        ));
    }
    summary.push_str(&format!(" cost=${:.4}", usage.total_cost_usd));
    summary
}

/// Print text content.
pub fn print_text(text: &str) {
    print!("{text}");
    let _ = io::stdout().flush();
}

/// Print reasoning content (dimmed).
pub fn print_reasoning(text: &str) {
    eprint!("{}", text.dimmed());
    let _ = io::stderr().flush();
}

/// Print the final usage summary.
pub fn print_usage(usage: &UsageChunk) {
    eprintln!();
    eprintln!("{} {}", "[USAGE]".blue().bold(), format_usage(usage).dimmed());
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!();
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}

/// Print one chunk to the matching stream.
pub fn print_chunk(chunk: &ApiStreamChunk) {
    match chunk {
        ApiStreamChunk::Text { text } => print_text(text),
        ApiStreamChunk::Reasoning { text } => print_reasoning(text),
        ApiStreamChunk::Usage(usage) => print_usage(usage),
    }
}
