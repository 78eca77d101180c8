//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table
pub fn print_table<T: Tabled>(rows: &[T], empty_message: &str) {
    if rows.is_empty() {
        println!("{}", empty_message.yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any value as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color a VM or site status
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "running" | "ok" => status.green().to_string(),
        "stopped" | "offline" | "powered_off" => status.yellow().to_string(),
        "error" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Shorten long text for table cells
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(1)).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Connection failed: refused", 11), "Connection…");
    }
}
