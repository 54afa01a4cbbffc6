//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use neonatal_lib::RiskLevel;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a weight in whole grams, or a dash when absent
pub fn format_grams(grams: Option<f64>) -> String {
    match grams {
        Some(g) => format!("{:.0}", g),
        None => "-".to_string(),
    }
}

/// Color a risk level by severity
pub fn color_risk(level: RiskLevel) -> String {
    let label = level.as_str();
    match level {
        RiskLevel::Low => label.green().to_string(),
        RiskLevel::Moderate => label.yellow().to_string(),
        RiskLevel::High => label.red().bold().to_string(),
        RiskLevel::Unknown => label.dimmed().to_string(),
    }
}

/// Color an absolute error: within 250 g green, within 500 g yellow, else red
pub fn color_error(grams: Option<f64>) -> String {
    let formatted = format_grams(grams);
    match grams {
        Some(g) if g <= 250.0 => formatted.green().to_string(),
        Some(g) if g <= 500.0 => formatted.yellow().to_string(),
        Some(_) => formatted.red().to_string(),
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_grams() {
        assert_eq!(format_grams(Some(3401.6)), "3402");
        assert_eq!(format_grams(None), "-");
    }

    #[test]
    fn test_color_risk_keeps_label() {
        colored::control::set_override(false);
        assert_eq!(color_risk(RiskLevel::High), "HIGH");
        assert_eq!(color_error(Some(120.0)), "120");
    }
}
