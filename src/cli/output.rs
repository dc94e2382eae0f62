//! CLI Output Formatting.
//!
//! Text output is styled with `console`; JSON output is one object per line
//! so it can be piped into other tools.

use console::style;
use serde::Serialize;

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMATTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Output formatter for CLI
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create new formatter
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Get format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn status(&self, status: &str, message: &str) -> bool {
        if self.format == OutputFormat::Json {
            println!("{}", serde_json::json!({ "status": status, "message": message }));
            return true;
        }
        false
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.format == OutputFormat::Text {
            println!();
            println!("{}", style(title).bold().underlined());
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if !self.status("success", message) {
            println!("{} {}", style("✓").green(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        if !self.status("error", message) {
            eprintln!("{} {}", style("✗").red(), message);
        }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if !self.status("info", message) {
            println!("{} {}", style("ℹ").blue(), message);
        }
    }

    /// Print key-value pair
    pub fn kv(&self, key: &str, value: impl std::fmt::Display) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ key: value.to_string() }));
            }
            OutputFormat::Text => {
                println!("  {:<28} {}", style(key).dim(), value);
            }
        }
    }

    /// Print serializable data
    pub fn data<T: Serialize>(&self, data: &T) {
        let rendered = match self.format {
            OutputFormat::Json => serde_json::to_string(data),
            OutputFormat::Text => serde_json::to_string_pretty(data),
        };
        match rendered {
            Ok(s) => println!("{}", s),
            Err(e) => self.error(&format!("could not render output: {}", e)),
        }
    }
}
