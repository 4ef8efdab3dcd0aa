//! Logger configuration
//!
//! - `Config`, `Format`, `DisplayConfig`: what to log and how it looks
//! - `presets`: development, production and test setups plus env parsing

mod presets;

use serde::{Deserialize, Serialize};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filter directives (e.g. `"info"`, `"debug,tether_lock=trace"`)
    pub level: String,

    /// Output format
    pub format: Format,

    /// Display options
    pub display: DisplayConfig,

    /// Allow swapping the filter at runtime through the guard
    pub reloadable: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            display: DisplayConfig::default(),
            reloadable: false,
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Multi-line, human-readable
    Pretty,
    /// Single line per event
    Compact,
    /// One JSON object per event
    Json,
}

impl Format {
    /// Parse a format name, falling back to [`Format::Compact`]
    #[must_use]
    pub fn parse_lossy(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// What each event line shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show timestamps
    pub time: bool,
    /// Show `file:line`
    pub source: bool,
    /// Show the target module
    pub target: bool,
    /// Use ANSI colors
    pub colors: bool,
    /// Put event fields at the top level of JSON output
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time: true,
            source: cfg!(debug_assertions),
            target: true,
            colors: std::io::IsTerminal::is_terminal(&std::io::stderr()),
            flatten: false,
        }
    }
}
