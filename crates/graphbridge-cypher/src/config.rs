//! Compiler configuration.

use serde::{Deserialize, Serialize};

/// Clause separator: `newline`, `space`, or any literal text.
pub const SEPARATOR_ENV: &str = "GRAPHBRIDGE_SEPARATOR";
/// Whether plain column names get the `n.` prefix (`true`/`false`/`1`/`0`).
pub const QUALIFY_COLUMNS_ENV: &str = "GRAPHBRIDGE_QUALIFY_COLUMNS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Joins top-level clauses, chained join patterns and the SKIP/LIMIT lines.
    pub separator: String,
    /// Prefix plain column names with the primary identifier.
    pub qualify_columns: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            qualify_columns: true,
        }
    }
}

impl CompilerConfig {
    /// Everything on one line.
    pub fn single_line() -> Self {
        Self {
            separator: " ".to_string(),
            ..Self::default()
        }
    }

    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(SEPARATOR_ENV) {
            config.separator = parse_separator(&raw);
        }

        if let Ok(raw) = std::env::var(QUALIFY_COLUMNS_ENV) {
            match parse_bool(&raw) {
                Some(flag) => config.qualify_columns = flag,
                None => tracing::warn!(
                    var = QUALIFY_COLUMNS_ENV,
                    value = %raw,
                    "ignoring unrecognized boolean"
                ),
            }
        }

        config
    }
}

fn parse_separator(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "newline" | "nl" | "\\n" => "\n".to_string(),
        "space" => " ".to_string(),
        _ if raw.is_empty() => " ".to_string(),
        _ => raw.to_string(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
