//! # Output Configuration
//!
//! Controls whether headings and prompts are coloured. The decision respects
//! the `--color` flag first and then the usual environment conventions:
//!
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals

use std::env;

use console::style;

/// Output configuration for controlling colors.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether ANSI styling should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// `color_flag` is the value of `--color`: "always", "never" or "auto".
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }

    /// Top-level heading for a mirror refresh: bold green title, `=` rule.
    pub fn title(&self, text: &str) -> String {
        let rule = "=".repeat(text.chars().count());
        if self.use_color {
            format!("{}\n{}", style(text).green().bold(), rule)
        } else {
            format!("{}\n{}", text, rule)
        }
    }

    /// Section heading for a publication component: bold title, `-` rule.
    pub fn section(&self, text: &str) -> String {
        let rule = "-".repeat(text.chars().count());
        if self.use_color {
            format!("{}\n{}", style(text).bold(), rule)
        } else {
            format!("{}\n{}", text, rule)
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Plain heading underlined with dashes, as used in batch reports.
///
/// ```
/// assert_eq!(aptrev::output::underlined("sw1"), "sw1\n---");
/// ```
pub fn underlined(text: &str) -> String {
    format!("{}\n{}", text, "-".repeat(text.chars().count()))
}
