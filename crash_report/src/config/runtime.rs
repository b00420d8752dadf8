// RUNTIME PREFERENCES (per-process, bounded)

use super::compile_time::{context, source};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub use crate::logging::LogLevel;

/// Default number of source lines shown around an error location
pub const DEFAULT_CONTEXT_LINES: u32 = 10;

/// Default maximum length of any displayed string value
pub const DEFAULT_MAX_STRING_LENGTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPreferences {
    /// Whether source windows are extracted at all
    pub show_source: bool,

    /// Lines shown before and after the error line, clamped to `0..=MAX_CONTEXT_LINES`
    pub context_lines: u32,

    /// Longest string kept verbatim, clamped to `MIN_STRING_LENGTH..=MAX_STRING_LENGTH`
    pub max_string_length: usize,

    /// Whether third-party frames are dropped from the trace
    pub hide_vendor_frames: bool,

    /// Whether HTML output is minified
    pub minify_output: bool,

    /// Template overriding the built-in report template
    pub template_path: Option<PathBuf>,

    /// Root that every displayed source file must live under (defaults to the CWD)
    pub project_root: Option<PathBuf>,
}

impl Default for ReportPreferences {
    fn default() -> Self {
        Self {
            show_source: true,
            context_lines: DEFAULT_CONTEXT_LINES,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            hide_vendor_frames: true,
            minify_output: true,
            template_path: None,
            project_root: None,
        }
    }
}

impl ReportPreferences {
    /// Overlay environment variables on top of the current values
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse(env_vars::SHOW_SOURCE) {
            self.show_source = v;
        }
        if let Some(v) = env_parse(env_vars::CONTEXT_LINES) {
            self.context_lines = v;
        }
        if let Some(v) = env_parse(env_vars::MAX_STRING_LENGTH) {
            self.max_string_length = v;
        }
        if let Some(v) = env_parse(env_vars::HIDE_VENDOR_FRAMES) {
            self.hide_vendor_frames = v;
        }
        if let Some(v) = env_parse(env_vars::MINIFY) {
            self.minify_output = v;
        }
        if let Ok(v) = env::var(env_vars::TEMPLATE) {
            if !v.is_empty() {
                self.template_path = Some(PathBuf::from(v));
            }
        }
        if let Ok(v) = env::var(env_vars::PROJECT_ROOT) {
            if !v.is_empty() {
                self.project_root = Some(PathBuf::from(v));
            }
        }
        self
    }

    /// Clamp every bounded value into its allowed range
    pub fn clamped(mut self) -> Self {
        self.context_lines = clamp_context_lines(self.context_lines);
        self.max_string_length = clamp_max_string_length(self.max_string_length);
        self
    }

    /// Project root, falling back to the current working directory
    pub fn effective_project_root(&self) -> PathBuf {
        self.project_root
            .clone()
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Clamp a context-line request to `0..=MAX_CONTEXT_LINES`
pub fn clamp_context_lines(lines: u32) -> u32 {
    lines.min(source::MAX_CONTEXT_LINES)
}

/// Clamp a string-length limit to `MIN_STRING_LENGTH..=MAX_STRING_LENGTH`
pub fn clamp_max_string_length(length: usize) -> usize {
    length.clamp(context::MIN_STRING_LENGTH, context::MAX_STRING_LENGTH)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingPreferences {
    /// Whether to use structured JSON logging
    pub use_structured_logging: bool,

    /// Whether to enable console output
    pub enable_console_logging: bool,

    /// Minimum level that reaches the logger
    pub min_log_level: LogLevel,
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            use_structured_logging: false,
            enable_console_logging: true,
            min_log_level: LogLevel::Info,
        }
    }
}

impl LoggingPreferences {
    /// Overlay environment variables on top of the current values
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse(env_vars::LOG_STRUCTURED) {
            self.use_structured_logging = v;
        }
        if let Some(v) = env_parse(env_vars::LOG_CONSOLE) {
            self.enable_console_logging = v;
        }
        if let Some(level) = env::var(env_vars::LOG_LEVEL)
            .ok()
            .and_then(|v| parse_log_level(&v))
        {
            self.min_log_level = level;
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse log level from string (used for environment variables)
pub fn parse_log_level(level: &str) -> Option<LogLevel> {
    match level.trim().to_lowercase().as_str() {
        "error" | "0" => Some(LogLevel::Error),
        "warning" | "warn" | "1" => Some(LogLevel::Warning),
        "info" | "2" => Some(LogLevel::Info),
        "debug" | "3" => Some(LogLevel::Debug),
        _ => None,
    }
}

/// Environment variable names for configuration
pub mod env_vars {
    pub const CONFIG_FILE: &str = "CRASH_REPORT_CONFIG";

    // Report
    pub const SHOW_SOURCE: &str = "CRASH_REPORT_SHOW_SOURCE";
    pub const CONTEXT_LINES: &str = "CRASH_REPORT_CONTEXT_LINES";
    pub const MAX_STRING_LENGTH: &str = "CRASH_REPORT_MAX_STRING_LENGTH";
    pub const HIDE_VENDOR_FRAMES: &str = "CRASH_REPORT_HIDE_VENDOR_FRAMES";
    pub const MINIFY: &str = "CRASH_REPORT_MINIFY";
    pub const TEMPLATE: &str = "CRASH_REPORT_TEMPLATE";
    pub const PROJECT_ROOT: &str = "CRASH_REPORT_PROJECT_ROOT";

    // Logging
    pub const LOG_LEVEL: &str = "CRASH_REPORT_LOG_LEVEL";
    pub const LOG_STRUCTURED: &str = "CRASH_REPORT_LOG_STRUCTURED";
    pub const LOG_CONSOLE: &str = "CRASH_REPORT_LOG_CONSOLE";
}
