//! Settings resolution: defaults < optional TOML file < environment variables.
//!
//! The resolved [`Settings`] are cached once per process by [`ConfigResolver::global`]
//! and are read-only afterwards. Components never read the global themselves; the
//! host passes a `Settings` value into the renderer constructor.

use super::runtime::{env_vars, parse_log_level, LoggingPreferences, ReportPreferences};
use crate::logging::codes;
use crate::{log_debug, log_error};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static GLOBAL_SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Configuration loading errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid configuration file {path}: {message}")]
    Parse { path: String, message: String },
}

impl ConfigError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            ConfigError::Read { .. } => codes::system::CONFIG_READ_FAILURE,
            ConfigError::Parse { .. } => codes::system::CONFIG_PARSE_FAILURE,
        }
    }
}

/// Fully resolved, clamped settings for one process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub report: ReportPreferences,
    pub logging: LoggingPreferences,
}

impl Settings {
    /// Settings with the given report preferences (clamped) and default logging
    pub fn with_report(report: ReportPreferences) -> Self {
        Self {
            report: report.clamped(),
            logging: LoggingPreferences::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    report: ReportSection,
    logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ReportSection {
    show_source: Option<bool>,
    context_lines: Option<u32>,
    max_string_length: Option<usize>,
    hide_vendor_frames: Option<bool>,
    minify_output: Option<bool>,
    template_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LoggingSection {
    use_structured_logging: Option<bool>,
    enable_console_logging: Option<bool>,
    min_log_level: Option<String>,
}

impl FileConfig {
    fn apply(self, settings: &mut Settings) {
        let report = &mut settings.report;
        let r = self.report;
        if let Some(v) = r.show_source {
            report.show_source = v;
        }
        if let Some(v) = r.context_lines {
            report.context_lines = v;
        }
        if let Some(v) = r.max_string_length {
            report.max_string_length = v;
        }
        if let Some(v) = r.hide_vendor_frames {
            report.hide_vendor_frames = v;
        }
        if let Some(v) = r.minify_output {
            report.minify_output = v;
        }
        if r.template_path.is_some() {
            report.template_path = r.template_path;
        }
        if r.project_root.is_some() {
            report.project_root = r.project_root;
        }

        let logging = &mut settings.logging;
        let l = self.logging;
        if let Some(v) = l.use_structured_logging {
            logging.use_structured_logging = v;
        }
        if let Some(v) = l.enable_console_logging {
            logging.enable_console_logging = v;
        }
        if let Some(level) = l.min_log_level.as_deref().and_then(parse_log_level) {
            logging.min_log_level = level;
        }
    }
}

/// Resolves [`Settings`] from their sources
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    config_file: Option<PathBuf>,
    read_env: bool,
}

impl ConfigResolver {
    /// Resolver honouring `CRASH_REPORT_CONFIG` and every environment override
    pub fn from_env() -> Self {
        Self {
            config_file: std::env::var(env_vars::CONFIG_FILE)
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            read_env: true,
        }
    }

    /// Use an explicit configuration file
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Enable or disable environment overrides
    pub fn with_env(mut self, enabled: bool) -> Self {
        self.read_env = enabled;
        self
    }

    /// Resolve settings, clamping every bounded value
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let mut settings = Settings::default();

        if let Some(path) = &self.config_file {
            load_file(path)?.apply(&mut settings);
        }

        if self.read_env {
            settings.report = settings.report.with_env_overrides();
            settings.logging = settings.logging.with_env_overrides();
        }

        settings.report = settings.report.clamped();

        log_debug!("Configuration resolved",
            "show_source" => settings.report.show_source,
            "context_lines" => settings.report.context_lines,
            "max_string_length" => settings.report.max_string_length,
            "hide_vendor_frames" => settings.report.hide_vendor_frames
        );

        Ok(settings)
    }

    /// Process-wide settings, resolved on first use and cached afterwards.
    ///
    /// A broken configuration file degrades to defaults plus environment
    /// overrides; it never prevents a report from being produced.
    pub fn global() -> &'static Settings {
        GLOBAL_SETTINGS.get_or_init(|| {
            let resolver = Self::from_env();
            match resolver.resolve() {
                Ok(settings) => settings,
                Err(error) => {
                    let message = error.to_string();
                    log_error!(error.error_code(), "Configuration could not be loaded, using defaults",
                        "error" => message.as_str());
                    let mut fallback = Settings::default();
                    fallback.report = fallback.report.with_env_overrides().clamped();
                    fallback.logging = fallback.logging.with_env_overrides();
                    fallback
                }
            }
        })
    }
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
