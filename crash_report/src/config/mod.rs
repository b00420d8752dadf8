//! Configuration module for the crash report pipeline
//!
//! Two tiers: compile-time security limits generated by build.rs from the
//! workspace `config/<profile>.toml`, and runtime preferences resolved once per
//! process from defaults, an optional TOML file and environment variables.

// Generated at compile time from the TOML profile; defines `compile_time`.
include!(concat!(env!("OUT_DIR"), "/constants.rs"));

pub mod resolver;
pub mod runtime;

pub use resolver::{ConfigError, ConfigResolver, Settings};
pub use runtime::{LogLevel, LoggingPreferences, ReportPreferences};

/// Build information and configuration metadata
pub mod build_info {
    /// Returns the configuration profile used during build
    pub fn profile() -> &'static str {
        option_env!("CRASH_REPORT_BUILD_PROFILE").unwrap_or("development")
    }

    /// Returns the configuration directory used during build
    pub fn config_dir() -> &'static str {
        option_env!("CRASH_REPORT_CONFIG_DIR").unwrap_or("config")
    }

    /// Returns configuration source information
    pub fn source_info() -> String {
        format!("Generated from {}/{}.toml", config_dir(), profile())
    }
}
