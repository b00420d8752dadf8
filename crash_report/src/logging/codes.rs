//! Diagnostic codes and their metadata
//!
//! Single source of truth for every code the pipeline logs, plus lookup
//! functions over the registry. Codes are grouped by pipeline stage.

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Code attached to every log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CLASSIFICATION TYPES
// ============================================================================

/// Severity of a logged condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Metadata for one registered code
#[derive(Debug, Clone)]
pub struct CodeMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl CodeMetadata {
    const fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        recoverable: bool,
        description: &'static str,
        recommended_action: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            recoverable,
            description,
            recommended_action,
        }
    }
}

// ============================================================================
// CODE CONSTANTS
// ============================================================================

/// System codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ERR001");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ERR002");
    pub const CONFIG_READ_FAILURE: Code = Code::new("ERR004");
    pub const CONFIG_PARSE_FAILURE: Code = Code::new("ERR005");
}

/// Source window extraction codes
pub mod source {
    use super::Code;

    pub const PATH_TRAVERSAL: Code = Code::new("S001");
    pub const OUTSIDE_PROJECT_ROOT: Code = Code::new("S002");
    pub const UNREADABLE: Code = Code::new("S003");
    pub const FILE_TOO_LARGE: Code = Code::new("S004");
    pub const LINE_TRUNCATED: Code = Code::new("S005");
    pub const SOURCE_DISABLED: Code = Code::new("S006");
    pub const HIGHLIGHT_FAILED: Code = Code::new("S007");
    pub const LINE_OUT_OF_RANGE: Code = Code::new("S008");
}

/// Request context collection codes
pub mod context {
    use super::Code;

    pub const BUDGET_EXCEEDED: Code = Code::new("X001");
    pub const SECTION_SHRUNK: Code = Code::new("X002");
    pub const SECTION_COLLAPSED: Code = Code::new("X003");
}

/// Stack trace formatting codes
pub mod trace {
    use super::Code;

    pub const FRAMES_CAPPED: Code = Code::new("T001");
    pub const ARGS_CAPPED: Code = Code::new("T002");
}

/// Classification codes
pub mod classify {
    use super::Code;

    pub const MESSAGE_SCAN_TRUNCATED: Code = Code::new("K001");
    pub const UNKNOWN_SQLSTATE: Code = Code::new("K002");
}

/// Report rendering codes
pub mod render {
    use super::Code;

    pub const TEMPLATE_LOAD_FAILURE: Code = Code::new("R001");
    pub const TEMPLATE_SYNTAX: Code = Code::new("R002");
    pub const TEMPLATE_RENDER: Code = Code::new("R003");
    pub const PANIC_RECOVERED: Code = Code::new("R004");
    pub const FALLBACK_USED: Code = Code::new("R005");
    pub const SERIALIZATION_FAILURE: Code = Code::new("R006");
}

/// Success codes
pub mod success {
    use super::Code;

    pub const REPORT_RENDERED: Code = Code::new("I001");
    pub const LOGGING_INITIALIZED: Code = Code::new("I004");
    pub const SOURCE_EXTRACTED: Code = Code::new("I010");
    pub const CONTEXT_COLLECTED: Code = Code::new("I020");
    pub const ERROR_CLASSIFIED: Code = Code::new("I030");
}

// ============================================================================
// METADATA REGISTRY
// ============================================================================

const ENTRIES: &[CodeMetadata] = &[
    // System
    CodeMetadata::new(
        "ERR001",
        "System",
        Severity::Critical,
        false,
        "Internal error in the report pipeline",
        "File a bug report with the logged context",
    ),
    CodeMetadata::new(
        "ERR002",
        "System",
        Severity::High,
        true,
        "Logging or settings initialization failed",
        "Check that initialization runs once per process",
    ),
    CodeMetadata::new(
        "ERR004",
        "System",
        Severity::Medium,
        true,
        "Configuration file could not be read",
        "Check CRASH_REPORT_CONFIG points at a readable file",
    ),
    CodeMetadata::new(
        "ERR005",
        "System",
        Severity::Medium,
        true,
        "Configuration file is not valid TOML or has unknown keys",
        "Fix the configuration file syntax",
    ),
    // Source
    CodeMetadata::new(
        "S001",
        "Source",
        Severity::High,
        true,
        "Source path contains a parent-directory segment",
        "Report paths must be absolute and free of '..' segments",
    ),
    CodeMetadata::new(
        "S002",
        "Source",
        Severity::High,
        true,
        "Source path resolves outside the project root",
        "Set the project root to the application directory",
    ),
    CodeMetadata::new(
        "S003",
        "Source",
        Severity::Medium,
        true,
        "Source file could not be resolved or read",
        "Check the file exists and is readable by the process",
    ),
    CodeMetadata::new(
        "S004",
        "Source",
        Severity::Low,
        true,
        "Source file exceeds the display size limit",
        "Open the file directly to inspect it",
    ),
    CodeMetadata::new(
        "S005",
        "Source",
        Severity::Low,
        true,
        "Source line exceeded the maximum displayed length",
        "No action required",
    ),
    CodeMetadata::new(
        "S006",
        "Source",
        Severity::Low,
        true,
        "Source display is disabled by configuration",
        "Set CRASH_REPORT_SHOW_SOURCE=true to enable it",
    ),
    CodeMetadata::new(
        "S007",
        "Source",
        Severity::Low,
        true,
        "Highlighting failed and plain escaped text was used",
        "No action required",
    ),
    CodeMetadata::new(
        "S008",
        "Source",
        Severity::Low,
        true,
        "Requested line is beyond the end of the file",
        "The file probably changed after the error was raised",
    ),
    // Context
    CodeMetadata::new(
        "X001",
        "Context",
        Severity::Medium,
        true,
        "Request snapshot exceeded the size budget",
        "Large request sections were shrunk to fit",
    ),
    CodeMetadata::new(
        "X002",
        "Context",
        Severity::Low,
        true,
        "Request section strings were shortened",
        "No action required",
    ),
    CodeMetadata::new(
        "X003",
        "Context",
        Severity::Low,
        true,
        "Request section replaced by a size marker",
        "No action required",
    ),
    // Trace
    CodeMetadata::new(
        "T001",
        "Trace",
        Severity::Low,
        true,
        "Stack trace exceeded the frame limit",
        "Only the innermost frames are shown",
    ),
    CodeMetadata::new(
        "T002",
        "Trace",
        Severity::Low,
        true,
        "Frame arguments exceeded the argument limit",
        "No action required",
    ),
    // Classify
    CodeMetadata::new(
        "K001",
        "Classify",
        Severity::Low,
        true,
        "Error message was longer than the scan limit",
        "Only the leading part of the message was scanned",
    ),
    CodeMetadata::new(
        "K002",
        "Classify",
        Severity::Low,
        true,
        "SQLSTATE code is not in the known table",
        "No action required",
    ),
    // Render
    CodeMetadata::new(
        "R001",
        "Render",
        Severity::High,
        true,
        "Report template could not be loaded",
        "Check CRASH_REPORT_TEMPLATE or remove it to use the built-in template",
    ),
    CodeMetadata::new(
        "R002",
        "Render",
        Severity::High,
        true,
        "Report template has a syntax error",
        "Fix unbalanced or unknown template blocks",
    ),
    CodeMetadata::new(
        "R003",
        "Render",
        Severity::High,
        true,
        "Report template referenced a missing value",
        "Check template variable names against the report fields",
    ),
    CodeMetadata::new(
        "R004",
        "Render",
        Severity::Critical,
        true,
        "Rendering panicked and was recovered",
        "File a bug report with the logged context",
    ),
    CodeMetadata::new(
        "R005",
        "Render",
        Severity::High,
        true,
        "Fallback report was served",
        "Inspect the preceding render error",
    ),
    CodeMetadata::new(
        "R006",
        "Render",
        Severity::High,
        true,
        "Report could not be serialized",
        "File a bug report with the logged context",
    ),
    // Success
    CodeMetadata::new(
        "I001",
        "Render",
        Severity::Low,
        true,
        "Report rendered",
        "Continue normal operation",
    ),
    CodeMetadata::new(
        "I004",
        "System",
        Severity::Low,
        true,
        "Logging initialized",
        "Continue normal operation",
    ),
    CodeMetadata::new(
        "I010",
        "Source",
        Severity::Low,
        true,
        "Source window extracted",
        "Continue normal operation",
    ),
    CodeMetadata::new(
        "I020",
        "Context",
        Severity::Low,
        true,
        "Request context collected",
        "Continue normal operation",
    ),
    CodeMetadata::new(
        "I030",
        "Classify",
        Severity::Low,
        true,
        "Error classified",
        "Continue normal operation",
    ),
];

static REGISTRY: OnceLock<HashMap<&'static str, &'static CodeMetadata>> = OnceLock::new();

fn registry() -> &'static HashMap<&'static str, &'static CodeMetadata> {
    REGISTRY.get_or_init(|| ENTRIES.iter().map(|m| (m.code, m)).collect())
}

// ============================================================================
// LOOKUP FUNCTIONS
// ============================================================================

pub fn get_metadata(code: &str) -> Option<&'static CodeMetadata> {
    registry().get(code).copied()
}

pub fn get_severity(code: &str) -> Severity {
    get_metadata(code)
        .map(|m| m.severity)
        .unwrap_or(Severity::Medium)
}

pub fn is_recoverable(code: &str) -> bool {
    get_metadata(code).map(|m| m.recoverable).unwrap_or(true)
}

pub fn get_description(code: &str) -> &'static str {
    get_metadata(code)
        .map(|m| m.description)
        .unwrap_or("Unknown code")
}

pub fn get_action(code: &str) -> &'static str {
    get_metadata(code)
        .map(|m| m.recommended_action)
        .unwrap_or("No specific action available")
}

pub fn get_category(code: &str) -> &'static str {
    get_metadata(code).map(|m| m.category).unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_constant_is_registered() {
        let all = [
            system::INTERNAL_ERROR,
            system::INITIALIZATION_FAILURE,
            system::CONFIG_READ_FAILURE,
            system::CONFIG_PARSE_FAILURE,
            source::PATH_TRAVERSAL,
            source::OUTSIDE_PROJECT_ROOT,
            source::UNREADABLE,
            source::FILE_TOO_LARGE,
            source::LINE_TRUNCATED,
            source::SOURCE_DISABLED,
            source::HIGHLIGHT_FAILED,
            source::LINE_OUT_OF_RANGE,
            context::BUDGET_EXCEEDED,
            context::SECTION_SHRUNK,
            context::SECTION_COLLAPSED,
            trace::FRAMES_CAPPED,
            trace::ARGS_CAPPED,
            classify::MESSAGE_SCAN_TRUNCATED,
            classify::UNKNOWN_SQLSTATE,
            render::TEMPLATE_LOAD_FAILURE,
            render::TEMPLATE_SYNTAX,
            render::TEMPLATE_RENDER,
            render::PANIC_RECOVERED,
            render::FALLBACK_USED,
            render::SERIALIZATION_FAILURE,
            success::REPORT_RENDERED,
            success::LOGGING_INITIALIZED,
            success::SOURCE_EXTRACTED,
            success::CONTEXT_COLLECTED,
            success::ERROR_CLASSIFIED,
        ];
        for code in all {
            assert!(get_metadata(code.as_str()).is_some(), "missing {}", code);
        }
        assert_eq!(registry().len(), ENTRIES.len(), "duplicate registry entry");
    }

    #[test]
    fn test_unknown_code_defaults() {
        assert_eq!(get_category("Z999"), "Unknown");
        assert_eq!(get_severity("Z999"), Severity::Medium);
        assert!(is_recoverable("Z999"));
        assert_eq!(get_description("Z999"), "Unknown code");
    }

    #[test]
    fn test_lookup() {
        assert_eq!(get_category("S001"), "Source");
        assert_eq!(get_severity("R004"), Severity::Critical);
        assert!(!is_recoverable("ERR001"));
    }
}
