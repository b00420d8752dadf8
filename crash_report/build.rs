// build.rs - TOML-driven compile-time limit generation
use std::env;
use std::fs;
use std::path::Path;

#[derive(serde::Deserialize)]
struct CompileTimeConfig {
    source: SourceLimits,
    context: ContextLimits,
    classifier: ClassifierLimits,
    suggestions: SuggestionLimits,
    trace: TraceLimits,
    render: RenderLimits,
    logging: LoggingLimits,
}

#[derive(serde::Deserialize)]
struct SourceLimits {
    max_file_size: u64,
    full_load_threshold: u64,
    max_line_length: usize,
    max_context_lines: u32,
    max_highlight_tokens_per_line: usize,
}

#[derive(serde::Deserialize)]
struct ContextLimits {
    max_items: usize,
    size_budget: usize,
    shrink_target_percent: usize,
    min_string_length: usize,
    max_string_length: usize,
}

#[derive(serde::Deserialize)]
struct ClassifierLimits {
    max_route_candidates: usize,
    max_route_distance: usize,
    max_message_scan: usize,
}

#[derive(serde::Deserialize)]
struct SuggestionLimits {
    max_suggestions: usize,
}

#[derive(serde::Deserialize)]
struct TraceLimits {
    max_frames: usize,
    max_args_per_frame: usize,
}

#[derive(serde::Deserialize)]
struct RenderLimits {
    max_cause_depth: usize,
    max_template_size: u64,
}

#[derive(serde::Deserialize)]
struct LoggingLimits {
    log_buffer_size: usize,
    max_log_message_length: usize,
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CRASH_REPORT_BUILD_PROFILE");
    println!("cargo:rerun-if-env-changed=CRASH_REPORT_CONFIG_DIR");

    let profile =
        env::var("CRASH_REPORT_BUILD_PROFILE").unwrap_or_else(|_| "development".to_string());
    let config_dir = env::var("CRASH_REPORT_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

    // Find workspace root (parent of crash_report directory)
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = Path::new(&manifest_dir)
        .parent()
        .expect("Could not find workspace root (parent directory)");

    let config_path = workspace_root
        .join(&config_dir)
        .join(format!("{}.toml", profile));

    println!("cargo:rerun-if-changed={}", config_path.display());

    if !config_path.exists() {
        panic!(
            "Configuration file not found: {}\nWorkspace root: {}\nLooking for: {}/{}/{}.toml",
            config_path.display(),
            workspace_root.display(),
            workspace_root.display(),
            config_dir,
            profile
        );
    }

    let config_content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", config_path.display(), e));

    let config: CompileTimeConfig = toml::from_str(&config_content)
        .unwrap_or_else(|e| panic!("Invalid TOML in {}: {}", config_path.display(), e));

    validate_security_constraints(&config, &profile);
    generate_constants(&config, &profile);
}

fn validate_security_constraints(config: &CompileTimeConfig, profile: &str) {
    const ABSOLUTE_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
    const ABSOLUTE_MAX_CONTEXT_BUDGET: usize = 16 * 1024 * 1024;
    const ABSOLUTE_MAX_CONTEXT_LINES: u32 = 500;

    if config.source.max_file_size > ABSOLUTE_MAX_FILE_SIZE {
        panic!("SECURITY: source.max_file_size exceeds absolute maximum");
    }

    if config.source.full_load_threshold > config.source.max_file_size {
        panic!("SECURITY: source.full_load_threshold must not exceed source.max_file_size");
    }

    if config.source.max_context_lines > ABSOLUTE_MAX_CONTEXT_LINES {
        panic!("SECURITY: source.max_context_lines exceeds absolute maximum");
    }

    if config.context.size_budget > ABSOLUTE_MAX_CONTEXT_BUDGET {
        panic!("SECURITY: context.size_budget exceeds absolute maximum");
    }

    if config.context.shrink_target_percent == 0 || config.context.shrink_target_percent > 100 {
        panic!("SECURITY: context.shrink_target_percent must be within 1..=100");
    }

    if config.context.min_string_length > config.context.max_string_length {
        panic!("SECURITY: context.min_string_length exceeds context.max_string_length");
    }

    if config.suggestions.max_suggestions == 0 {
        panic!("SECURITY: suggestions.max_suggestions must be at least 1");
    }

    if profile == "production" {
        if config.source.max_file_size > 50 * 1024 * 1024 {
            panic!("PRODUCTION: source.max_file_size too high for production");
        }
        if config.trace.max_frames > 500 {
            panic!("PRODUCTION: trace.max_frames too high for production");
        }
    }
}

fn generate_constants(config: &CompileTimeConfig, profile: &str) {
    let out_dir = env::var("OUT_DIR").unwrap();
    let output_path = Path::new(&out_dir).join("constants.rs");

    let constants_code = format!(
        r#"
// Generated compile-time constants from TOML configuration
// Profile: {}
// DO NOT EDIT - Generated by build.rs

pub mod compile_time {{
    pub mod source {{
        pub const MAX_FILE_SIZE: u64 = {};
        pub const FULL_LOAD_THRESHOLD: u64 = {};
        pub const MAX_LINE_LENGTH: usize = {};
        pub const MAX_CONTEXT_LINES: u32 = {};
        pub const MAX_HIGHLIGHT_TOKENS_PER_LINE: usize = {};
    }}

    pub mod context {{
        pub const MAX_ITEMS: usize = {};
        pub const SIZE_BUDGET: usize = {};
        pub const SHRINK_TARGET_PERCENT: usize = {};
        pub const MIN_STRING_LENGTH: usize = {};
        pub const MAX_STRING_LENGTH: usize = {};
    }}

    pub mod classifier {{
        pub const MAX_ROUTE_CANDIDATES: usize = {};
        pub const MAX_ROUTE_DISTANCE: usize = {};
        pub const MAX_MESSAGE_SCAN: usize = {};
    }}

    pub mod suggestions {{
        pub const MAX_SUGGESTIONS: usize = {};
    }}

    pub mod trace {{
        pub const MAX_FRAMES: usize = {};
        pub const MAX_ARGS_PER_FRAME: usize = {};
    }}

    pub mod render {{
        pub const MAX_CAUSE_DEPTH: usize = {};
        pub const MAX_TEMPLATE_SIZE: u64 = {};
    }}

    pub mod logging {{
        pub const LOG_BUFFER_SIZE: usize = {};
        pub const MAX_LOG_MESSAGE_LENGTH: usize = {};
    }}
}}
"#,
        profile,
        // Source
        config.source.max_file_size,
        config.source.full_load_threshold,
        config.source.max_line_length,
        config.source.max_context_lines,
        config.source.max_highlight_tokens_per_line,
        // Context
        config.context.max_items,
        config.context.size_budget,
        config.context.shrink_target_percent,
        config.context.min_string_length,
        config.context.max_string_length,
        // Classifier
        config.classifier.max_route_candidates,
        config.classifier.max_route_distance,
        config.classifier.max_message_scan,
        // Suggestions
        config.suggestions.max_suggestions,
        // Trace
        config.trace.max_frames,
        config.trace.max_args_per_frame,
        // Render
        config.render.max_cause_depth,
        config.render.max_template_size,
        // Logging
        config.logging.log_buffer_size,
        config.logging.max_log_message_length,
    );

    fs::write(output_path, constants_code).unwrap();
}
