//! # crash-report CLI
//!
//! Renders a diagnostic report for an error described as JSON, optionally
//! with the request that triggered it and the host's route table.

use clap::{Args, Parser, Subcommand, ValueEnum};
use crash_report::{
    config, log_info, logging, ConfigResolver, ErrorDescriptor, OutputFormat, RawRequest, Renderer,
    RouteTable, Settings,
};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "crash-report", version, about = "Render diagnostic error reports")]
struct Cli {
    /// Configuration file, overriding CRASH_REPORT_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a full report
    Render(RenderArgs),

    /// Print the one-line summary of an error
    Summary {
        /// Error descriptor (JSON)
        #[arg(long)]
        error: PathBuf,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Error descriptor (JSON)
    #[arg(long)]
    error: PathBuf,

    /// Request that triggered the error (JSON)
    #[arg(long)]
    request: Option<PathBuf>,

    /// Registered routes (JSON list of {method, path, handler})
    #[arg(long)]
    routes: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Html)]
    format: Format,

    /// Write the report here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Root that displayed source files must live under
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Template overriding the built-in report template
    #[arg(long)]
    template: Option<PathBuf>,

    /// Keep the HTML output unminified
    #[arg(long)]
    no_minify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Html,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Html => OutputFormat::Html,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut resolver = ConfigResolver::from_env();
    if let Some(path) = &cli.config {
        resolver = resolver.with_config_file(path);
    }
    let settings = resolver.resolve()?;

    logging::init_global_logging(settings.logging.clone())?;
    log_info!("crash-report starting",
        "version" => env!("CARGO_PKG_VERSION"),
        "limits" => config::build_info::source_info());

    match cli.command {
        Command::Render(args) => render(args, settings),
        Command::Summary { error } => summary(&error),
    }
}

fn render(args: RenderArgs, mut settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let error: ErrorDescriptor = read_json(&args.error)?;
    let request = args.request.as_deref().map(read_json::<RawRequest>).transpose()?;
    let routes = args
        .routes
        .as_deref()
        .map(read_json::<RouteTable>)
        .transpose()?
        .unwrap_or_default();

    apply_overrides(&args, &mut settings);

    let renderer = Renderer::with_defaults(settings, routes);
    let document = renderer.render(&error, request.as_ref(), args.format.into());

    // The host owns the error log line
    log::error!("{}", document.log_line);
    if document.is_fallback {
        log::warn!("Full report unavailable, wrote the basic fallback document");
    }

    match &args.output {
        Some(path) => {
            fs::write(path, &document.body)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            log::info!("Report written to {} ({})", path.display(), document.content_type);
        }
        None => println!("{}", document.body),
    }

    Ok(())
}

fn summary(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let error: ErrorDescriptor = read_json(path)?;
    println!("{}", error.summary_line());
    Ok(())
}

fn apply_overrides(args: &RenderArgs, settings: &mut Settings) {
    if let Some(root) = &args.project_root {
        settings.report.project_root = Some(root.clone());
    }
    if let Some(template) = &args.template {
        settings.report.template_path = Some(template.clone());
    }
    if args.no_minify {
        settings.report.minify_output = false;
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid JSON in {}: {}", path.display(), e))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_arguments() {
        let cli = Cli::try_parse_from([
            "crash-report",
            "render",
            "--error",
            "error.json",
            "--format",
            "json",
            "--no-minify",
            "-o",
            "out.json",
        ])
        .unwrap();
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.format, Format::Json);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));

        let mut settings = Settings::default();
        apply_overrides(&args, &mut settings);
        assert!(!settings.report.minify_output);
    }

    #[test]
    fn test_read_error_descriptor() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"kind":"RuntimeException","message":"boom","file":"app.php","line":3}}"#
        )
        .unwrap();
        let error: ErrorDescriptor = read_json(file.path()).unwrap();
        assert_eq!(error.summary_line(), "[RuntimeException] boom in app.php:3");

        let missing: Result<ErrorDescriptor, _> = read_json(Path::new("/nonexistent/error.json"));
        assert!(missing.unwrap_err().to_string().contains("Failed to read"));
    }
}
