//! Report Renderer
//!
//! Runs the pipeline for one error: collect request context, format the
//! trace, extract source windows, classify, suggest, then sanitize the
//! assembled report and serialize it. Collaborators are injected as trait
//! objects so hosts and tests can replace any stage.
//!
//! [`Renderer::render`] never fails. Any error or panic past this boundary
//! produces the basic fallback document instead.

pub mod fallback;
pub mod minify;
pub mod report;
pub mod template;

pub use report::{sanitize, ErrorView, Report, ReportValue, SafeValue, ToReportValue};
pub use template::{Template, TemplateError};

use crate::classify::{Classifier, ErrorClassifier, RouteTable};
use crate::config::compile_time::render::MAX_CAUSE_DEPTH;
use crate::config::runtime::clamp_max_string_length;
use crate::config::Settings;
use crate::context::mask::{is_sensitive_key, mask_string, truncate_string, HIDDEN};
use crate::context::{ContextCollector, RawRequest, RequestCollector, RequestScope};
use crate::descriptor::{ArgValue, ErrorDescriptor};
use crate::logging::codes;
use crate::source::{FileSourceExtractor, SourceExtractor};
use crate::suggest::{PatternSuggestionEngine, SuggestionEngine};
use crate::trace::{FormattedTrace, FrameFormatter, StackFormatter};
use crate::{log_debug, log_error, log_success, log_warning};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Html,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Html => "text/html; charset=utf-8",
            OutputFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Serialized report handed back to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub format: OutputFormat,
    pub content_type: &'static str,
    pub body: String,
    pub is_fallback: bool,
    /// One-line summary for the host's own log writer
    pub log_line: String,
}

impl Document {
    fn new(error: &ErrorDescriptor, format: OutputFormat, body: String, is_fallback: bool) -> Self {
        Self {
            format,
            content_type: format.content_type(),
            body,
            is_fallback,
            log_line: error.summary_line(),
        }
    }

    /// The basic fallback document for `error`
    pub fn fallback(error: &ErrorDescriptor, format: OutputFormat) -> Self {
        Self::new(error, format, fallback::basic_document(error, format), true)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Failed to serialize report: {0}")]
    Serialization(String),

    #[error("Report rendering panicked: {0}")]
    Panic(String),
}

impl RenderError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            RenderError::Template(e) => e.error_code(),
            RenderError::Serialization(_) => codes::render::SERIALIZATION_FAILURE,
            RenderError::Panic(_) => codes::render::PANIC_RECOVERED,
        }
    }
}

pub struct Renderer {
    settings: Settings,
    extractor: Box<dyn SourceExtractor + Send + Sync>,
    collector: Box<dyn ContextCollector + Send + Sync>,
    formatter: Box<dyn StackFormatter + Send + Sync>,
    classifier: Box<dyn Classifier + Send + Sync>,
    suggester: Box<dyn SuggestionEngine + Send + Sync>,
}

impl Renderer {
    pub fn new(
        settings: Settings,
        extractor: Box<dyn SourceExtractor + Send + Sync>,
        collector: Box<dyn ContextCollector + Send + Sync>,
        formatter: Box<dyn StackFormatter + Send + Sync>,
        classifier: Box<dyn Classifier + Send + Sync>,
        suggester: Box<dyn SuggestionEngine + Send + Sync>,
    ) -> Self {
        Self {
            settings,
            extractor,
            collector,
            formatter,
            classifier,
            suggester,
        }
    }

    /// Renderer built from the standard components
    pub fn with_defaults(settings: Settings, routes: RouteTable) -> Self {
        let preferences = settings.report.clone();
        Self::new(
            settings,
            Box::new(FileSourceExtractor::new(&preferences)),
            Box::new(RequestCollector::new(&preferences)),
            Box::new(FrameFormatter::new(&preferences)),
            Box::new(ErrorClassifier::new(routes)),
            Box::new(PatternSuggestionEngine::new()),
        )
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Render `error`, falling back to the basic document on any failure
    pub fn render(
        &self,
        error: &ErrorDescriptor,
        request: Option<&RawRequest>,
        format: OutputFormat,
    ) -> Document {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_render(error, request, format)));
        let failure = match outcome {
            Ok(Ok(document)) => return document,
            Ok(Err(failure)) => failure,
            Err(payload) => RenderError::Panic(panic_message(payload.as_ref())),
        };

        log_error!(failure.error_code(), "Report rendering failed",
            "kind" => error.kind, "reason" => failure);
        log_warning!(codes::render::FALLBACK_USED, "Serving basic fallback document",
            "format" => format);
        Document::fallback(error, format)
    }

    /// Render `error`, reporting failures instead of falling back
    pub fn try_render(
        &self,
        error: &ErrorDescriptor,
        request: Option<&RawRequest>,
        format: OutputFormat,
    ) -> Result<Document, RenderError> {
        let report = self.build_report(error, request);

        log_debug!("Sanitizing report", "report_id" => report.report_id);
        let tree = sanitize(report.to_report_value());

        let body = match format {
            OutputFormat::Html => {
                let template = self.template()?;
                let html = template.render(&tree)?;
                if self.settings.report.minify_output {
                    minify::minify_html(&html)
                } else {
                    html
                }
            }
            OutputFormat::Json => serde_json::to_string_pretty(&tree)
                .map_err(|e| RenderError::Serialization(e.to_string()))?,
        };

        log_success!(codes::success::REPORT_RENDERED, "Report rendered",
            "report_id" => report.report_id, "format" => format, "bytes" => body.len());
        Ok(Document::new(error, format, body, false))
    }

    /// Run every stage and assemble the unsanitized report
    pub fn build_report(&self, error: &ErrorDescriptor, request: Option<&RawRequest>) -> Report {
        let preferences = &self.settings.report;

        log_debug!("Collecting request context", "has_request" => request.is_some());
        let context = request.map(|raw| {
            let scope = RequestScope::new(raw);
            scope.snapshot(self.collector.as_ref()).clone()
        });

        log_debug!("Formatting stack trace", "frames" => error.frames.len());
        let FormattedTrace {
            mut frames,
            hidden_vendor_frames,
            dropped_frames,
        } = self.formatter.format(&error.frames);

        let source = if preferences.show_source {
            log_debug!("Extracting source windows", "file" => error.file, "line" => error.line);
            for frame in frames.iter_mut().filter(|f| f.is_application) {
                if let (Some(file), Some(line)) = (frame.file.as_deref(), frame.line) {
                    frame.source = Some(self.extractor.extract(file, line, None));
                }
            }
            Some(self.extractor.extract(&error.file, error.line, None))
        } else {
            None
        };

        let mut classified = self.classifier.classify(error);
        classified.suggestions = self.suggester.suggest(&classified, error);

        let max_string_length = clamp_max_string_length(preferences.max_string_length);

        Report {
            report_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            error: ErrorView::new(error, max_string_length),
            causes: error
                .causes(MAX_CAUSE_DEPTH)
                .into_iter()
                .map(|cause| ErrorView::new(cause, max_string_length))
                .collect(),
            frames,
            frame_count_hidden: hidden_vendor_frames,
            frames_dropped: dropped_frames,
            source,
            context,
            classified,
            error_context: masked_error_context(&error.context, max_string_length),
        }
    }

    fn template(&self) -> Result<Template, TemplateError> {
        match &self.settings.report.template_path {
            Some(path) => Template::load(path),
            None => Template::builtin(),
        }
    }
}

/// Host-attached context with sensitive values masked and long strings cut
fn masked_error_context(
    context: &BTreeMap<String, ArgValue>,
    max_string_length: usize,
) -> BTreeMap<String, ArgValue> {
    context
        .iter()
        .map(|(key, value)| {
            let value = match value {
                ArgValue::String(s) if is_sensitive_key(key) => ArgValue::String(mask_string(s)),
                ArgValue::Null => ArgValue::Null,
                _ if is_sensitive_key(key) => ArgValue::String(HIDDEN.to_string()),
                ArgValue::String(s) => ArgValue::String(truncate_string(s, max_string_length)),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
