// Internal modules
#[macro_use]
pub mod logging;
pub mod classify;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod html;
pub mod render;
pub mod source;
pub mod suggest;
pub mod trace;

// Re-export key types for library consumers
pub use classify::{Category, ClassifiedError, Classifier, ErrorClassifier, Route, RouteTable};
pub use config::{ConfigError, ConfigResolver, ReportPreferences, Settings};
pub use context::{ContextCollector, RawRequest, RequestCollector, RequestSnapshot};
pub use descriptor::{ArgValue, CallType, ErrorDescriptor, RawFrame};
pub use html::SafeHtml;
pub use render::{Document, OutputFormat, RenderError, Renderer};
pub use source::{FileSourceExtractor, SourceExtractor, SourceWindow};
pub use suggest::{PatternSuggestionEngine, SuggestionEngine};
pub use trace::{FormattedTrace, FrameFormatter, StackFormatter};
