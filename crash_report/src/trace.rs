//! Stack trace normalization
//!
//! Raw frames are given defaults, classified as vendor or application code,
//! shortened for display and stripped of bulky argument values. Vendor frames
//! are removed entirely when hiding is enabled.

use crate::config::compile_time::trace::{MAX_ARGS_PER_FRAME, MAX_FRAMES};
use crate::config::runtime::{clamp_max_string_length, ReportPreferences};
use crate::context::mask::truncate_string;
use crate::descriptor::{ArgValue, CallType, RawFrame};
use crate::logging::codes;
use crate::source::SourceWindow;
use crate::{log_debug, log_warning};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Path fragments marking third-party code
pub const VENDOR_MARKERS: &[&str] = &[
    "/vendor/",
    "/node_modules/",
    "/.cargo/registry/",
    "/rustc/",
    "/pear/",
    "/usr/share/php/",
];

/// Path fragments marking application code
pub const APPLICATION_MARKERS: &[&str] = &[
    "/app/",
    "/src/",
    "/routes/",
    "/config/",
    "/database/",
    "/resources/",
];

/// Display form of one argument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgPreview {
    #[serde(rename = "type")]
    pub type_name: String,
    pub preview: String,
    /// Present only for scalars
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedFrame {
    pub index: usize,
    pub file: Option<String>,
    pub short_file: Option<String>,
    pub line: Option<u32>,
    pub function_name: String,
    pub is_vendor: bool,
    pub is_application: bool,
    pub args: Vec<ArgPreview>,
    pub source: Option<SourceWindow>,
}

/// Formatter output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormattedTrace {
    pub frames: Vec<FormattedFrame>,
    /// Vendor frames removed by hiding
    pub hidden_vendor_frames: usize,
    /// Frames beyond the frame cap
    pub dropped_frames: usize,
}

pub trait StackFormatter {
    fn format(&self, frames: &[RawFrame]) -> FormattedTrace;
}

#[derive(Debug, Clone)]
pub struct FrameFormatter {
    project_root: PathBuf,
    hide_vendor: bool,
    max_string_length: usize,
}

impl FrameFormatter {
    pub fn new(preferences: &ReportPreferences) -> Self {
        Self {
            project_root: preferences.effective_project_root(),
            hide_vendor: preferences.hide_vendor_frames,
            max_string_length: clamp_max_string_length(preferences.max_string_length),
        }
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn with_hide_vendor(mut self, hide: bool) -> Self {
        self.hide_vendor = hide;
        self
    }

    pub fn format_frame(&self, index: usize, frame: &RawFrame) -> FormattedFrame {
        let file = frame.file.as_deref().filter(|f| !f.is_empty());
        let is_vendor = file.is_some_and(is_vendor_path);
        let is_application = !is_vendor && file.is_some_and(|f| self.is_application_path(f));

        FormattedFrame {
            index,
            file: file.map(str::to_string),
            short_file: file.map(|f| self.short_file(f)),
            line: frame.line,
            function_name: function_name(frame),
            is_vendor,
            is_application,
            args: self.format_args(&frame.args),
            source: None,
        }
    }

    fn is_application_path(&self, file: &str) -> bool {
        let normalized = normalize(file);
        APPLICATION_MARKERS.iter().any(|m| normalized.contains(m))
            || Path::new(file).starts_with(&self.project_root)
    }

    /// Path relative to the project root, or its last three segments
    pub fn short_file(&self, file: &str) -> String {
        if let Ok(relative) = Path::new(file).strip_prefix(&self.project_root) {
            let relative = relative.to_string_lossy();
            if !relative.is_empty() {
                return normalize(&relative);
            }
        }

        let normalized = normalize(file);
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        let keep = segments.len().saturating_sub(3);
        segments[keep..].join("/")
    }

    fn format_args(&self, args: &[ArgValue]) -> Vec<ArgPreview> {
        let mut previews: Vec<ArgPreview> = args
            .iter()
            .take(MAX_ARGS_PER_FRAME)
            .map(|arg| self.preview_arg(arg))
            .collect();

        if args.len() > MAX_ARGS_PER_FRAME {
            let remaining = args.len() - MAX_ARGS_PER_FRAME;
            previews.push(ArgPreview {
                type_name: "truncated".to_string(),
                preview: format!("... {} more arguments", remaining),
                value: None,
            });
        }
        previews
    }

    pub fn preview_arg(&self, arg: &ArgValue) -> ArgPreview {
        let (preview, value) = match arg {
            ArgValue::Null => ("null".to_string(), Some(Value::Null)),
            ArgValue::Bool(b) => (b.to_string(), Some(Value::Bool(*b))),
            ArgValue::Int(i) => (i.to_string(), Some(Value::from(*i))),
            ArgValue::Float(f) => (
                f.to_string(),
                serde_json::Number::from_f64(*f).map(Value::Number),
            ),
            ArgValue::String(s) => {
                let shown = truncate_string(s, self.max_string_length);
                (format!("\"{}\"", shown), Some(Value::String(shown)))
            }
            ArgValue::Array(items) => (format!("array({})", items.len()), None),
            ArgValue::Object(class) => (truncate_string(class, self.max_string_length), None),
            ArgValue::Resource(kind) => (
                format!("resource({})", truncate_string(kind, self.max_string_length)),
                None,
            ),
        };

        ArgPreview {
            type_name: arg.type_name().to_string(),
            preview,
            value,
        }
    }
}

impl StackFormatter for FrameFormatter {
    fn format(&self, frames: &[RawFrame]) -> FormattedTrace {
        let dropped_frames = frames.len().saturating_sub(MAX_FRAMES);
        if dropped_frames > 0 {
            log_warning!(codes::trace::FRAMES_CAPPED, "Stack trace capped",
                "frames" => frames.len(), "limit" => MAX_FRAMES);
        }

        let mut trace = FormattedTrace {
            dropped_frames,
            ..Default::default()
        };

        for (index, frame) in frames.iter().take(MAX_FRAMES).enumerate() {
            if frame.args.len() > MAX_ARGS_PER_FRAME {
                log_warning!(codes::trace::ARGS_CAPPED, "Frame arguments capped",
                    "frame" => index, "args" => frame.args.len());
            }
            let formatted = self.format_frame(index, frame);
            if self.hide_vendor && formatted.is_vendor {
                trace.hidden_vendor_frames += 1;
                continue;
            }
            trace.frames.push(formatted);
        }

        log_debug!("Stack trace formatted",
            "shown" => trace.frames.len(), "hidden" => trace.hidden_vendor_frames);
        trace
    }
}

pub fn is_vendor_path(file: &str) -> bool {
    let normalized = normalize(file);
    VENDOR_MARKERS.iter().any(|m| normalized.contains(m))
}

/// `Class::method`, `Class->method` or the bare function name
pub fn function_name(frame: &RawFrame) -> String {
    let function = if frame.function.is_empty() {
        "unknown"
    } else {
        frame.function.as_str()
    };

    match frame.class.as_deref().filter(|c| !c.is_empty()) {
        Some(class) => {
            let separator = frame.call_type.unwrap_or(CallType::Static).separator();
            format!("{}{}{}", class, separator, function)
        }
        None => function.to_string(),
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> FrameFormatter {
        FrameFormatter::new(&ReportPreferences::default()).with_project_root("/srv/shop")
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let frame = formatter().format_frame(0, &RawFrame::default());
        assert_eq!(frame.function_name, "unknown");
        assert_eq!(frame.file, None);
        assert_eq!(frame.short_file, None);
        assert!(!frame.is_vendor && !frame.is_application);
    }

    #[test]
    fn test_function_names() {
        let instance = RawFrame::new("store").method("App\\Http\\UserController", CallType::Instance);
        assert_eq!(function_name(&instance), "App\\Http\\UserController->store");
        let fixed = RawFrame::new("make").method("Factory", CallType::Static);
        assert_eq!(function_name(&fixed), "Factory::make");
        assert_eq!(function_name(&RawFrame::new("main")), "main");
    }

    #[test]
    fn test_vendor_and_application_classification() {
        let formatter = formatter();
        let vendor = formatter.format_frame(0, &RawFrame::new("handle").at("/srv/shop/vendor/acme/http/Kernel.php", 88));
        assert!(vendor.is_vendor);
        assert!(!vendor.is_application);

        let app = formatter.format_frame(1, &RawFrame::new("index").at("/srv/shop/app/Http/Home.php", 12));
        assert!(app.is_application);
        assert_eq!(app.short_file.as_deref(), Some("app/Http/Home.php"));

        let under_root = formatter.format_frame(2, &RawFrame::new("boot").at("/srv/shop/bootstrap.php", 3));
        assert!(under_root.is_application);

        let elsewhere = formatter.format_frame(3, &RawFrame::new("x").at("/opt/lib/php/tools/Thing.php", 1));
        assert!(!elsewhere.is_application);
        assert_eq!(elsewhere.short_file.as_deref(), Some("php/tools/Thing.php"));
    }

    #[test]
    fn test_windows_separators_are_recognised() {
        assert!(is_vendor_path("C:\\www\\site\\vendor\\lib\\A.php"));
    }

    #[test]
    fn test_hidden_vendor_frames_are_dropped_and_counted() {
        let frames = vec![
            RawFrame::new("a").at("/srv/shop/app/A.php", 1),
            RawFrame::new("b").at("/srv/shop/vendor/x/B.php", 2),
            RawFrame::new("c").at("/srv/shop/vendor/x/C.php", 3),
        ];
        let trace = formatter().with_hide_vendor(true).format(&frames);
        assert_eq!(trace.frames.len(), 1);
        assert_eq!(trace.hidden_vendor_frames, 2);
        assert!(trace.frames.iter().all(|f| !f.is_vendor));

        let shown = formatter().with_hide_vendor(false).format(&frames);
        assert_eq!(shown.frames.len(), 3);
        assert_eq!(shown.hidden_vendor_frames, 0);
    }

    #[test]
    fn test_argument_previews_never_expand_containers() {
        let formatter = formatter();
        let array = formatter.preview_arg(&ArgValue::Array(vec![ArgValue::Int(1), ArgValue::Int(2)]));
        assert_eq!(array.preview, "array(2)");
        assert_eq!(array.value, None);

        let object = formatter.preview_arg(&ArgValue::Object("App\\Models\\User".to_string()));
        assert_eq!(object.preview, "App\\Models\\User");
        assert_eq!(object.value, None);

        let resource = formatter.preview_arg(&ArgValue::Resource("stream".to_string()));
        assert_eq!(resource.preview, "resource(stream)");

        let int = formatter.preview_arg(&ArgValue::Int(42));
        assert_eq!(int.value, Some(Value::from(42)));

        let long = formatter.preview_arg(&ArgValue::String("s".repeat(2000)));
        assert_eq!(long.value, Some(Value::String(format!("{}...", "s".repeat(1000)))));
    }

    #[test]
    fn test_frame_and_argument_caps() {
        let many_args = RawFrame::new("f").with_args(vec![ArgValue::Null; MAX_ARGS_PER_FRAME + 5]);
        let frame = formatter().format_frame(0, &many_args);
        assert_eq!(frame.args.len(), MAX_ARGS_PER_FRAME + 1);
        assert_eq!(frame.args[MAX_ARGS_PER_FRAME].preview, "... 5 more arguments");

        let frames = vec![RawFrame::new("f"); MAX_FRAMES + 7];
        let trace = formatter().format(&frames);
        assert_eq!(trace.frames.len(), MAX_FRAMES);
        assert_eq!(trace.dropped_frames, 7);
    }
}
