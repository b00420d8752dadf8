//! Error descriptors handed to the pipeline by the host's error-trapping layer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value captured from the host runtime (frame argument or attached context)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ArgValue>),
    /// Object instance, carrying only its class name
    Object(String),
    /// Opaque runtime handle, carrying only its kind (e.g. "stream")
    Resource(String),
}

impl ArgValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Bool(_) => "bool",
            ArgValue::Int(_) => "int",
            ArgValue::Float(_) => "float",
            ArgValue::String(_) => "string",
            ArgValue::Array(_) => "array",
            ArgValue::Object(_) => "object",
            ArgValue::Resource(_) => "resource",
        }
    }
}

/// How a method frame was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Static,
    Instance,
}

impl CallType {
    pub fn separator(&self) -> &'static str {
        match self {
            CallType::Static => "::",
            CallType::Instance => "->",
        }
    }
}

/// One frame as captured by the host runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFrame {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub function: String,
    pub class: Option<String>,
    pub call_type: Option<CallType>,
    pub args: Vec<ArgValue>,
}

impl RawFrame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn method(mut self, class: impl Into<String>, call_type: CallType) -> Self {
        self.class = Some(class.into());
        self.call_type = Some(call_type);
        self
    }

    pub fn with_args(mut self, args: Vec<ArgValue>) -> Self {
        self.args = args;
        self
    }
}

/// The error being reported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDescriptor {
    pub kind: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub code: i64,
    pub frames: Vec<RawFrame>,
    pub cause: Option<Box<ErrorDescriptor>>,
    pub context: BTreeMap<String, ArgValue>,
}

impl ErrorDescriptor {
    pub fn new(
        kind: impl Into<String>,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            file: file.into(),
            line,
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_frames(mut self, frames: Vec<RawFrame>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_cause(mut self, cause: ErrorDescriptor) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: ArgValue) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Type name without its namespace (`App\Http\FooException` -> `FooException`)
    pub fn short_kind(&self) -> &str {
        short_type_name(&self.kind)
    }

    /// Namespace part of the type name, if any
    pub fn namespace(&self) -> Option<&str> {
        let short = self.short_kind();
        let prefix = &self.kind[..self.kind.len() - short.len()];
        let trimmed = prefix.trim_end_matches(['\\', ':', '.']);
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Chained causes, outermost first, at most `limit` deep
    pub fn causes(&self, limit: usize) -> Vec<&ErrorDescriptor> {
        let mut chain = Vec::new();
        let mut current = self.cause.as_deref();
        while let Some(cause) = current {
            if chain.len() >= limit {
                break;
            }
            chain.push(cause);
            current = cause.cause.as_deref();
        }
        chain
    }

    /// One-line summary for a host log writer
    pub fn summary_line(&self) -> String {
        let line = format!(
            "[{}] {} in {}:{}",
            self.kind, self.message, self.file, self.line
        );
        line.chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect()
    }
}

/// Last segment of a `\`, `::` or `.` separated type name
pub fn short_type_name(kind: &str) -> &str {
    let cut = [
        kind.rfind('\\').map(|i| i + 1),
        kind.rfind("::").map(|i| i + 2),
        kind.rfind('.').map(|i| i + 1),
    ]
    .into_iter()
    .flatten()
    .max()
    .unwrap_or(0);
    &kind[cut..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_kind_and_namespace() {
        let error = ErrorDescriptor::new(
            "Illuminate\\Database\\QueryException",
            "boom",
            "/app/a.php",
            1,
        );
        assert_eq!(error.short_kind(), "QueryException");
        assert_eq!(error.namespace(), Some("Illuminate\\Database"));

        let plain = ErrorDescriptor::new("RuntimeException", "boom", "/app/a.php", 1);
        assert_eq!(plain.short_kind(), "RuntimeException");
        assert_eq!(plain.namespace(), None);

        assert_eq!(short_type_name("std::io::Error"), "Error");
    }

    #[test]
    fn test_summary_line_is_single_line() {
        let error = ErrorDescriptor::new("Exception", "first\nsecond\r", "/app/x.php", 7);
        let summary = error.summary_line();
        assert_eq!(summary, "[Exception] first second  in /app/x.php:7");
        assert!(!summary.contains('\n'));
    }

    #[test]
    fn test_causes_respect_limit() {
        let mut error = ErrorDescriptor::new("E0", "m", "f", 1);
        for depth in 1..=5 {
            error = ErrorDescriptor::new(format!("E{}", depth), "m", "f", 1).with_cause(error);
        }
        assert_eq!(error.causes(10).len(), 5);
        let limited = error.causes(2);
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].kind, "E4");
    }

    #[test]
    fn test_deserialize_from_host_json() {
        let json = r#"{
            "kind": "TypeError",
            "message": "bad",
            "file": "/app/src/a.php",
            "line": 3,
            "frames": [
                {"function": "handle", "class": "App\\Kernel", "call_type": "instance",
                 "args": [{"type": "int", "value": 4}, {"type": "object", "value": "App\\User"}, {"type": "null"}]}
            ]
        }"#;
        let error: ErrorDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(error.code, 0);
        assert_eq!(error.frames[0].call_type, Some(CallType::Instance));
        assert_eq!(error.frames[0].args[1], ArgValue::Object("App\\User".into()));
        assert_eq!(error.frames[0].args[2], ArgValue::Null);
    }
}
