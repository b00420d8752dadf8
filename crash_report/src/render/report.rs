//! Report document model and the sanitization pass
//!
//! [`Report`] is lowered into a [`ReportValue`] tree, which keeps track of
//! which strings are pre-sanitized markup. [`sanitize`] turns that tree into
//! a [`SafeValue`] tree in which every string is safe to emit: text and map
//! keys are escaped, markup passes through, opaque objects collapse to an
//! `[Object: type]` label. Templates and the JSON writer only ever see
//! `SafeValue`.

use crate::classify::{Category, ClassifiedError};
use crate::context::mask::truncate_string;
use crate::context::{FileMeta, RequestSnapshot};
use crate::descriptor::{ArgValue, ErrorDescriptor};
use crate::html::{escape_html, SafeHtml};
use crate::source::SourceWindow;
use crate::trace::{ArgPreview, FormattedFrame};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Unsanitized report tree
#[derive(Debug, Clone, PartialEq)]
pub enum ReportValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Markup(SafeHtml),
    List(Vec<ReportValue>),
    Map(Vec<(String, ReportValue)>),
    /// Value with no safe string form, carrying its type name
    Opaque(String),
}

/// Sanitized report tree
#[derive(Debug, Clone, PartialEq)]
pub enum SafeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Html(SafeHtml),
    List(Vec<SafeValue>),
    Map(Vec<(SafeHtml, SafeValue)>),
}

impl SafeValue {
    pub fn get(&self, key: &str) -> Option<&SafeValue> {
        match self {
            SafeValue::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            SafeValue::Null => false,
            SafeValue::Bool(b) => *b,
            SafeValue::Int(i) => *i != 0,
            SafeValue::Float(f) => *f != 0.0,
            SafeValue::Html(h) => !h.is_empty(),
            SafeValue::List(items) => !items.is_empty(),
            SafeValue::Map(entries) => !entries.is_empty(),
        }
    }
}

impl Serialize for SafeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SafeValue::Null => serializer.serialize_unit(),
            SafeValue::Bool(b) => serializer.serialize_bool(*b),
            SafeValue::Int(i) => serializer.serialize_i64(*i),
            SafeValue::Float(f) => serializer.serialize_f64(*f),
            SafeValue::Html(h) => serializer.serialize_str(h.as_str()),
            SafeValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            SafeValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key.as_str(), value)?;
                }
                map.end()
            }
        }
    }
}

/// Escape every string in the tree, except markup that is already safe
pub fn sanitize(value: ReportValue) -> SafeValue {
    match value {
        ReportValue::Null => SafeValue::Null,
        ReportValue::Bool(b) => SafeValue::Bool(b),
        ReportValue::Int(i) => SafeValue::Int(i),
        ReportValue::Float(f) => SafeValue::Float(f),
        ReportValue::Text(text) => SafeValue::Html(SafeHtml::escape(&text)),
        ReportValue::Markup(markup) => SafeValue::Html(markup),
        ReportValue::Opaque(type_name) => SafeValue::Html(SafeHtml::from_sanitized(format!(
            "[Object: {}]",
            escape_html(&type_name)
        ))),
        ReportValue::List(items) => SafeValue::List(items.into_iter().map(sanitize).collect()),
        ReportValue::Map(entries) => SafeValue::Map(
            entries
                .into_iter()
                .map(|(key, value)| (SafeHtml::escape(&key), sanitize(value)))
                .collect(),
        ),
    }
}

pub trait ToReportValue {
    fn to_report_value(&self) -> ReportValue;
}

fn map<const N: usize>(entries: [(&str, ReportValue); N]) -> ReportValue {
    ReportValue::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

impl ToReportValue for str {
    fn to_report_value(&self) -> ReportValue {
        ReportValue::Text(self.to_string())
    }
}

impl ToReportValue for String {
    fn to_report_value(&self) -> ReportValue {
        ReportValue::Text(self.clone())
    }
}

impl ToReportValue for SafeHtml {
    fn to_report_value(&self) -> ReportValue {
        ReportValue::Markup(self.clone())
    }
}

impl ToReportValue for bool {
    fn to_report_value(&self) -> ReportValue {
        ReportValue::Bool(*self)
    }
}

impl ToReportValue for f64 {
    fn to_report_value(&self) -> ReportValue {
        ReportValue::Float(*self)
    }
}

macro_rules! int_report_value {
    ($($ty:ty),*) => {
        $(
            impl ToReportValue for $ty {
                fn to_report_value(&self) -> ReportValue {
                    ReportValue::Int(i64::try_from(*self).unwrap_or(i64::MAX))
                }
            }
        )*
    };
}

int_report_value!(i32, i64, u32, u64, usize);

impl<T: ToReportValue> ToReportValue for Option<T> {
    fn to_report_value(&self) -> ReportValue {
        self.as_ref()
            .map(ToReportValue::to_report_value)
            .unwrap_or(ReportValue::Null)
    }
}

impl<T: ToReportValue> ToReportValue for Vec<T> {
    fn to_report_value(&self) -> ReportValue {
        ReportValue::List(self.iter().map(ToReportValue::to_report_value).collect())
    }
}

impl<T: ToReportValue> ToReportValue for BTreeMap<String, T> {
    fn to_report_value(&self) -> ReportValue {
        ReportValue::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_report_value()))
                .collect(),
        )
    }
}

impl ToReportValue for Value {
    fn to_report_value(&self) -> ReportValue {
        match self {
            Value::Null => ReportValue::Null,
            Value::Bool(b) => ReportValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ReportValue::Int(i),
                None => n.as_f64().map(ReportValue::Float).unwrap_or(ReportValue::Null),
            },
            Value::String(s) => ReportValue::Text(s.clone()),
            Value::Array(items) => items.to_report_value(),
            Value::Object(entries) => ReportValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_report_value()))
                    .collect(),
            ),
        }
    }
}

impl ToReportValue for ArgValue {
    fn to_report_value(&self) -> ReportValue {
        match self {
            ArgValue::Null => ReportValue::Null,
            ArgValue::Bool(b) => ReportValue::Bool(*b),
            ArgValue::Int(i) => ReportValue::Int(*i),
            ArgValue::Float(f) => ReportValue::Float(*f),
            ArgValue::String(s) => ReportValue::Text(s.clone()),
            ArgValue::Array(items) => items.to_report_value(),
            ArgValue::Object(class) => ReportValue::Opaque(class.clone()),
            ArgValue::Resource(kind) => ReportValue::Opaque(format!("resource({})", kind)),
        }
    }
}

impl ToReportValue for SourceWindow {
    fn to_report_value(&self) -> ReportValue {
        let lines = self
            .lines
            .values()
            .map(|record| {
                (
                    record.number.to_string(),
                    map([
                        ("number", record.number.to_report_value()),
                        ("raw_content", record.raw_content.to_report_value()),
                        ("highlighted_html", record.highlighted_html.to_report_value()),
                        ("is_highlighted", (record.number == self.highlighted_line).to_report_value()),
                    ]),
                )
            })
            .collect();

        map([
            ("start_line", self.start_line.to_report_value()),
            ("end_line", self.end_line.to_report_value()),
            ("highlighted_line", self.highlighted_line.to_report_value()),
            ("lines", ReportValue::Map(lines)),
            ("error", self.error.to_report_value()),
        ])
    }
}

impl ToReportValue for ArgPreview {
    fn to_report_value(&self) -> ReportValue {
        map([
            ("type", self.type_name.to_report_value()),
            ("preview", self.preview.to_report_value()),
            ("value", self.value.to_report_value()),
        ])
    }
}

impl ToReportValue for FormattedFrame {
    fn to_report_value(&self) -> ReportValue {
        map([
            ("index", self.index.to_report_value()),
            ("file", self.file.to_report_value()),
            ("short_file", self.short_file.to_report_value()),
            ("line", self.line.to_report_value()),
            ("function_name", self.function_name.to_report_value()),
            ("is_vendor", self.is_vendor.to_report_value()),
            ("is_application", self.is_application.to_report_value()),
            ("args", self.args.to_report_value()),
            ("source", self.source.to_report_value()),
        ])
    }
}

impl ToReportValue for FileMeta {
    fn to_report_value(&self) -> ReportValue {
        map([
            ("name", self.name.to_report_value()),
            ("size", self.size.to_report_value()),
            ("mime", self.mime.to_report_value()),
            ("error", self.error.to_report_value()),
        ])
    }
}

impl ToReportValue for RequestSnapshot {
    fn to_report_value(&self) -> ReportValue {
        map([
            ("method", self.method.to_report_value()),
            ("url", self.url.to_report_value()),
            ("headers", self.headers.to_report_value()),
            ("query", self.query.to_report_value()),
            ("body", self.body.to_report_value()),
            ("files", self.files.to_report_value()),
            ("server", self.server.to_report_value()),
            ("env", self.env.to_report_value()),
            ("session", self.session.to_report_value()),
            ("omitted_sections", self.omitted_sections.to_report_value()),
        ])
    }
}

impl ToReportValue for Category {
    fn to_report_value(&self) -> ReportValue {
        map([
            ("name", self.as_str().to_report_value()),
            ("title", self.title().to_report_value()),
        ])
    }
}

impl ToReportValue for ClassifiedError {
    fn to_report_value(&self) -> ReportValue {
        map([
            ("category", self.category.to_report_value()),
            ("detail", self.detail.to_report_value()),
            ("suggestions", self.suggestions.to_report_value()),
        ])
    }
}

/// Display form of an error or one of its causes
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorView {
    pub kind: String,
    pub short_kind: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub code: i64,
}

impl ErrorView {
    pub fn new(error: &ErrorDescriptor, max_message_length: usize) -> Self {
        Self {
            kind: error.kind.clone(),
            short_kind: error.short_kind().to_string(),
            message: truncate_string(&error.message, max_message_length),
            file: error.file.clone(),
            line: error.line,
            code: error.code,
        }
    }
}

impl ToReportValue for ErrorView {
    fn to_report_value(&self) -> ReportValue {
        map([
            ("kind", self.kind.to_report_value()),
            ("short_kind", self.short_kind.to_report_value()),
            ("message", self.message.to_report_value()),
            ("file", self.file.to_report_value()),
            ("line", self.line.to_report_value()),
            ("code", self.code.to_report_value()),
        ])
    }
}

/// Everything known about one error, before sanitization
#[derive(Debug, Clone)]
pub struct Report {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub error: ErrorView,
    pub causes: Vec<ErrorView>,
    pub frames: Vec<FormattedFrame>,
    pub frame_count_hidden: usize,
    pub frames_dropped: usize,
    pub source: Option<SourceWindow>,
    pub context: Option<RequestSnapshot>,
    pub classified: ClassifiedError,
    pub error_context: BTreeMap<String, ArgValue>,
}

impl ToReportValue for Report {
    fn to_report_value(&self) -> ReportValue {
        map([
            ("report_id", self.report_id.to_report_value()),
            (
                "generated_at",
                self.generated_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
                    .to_report_value(),
            ),
            ("error", self.error.to_report_value()),
            ("causes", self.causes.to_report_value()),
            ("frames", self.frames.to_report_value()),
            ("frame_count_hidden", self.frame_count_hidden.to_report_value()),
            ("frames_dropped", self.frames_dropped.to_report_value()),
            ("source", self.source.to_report_value()),
            ("context", self.context.to_report_value()),
            ("classified", self.classified.to_report_value()),
            ("error_context", self.error_context.to_report_value()),
        ])
    }
}
