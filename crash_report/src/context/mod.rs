//! Request context collection
//!
//! Builds a [`RequestSnapshot`] from the raw request maps supplied by the
//! host. Sensitive keys are masked, strings and maps are bounded, and the
//! whole snapshot is held under a byte budget. Collection is a pure function
//! of its input.

pub mod budget;
pub mod mask;

use crate::config::compile_time::context::{MAX_ITEMS, SIZE_BUDGET};
use crate::config::runtime::{clamp_max_string_length, ReportPreferences};
use crate::html::SafeHtml;
use crate::logging::codes;
use crate::log_success;
use mask::{
    is_sensitive_key, mask_string, mask_value, more_items_marker, redact_value, truncate_map,
    truncate_string, value_to_display, FILTERED,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::OnceCell;
use std::collections::BTreeMap;

pub use budget::{enforce_budget, Section};

/// Server variables that may appear in a report
pub const SERVER_ALLOW_LIST: &[&str] = &[
    "SERVER_SOFTWARE",
    "SERVER_NAME",
    "SERVER_PORT",
    "SERVER_PROTOCOL",
    "REQUEST_METHOD",
    "REQUEST_URI",
    "REQUEST_TIME",
    "HTTP_HOST",
    "HTTP_USER_AGENT",
    "HTTP_ACCEPT",
    "HTTP_ACCEPT_LANGUAGE",
    "REMOTE_ADDR",
    "SCRIPT_NAME",
    "DOCUMENT_ROOT",
    "HTTPS",
];

/// Environment variables that may appear in a report
pub const ENV_ALLOW_LIST: &[&str] = &[
    "APP_ENV",
    "APP_DEBUG",
    "APP_URL",
    "APP_NAME",
    "APP_LOCALE",
    "APP_TIMEZONE",
    "LOG_LEVEL",
    "DB_CONNECTION",
    "DB_HOST",
    "DB_PORT",
    "DB_DATABASE",
    "CACHE_DRIVER",
    "QUEUE_CONNECTION",
];

/// Upload metadata as received from the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadedFile {
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub error: i32,
}

/// Raw request state, passed in explicitly by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRequest {
    pub method: String,
    pub uri: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, Value>,
    pub body: BTreeMap<String, Value>,
    pub files: BTreeMap<String, UploadedFile>,
    pub server: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub session: Option<BTreeMap<String, Value>>,
}

/// Upload metadata as displayed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub error: i32,
}

/// Masked, bounded view of one request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: SafeHtml,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: BTreeMap<String, String>,
    pub files: BTreeMap<String, FileMeta>,
    pub server: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub session: BTreeMap<String, String>,
    /// Sections dropped by budgeting, with a note of what was lost
    pub omitted_sections: BTreeMap<String, String>,
}

/// Builds request snapshots
pub trait ContextCollector {
    fn collect(&self, request: &RawRequest) -> RequestSnapshot;
}

/// The standard masking and budgeting collector
#[derive(Debug, Clone)]
pub struct RequestCollector {
    max_string_length: usize,
    max_items: usize,
    size_budget: usize,
}

impl RequestCollector {
    pub fn new(preferences: &ReportPreferences) -> Self {
        Self {
            max_string_length: clamp_max_string_length(preferences.max_string_length),
            max_items: MAX_ITEMS,
            size_budget: SIZE_BUDGET,
        }
    }

    pub fn with_size_budget(mut self, budget: usize) -> Self {
        self.size_budget = budget;
        self
    }

    pub fn size_budget(&self) -> usize {
        self.size_budget
    }

    fn collect_values(&self, values: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
        let bounded = values
            .iter()
            .map(|(key, value)| {
                let shown = if is_sensitive_key(key) {
                    mask_value(value)
                } else {
                    truncate_string(&value_to_display(&redact_value(value)), self.max_string_length)
                };
                (self.bound_key(key), shown)
            })
            .collect();
        truncate_map(bounded, self.max_items, more_items_marker)
    }

    fn collect_strings<'a>(
        &self,
        values: impl Iterator<Item = (&'a String, &'a String)>,
        normalize_key: fn(&str) -> String,
    ) -> BTreeMap<String, String> {
        let bounded = values
            .map(|(key, value)| {
                let shown = if is_sensitive_key(key) {
                    mask_string(value)
                } else {
                    truncate_string(value, self.max_string_length)
                };
                (self.bound_key(&normalize_key(key)), shown)
            })
            .collect();
        truncate_map(bounded, self.max_items, more_items_marker)
    }

    fn collect_files(&self, files: &BTreeMap<String, UploadedFile>) -> BTreeMap<String, FileMeta> {
        let bounded = files
            .iter()
            .map(|(field, file)| {
                let meta = FileMeta {
                    name: truncate_string(&file.name, self.max_string_length),
                    size: file.size,
                    mime: truncate_string(&file.mime, self.max_string_length),
                    error: file.error,
                };
                (self.bound_key(field), meta)
            })
            .collect();
        truncate_map(bounded, self.max_items, |count| FileMeta {
            name: more_items_marker(count),
            ..Default::default()
        })
    }

    fn bound_key(&self, key: &str) -> String {
        truncate_string(key, self.max_string_length)
    }

    /// Display URL with sensitive query parameters filtered
    fn build_url(&self, uri: &str) -> SafeHtml {
        let without_fragment = uri.split('#').next().unwrap_or_default();
        let (path, query) = match without_fragment.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (without_fragment, None),
        };

        let mut url = path.to_string();
        if let Some(query) = query {
            let params: Vec<String> = query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((name, _)) if is_sensitive_key(name) => format!("{}={}", name, FILTERED),
                    None if is_sensitive_key(pair) => format!("{}={}", pair, FILTERED),
                    _ => pair.to_string(),
                })
                .collect();
            if !params.is_empty() {
                url.push('?');
                url.push_str(&params.join("&"));
            }
        }

        SafeHtml::escape(&truncate_string(&url, self.max_string_length))
    }
}

impl ContextCollector for RequestCollector {
    fn collect(&self, request: &RawRequest) -> RequestSnapshot {
        let server = request
            .server
            .iter()
            .filter(|(name, _)| SERVER_ALLOW_LIST.contains(&name.as_str()));
        let env = request
            .env
            .iter()
            .filter(|(name, _)| ENV_ALLOW_LIST.contains(&name.as_str()));

        let mut snapshot = RequestSnapshot {
            method: truncate_string(&request.method.to_uppercase(), 16),
            url: self.build_url(&request.uri),
            headers: self.collect_strings(request.headers.iter(), str::to_lowercase),
            query: self.collect_values(&request.query),
            body: self.collect_values(&request.body),
            files: self.collect_files(&request.files),
            server: self.collect_strings(server, str::to_string),
            env: self.collect_strings(env, str::to_string),
            session: request
                .session
                .as_ref()
                .map(|session| self.collect_values(session))
                .unwrap_or_default(),
            omitted_sections: BTreeMap::new(),
        };

        let size = enforce_budget(&mut snapshot, self.size_budget);
        log_success!(codes::success::CONTEXT_COLLECTED, "Request context collected",
            "size" => size, "omitted" => snapshot.omitted_sections.len());
        snapshot
    }
}

/// One request's snapshot, collected at most once
#[derive(Debug)]
pub struct RequestScope<'a> {
    request: &'a RawRequest,
    snapshot: OnceCell<RequestSnapshot>,
}

impl<'a> RequestScope<'a> {
    pub fn new(request: &'a RawRequest) -> Self {
        Self {
            request,
            snapshot: OnceCell::new(),
        }
    }

    pub fn request(&self) -> &'a RawRequest {
        self.request
    }

    pub fn snapshot(&self, collector: &dyn ContextCollector) -> &RequestSnapshot {
        self.snapshot.get_or_init(|| collector.collect(self.request))
    }
}
