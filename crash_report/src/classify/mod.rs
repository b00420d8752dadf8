//! Error classification
//!
//! Assigns each error one category, first match wins, and attaches
//! category-specific detail. Pattern misses leave detail fields out; nothing
//! here fails.

pub mod database;
pub mod routes;

use crate::config::compile_time::classifier::MAX_MESSAGE_SCAN;
use crate::descriptor::ErrorDescriptor;
use crate::logging::codes;
use crate::{log_debug, log_success};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

pub use database::{parse_database_message, DatabaseDetail};
pub use routes::{levenshtein, Route, RouteMatch, RouteTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Syntax,
    Database,
    NotFound,
    Validation,
    Custom,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Syntax => "syntax",
            Category::Database => "database",
            Category::NotFound => "notFound",
            Category::Validation => "validation",
            Category::Custom => "custom",
            Category::General => "general",
        }
    }

    /// Heading shown in reports
    pub fn title(&self) -> &'static str {
        match self {
            Category::Syntax => "Syntax error",
            Category::Database => "Database error",
            Category::NotFound => "Not found",
            Category::Validation => "Validation error",
            Category::Custom => "Application error",
            Category::General => "Error",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedError {
    pub category: Category,
    pub detail: BTreeMap<String, Value>,
    pub suggestions: Vec<String>,
}

impl ClassifiedError {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            detail: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.detail.get(key).and_then(Value::as_str)
    }
}

pub trait Classifier {
    fn classify(&self, error: &ErrorDescriptor) -> ClassifiedError;
}

/// Exception types that carry no application meaning of their own
const GENERIC_TYPES: &[&str] = &[
    "Exception",
    "Error",
    "ErrorException",
    "RuntimeException",
    "LogicException",
    "InvalidArgumentException",
    "DomainException",
    "LengthException",
    "OutOfRangeException",
    "OutOfBoundsException",
    "RangeException",
    "OverflowException",
    "UnderflowException",
    "UnexpectedValueException",
    "BadFunctionCallException",
    "BadMethodCallException",
    "TypeError",
    "ValueError",
    "ArgumentCountError",
    "ArithmeticError",
    "DivisionByZeroError",
];

const CUSTOM_TYPE_MARKERS: &[&str] = &["Auth", "Permission", "Authorization", "NotFound"];

const DATABASE_TYPES: &[&str] = &["PDOException", "QueryException", "DatabaseException"];

const DATABASE_MESSAGE_MARKERS: &[&str] = &["SQLSTATE[", "(SQL:", "SQL syntax", "database", "Database"];

const NOT_FOUND_MARKERS: &[&str] = &["404", "Not Found", "Route not found"];

/// Validation rule names recognised in messages
const VALIDATION_RULES: &[&str] = &[
    "required",
    "email",
    "numeric",
    "integer",
    "string",
    "min",
    "max",
    "between",
    "size",
    "unique",
    "confirmed",
    "date",
];

/// Classifies errors against an injected route table
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    routes: RouteTable,
}

impl ErrorClassifier {
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn detect_category(&self, error: &ErrorDescriptor) -> Category {
        let kind = error.short_kind();
        let kind_lower = kind.to_lowercase();
        let message = scan_window(&error.message);
        let message_lower = message.to_lowercase();

        if kind_lower.contains("parse")
            || kind_lower.contains("syntax")
            || message_lower.contains("syntax error")
            || message_lower.contains("parse error")
        {
            return Category::Syntax;
        }

        if DATABASE_TYPES.contains(&kind)
            || error.kind.contains("\\Database\\")
            || DATABASE_MESSAGE_MARKERS.iter().any(|m| message.contains(m))
        {
            return Category::Database;
        }

        if NOT_FOUND_MARKERS.iter().any(|m| message.contains(m)) {
            return Category::NotFound;
        }

        if kind_lower.contains("validation") || message_lower.contains("validation") {
            return Category::Validation;
        }

        if !kind.is_empty()
            && (CUSTOM_TYPE_MARKERS.iter().any(|m| kind.contains(m)) || !GENERIC_TYPES.contains(&kind))
        {
            return Category::Custom;
        }

        Category::General
    }

    fn add_not_found_detail(&self, message: &str, detail: &mut BTreeMap<String, Value>) {
        let Some(url) = routes::extract_url(message) else {
            return;
        };
        let similar = self.routes.similar_to(&url);
        detail.insert("requested_url".to_string(), Value::String(url));
        if !similar.is_empty() {
            detail.insert("similar_routes".to_string(), json!(similar));
        }
    }
}

impl Classifier for ErrorClassifier {
    fn classify(&self, error: &ErrorDescriptor) -> ClassifiedError {
        let category = self.detect_category(error);
        let message = scan_window(&error.message);
        let mut classified = ClassifiedError::new(category);
        let detail = &mut classified.detail;

        detail.insert("error_class".to_string(), Value::String(error.short_kind().to_string()));
        if error.code != 0 {
            detail.insert("code".to_string(), Value::from(error.code));
        }

        match category {
            Category::Syntax => add_syntax_detail(message, detail),
            Category::Database => add_database_detail(message, detail),
            Category::NotFound => self.add_not_found_detail(message, detail),
            Category::Validation => {
                let rules = validation_rules(message);
                if !rules.is_empty() {
                    detail.insert("rules".to_string(), json!(rules));
                }
            }
            Category::Custom => {
                if let Some(namespace) = error.namespace() {
                    detail.insert("namespace".to_string(), Value::String(namespace.to_string()));
                }
            }
            Category::General => {}
        }

        log_success!(codes::success::ERROR_CLASSIFIED, "Error classified",
            "category" => category, "detail_fields" => classified.detail.len());
        classified
    }
}

/// Message prefix examined by pattern matching
pub fn scan_window(message: &str) -> &str {
    if message.len() <= MAX_MESSAGE_SCAN {
        return message;
    }
    let mut cut = MAX_MESSAGE_SCAN;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    log_debug!("Message scan truncated",
        "code" => codes::classify::MESSAGE_SCAN_TRUNCATED, "length" => message.len());
    &message[..cut]
}

static UNEXPECTED_REGEX: OnceLock<Regex> = OnceLock::new();
static EXPECTED_REGEX: OnceLock<Regex> = OnceLock::new();
static WORD_REGEX: OnceLock<Regex> = OnceLock::new();

fn unexpected_regex() -> &'static Regex {
    UNEXPECTED_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)unexpected\s+(?:token\s+)?(?:'([^']*)'|"([^"]*)"|([^\s,]+))"#)
            .expect("Failed to compile unexpected-token regex")
    })
}

fn expected_regex() -> &'static Regex {
    EXPECTED_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)\bexpect(?:ing|ed)\s+(?:'([^']*)'|"([^"]*)"|([^\s,]+))"#)
            .expect("Failed to compile expected-token regex")
    })
}

fn word_regex() -> &'static Regex {
    WORD_REGEX.get_or_init(|| Regex::new(r"[a-z_]+").expect("Failed to compile word regex"))
}

/// Quoted tokens are kept as written; bare words lose trailing punctuation
fn first_token(regex: &Regex, message: &str) -> Option<String> {
    let captures = regex.captures(message)?;
    let token = match (captures.get(1), captures.get(2), captures.get(3)) {
        (Some(quoted), _, _) | (None, Some(quoted), _) => quoted.as_str(),
        (None, None, Some(bare)) => bare.as_str().trim_end_matches(['.', ';']),
        _ => return None,
    };
    (!token.is_empty()).then(|| token.to_string())
}

fn add_syntax_detail(message: &str, detail: &mut BTreeMap<String, Value>) {
    if let Some(token) = first_token(unexpected_regex(), message) {
        detail.insert("unexpected".to_string(), Value::String(token));
    }
    if let Some(token) = first_token(expected_regex(), message) {
        detail.insert("expected".to_string(), Value::String(token));
    }
}

fn add_database_detail(message: &str, detail: &mut BTreeMap<String, Value>) {
    let parsed = parse_database_message(message);
    if let Some(sqlstate) = parsed.sqlstate {
        detail.insert("sqlstate".to_string(), Value::String(sqlstate));
    }
    if let Some(description) = parsed.error_description {
        detail.insert("error_description".to_string(), Value::String(description.to_string()));
    }
    if let Some(sql) = parsed.sql {
        detail.insert("sql".to_string(), Value::String(sql));
    }
    if let Some(driver_message) = parsed.driver_message {
        detail.insert("driver_message".to_string(), Value::String(driver_message));
    }
}

/// Rule names mentioned in a validation message, in table order
pub fn validation_rules(message: &str) -> Vec<&'static str> {
    let lower = message.to_lowercase();
    let words: Vec<&str> = word_regex().find_iter(&lower).map(|m| m.as_str()).collect();
    VALIDATION_RULES
        .iter()
        .copied()
        .filter(|rule| words.contains(rule))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn classify(kind: &str, message: &str) -> ClassifiedError {
        ErrorClassifier::default().classify(&ErrorDescriptor::new(kind, message, "/srv/app/x.php", 3))
    }

    #[test]
    fn test_detection_order() {
        assert_matches!(classify("ParseError", "syntax error, unexpected '}'").category, Category::Syntax);
        assert_matches!(classify("PDOException", "could not connect").category, Category::Database);
        assert_matches!(
            classify("Illuminate\\Database\\QueryException", "SQLSTATE[23000]: Integrity").category,
            Category::Database
        );
        assert_matches!(classify("RuntimeException", "Route not found: /x").category, Category::NotFound);
        assert_matches!(classify("RuntimeException", "404 page").category, Category::NotFound);
        assert_matches!(classify("RuntimeException", "Validation failed").category, Category::Validation);
        assert_matches!(classify("App\\Exceptions\\PaymentDeclined", "declined").category, Category::Custom);
        assert_matches!(classify("AuthenticationException", "nope").category, Category::Custom);
        assert_matches!(classify("RuntimeException", "boom").category, Category::General);
        assert_matches!(classify("", "boom").category, Category::General);
    }

    #[test]
    fn test_not_found_markers_are_case_sensitive() {
        assert_matches!(classify("RuntimeException", "page not found").category, Category::General);
    }

    #[test]
    fn test_sqlstate_mapping() {
        let classified = classify(
            "Illuminate\\Database\\QueryException",
            "SQLSTATE[42S02]: Base table or view not found: 1146 Table 'app.posts' doesn't exist (SQL: select * from posts)",
        );
        assert_eq!(classified.category, Category::Database);
        assert_eq!(classified.detail_str("sqlstate"), Some("42S02"));
        assert_eq!(classified.detail_str("error_description"), Some("Base table or view not found"));
        assert_eq!(classified.detail_str("sql"), Some("select * from posts"));
        assert_eq!(classified.detail_str("error_class"), Some("QueryException"));
    }

    #[test]
    fn test_database_message_without_sqlstate_omits_fields() {
        let classified = classify("PDOException", "database is locked");
        assert_eq!(classified.detail_str("sqlstate"), None);
        assert_eq!(classified.detail_str("error_description"), None);
    }

    #[test]
    fn test_not_found_detail_uses_route_table() {
        let classifier = ErrorClassifier::new(RouteTable::new(vec![
            Route::new("GET", "/users"),
            Route::new("GET", "/users/{id}"),
        ]));
        let classified = classifier.classify(&ErrorDescriptor::new(
            "NotFoundHttpException",
            "Route not found: /user",
            "web.php",
            1,
        ));
        assert_eq!(classified.category, Category::NotFound);
        assert_eq!(classified.detail_str("requested_url"), Some("/user"));
        assert_eq!(classified.detail["similar_routes"][0]["path"], "/users");
    }

    #[test]
    fn test_syntax_tokens() {
        let classified = classify("ParseError", "syntax error, unexpected '}', expecting ';'");
        assert_eq!(classified.detail_str("unexpected"), Some("}"));
        assert_eq!(classified.detail_str("expected"), Some(";"));

        let php8 = classify("ParseError", "syntax error, unexpected token \")\", expecting variable");
        assert_eq!(php8.detail_str("unexpected"), Some(")"));
        assert_eq!(php8.detail_str("expected"), Some("variable"));
    }

    #[test]
    fn test_validation_and_custom_detail() {
        let validation = classify("ValidationException", "The email field is required.");
        assert_eq!(validation.detail["rules"], json!(["required", "email"]));

        let custom = ErrorClassifier::default()
            .classify(&ErrorDescriptor::new("App\\Billing\\CardDeclined", "no", "a.php", 1).with_code(402));
        assert_eq!(custom.detail_str("namespace"), Some("App\\Billing"));
        assert_eq!(custom.detail["code"], json!(402));
    }

    #[test]
    fn test_long_messages_are_scanned_partially() {
        let message = format!("{}SQLSTATE[42S02]", "é".repeat(MAX_MESSAGE_SCAN));
        assert!(scan_window(&message).len() <= MAX_MESSAGE_SCAN);
        assert_matches!(classify("RuntimeException", &message).category, Category::General);
    }
}
