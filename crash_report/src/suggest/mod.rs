//! Remediation suggestions
//!
//! A category-specific generator runs first, then every message is checked
//! against the operational pattern table. The combined list is deduplicated
//! in first-seen order and capped at `MAX_SUGGESTIONS`.

pub mod patterns;

use crate::classify::{scan_window, Category, ClassifiedError};
use crate::config::compile_time::suggestions::MAX_SUGGESTIONS;
use crate::descriptor::ErrorDescriptor;
use crate::log_debug;
use patterns::{
    exact_hints, matching_hints, CLASS_NOT_FOUND_HINTS, CUSTOM_TYPE_HINTS, EXPECTED_TOKEN_HINTS,
    GENERAL_HINTS, OPERATIONAL_HINTS, SQLSTATE_HINTS, UNEXPECTED_TOKEN_HINTS, VALIDATION_HINTS,
};
use serde_json::Value;
use std::collections::HashSet;

pub trait SuggestionEngine {
    fn suggest(&self, classified: &ClassifiedError, error: &ErrorDescriptor) -> Vec<String>;
}

/// Table-driven suggestion engine
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternSuggestionEngine;

impl PatternSuggestionEngine {
    pub fn new() -> Self {
        Self
    }

    fn category_hints(&self, classified: &ClassifiedError, error: &ErrorDescriptor, message: &str) -> Vec<String> {
        match classified.category {
            Category::Syntax => syntax_hints(classified, error),
            Category::Database => database_hints(classified, message),
            Category::NotFound => not_found_hints(classified),
            Category::Validation => validation_hints(classified),
            Category::Custom => custom_hints(error),
            Category::General => general_hints(message),
        }
    }
}

impl SuggestionEngine for PatternSuggestionEngine {
    fn suggest(&self, classified: &ClassifiedError, error: &ErrorDescriptor) -> Vec<String> {
        let message = scan_window(&error.message).to_lowercase();

        let mut candidates = self.category_hints(classified, error, &message);
        candidates.extend(matching_hints(OPERATIONAL_HINTS, &message).map(str::to_string));

        let total = candidates.len();
        let suggestions = dedupe_and_cap(candidates, MAX_SUGGESTIONS);
        log_debug!("Suggestions generated",
            "category" => classified.category, "candidates" => total, "kept" => suggestions.len());
        suggestions
    }
}

/// Drop repeats, keeping first occurrences in order, then cap
pub fn dedupe_and_cap(candidates: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.clone()))
        .take(cap)
        .collect()
}

fn to_owned(hints: &[&str]) -> Vec<String> {
    hints.iter().map(|h| h.to_string()).collect()
}

fn syntax_hints(classified: &ClassifiedError, error: &ErrorDescriptor) -> Vec<String> {
    let mut hints = Vec::new();
    if let Some(token) = classified.detail_str("unexpected") {
        hints.extend(to_owned(exact_hints(UNEXPECTED_TOKEN_HINTS, token)));
    }
    if let Some(token) = classified.detail_str("expected") {
        hints.extend(to_owned(exact_hints(EXPECTED_TOKEN_HINTS, token)));
    }
    if error.line > 0 {
        hints.push(format!(
            "Check the syntax on line {} and the lines just above it",
            error.line
        ));
    }
    hints.push("Run the file through a linter to locate the first syntax error".to_string());
    hints
}

fn database_hints(classified: &ClassifiedError, message: &str) -> Vec<String> {
    let mut hints = match classified.detail_str("sqlstate") {
        Some(sqlstate) => to_owned(exact_hints(SQLSTATE_HINTS, sqlstate)),
        None => vec!["Check the database connection settings".to_string()],
    };
    if message.contains("sql syntax") {
        hints.push("Check the SQL syntax near the quoted fragment of the query".to_string());
    }
    if classified.detail.contains_key("sql") {
        hints.push("Run the SQL statement shown above directly against the database".to_string());
    }
    hints
}

fn not_found_hints(classified: &ClassifiedError) -> Vec<String> {
    let mut hints = Vec::new();
    if let Some(Value::Array(routes)) = classified.detail.get("similar_routes") {
        for route in routes {
            if let (Some(method), Some(path)) = (
                route.get("method").and_then(Value::as_str),
                route.get("path").and_then(Value::as_str),
            ) {
                hints.push(format!("Did you mean {} {}?", method, path));
            }
        }
    }
    match classified.detail_str("requested_url") {
        Some(url) => hints.push(format!("Check that a route is registered for {}", url)),
        None => hints.push("Check that the requested page or resource exists".to_string()),
    }
    hints.push("Check that the HTTP method matches the registered route".to_string());
    hints
}

fn validation_hints(classified: &ClassifiedError) -> Vec<String> {
    let mut hints: Vec<String> = match classified.detail.get("rules") {
        Some(Value::Array(rules)) => rules
            .iter()
            .filter_map(Value::as_str)
            .flat_map(|rule| to_owned(exact_hints(VALIDATION_HINTS, rule)))
            .collect(),
        _ => Vec::new(),
    };
    hints.push("Review the validation rules for this request".to_string());
    hints
}

fn custom_hints(error: &ErrorDescriptor) -> Vec<String> {
    let kind = error.short_kind().to_lowercase();
    let mut hints: Vec<String> = matching_hints(CUSTOM_TYPE_HINTS, &kind)
        .map(str::to_string)
        .collect();
    if hints.is_empty() {
        hints.push(format!(
            "Look at where {} is thrown and the conditions that trigger it",
            error.short_kind()
        ));
    }
    hints
}

fn general_hints(message: &str) -> Vec<String> {
    let mut hints: Vec<String> = matching_hints(GENERAL_HINTS, message)
        .map(str::to_string)
        .collect();
    if message.contains("class") && message.contains("not found") {
        hints.extend(to_owned(CLASS_NOT_FOUND_HINTS));
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classifier, ErrorClassifier, Route, RouteTable};
    use patterns::MEMORY_HINT;

    fn suggest_for(classifier: &ErrorClassifier, error: &ErrorDescriptor) -> Vec<String> {
        let classified = classifier.classify(error);
        PatternSuggestionEngine::new().suggest(&classified, error)
    }

    fn suggest(kind: &str, message: &str) -> Vec<String> {
        suggest_for(&ErrorClassifier::default(), &ErrorDescriptor::new(kind, message, "/srv/app/a.php", 12))
    }

    #[test]
    fn test_syntax_suggestions() {
        let hints = suggest("ParseError", "syntax error, unexpected '}', expecting ';'");
        assert_eq!(hints[0], "Check for an extra closing brace '}' or a missing opening brace '{'");
        assert_eq!(hints[1], "Add the missing semicolon ';' at the end of the previous statement");
        assert!(hints.iter().any(|h| h.contains("line 12")));
    }

    #[test]
    fn test_database_suggestions_follow_sqlstate() {
        let hints = suggest("PDOException", "SQLSTATE[42S22]: Column not found: 1054 Unknown column 'nme'");
        assert_eq!(hints[0], "Check the column name in the query for typos");
    }

    #[test]
    fn test_not_found_suggests_near_routes_first() {
        let classifier = ErrorClassifier::new(RouteTable::new(vec![
            Route::new("GET", "/users"),
            Route::new("GET", "/users/{id}"),
        ]));
        let error = ErrorDescriptor::new("NotFoundHttpException", "Route not found: /user", "web.php", 1);
        let hints = suggest_for(&classifier, &error);
        assert_eq!(hints[0], "Did you mean GET /users?");
        assert!(hints.contains(&"Check that a route is registered for /user".to_string()));
    }

    #[test]
    fn test_validation_and_custom_suggestions() {
        let hints = suggest("ValidationException", "The email field is required.");
        assert_eq!(hints[0], "Make sure every required field is sent with the request");
        assert_eq!(hints[1], "Check that the email address is well formed");

        let hints = suggest("App\\Auth\\AuthenticationException", "Unauthenticated.");
        assert!(hints[0].contains("logged in"));

        let hints = suggest("App\\Billing\\CardDeclined", "declined");
        assert_eq!(hints, vec!["Look at where CardDeclined is thrown and the conditions that trigger it"]);
    }

    #[test]
    fn test_general_and_operational_suggestions() {
        let hints = suggest("Error", "Class \"App\\Mailer\" not found");
        assert_eq!(hints[0], "Check the class name and its namespace import");

        let hints = suggest("Error", "Allowed memory size of 134217728 bytes exhausted");
        assert_eq!(hints, vec![MEMORY_HINT]);

        let hints = suggest("RuntimeException", "cURL error 7: Connection refused");
        assert_eq!(hints.len(), 2);
    }

    #[test]
    fn test_no_match_yields_empty_list() {
        assert!(suggest("RuntimeException", "boom").is_empty());
    }

    #[test]
    fn test_suggestion_cap_with_every_pattern() {
        let message = "Undefined variable $x; undefined index: a; undefined array key 1; undefined offset 2; \
            Call to undefined function foo(); Call to undefined method Bar::baz(); \
            Class Qux not found; method on null; Division by zero; Permission denied; \
            Allowed memory size exhausted; Maximum execution time exceeded; \
            No such file; failed to open stream; file not found; Connection refused; \
            timed out; timeout; cURL error; Could not resolve host";
        let hints = suggest("Error", message);

        assert!(hints.len() <= MAX_SUGGESTIONS);
        assert_eq!(hints.len(), MAX_SUGGESTIONS);
        let unique: HashSet<_> = hints.iter().collect();
        assert_eq!(unique.len(), hints.len());
    }

    #[test]
    fn test_database_suggestions_are_capped_with_operational_hints() {
        let message = "SQLSTATE[42S02]: Base table or view not found: 1146 check the manual for the right \
            SQL syntax; Allowed memory size exhausted; Maximum execution time exceeded; \
            failed to open stream: No such file; Connection refused; timed out after timeout; \
            cURL error 6: Could not resolve host (SQL: select * from users)";
        let error = ErrorDescriptor::new("PDOException", message, "/srv/app/a.php", 12);
        let classified = ErrorClassifier::default().classify(&error);
        assert_eq!(classified.category, Category::Database);

        let hints = PatternSuggestionEngine::new().suggest(&classified, &error);
        assert_eq!(hints.len(), MAX_SUGGESTIONS);
        let unique: HashSet<_> = hints.iter().collect();
        assert_eq!(unique.len(), hints.len());

        // Category hints come first; the overflow drops the last operational ones
        assert_eq!(hints[0], "Run the pending database migrations");
        assert_eq!(hints[4], MEMORY_HINT);
        assert!(!hints.contains(&"Check network connectivity and the remote URL".to_string()));
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let deduped = dedupe_and_cap(
            vec!["b".to_string(), "a".to_string(), "b".to_string(), "c".to_string()],
            2,
        );
        assert_eq!(deduped, vec!["b", "a"]);
    }
}
