//! SQL error detail extraction

use crate::log_warning;
use crate::logging::codes;
use regex::Regex;
use std::sync::OnceLock;

/// Description for SQLSTATE codes missing from the table
pub const UNKNOWN_DATABASE_ERROR: &str = "Unknown database error";

const SQLSTATE_DESCRIPTIONS: &[(&str, &str)] = &[
    ("23000", "Integrity constraint violation"),
    ("23505", "Integrity constraint violation"),
    ("42S02", "Base table or view not found"),
    ("42S22", "Column not found"),
    ("08006", "Connection failure"),
    ("28000", "Connection failure"),
    ("22001", "String data, right truncated"),
];

static SQLSTATE_REGEX: OnceLock<Regex> = OnceLock::new();
static SQL_REGEX: OnceLock<Regex> = OnceLock::new();
static DRIVER_MESSAGE_REGEX: OnceLock<Regex> = OnceLock::new();

fn sqlstate_regex() -> &'static Regex {
    SQLSTATE_REGEX.get_or_init(|| {
        Regex::new(r"SQLSTATE\[([0-9A-Z]{5})\]").expect("Failed to compile SQLSTATE regex")
    })
}

fn sql_regex() -> &'static Regex {
    SQL_REGEX.get_or_init(|| Regex::new(r"(?s)\(SQL:\s*(.*)\)").expect("Failed to compile SQL regex"))
}

fn driver_message_regex() -> &'static Regex {
    DRIVER_MESSAGE_REGEX.get_or_init(|| {
        Regex::new(r"(?s)SQLSTATE\[[0-9A-Z]{5}\]:?\s*(.*?)\s*(?:\(SQL:|$)")
            .expect("Failed to compile driver message regex")
    })
}

/// Parts of a database error message; absent parts did not match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseDetail {
    pub sqlstate: Option<String>,
    pub error_description: Option<&'static str>,
    pub sql: Option<String>,
    pub driver_message: Option<String>,
}

pub fn parse_database_message(message: &str) -> DatabaseDetail {
    let sqlstate = sqlstate_regex()
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let error_description = sqlstate.as_deref().map(describe_sqlstate);

    let sql = sql_regex()
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    let driver_message = driver_message_regex()
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty());

    DatabaseDetail {
        sqlstate,
        error_description,
        sql,
        driver_message,
    }
}

/// Human description of a SQLSTATE code
pub fn describe_sqlstate(code: &str) -> &'static str {
    match SQLSTATE_DESCRIPTIONS.iter().find(|(known, _)| *known == code) {
        Some((_, description)) => *description,
        None => {
            log_warning!(codes::classify::UNKNOWN_SQLSTATE, "Unmapped SQLSTATE", "sqlstate" => code);
            UNKNOWN_DATABASE_ERROR
        }
    }
}
