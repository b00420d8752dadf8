//! Remediation hint tables
//!
//! Patterns are matched case-insensitively against the error message (or a
//! classifier token). Hints must be stable, specific and never destructive.

/// Hints attached to a message pattern
#[derive(Debug, Clone, Copy)]
pub struct PatternHint {
    pub pattern: &'static str,
    pub hints: &'static [&'static str],
}

const fn hint(pattern: &'static str, hints: &'static [&'static str]) -> PatternHint {
    PatternHint { pattern, hints }
}

pub const MEMORY_HINT: &str =
    "Raise the memory limit or process the data in smaller batches";
pub const EXECUTION_TIME_HINT: &str =
    "Speed up the slow operation or move it to a background job";
pub const MISSING_FILE_HINT: &str = "Check that the file path exists and is readable";
pub const PERMISSION_HINT: &str =
    "Check file and directory permissions for the user running the application";

/// Keyed on the classifier's `unexpected` token
pub const UNEXPECTED_TOKEN_HINTS: &[PatternHint] = &[
    hint("}", &["Check for an extra closing brace '}' or a missing opening brace '{'"]),
    hint("{", &["Check the statement before the '{': a ')' or ';' is probably missing"]),
    hint(")", &["Check for an extra ')' or a missing '('"]),
    hint("(", &["Check the expression before the '(' for a missing operator or ';'"]),
    hint("end of file", &["A block is never closed: look for a missing '}' near the end of the file"]),
    hint("end", &["A block is never closed: look for a missing '}' near the end of the file"]),
    hint("variable", &["A ';' or operator is probably missing before this variable"]),
    hint("=", &["Check the left side of the assignment; '==' may have been intended"]),
];

/// Keyed on the classifier's `expected` token
pub const EXPECTED_TOKEN_HINTS: &[PatternHint] = &[
    hint(";", &["Add the missing semicolon ';' at the end of the previous statement"]),
    hint(")", &["Check that every '(' has a matching ')'"]),
    hint("(", &["Add the missing '(' after the function or control keyword"]),
    hint("]", &["Check that every '[' has a matching ']'"]),
    hint("{", &["Add the missing '{' to open the block"]),
];

/// Keyed on SQLSTATE
pub const SQLSTATE_HINTS: &[PatternHint] = &[
    hint("23000", &[
        "A unique or foreign key constraint was violated: look for duplicate values or missing parent rows",
        "Validate the input before writing, or use an upsert",
    ]),
    hint("23505", &[
        "A unique or foreign key constraint was violated: look for duplicate values or missing parent rows",
        "Validate the input before writing, or use an upsert",
    ]),
    hint("42S02", &[
        "Run the pending database migrations",
        "Check the table name in the query for typos",
    ]),
    hint("42S22", &[
        "Check the column name in the query for typos",
        "Run the pending database migrations to add the column",
    ]),
    hint("08006", &[
        "Check the database host, port and credentials in the configuration",
        "Make sure the database server is running and reachable",
    ]),
    hint("28000", &[
        "Check the database host, port and credentials in the configuration",
        "Make sure the database server is running and reachable",
    ]),
    hint("22001", &["The value is longer than the column allows: validate its length or widen the column"]),
];

/// Keyed on validation rule names found by the classifier
pub const VALIDATION_HINTS: &[PatternHint] = &[
    hint("required", &["Make sure every required field is sent with the request"]),
    hint("email", &["Check that the email address is well formed"]),
    hint("numeric", &["Send a number for numeric fields"]),
    hint("integer", &["Send a whole number for integer fields"]),
    hint("min", &["Check the minimum length or size of the field"]),
    hint("max", &["Check the maximum length or size of the field"]),
    hint("between", &["Check that the value lies within the allowed range"]),
    hint("size", &["Check the exact size required for the field"]),
    hint("unique", &["The value is already taken; choose a different one"]),
    hint("confirmed", &["The confirmation field must match the original field"]),
    hint("date", &["Send a valid date in the expected format"]),
];

/// Keyed on the short type name of application errors
pub const CUSTOM_TYPE_HINTS: &[PatternHint] = &[
    hint("authorization", &["Check the roles and permissions granted to the current user for this action"]),
    hint("permission", &["Check the roles and permissions granted to the current user for this action"]),
    hint("auth", &[
        "Check that the user is logged in and the session or token is still valid",
        "Verify the authentication guard configured for this route",
    ]),
    hint("notfound", &["Check that the requested record exists before using it"]),
];

/// Message patterns for errors without a more specific category
pub const GENERAL_HINTS: &[PatternHint] = &[
    hint("undefined variable", &["Define the variable before using it, or check its spelling"]),
    hint("undefined index", &["Check that the array key exists before reading it"]),
    hint("undefined array key", &["Check that the array key exists before reading it"]),
    hint("undefined offset", &["Check the array length before reading by position"]),
    hint("call to undefined function", &["Check the function name, or load the file that defines it"]),
    hint("call to undefined method", &["Check the method name against the object's class"]),
    hint("on null", &["A value is null where an object was expected: check the lookup that produced it"]),
    hint("division by zero", &["Guard the division against a zero divisor"]),
    hint("permission denied", &[PERMISSION_HINT]),
    hint("allowed memory size", &[MEMORY_HINT]),
    hint("maximum execution time", &[EXECUTION_TIME_HINT]),
];

/// Class-not-found needs two markers, so it is matched separately
pub const CLASS_NOT_FOUND_HINTS: &[&str] = &[
    "Check the class name and its namespace import",
    "Regenerate the autoloader so new classes are found",
];

/// Operational patterns checked for every error
pub const OPERATIONAL_HINTS: &[PatternHint] = &[
    hint("memory", &[MEMORY_HINT]),
    hint("execution time", &[EXECUTION_TIME_HINT]),
    hint("no such file", &[MISSING_FILE_HINT]),
    hint("failed to open stream", &[MISSING_FILE_HINT]),
    hint("file not found", &[MISSING_FILE_HINT]),
    hint("connection refused", &["Make sure the target service is running and accepting connections"]),
    hint("timed out", &["The operation timed out: check network latency or raise the timeout"]),
    hint("timeout", &["The operation timed out: check network latency or raise the timeout"]),
    hint("curl error", &["Check network connectivity and the remote URL"]),
    hint("could not resolve host", &["Check network connectivity and the remote URL"]),
];

/// Hints of every entry whose pattern occurs in `haystack` (already lower-cased)
pub fn matching_hints<'a>(table: &'a [PatternHint], haystack: &'a str) -> impl Iterator<Item = &'static str> + 'a {
    table
        .iter()
        .filter(move |entry| haystack.contains(entry.pattern))
        .flat_map(|entry| entry.hints.iter().copied())
}

/// Hints of the entry whose pattern equals `key` exactly
pub fn exact_hints(table: &[PatternHint], key: &str) -> &'static [&'static str] {
    table
        .iter()
        .find(|entry| entry.pattern.eq_ignore_ascii_case(key))
        .map(|entry| entry.hints)
        .unwrap_or(&[])
}
