//! Source window extraction
//!
//! Turns a (file, line) pair into a bounded window of highlighted lines.
//! Every rejection is reported through [`SourceWindow::error`]; extraction
//! never fails the surrounding report.

pub mod highlight;
pub mod reader;
pub mod sanitize;

use crate::config::compile_time::source::{FULL_LOAD_THRESHOLD, MAX_FILE_SIZE};
use crate::config::runtime::{clamp_context_lines, ReportPreferences};
use crate::html::SafeHtml;
use crate::logging::codes;
use crate::{log_debug, log_success, log_warning};
use highlight::Highlighter;
use reader::RawLine;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Appended to a line cut at the length limit
pub const TRUNCATION_MARKER: &str = " [... line truncated]";

/// Source extraction failures, surfaced as the window's `error` text
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("Source display is disabled")]
    Disabled,

    #[error("Invalid file path")]
    EmptyPath,

    #[error("Path traversal is not allowed: {path}")]
    PathTraversal { path: String },

    #[error("File is outside the project root: {path}")]
    OutsideProjectRoot { path: String },

    #[error("Unable to read file: {path}")]
    Unreadable { path: String, message: String },

    #[error("Line {line} is beyond the end of file")]
    LineBeyondEnd { line: u32 },
}

impl SourceError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            SourceError::Disabled => codes::source::SOURCE_DISABLED,
            SourceError::EmptyPath | SourceError::Unreadable { .. } => codes::source::UNREADABLE,
            SourceError::PathTraversal { .. } => codes::source::PATH_TRAVERSAL,
            SourceError::OutsideProjectRoot { .. } => codes::source::OUTSIDE_PROJECT_ROOT,
            SourceError::LineBeyondEnd { .. } => codes::source::LINE_OUT_OF_RANGE,
        }
    }
}

/// One displayed source line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRecord {
    pub number: u32,
    pub raw_content: String,
    pub highlighted_html: SafeHtml,
}

/// A bounded slice of a source file around one line
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceWindow {
    pub start_line: u32,
    pub end_line: u32,
    pub highlighted_line: u32,
    pub lines: BTreeMap<u32, LineRecord>,
    pub error: Option<String>,
}

impl SourceWindow {
    /// Window carrying only an error
    pub fn failed(line: u32, error: impl Into<String>) -> Self {
        Self {
            start_line: line,
            end_line: line,
            highlighted_line: line,
            lines: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Produces source windows
pub trait SourceExtractor {
    fn extract(&self, file: &str, line: u32, context_lines: Option<u32>) -> SourceWindow;
}

/// Reads windows from the local file system, confined to a project root
#[derive(Debug, Clone)]
pub struct FileSourceExtractor {
    show_source: bool,
    default_context_lines: u32,
    project_root: PathBuf,
}

impl FileSourceExtractor {
    pub fn new(preferences: &ReportPreferences) -> Self {
        Self {
            show_source: preferences.show_source,
            default_context_lines: clamp_context_lines(preferences.context_lines),
            project_root: preferences.effective_project_root(),
        }
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn try_extract(&self, file: &str, line: u32, context: u32) -> Result<SourceWindow, SourceError> {
        if !self.show_source {
            return Err(SourceError::Disabled);
        }

        let path = self.validate_path(file)?;
        let size = fs::metadata(&path)
            .map_err(|e| SourceError::Unreadable {
                path: file.to_string(),
                message: e.to_string(),
            })?
            .len();

        let start = line.saturating_sub(context).max(1);
        let end = line.saturating_add(context);

        if size > MAX_FILE_SIZE {
            log_warning!(codes::source::FILE_TOO_LARGE, "Source file too large to display",
                "file" => file, "size" => size, "limit" => MAX_FILE_SIZE);
            return Ok(placeholder_window(line, size));
        }

        let mut highlighter = Highlighter::for_path(&path);
        let prime = |line: &str| highlighter.prime(line);
        let read = if size <= FULL_LOAD_THRESHOLD {
            reader::read_window_full(&path, start, end, prime)
        } else {
            reader::read_window_streaming(&path, start, end, prime)
        };
        let raw_lines = read.map_err(|e| SourceError::Unreadable {
            path: file.to_string(),
            message: e.to_string(),
        })?;

        if !raw_lines.iter().any(|l| l.number == line) {
            return Err(SourceError::LineBeyondEnd { line });
        }

        let mut lines = BTreeMap::new();
        for raw in raw_lines {
            let record = build_record(&mut highlighter, raw, file);
            lines.insert(record.number, record);
        }

        let end_line = lines.keys().next_back().copied().unwrap_or(line);
        log_success!(codes::success::SOURCE_EXTRACTED, "Source window extracted",
            "file" => file, "start" => start, "end" => end_line);

        Ok(SourceWindow {
            start_line: start,
            end_line,
            highlighted_line: line,
            lines,
            error: None,
        })
    }

    /// Reject traversal segments, then require the real path under the root
    fn validate_path(&self, file: &str) -> Result<PathBuf, SourceError> {
        if file.trim().is_empty() {
            return Err(SourceError::EmptyPath);
        }

        if file.split(['/', '\\']).any(|segment| segment == "..") {
            return Err(SourceError::PathTraversal {
                path: file.to_string(),
            });
        }

        let candidate = Path::new(file);
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.project_root.join(candidate)
        };

        let canonical = candidate
            .canonicalize()
            .map_err(|e| SourceError::Unreadable {
                path: file.to_string(),
                message: e.to_string(),
            })?;

        let root = self
            .project_root
            .canonicalize()
            .map_err(|_| SourceError::OutsideProjectRoot {
                path: file.to_string(),
            })?;

        if !canonical.starts_with(&root) {
            return Err(SourceError::OutsideProjectRoot {
                path: file.to_string(),
            });
        }

        if !canonical.is_file() {
            return Err(SourceError::Unreadable {
                path: file.to_string(),
                message: "not a regular file".to_string(),
            });
        }

        log_debug!("Source path validated", "canonical_path" => canonical.display());
        Ok(canonical)
    }
}

impl SourceExtractor for FileSourceExtractor {
    fn extract(&self, file: &str, line: u32, context_lines: Option<u32>) -> SourceWindow {
        let line = line.max(1);
        let context = clamp_context_lines(context_lines.unwrap_or(self.default_context_lines));

        match self.try_extract(file, line, context) {
            Ok(window) => window,
            Err(error) => {
                let detail = match &error {
                    SourceError::Unreadable { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                log_warning!(error.error_code(), "Source window unavailable",
                    "file" => file, "line" => line, "reason" => detail);
                SourceWindow::failed(line, error.to_string())
            }
        }
    }
}

fn placeholder_window(line: u32, size: u64) -> SourceWindow {
    let text = format!(
        "[File too large to display: {} bytes, limit {} bytes]",
        size, MAX_FILE_SIZE
    );
    let mut lines = BTreeMap::new();
    lines.insert(
        line,
        LineRecord {
            number: line,
            highlighted_html: SafeHtml::escape(&text),
            raw_content: text,
        },
    );
    SourceWindow {
        start_line: line,
        end_line: line,
        highlighted_line: line,
        lines,
        error: None,
    }
}

fn build_record(highlighter: &mut Highlighter, raw: RawLine, file: &str) -> LineRecord {
    let highlighted = match highlighter.highlight_line(&raw.text) {
        Ok(markup) => SafeHtml::from_sanitized(sanitize::sanitize_markup(&markup)),
        Err(e) => {
            log_warning!(codes::source::HIGHLIGHT_FAILED, "Highlighting failed, using plain text",
                "file" => file, "line" => raw.number, "error" => e);
            SafeHtml::escape(&raw.text)
        }
    };

    let (raw_content, highlighted_html) = if raw.truncated {
        log_debug!("Source line truncated", "file" => file, "line" => raw.number);
        (
            format!("{}{}", raw.text, TRUNCATION_MARKER),
            SafeHtml::from_sanitized(format!(
                "{}<span class=\"hl-truncated\">{}</span>",
                highlighted,
                crate::html::escape_html(TRUNCATION_MARKER)
            )),
        )
    } else {
        (raw.text, highlighted)
    };

    LineRecord {
        number: raw.number,
        raw_content,
        highlighted_html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::compile_time::source::MAX_LINE_LENGTH;
    use crate::logging::service::create_test_service;
    use crate::logging::with_scoped_logger;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn project_with(files: &[(&str, &str)]) -> (TempDir, FileSourceExtractor) {
        let dir = tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        let extractor =
            FileSourceExtractor::new(&ReportPreferences::default()).with_project_root(dir.path());
        (dir, extractor)
    }

    fn numbered(count: usize) -> String {
        (1..=count).map(|i| format!("$line{} = {};\n", i, i)).collect()
    }

    #[test]
    fn test_window_around_line() {
        let (dir, extractor) = project_with(&[("app/index.php", &format!("<?php\n{}", numbered(30)))]);
        let file = dir.path().join("app/index.php");
        let window = extractor.extract(file.to_str().unwrap(), 15, Some(3));

        assert!(window.is_ok(), "{:?}", window.error);
        assert_eq!(window.start_line, 12);
        assert_eq!(window.end_line, 18);
        assert_eq!(window.highlighted_line, 15);
        assert_eq!(window.lines.len(), 7);
        assert_eq!(window.lines[&15].raw_content, "$line14 = 14;");
        assert!(window.lines[&15]
            .highlighted_html
            .as_str()
            .starts_with("<span class=\"hl-variable\">$line14</span>"));
    }

    #[test]
    fn test_mid_file_window_keeps_highlighter_state() {
        let content = format!("<?php\n{}/*\n * long header\n{}*/\n$after = 1;\n", numbered(10), " * more\n".repeat(10));
        let (dir, extractor) = project_with(&[("lib.php", &content)]);
        let file = dir.path().join("lib.php");

        let inside = extractor.extract(file.to_str().unwrap(), 20, Some(0));
        assert!(inside.lines[&20]
            .highlighted_html
            .as_str()
            .starts_with("<span class=\"hl-comment\">"));

        let after = extractor.extract(file.to_str().unwrap(), 25, Some(0));
        assert_eq!(after.lines[&25].raw_content, "$after = 1;");
        assert!(after.lines[&25]
            .highlighted_html
            .as_str()
            .starts_with("<span class=\"hl-variable\">$after</span>"));
    }

    #[test]
    fn test_end_clamps_to_file_length_and_start_to_one() {
        let (dir, extractor) = project_with(&[("a.py", "x = 1\ny = 2\nz = 3\n")]);
        let file = dir.path().join("a.py");
        let window = extractor.extract(file.to_str().unwrap(), 2, Some(10));
        assert_eq!(window.start_line, 1);
        assert_eq!(window.end_line, 3);
        assert!(window.lines.len() <= 2 * 10 + 1);
    }

    #[test]
    fn test_context_lines_are_clamped() {
        let (dir, extractor) = project_with(&[("big.rs", &"fn x() {}\n".repeat(500))]);
        let file = dir.path().join("big.rs");
        let window = extractor.extract(file.to_str().unwrap(), 250, Some(1000));
        assert_eq!(window.lines.len(), 101);
    }

    #[test]
    fn test_no_traversal() {
        let (dir, extractor) = project_with(&[("app/a.php", "<?php\n")]);
        let sneaky = format!("{}/app/../app/a.php", dir.path().display());
        let window = extractor.extract(&sneaky, 1, None);
        assert!(window.error.as_deref().unwrap().contains("traversal"));
        assert!(window.lines.is_empty());

        let outside = tempdir().unwrap();
        let foreign = outside.path().join("secret.php");
        fs::write(&foreign, "<?php $password = 'x';\n").unwrap();
        let window = extractor.extract(foreign.to_str().unwrap(), 1, None);
        assert!(window.error.as_deref().unwrap().contains("outside the project root"));
        assert!(window.lines.is_empty());
    }

    #[test]
    fn test_rejected_paths_are_logged_with_codes() {
        let (dir, extractor) = project_with(&[("app/a.php", "<?php\n")]);
        let outside = tempdir().unwrap();
        let foreign = outside.path().join("secret.php");
        fs::write(&foreign, "<?php\n").unwrap();

        let (service, memory) = create_test_service();
        with_scoped_logger(Arc::new(service), || {
            extractor.extract(&format!("{}/app/../app/a.php", dir.path().display()), 1, None);
            extractor.extract(foreign.to_str().unwrap(), 1, None);
        });

        assert!(memory.has_warning_with_code(codes::source::PATH_TRAVERSAL));
        assert!(memory.has_warning_with_code(codes::source::OUTSIDE_PROJECT_ROOT));
        let traversal = &memory.get_events_with_code(codes::source::PATH_TRAVERSAL)[0];
        assert_eq!(traversal.context["line"], "1");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escaping_root_is_rejected() {
        let (dir, extractor) = project_with(&[]);
        let outside = tempdir().unwrap();
        let target = outside.path().join("t.php");
        fs::write(&target, "<?php\n").unwrap();
        let link = dir.path().join("link.php");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let window = extractor.extract(link.to_str().unwrap(), 1, None);
        assert!(window.error.is_some());
        assert!(window.lines.is_empty());
    }

    #[test]
    fn test_missing_file_and_disabled_source() {
        let (dir, extractor) = project_with(&[("a.php", "<?php\n")]);
        let missing = dir.path().join("nope.php");
        let window = extractor.extract(missing.to_str().unwrap(), 1, None);
        assert!(window.error.is_some());

        let disabled = FileSourceExtractor::new(&ReportPreferences {
            show_source: false,
            ..Default::default()
        })
        .with_project_root(dir.path());
        let file = dir.path().join("a.php");
        let window = disabled.extract(file.to_str().unwrap(), 1, None);
        assert_eq!(window.error.as_deref(), Some("Source display is disabled"));
    }

    #[test]
    fn test_line_beyond_end_of_file() {
        let (dir, extractor) = project_with(&[("a.php", "<?php\necho 1;\n")]);
        let file = dir.path().join("a.php");
        let window = extractor.extract(file.to_str().unwrap(), 9, Some(2));
        assert_eq!(
            window.error.as_deref(),
            Some("Line 9 is beyond the end of file")
        );
        assert!(window.lines.is_empty());
    }

    #[test]
    fn test_line_zero_is_treated_as_one() {
        let (dir, extractor) = project_with(&[("a.js", "let a = 1;\n")]);
        let file = dir.path().join("a.js");
        let window = extractor.extract(file.to_str().unwrap(), 0, Some(0));
        assert_eq!(window.highlighted_line, 1);
        assert_eq!(window.lines.len(), 1);
    }

    #[test]
    fn test_relative_paths_resolve_under_root() {
        let (_dir, extractor) = project_with(&[("src/main.rs", "fn main() {}\n")]);
        let window = extractor.extract("src/main.rs", 1, Some(0));
        assert!(window.is_ok(), "{:?}", window.error);
        assert!(window.lines[&1]
            .highlighted_html
            .as_str()
            .contains("<span class=\"hl-keyword\">fn</span>"));
    }

    #[test]
    fn test_xss_containment() {
        let (dir, extractor) =
            project_with(&[("x.php", "<?php echo \"<script>alert(1)</script>\";\n")]);
        let file = dir.path().join("x.php");
        let window = extractor.extract(file.to_str().unwrap(), 1, Some(0));
        let html = window.lines[&1].highlighted_html.as_str();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_long_line_is_truncated_with_marker() {
        let long = format!("<?php $x = '{}';\n", "a".repeat(MAX_LINE_LENGTH + 100));
        let (dir, extractor) = project_with(&[("long.php", &long)]);
        let file = dir.path().join("long.php");
        let window = extractor.extract(file.to_str().unwrap(), 1, Some(0));
        let record = &window.lines[&1];
        assert!(record.raw_content.ends_with(TRUNCATION_MARKER));
        assert!(record.highlighted_html.as_str().contains("hl-truncated"));
    }

    #[test]
    fn test_streaming_path_for_large_files() {
        let line = format!("// {}\n", "y".repeat(200));
        let content = line.repeat((FULL_LOAD_THRESHOLD as usize / line.len()) + 50);
        let (dir, extractor) = project_with(&[("large.rs", &content)]);
        let file = dir.path().join("large.rs");
        let window = extractor.extract(file.to_str().unwrap(), 480, Some(2));
        assert!(window.is_ok(), "{:?}", window.error);
        assert_eq!(window.lines.len(), 5);
        assert!(window.lines[&480]
            .highlighted_html
            .as_str()
            .starts_with("<span class=\"hl-comment\">"));
    }
}
