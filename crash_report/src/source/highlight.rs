//! Line-oriented syntax highlighter
//!
//! Produces `<span class="hl-*">` markup with every piece of source text
//! HTML-escaped. Block-comment and PHP open/close-tag state carries from one
//! line to the next, so a window must be highlighted in order.

use crate::config::compile_time::source::MAX_HIGHLIGHT_TOKENS_PER_LINE;
use crate::html::escape_html;
use std::path::Path;

/// Highlighting failures; the caller falls back to escaped plain text
#[derive(Debug, Clone, thiserror::Error)]
pub enum HighlightError {
    #[error("Too many tokens on one line: more than {limit}")]
    TooManyTokens { limit: usize },
}

/// Languages with a tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Php,
    Rust,
    JavaScript,
    Python,
    Plain,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("php" | "phtml" | "inc") => Language::Php,
            Some("rs") => Language::Rust,
            Some("js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx") => Language::JavaScript,
            Some("py" | "pyw") => Language::Python,
            _ => Language::Plain,
        }
    }

    fn syntax(&self) -> Option<&'static Syntax> {
        match self {
            Language::Php => Some(&PHP),
            Language::Rust => Some(&RUST),
            Language::JavaScript => Some(&JAVASCRIPT),
            Language::Python => Some(&PYTHON),
            Language::Plain => None,
        }
    }
}

struct Syntax {
    keywords: &'static [&'static str],
    case_insensitive_keywords: bool,
    line_comments: &'static [&'static str],
    block_comment: Option<(&'static str, &'static str)>,
    string_delimiters: &'static [char],
    variable_sigil: Option<char>,
}

const PHP: Syntax = Syntax {
    keywords: &[
        "abstract", "and", "array", "as", "break", "case", "catch", "class", "clone", "const",
        "continue", "declare", "default", "do", "echo", "else", "elseif", "empty", "enum",
        "extends", "false", "final", "finally", "fn", "for", "foreach", "function", "global",
        "if", "implements", "include", "include_once", "instanceof", "interface", "isset",
        "list", "match", "namespace", "new", "null", "or", "print", "private", "protected",
        "public", "readonly", "require", "require_once", "return", "static", "switch", "throw",
        "trait", "true", "try", "unset", "use", "var", "while", "yield",
    ],
    case_insensitive_keywords: true,
    line_comments: &["//", "#"],
    block_comment: Some(("/*", "*/")),
    string_delimiters: &['"', '\''],
    variable_sigil: Some('$'),
};

const RUST: Syntax = Syntax {
    keywords: &[
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
        "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
        "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super",
        "trait", "true", "type", "unsafe", "use", "where", "while",
    ],
    case_insensitive_keywords: false,
    line_comments: &["//"],
    block_comment: Some(("/*", "*/")),
    string_delimiters: &['"'],
    variable_sigil: None,
};

const JAVASCRIPT: Syntax = Syntax {
    keywords: &[
        "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
        "delete", "do", "else", "export", "extends", "false", "finally", "for", "from",
        "function", "if", "import", "in", "instanceof", "interface", "let", "new", "null",
        "of", "return", "static", "super", "switch", "this", "throw", "true", "try", "type",
        "typeof", "undefined", "var", "void", "while", "yield",
    ],
    case_insensitive_keywords: false,
    line_comments: &["//"],
    block_comment: Some(("/*", "*/")),
    string_delimiters: &['"', '\'', '`'],
    variable_sigil: None,
};

const PYTHON: Syntax = Syntax {
    keywords: &[
        "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
        "elif", "else", "except", "False", "finally", "for", "from", "global", "if", "import",
        "in", "is", "lambda", "None", "nonlocal", "not", "or", "pass", "raise", "return",
        "True", "try", "while", "with", "yield",
    ],
    case_insensitive_keywords: false,
    line_comments: &["#"],
    block_comment: None,
    string_delimiters: &['"', '\''],
    variable_sigil: None,
};

const OPERATOR_CHARS: &str = "+-*/%=<>!&|^~?:.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    BlockComment,
    /// PHP file content outside `<?php ... ?>`
    Markup,
}

/// Stateful highlighter for the lines of one file
pub struct Highlighter {
    language: Language,
    state: State,
}

impl Highlighter {
    pub fn new(language: Language) -> Self {
        let state = match language {
            Language::Php => State::Markup,
            _ => State::Code,
        };
        Self { language, state }
    }

    pub fn for_path(path: &Path) -> Self {
        Self::new(Language::from_path(path))
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Carry state across a line that is not displayed
    pub fn prime(&mut self, line: &str) {
        if self.language.syntax().is_some() {
            // Output is discarded; a line over the token limit keeps the state it reached
            let _ = self.highlight_line(line);
        }
    }

    /// Highlight one line; the result still needs sanitizing before display
    pub fn highlight_line(&mut self, line: &str) -> Result<String, HighlightError> {
        let Some(syntax) = self.language.syntax() else {
            return Ok(escape_html(line));
        };

        let mut out = String::with_capacity(line.len() * 2);
        let mut rest = line;
        let mut tokens = 0usize;

        while !rest.is_empty() {
            tokens += 1;
            if tokens > MAX_HIGHLIGHT_TOKENS_PER_LINE {
                return Err(HighlightError::TooManyTokens {
                    limit: MAX_HIGHLIGHT_TOKENS_PER_LINE,
                });
            }

            let consumed = match self.state {
                State::Markup => self.markup(rest, &mut out),
                State::BlockComment => self.block_comment_tail(syntax, rest, &mut out),
                State::Code => self.code_token(syntax, rest, &mut out),
            };
            rest = &rest[consumed..];
        }

        Ok(out)
    }

    fn markup(&mut self, rest: &str, out: &mut String) -> usize {
        match rest.find("<?") {
            Some(pos) => {
                out.push_str(&escape_html(&rest[..pos]));
                let tag = &rest[pos..];
                let tag_len = if tag
                    .get(..5)
                    .is_some_and(|open| open.eq_ignore_ascii_case("<?php"))
                {
                    5
                } else if tag.starts_with("<?=") {
                    3
                } else {
                    2
                };
                push_span(out, "hl-tag", &tag[..tag_len]);
                self.state = State::Code;
                pos + tag_len
            }
            None => {
                out.push_str(&escape_html(rest));
                rest.len()
            }
        }
    }

    fn block_comment_tail(&mut self, syntax: &Syntax, rest: &str, out: &mut String) -> usize {
        let end_marker = syntax.block_comment.map(|(_, end)| end).unwrap_or("*/");
        match rest.find(end_marker) {
            Some(pos) => {
                let len = pos + end_marker.len();
                push_span(out, "hl-comment", &rest[..len]);
                self.state = State::Code;
                len
            }
            None => {
                push_span(out, "hl-comment", rest);
                rest.len()
            }
        }
    }

    fn code_token(&mut self, syntax: &Syntax, rest: &str, out: &mut String) -> usize {
        if self.language == Language::Php && rest.starts_with("?>") {
            push_span(out, "hl-tag", "?>");
            self.state = State::Markup;
            return 2;
        }

        if let Some((start, end)) = syntax.block_comment {
            if rest.starts_with(start) {
                return match rest[start.len()..].find(end) {
                    Some(pos) => {
                        let len = start.len() + pos + end.len();
                        push_span(out, "hl-comment", &rest[..len]);
                        len
                    }
                    None => {
                        push_span(out, "hl-comment", rest);
                        self.state = State::BlockComment;
                        rest.len()
                    }
                };
            }
        }

        if syntax.line_comments.iter().any(|m| rest.starts_with(m)) {
            push_span(out, "hl-comment", rest);
            return rest.len();
        }

        let Some(first) = rest.chars().next() else {
            return 0;
        };

        if syntax.string_delimiters.contains(&first) {
            let len = string_length(rest, first);
            push_span(out, "hl-string", &rest[..len]);
            return len;
        }

        if first.is_ascii_digit() {
            let len = scan_while(rest, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            push_span(out, "hl-number", &rest[..len]);
            return len;
        }

        if Some(first) == syntax.variable_sigil {
            let name_len = scan_while(&rest[1..], is_identifier_char);
            if name_len > 0 {
                let len = 1 + name_len;
                push_span(out, "hl-variable", &rest[..len]);
                return len;
            }
        }

        if first.is_alphabetic() || first == '_' {
            let len = scan_while(rest, is_identifier_char);
            let word = &rest[..len];
            let is_keyword = if syntax.case_insensitive_keywords {
                syntax.keywords.iter().any(|k| k.eq_ignore_ascii_case(word))
            } else {
                syntax.keywords.contains(&word)
            };
            if is_keyword {
                push_span(out, "hl-keyword", word);
            } else {
                out.push_str(&escape_html(word));
            }
            return len;
        }

        if OPERATOR_CHARS.contains(first) {
            // `?>` must stay visible as a tag, so a PHP operator run stops before it
            let len = scan_while(rest, |c| OPERATOR_CHARS.contains(c));
            let len = match self.language {
                Language::Php => rest[..len].find("?>").unwrap_or(len).max(first.len_utf8()),
                _ => len,
            };
            push_span(out, "hl-operator", &rest[..len]);
            return len;
        }

        let len = first.len_utf8();
        out.push_str(&escape_html(&rest[..len]));
        len
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn scan_while(text: &str, predicate: impl Fn(char) -> bool) -> usize {
    text.char_indices()
        .find(|(_, c)| !predicate(*c))
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// Byte length of a string literal starting at `text[0]`, up to the end of
/// the line when unterminated
fn string_length(text: &str, delimiter: char) -> usize {
    let mut escaped = false;
    for (i, c) in text.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == delimiter {
            return i + c.len_utf8();
        }
    }
    text.len()
}

fn push_span(out: &mut String, class: &str, text: &str) {
    out.push_str("<span class=\"");
    out.push_str(class);
    out.push_str("\">");
    out.push_str(&escape_html(text));
    out.push_str("</span>");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_path(Path::new("a/b.PHP")), Language::Php);
        assert_eq!(Language::from_path(Path::new("main.rs")), Language::Rust);
        assert_eq!(Language::from_path(Path::new("x.tsx")), Language::JavaScript);
        assert_eq!(Language::from_path(Path::new("x.py")), Language::Python);
        assert_eq!(Language::from_path(Path::new("README")), Language::Plain);
    }

    #[test]
    fn test_php_line_tokens() {
        let mut highlighter = Highlighter::new(Language::Php);
        let out = highlighter
            .highlight_line("<?php echo $name . 'x'; // done")
            .unwrap();
        assert!(out.starts_with("<span class=\"hl-tag\">&lt;?php</span>"));
        assert!(out.contains("<span class=\"hl-keyword\">echo</span>"));
        assert!(out.contains("<span class=\"hl-variable\">$name</span>"));
        assert!(out.contains("<span class=\"hl-string\">&#39;x&#39;</span>"));
        assert!(out.contains("<span class=\"hl-comment\">// done</span>"));
    }

    #[test]
    fn test_php_script_string_is_escaped() {
        let mut highlighter = Highlighter::new(Language::Php);
        let out = highlighter
            .highlight_line(r#"<?php echo "<script>alert(1)</script>";"#)
            .unwrap();
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_php_markup_outside_tags_is_escaped() {
        let mut highlighter = Highlighter::new(Language::Php);
        let out = highlighter.highlight_line("<b>hi</b><?= $x ?><i>").unwrap();
        assert!(out.starts_with("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(out.contains("<span class=\"hl-tag\">&lt;?=</span>"));
        assert!(out.contains("<span class=\"hl-tag\">?&gt;</span>"));
        assert!(out.ends_with("&lt;i&gt;"));
    }

    #[test]
    fn test_block_comment_spans_lines() {
        let mut highlighter = Highlighter::new(Language::Rust);
        let first = highlighter.highlight_line("let a = 1; /* start").unwrap();
        let second = highlighter.highlight_line("still comment */ fn").unwrap();
        assert!(first.contains("<span class=\"hl-comment\">/* start</span>"));
        assert!(second.starts_with("<span class=\"hl-comment\">still comment */</span>"));
        assert!(second.contains("<span class=\"hl-keyword\">fn</span>"));
    }

    #[test]
    fn test_priming_carries_php_and_comment_state() {
        let mut highlighter = Highlighter::new(Language::Php);
        highlighter.prime("<?php");
        highlighter.prime("/* header");
        highlighter.prime("   still header */");
        let out = highlighter.highlight_line("$total = 1;").unwrap();
        assert!(out.starts_with("<span class=\"hl-variable\">$total</span>"));

        let mut highlighter = Highlighter::new(Language::Php);
        highlighter.prime("<?php /* open");
        let out = highlighter.highlight_line("$inside */ $x").unwrap();
        assert!(out.starts_with("<span class=\"hl-comment\">$inside */</span>"));
        assert!(out.contains("<span class=\"hl-variable\">$x</span>"));
    }

    #[test]
    fn test_plain_text_is_only_escaped() {
        let mut highlighter = Highlighter::new(Language::Plain);
        assert_eq!(highlighter.highlight_line("a<b").unwrap(), "a&lt;b");
    }

    #[test]
    fn test_token_limit() {
        let mut highlighter = Highlighter::new(Language::Python);
        let line = "a ".repeat(MAX_HIGHLIGHT_TOKENS_PER_LINE);
        assert!(highlighter.highlight_line(&line).is_err());
    }

    #[test]
    fn test_unterminated_string_runs_to_end_of_line() {
        let mut highlighter = Highlighter::new(Language::JavaScript);
        let out = highlighter.highlight_line("x = `open").unwrap();
        assert!(out.ends_with("<span class=\"hl-string\">`open</span>"));
    }
}
