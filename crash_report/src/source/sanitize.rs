//! Allow-list sanitizer for highlighted markup
//!
//! Keeps only `span`, `code` and `pre` tags, and on them only a `class`
//! attribute whose value is made of letters, digits, `_`, `-` and whitespace.
//! `<script>` and `<style>` elements are removed with their content; every
//! other tag is dropped while its text is kept. Stray angle brackets in text
//! are escaped.

use regex::Regex;
use std::sync::OnceLock;

const ALLOWED_TAGS: &[&str] = &["span", "code", "pre"];

static STRIP_BLOCK_REGEX: OnceLock<Regex> = OnceLock::new();
static UNTERMINATED_BLOCK_REGEX: OnceLock<Regex> = OnceLock::new();
static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static ATTR_REGEX: OnceLock<Regex> = OnceLock::new();
static CLASS_VALUE_REGEX: OnceLock<Regex> = OnceLock::new();

fn strip_block_regex() -> &'static Regex {
    STRIP_BLOCK_REGEX.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
            .expect("Failed to compile script/style block regex")
    })
}

fn unterminated_block_regex() -> &'static Regex {
    UNTERMINATED_BLOCK_REGEX.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b.*$")
            .expect("Failed to compile unterminated block regex")
    })
}

fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| {
        Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9-]*)([^<>]*)>").expect("Failed to compile tag regex")
    })
}

fn attr_regex() -> &'static Regex {
    ATTR_REGEX.get_or_init(|| {
        Regex::new(
            r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#,
        )
        .expect("Failed to compile attribute regex")
    })
}

fn class_value_regex() -> &'static Regex {
    CLASS_VALUE_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_\-\s]*$").expect("Failed to compile class value regex")
    })
}

/// Sanitize markup down to the allow-list
pub fn sanitize_markup(markup: &str) -> String {
    let without_blocks = strip_block_regex().replace_all(markup, "");
    let without_blocks = unterminated_block_regex().replace_all(&without_blocks, "");

    let mut output = String::with_capacity(without_blocks.len());
    let mut last = 0;

    for captures in tag_regex().captures_iter(&without_blocks) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        push_text(&mut output, &without_blocks[last..whole.start()]);
        last = whole.end();

        let closing = captures.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = captures
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();

        if !ALLOWED_TAGS.contains(&name.as_str()) {
            continue;
        }

        if closing {
            output.push_str("</");
            output.push_str(&name);
            output.push('>');
        } else {
            let attrs = captures.get(3).map(|m| m.as_str()).unwrap_or("");
            output.push('<');
            output.push_str(&name);
            if let Some(class) = allowed_class(attrs) {
                output.push_str(" class=\"");
                output.push_str(&class);
                output.push('"');
            }
            output.push('>');
        }
    }
    push_text(&mut output, &without_blocks[last..]);

    output
}

/// The first `class` attribute, if its value passes the allow-list
fn allowed_class(attrs: &str) -> Option<String> {
    for captures in attr_regex().captures_iter(attrs) {
        let name = captures.get(1)?.as_str();
        if !name.eq_ignore_ascii_case("class") {
            continue;
        }
        let value = captures
            .get(2)
            .or_else(|| captures.get(3))
            .or_else(|| captures.get(4))
            .map(|m| m.as_str())
            .unwrap_or("");
        return class_value_regex()
            .is_match(value)
            .then(|| value.split_whitespace().collect::<Vec<_>>().join(" "));
    }
    None
}

fn push_text(output: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            _ => output.push(c),
        }
    }
}
