//! HTML minification
//!
//! Removes comments and collapses whitespace. Content inside `pre`, `code`,
//! `textarea`, `script` and `style` elements is copied unchanged.

const PRESERVED_TAGS: &[&str] = &["pre", "code", "textarea", "script", "style"];

pub fn minify_html(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut position = 0;

    while let Some((start, tag)) = find_preserved_open(&lower, position) {
        collapse_into(&html[position..start], Some('<'), &mut out);
        let end = find_close(&lower, start, tag).unwrap_or(html.len());
        out.push_str(&html[start..end]);
        position = end;
    }
    collapse_into(&html[position..], None, &mut out);

    out.trim().to_string()
}

/// Byte offset and name of the next preserved opening tag at or after `from`.
/// Tags inside comments do not count.
fn find_preserved_open(lower: &str, from: usize) -> Option<(usize, &'static str)> {
    let mut offset = from;
    while let Some(found) = lower[offset..].find('<') {
        let start = offset + found;
        if lower[start..].starts_with("<!--") {
            let close = lower[start + 4..].find("-->")?;
            offset = start + 4 + close + 3;
            continue;
        }
        let after = &lower[start + 1..];
        for &tag in PRESERVED_TAGS {
            if let Some(tail) = after.strip_prefix(tag) {
                if tail.starts_with(|c: char| c == '>' || c.is_ascii_whitespace()) {
                    return Some((start, tag));
                }
            }
        }
        offset = start + 1;
    }
    None
}

/// Byte offset just past the closing tag of `tag` opened at `start`
fn find_close(lower: &str, start: usize, tag: &str) -> Option<usize> {
    let needle = format!("</{}", tag);
    let close = start + lower[start..].find(&needle)?;
    let end = lower[close..].find('>')?;
    Some(close + end + 1)
}

/// `followed_by` is the first character after the segment, if any
fn collapse_into(segment: &str, followed_by: Option<char>, out: &mut String) {
    let without_comments = strip_comments(segment);
    let mut chars = without_comments.chars().peekable();

    while let Some(c) = chars.next() {
        if !c.is_whitespace() {
            out.push(c);
            continue;
        }

        let mut saw_newline = c == '\n';
        while let Some(next) = chars.peek().copied().filter(|n| n.is_whitespace()) {
            saw_newline |= next == '\n';
            chars.next();
        }

        // Indentation between tags carries no content
        let next = chars.peek().copied().or(followed_by);
        let between_tags = out.ends_with('>') && next == Some('<');
        if !(saw_newline && between_tags) && !out.is_empty() {
            out.push(' ');
        }
    }
}

fn strip_comments(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start + 4..].find("-->") {
            Some(end) => rest = &rest[start + 4 + end + 3..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace_and_strips_comments() {
        let html = "<div>\n    <!-- note -->\n    <p>Hello   world</p>\n</div>\n";
        assert_eq!(minify_html(html), "<div><p>Hello world</p></div>");
    }

    #[test]
    fn test_inline_spacing_is_kept() {
        assert_eq!(minify_html("<b>a</b> <i>b</i>"), "<b>a</b> <i>b</i>");
    }

    #[test]
    fn test_preformatted_content_is_preserved() {
        let html = "<div>\n  <pre class=\"src\">  line 1\n    line 2\n</pre>\n  <code>a  b</code>\n</div>";
        let minified = minify_html(html);
        assert!(minified.contains("<pre class=\"src\">  line 1\n    line 2\n</pre>"));
        assert!(minified.contains("<code>a  b</code>"));
        assert!(minified.starts_with("<div><pre"));
    }

    #[test]
    fn test_prefix_lookalikes_are_not_preserved() {
        assert_eq!(minify_html("<preview>  a  </preview>"), "<preview> a </preview>");
    }

    #[test]
    fn test_preserved_tags_inside_comments_are_ignored() {
        let html = "<div>\n  <!-- old: <pre>  kept? -->\n  <p>a   b</p>\n  <pre> x  y </pre>\n</div>";
        assert_eq!(minify_html(html), "<div><p>a b</p><pre> x  y </pre></div>");
        assert_eq!(minify_html("<p>x</p><!-- <pre> open"), "<p>x</p>");
    }

    #[test]
    fn test_unclosed_comment_is_dropped() {
        assert_eq!(minify_html("<p>x</p><!-- open"), "<p>x</p>");
    }
}
