//! Basic fallback document
//!
//! Used whenever the full report cannot be produced. Only the error type,
//! message, file and line are shown, each escaped, and nothing here can fail.

use super::OutputFormat;
use crate::context::mask::truncate_string;
use crate::descriptor::ErrorDescriptor;
use crate::html::escape_html;
use serde_json::json;

/// Longest message shown on the fallback page
const MAX_FALLBACK_MESSAGE: usize = 10_000;

pub fn basic_document(error: &ErrorDescriptor, format: OutputFormat) -> String {
    match format {
        OutputFormat::Html => basic_html(error),
        OutputFormat::Json => basic_json(error),
    }
}

fn basic_html(error: &ErrorDescriptor) -> String {
    let kind = escape_html(&error.kind);
    let message = escape_html(&truncate_string(&error.message, MAX_FALLBACK_MESSAGE));
    let file = escape_html(&error.file);

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>{kind}</title>\n\
         <style>body{{font-family:sans-serif;margin:2rem;color:#1f2328}}\
         h1{{color:#b42318;font-size:1.4rem}}\
         pre{{background:#f6f8fa;padding:1rem;white-space:pre-wrap;word-break:break-word}}</style>\n\
         </head>\n\
         <body>\n\
         <h1>{kind}</h1>\n\
         <pre>{message}</pre>\n\
         <p>in <code>{file}</code> on line <strong>{line}</strong></p>\n\
         </body>\n\
         </html>\n",
        kind = kind,
        message = message,
        file = file,
        line = error.line,
    )
}

fn basic_json(error: &ErrorDescriptor) -> String {
    let document = json!({
        "fallback": true,
        "error": {
            "kind": escape_html(&error.kind),
            "message": escape_html(&truncate_string(&error.message, MAX_FALLBACK_MESSAGE)),
            "file": escape_html(&error.file),
            "line": error.line,
        }
    });
    serde_json::to_string_pretty(&document).unwrap_or_else(|_| "{\"fallback\":true}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_escapes_all_fields() {
        let error = ErrorDescriptor::new("<Kind>", "msg <script>x</script>", "/a/<b>.php", 9);
        let html = basic_document(&error, OutputFormat::Html);
        assert!(html.contains("<h1>&lt;Kind&gt;</h1>"));
        assert!(html.contains("msg &lt;script&gt;x&lt;/script&gt;"));
        assert!(html.contains("/a/&lt;b&gt;.php"));
        assert!(html.contains("<strong>9</strong>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_json_fallback() {
        let error = ErrorDescriptor::new("RuntimeException", "a \"quoted\" <b>", "a.php", 3);
        let body = basic_document(&error, OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["fallback"], true);
        assert_eq!(parsed["error"]["message"], "a &quot;quoted&quot; &lt;b&gt;");
        assert_eq!(parsed["error"]["line"], 3);
    }
}
