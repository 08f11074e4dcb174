//! Error overlay served in place of pages while the last build is broken.
//!
//! The page subscribes to the HMR stream and reloads once a build succeeds.

use crate::hmr::HMR_CLIENT_PATH;
use fob_hmr::Diagnostic;
use std::fmt::Write as _;

const STYLE: &str = r#"
  body { margin: 0; background: #1e1e1e; color: #e6e6e6; font: 14px/1.5 ui-monospace, Menlo, Consolas, monospace; }
  main { max-width: 960px; margin: 0 auto; padding: 32px; }
  h1 { color: #ff6b6b; font-size: 20px; }
  section { border-left: 3px solid #ff6b6b; padding: 8px 16px; margin: 16px 0; background: #262626; }
  .origin { color: #9a9a9a; }
  .file { color: #6cb6ff; }
  pre { overflow-x: auto; background: #171717; padding: 12px; }
  .hint { color: #ffd166; }
"#;

/// Render the overlay for `diagnostics`. All diagnostic text is escaped.
pub fn render_error_overlay(diagnostics: &[Diagnostic]) -> String {
    let mut body = String::new();

    for diagnostic in diagnostics {
        body.push_str("<section>");
        if let Some(origin) = &diagnostic.origin {
            let _ = write!(body, r#"<div class="origin">{}</div>"#, html_escape(origin));
        }
        let _ = write!(body, "<p>{}</p>", html_escape(&diagnostic.message));
        if let Some(file) = &diagnostic.file_path {
            let _ = write!(
                body,
                r#"<div class="file">{}</div>"#,
                html_escape(&file.display().to_string())
            );
        }
        if let Some(frame) = &diagnostic.code_frame {
            let _ = write!(body, "<pre>{}</pre>", html_escape(frame));
        }
        for hint in &diagnostic.hints {
            let _ = write!(body, r#"<div class="hint">Hint: {}</div>"#, html_escape(hint));
        }
        if let Some(stack) = &diagnostic.stack {
            let _ = write!(body, "<pre>{}</pre>", html_escape(stack));
        }
        body.push_str("</section>");
    }

    if diagnostics.is_empty() {
        body.push_str("<section><p>The build failed without diagnostics.</p></section>");
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Build Error</title>
<style>{style}</style>
</head>
<body>
<main>
<h1>Build Error</h1>
{body}
</main>
<script src="{client}"></script>
</body>
</html>
"#,
        style = STYLE,
        body = body,
        client = HMR_CLIENT_PATH,
    )
}

/// HTML-escape a string.
pub fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape_combined() {
        let input = r#"Error in <Component attr="value" & 'test'>"#;
        let expected =
            r#"Error in &lt;Component attr=&quot;value&quot; &amp; &#x27;test&#x27;&gt;"#;
        assert_eq!(html_escape(input), expected);
    }

    #[test]
    fn test_html_escape_no_special_chars() {
        assert_eq!(html_escape("Normal error message"), "Normal error message");
    }

    #[test]
    fn test_overlay_escapes_diagnostic_text() {
        let diagnostics = vec![
            Diagnostic::new("<script>alert('xss')</script>")
                .with_origin("@fob/transformer")
                .with_file("src/<app>.js")
                .with_hint("Check the import"),
        ];
        let html = render_error_overlay(&diagnostics);

        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("src/&lt;app&gt;.js"));
        assert!(html.contains("Hint: Check the import"));
        assert!(html.contains("@fob/transformer"));
    }

    #[test]
    fn test_overlay_structure() {
        let html = render_error_overlay(&[Diagnostic::new("Test error")]);

        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("Build Error"));
        assert!(html.contains("Test error"));
        assert!(html.contains(HMR_CLIENT_PATH));
    }

    #[test]
    fn test_overlay_without_diagnostics() {
        let html = render_error_overlay(&[]);
        assert!(html.contains("without diagnostics"));
    }
}
