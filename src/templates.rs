// Tiny template layer: read an HTML file and substitute {{placeholders}}.
use std::path::Path;
use crate::errors::{AppError, AppResult};

pub async fn render(templates_dir: &str, name: &str, vars: &[(&str, &str)]) -> AppResult<String> {
    let path = Path::new(templates_dir).join(name);
    let mut html = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| {
            tracing::error!("Failed to read template {}: {}", path.display(), e);
            AppError::File(e)
        })?;

    for (key, value) in vars {
        html = html.replace(&format!("{{{{{}}}}}", key), value);
    }

    tracing::trace!("Rendered template {}", name);
    Ok(html)
}

/// Escapes text for safe interpolation into HTML bodies and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&#39;");
        assert_eq!(escape_html("plain/name.txt"), "plain/name.txt");
    }

    #[tokio::test]
    async fn test_render_substitutes_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.html"), "<p>{{name}} in {{bucket}}</p>").unwrap();

        let html = render(
            dir.path().to_str().unwrap(),
            "page.html",
            &[("name", "file.txt"), ("bucket", "b1")],
        )
        .await
        .unwrap();
        assert_eq!(html, "<p>file.txt in b1</p>");
    }

    #[tokio::test]
    async fn test_render_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let result = render(dir.path().to_str().unwrap(), "missing.html", &[]).await;
        assert!(matches!(result, Err(AppError::File(_))));
    }
}
