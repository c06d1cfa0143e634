use pulldown_cmark::{html, Options, Parser};

/// Title used when the front-matter does not provide one.
pub const UNTITLED: &str = "Untitled";

/// Fields read from a Markdown page's front-matter block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
}

/// Split a leading `---` fenced front-matter block off `source`.
///
/// The block is a run of `key: value` lines closed by `---` or `...`.
/// Returns the parsed fields and the remaining body. Without a closed block
/// the whole source is the body.
pub fn split_front_matter(source: &str) -> (FrontMatter, &str) {
    let Some(rest) = source.strip_prefix("---").and_then(strip_line_break) else {
        return (FrontMatter::default(), source);
    };

    let mut fields = FrontMatter::default();
    let mut consumed = 0;
    for line in rest.split_inclusive('\n') {
        consumed += line.len();
        let line = line.trim_end_matches(['\r', '\n']);
        if line == "---" || line == "..." {
            return (fields, &rest[consumed..]);
        }
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == "title" {
                fields.title = Some(unquote(value.trim()).to_string());
            }
        }
    }

    (FrontMatter::default(), source)
}

fn strip_line_break(s: &str) -> Option<&str> {
    s.strip_prefix("\r\n").or_else(|| s.strip_prefix('\n'))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Escape text for use inside HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    // Writing into a String cannot fail
    let _ = pulldown_cmark_escape::escape_html(&mut escaped, text);
    escaped
}

/// Render a Markdown page into a complete HTML document.
///
/// The `<title>` comes from front-matter and is always escaped.
pub fn render_page(source: &str) -> String {
    let (front_matter, body) = split_front_matter(source);
    let title = front_matter.title.as_deref().unwrap_or(UNTITLED);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(body, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; max-width: 800px; margin: 40px auto; padding: 0 20px; line-height: 1.6; }}
        img {{ max-width: 100%; height: auto; }}
        code {{ background: #f4f4f4; padding: 2px 6px; border-radius: 3px; }}
        pre {{ background: #f4f4f4; padding: 12px; border-radius: 5px; overflow-x: auto; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
    </style>
</head>
<body>
{}
</body>
</html>"#,
        escape_html(title),
        html_output
    )
}
