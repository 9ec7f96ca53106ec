//! Readable-content extraction from raw HTML.
//!
//! Readability-style: look for a main content container first, fall back
//! to the body with boilerplate stripped, convert to markdown. Parsing is
//! fully synchronous — `scraper::Html` is not `Send` and must never live
//! across an await point.

use scraper::{Html, Selector};

/// Selectors tried in order when looking for the main content container.
const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    "#main",
    ".content",
    ".main",
    ".post-content",
    ".entry-content",
    ".markdown-body",
];

/// Elements stripped before conversion — navigation, chrome, scripts.
const BOILERPLATE_SELECTORS: &[&str] = &[
    "nav",
    "header",
    "footer",
    "aside",
    ".nav",
    ".navbar",
    ".header",
    ".footer",
    ".sidebar",
    ".menu",
    ".advertisement",
    ".ads",
    ".cookie-banner",
    "#nav",
    "#header",
    "#footer",
    "#sidebar",
    "script",
    "style",
    "noscript",
    "iframe",
];

/// What extraction pulled out of one document.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub headings: Vec<String>,
    /// Readable body as markdown
    pub markdown: String,
    /// Extracted-text length relative to raw HTML length, in [0, 1]
    pub content_ratio: f32,
}

/// Extract readable content from a raw HTML document.
pub fn extract(html: &str) -> ExtractedContent {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let meta_description = extract_meta_description(&document);
    let headings = extract_headings(&document);

    let main_html = extract_main_content(&document);
    let markdown = html_to_markdown(&main_html);

    let content_ratio = if html.is_empty() {
        0.0
    } else {
        (markdown.len() as f32 / html.len() as f32).min(1.0)
    };

    ExtractedContent {
        title,
        meta_description,
        headings,
        markdown,
        content_ratio,
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn extract_meta_description(document: &Html) -> Option<String> {
    let selector = Selector::parse("meta[name='description']").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn extract_headings(document: &Html) -> Vec<String> {
    let selector = match Selector::parse("h1, h2, h3") {
        Ok(s) => s,
        Err(_) => return vec![],
    };
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|h| !h.is_empty())
        .take(50)
        .collect()
}

/// Find the main content area, or fall back to body minus boilerplate.
fn extract_main_content(document: &Html) -> String {
    for selector_str in MAIN_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(main) = document.select(&selector).next() {
                return main.html();
            }
        }
    }

    if let Ok(body_selector) = Selector::parse("body") {
        if let Some(body) = document.select(&body_selector).next() {
            return remove_boilerplate(&body.html());
        }
    }

    document.html()
}

/// Strip boilerplate elements from an HTML fragment.
fn remove_boilerplate(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut result = html.to_string();
    for selector_str in BOILERPLATE_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                let element_html = element.html();
                result = result.replace(&element_html, "");
            }
        }
    }
    result
}

/// Convert HTML to markdown, falling back to stripped text.
fn html_to_markdown(html: &str) -> String {
    htmd::convert(html).unwrap_or_else(|_| {
        let document = Html::parse_document(html);
        document.root_element().text().collect::<String>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_meta() {
        let html = r#"<html><head><title>Flask Docs</title>
            <meta name="description" content="Flask web framework">
            </head><body><main><h1>Quickstart</h1><p>Hello</p></main></body></html>"#;
        let content = extract(html);
        assert_eq!(content.title.as_deref(), Some("Flask Docs"));
        assert_eq!(content.meta_description.as_deref(), Some("Flask web framework"));
        assert_eq!(content.headings, vec!["Quickstart"]);
        assert!(content.markdown.contains("Hello"));
    }

    #[test]
    fn prefers_main_over_body() {
        let html = r#"<html><body>
            <nav>Site navigation junk</nav>
            <main><p>The real content</p></main>
            <footer>Footer junk</footer>
            </body></html>"#;
        let content = extract(html);
        assert!(content.markdown.contains("The real content"));
        assert!(!content.markdown.contains("navigation junk"));
    }

    #[test]
    fn strips_boilerplate_without_main() {
        let html = r#"<html><body>
            <nav>menu menu menu</nav>
            <div><p>Body paragraph text</p></div>
            <script>var x = 1;</script>
            </body></html>"#;
        let content = extract(html);
        assert!(content.markdown.contains("Body paragraph text"));
        assert!(!content.markdown.contains("menu menu menu"));
        assert!(!content.markdown.contains("var x"));
    }

    #[test]
    fn empty_document_yields_empty_content() {
        let content = extract("");
        assert!(content.title.is_none());
        assert_eq!(content.content_ratio, 0.0);
    }
}
