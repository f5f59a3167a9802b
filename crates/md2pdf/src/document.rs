//! HTML document assembly and page geometry.

use serde::{Deserialize, Serialize};

use crate::markdown::escape_html;

/// Paper size and margins, emitted as an `@page` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageOptions {
    /// Any CSS `size` value: `A4`, `Letter`, `A5 landscape`, `210mm 297mm`.
    pub size: String,
    /// Any CSS `margin` value.
    pub margin: String,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            size: "A4".to_string(),
            margin: "2cm".to_string(),
        }
    }
}

impl PageOptions {
    pub fn to_css(&self) -> String {
        format!(
            "@page {{\n  size: {};\n  margin: {};\n}}\n",
            self.size.trim(),
            self.margin.trim()
        )
    }
}

/// Builds the print layer: the `@page` rule, then any extra print CSS.
pub fn print_layer(page: &PageOptions, extras: &[&str]) -> String {
    let mut css = page.to_css();
    for extra in extras.iter().filter(|e| !e.trim().is_empty()) {
        css.push('\n');
        css.push_str(extra.trim_end());
        css.push('\n');
    }
    css
}

/// A complete HTML page ready for a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlDocument {
    html: String,
}

impl HtmlDocument {
    /// One `<style>` element with the whole stylesheet, then the header
    /// block, then the content.
    pub fn assemble(title: &str, stylesheet: &str, header: Option<&str>, body: &str) -> Self {
        let has_header = header.is_some_and(|h| !h.trim().is_empty());
        let mut html = String::with_capacity(stylesheet.len() + body.len() + 512);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"UTF-8\">\n");
        html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
        html.push_str("<style>\n");
        html.push_str(stylesheet);
        if !stylesheet.ends_with('\n') {
            html.push('\n');
        }
        html.push_str("</style>\n</head>\n<body>\n");

        if let Some(header) = header.filter(|_| has_header) {
            html.push_str(header);
            html.push('\n');
        }

        if has_header {
            html.push_str("<div class=\"content has-header\">\n");
        } else {
            html.push_str("<div class=\"content\">\n");
        }
        html.push_str(body);
        if !body.ends_with('\n') {
            html.push('\n');
        }
        html.push_str("</div>\n</body>\n</html>\n");

        Self { html }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn into_string(self) -> String {
        self.html
    }
}
