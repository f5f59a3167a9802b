//! Running page header built from a directory of assets.
//!
//! The header directory may hold a logo image and a Markdown snippet:
//!
//! - logo: the first file by extension priority `png`, `jpg`, `jpeg`, `svg`,
//!   `gif`, embedded as a base64 data URI
//! - text: the first `*.md` file, with `#date#` replaced by today's date
//!
//! Either part may be missing. With neither, there is no header at all.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use glob::{MatchOptions, Pattern};

use crate::markdown::{Extensions, MarkdownParser};

/// Logo extensions in priority order, with their MIME types.
const LOGO_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("svg", "image/svg+xml"),
    ("gif", "image/gif"),
];

const DATE_PLACEHOLDER: &str = "#date#";

/// Print CSS that turns the header into a running element in the top margin.
pub const HEADER_CSS: &str = include_str!("../assets/header.css");

/// Today's date the way header text shows it, e.g. `07 Mar 2025`.
pub fn today() -> String {
    chrono::Local::now().format("%d %b %Y").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub logo_html: Option<String>,
    pub text_html: Option<String>,
}

impl Header {
    /// Reads the header directory. Returns `None` if it is missing or holds
    /// nothing usable. Unreadable files are logged and skipped.
    pub fn load(dir: &Path, parser: &dyn MarkdownParser, date: &str) -> Option<Header> {
        if !dir.is_dir() {
            log::debug!("no header directory at {}", dir.display());
            return None;
        }

        let logo_html = find_logo(dir).and_then(|(path, mime)| match fs::read(&path) {
            Ok(bytes) => Some(format!(
                "<img src=\"data:{};base64,{}\" class=\"header-logo\" alt=\"Logo\">",
                mime,
                STANDARD.encode(bytes)
            )),
            Err(err) => {
                log::warn!("cannot read header logo {}: {}", path.display(), err);
                None
            }
        });

        let text_html = first_match(dir, "md").and_then(|path| match fs::read_to_string(&path) {
            Ok(text) => {
                let text = text.replace(DATE_PLACEHOLDER, date);
                Some(parser.to_html(&text, &Extensions::default()))
            }
            Err(err) => {
                log::warn!("cannot read header text {}: {}", path.display(), err);
                None
            }
        });

        if logo_html.is_none() && text_html.is_none() {
            return None;
        }
        Some(Header {
            logo_html,
            text_html,
        })
    }

    /// The header block placed before the content.
    pub fn to_html(&self) -> String {
        let mut html = String::from("<div class=\"header-wrapper\"><div class=\"header-container\">");
        match &self.text_html {
            Some(text) => {
                html.push_str("<div class=\"header-text\">");
                html.push_str(text.trim_end());
                html.push_str("</div>");
            }
            // Empty spacer keeps the logo on the right.
            None if self.logo_html.is_some() => html.push_str("<div class=\"header-text\"></div>"),
            None => {}
        }
        if let Some(logo) = &self.logo_html {
            html.push_str("<div class=\"header-logo-wrapper\">");
            html.push_str(logo);
            html.push_str("</div>");
        }
        html.push_str("</div></div>");
        html
    }
}

fn find_logo(dir: &Path) -> Option<(PathBuf, &'static str)> {
    LOGO_TYPES
        .iter()
        .find_map(|(ext, mime)| first_match(dir, ext).map(|path| (path, *mime)))
}

/// First file in `dir` (alphabetically) with the given extension, any case.
fn first_match(dir: &Path, ext: &str) -> Option<PathBuf> {
    let pattern = format!(
        "{}/*.{}",
        Pattern::escape(&dir.to_string_lossy()),
        ext
    );
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    glob::glob_with(&pattern, options)
        .ok()?
        .filter_map(Result::ok)
        .find(|path| path.is_file())
}
