//! Markdown to HTML.
//!
//! [`CmarkParser`] wraps `pulldown-cmark` and adds what the stylesheets
//! expect from the generated markup:
//!
//! - every heading gets an `id` (an explicit `{#id}` is kept, otherwise a
//!   slug of the heading text, made unique within the document)
//! - a paragraph consisting of nothing but `[TOC]` becomes a nested list of
//!   links to the headings, wrapped in `<nav class="toc">`

use std::collections::HashSet;

use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Which Markdown extensions are switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extensions {
    pub tables: bool,
    pub footnotes: bool,
    pub strikethrough: bool,
    pub task_lists: bool,
    /// Heading ids and the `[TOC]` marker.
    pub toc: bool,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            task_lists: true,
            toc: true,
        }
    }
}

impl Extensions {
    fn options(&self) -> Options {
        let mut options = Options::empty();
        if self.tables {
            options.insert(Options::ENABLE_TABLES);
        }
        if self.footnotes {
            options.insert(Options::ENABLE_FOOTNOTES);
        }
        if self.strikethrough {
            options.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.task_lists {
            options.insert(Options::ENABLE_TASKLISTS);
        }
        if self.toc {
            options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        }
        options
    }
}

/// Converts Markdown text to an HTML fragment.
pub trait MarkdownParser: Send + Sync {
    fn to_html(&self, markdown: &str, extensions: &Extensions) -> String;
}

/// `pulldown-cmark` backed parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmarkParser;

impl MarkdownParser for CmarkParser {
    fn to_html(&self, markdown: &str, extensions: &Extensions) -> String {
        let events: Vec<Event<'_>> = Parser::new_ext(markdown, extensions.options()).collect();
        let events = if extensions.toc {
            with_toc(events)
        } else {
            events
        };

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}

/// A heading as listed in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub title: String,
}

const TOC_MARKER: &str = "[TOC]";

fn with_toc(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out: Vec<Event<'_>> = Vec::with_capacity(events.len());
    let mut entries = Vec::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut toc_slots = Vec::new();

    // Explicit ids claim their names before any slug is generated.
    for event in &events {
        if let Event::Start(Tag::Heading { id: Some(id), .. }) = event {
            used.insert(id.to_string());
        }
    }

    let mut iter = events.into_iter();
    while let Some(event) = iter.next() {
        match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let mut inner = Vec::new();
                for next in iter.by_ref() {
                    let done = matches!(next, Event::End(TagEnd::Heading(_)));
                    inner.push(next);
                    if done {
                        break;
                    }
                }
                let title = plain_text(&inner);
                let id = match id {
                    Some(id) => id.to_string(),
                    None => unique_slug(&title, &mut used),
                };
                entries.push(TocEntry {
                    level: heading_level(level),
                    id: id.clone(),
                    title,
                });
                out.push(Event::Start(Tag::Heading {
                    level,
                    id: Some(CowStr::from(id)),
                    classes,
                    attrs,
                }));
                out.extend(inner);
            }
            Event::Start(Tag::Paragraph) => {
                let mut inner = Vec::new();
                for next in iter.by_ref() {
                    let done = matches!(next, Event::End(TagEnd::Paragraph));
                    inner.push(next);
                    if done {
                        break;
                    }
                }
                if is_toc_marker(&inner) {
                    toc_slots.push(out.len());
                    out.push(Event::Html(CowStr::Borrowed("")));
                } else {
                    out.push(Event::Start(Tag::Paragraph));
                    out.extend(inner);
                }
            }
            other => out.push(other),
        }
    }

    if !toc_slots.is_empty() {
        let toc = toc_html(&entries);
        for slot in toc_slots {
            out[slot] = Event::Html(CowStr::from(toc.clone()));
        }
    }
    out
}

/// Whether a paragraph's events (closing tag included) spell out `[TOC]`.
fn is_toc_marker(inner: &[Event<'_>]) -> bool {
    let mut text = String::new();
    for event in inner {
        match event {
            Event::Text(t) => text.push_str(t),
            Event::End(TagEnd::Paragraph) => {}
            _ => return false,
        }
    }
    text.trim() == TOC_MARKER
}

fn plain_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text.trim().to_string()
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Lowercase ASCII slug: letters and digits kept, everything else folded
/// into single dashes.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode::deunicode(text);
    let mut slug = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn unique_slug(title: &str, used: &mut HashSet<String>) -> String {
    let mut base = slugify(title);
    if base.is_empty() {
        base = "section".to_string();
    }
    let mut candidate = base.clone();
    let mut n = 1;
    while used.contains(&candidate) {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Nested `<ul>` lists following heading levels.
pub fn toc_html(entries: &[TocEntry]) -> String {
    let mut out = String::from("<nav class=\"toc\">\n");
    let mut open: Vec<u8> = Vec::new();

    for entry in entries {
        while open.last().is_some_and(|&top| top > entry.level) {
            out.push_str("</li>\n</ul>\n");
            open.pop();
        }
        if open.last() == Some(&entry.level) {
            out.push_str("</li>\n");
        } else {
            out.push_str("<ul>\n");
            open.push(entry.level);
        }
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            escape_html(&entry.id),
            escape_html(&entry.title)
        ));
    }
    while open.pop().is_some() {
        out.push_str("</li>\n</ul>\n");
    }

    out.push_str("</nav>\n");
    out
}

/// Escapes text for use in HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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
