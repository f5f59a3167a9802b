//! Stylesheet metadata extraction.
//!
//! Style and theme files describe themselves with a loose convention: the
//! first non-blank line is a comment of the form
//!
//! ```css
//! /* Technical - Clean docs style */
//! ```
//!
//! and palette or font tokens are declared as custom properties, usually in
//! a `:root` rule:
//!
//! ```css
//! :root {
//!     --theme-primary: #1d4ed8;
//!     --font-body: "Inter", sans-serif;
//! }
//! ```
//!
//! The convention is not applied consistently across stylesheets, so
//! extraction is total: a missing or oddly shaped header comment falls back
//! to a display name derived from the file stem, and declarations the CSS
//! tokenizer cannot make sense of are left out. The result feeds listings
//! and diagnostics only; merging works on raw text and never depends on it.
//!
//! Custom properties are collected from top-level qualified rules only.
//! Declarations inside `@media`, `@page` or other at-rules are ignored. When
//! a file declares the same token twice, the first value is recorded.

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser,
};

/// Structured data pulled out of one stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetMetadata {
    pub display_name: String,
    pub description: String,
    /// `(token, value)` pairs in declaration order, tokens include the `--`.
    pub declared_variables: Vec<(String, String)>,
}

/// Extracts metadata from a stylesheet's text.
///
/// `stem` is the file stem, used when the text has no usable header comment.
pub fn extract(stem: &str, text: &str) -> SheetMetadata {
    let (display_name, description) = match header_comment(text) {
        Some((name, description)) => (name, description),
        None => (display_name_from_stem(stem), String::new()),
    };

    SheetMetadata {
        display_name,
        description,
        declared_variables: declared_variables(text),
    }
}

/// Normalizes a file stem into a registry name.
///
/// Transliterates to ASCII, lowercases, and turns `_` and whitespace into
/// `-`, collapsing runs and trimming the ends.
///
/// ```rust
/// use md2pdf_styles::normalize_name;
///
/// assert_eq!(normalize_name("Oceanic"), "oceanic");
/// assert_eq!(normalize_name("dark_mode"), "dark-mode");
/// assert_eq!(normalize_name("  Solarized  Light "), "solarized-light");
/// ```
pub fn normalize_name(stem: &str) -> String {
    let ascii = deunicode::deunicode(stem);
    let mut out = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        let c = if c == '_' || c.is_whitespace() { '-' } else { c };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.extend(c.to_lowercase());
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Derives a human label from a file stem: `dark_mode` → `Dark Mode`.
pub fn display_name_from_stem(stem: &str) -> String {
    stem.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Header comment
// =============================================================================

const DASHES: &[char] = &['-', '\u{2013}', '\u{2014}'];

/// Reads `/* Name - Description */` from the first non-blank line.
fn header_comment(text: &str) -> Option<(String, String)> {
    let text = text.trim_start_matches('\u{feff}');
    let line = text.lines().find(|l| !l.trim().is_empty())?.trim();
    let inner = line.strip_prefix("/*")?;
    let end = inner.find("*/")?;
    let inner = inner[..end].trim().trim_matches('*').trim();
    if inner.is_empty() {
        return None;
    }

    match split_on_dash(inner) {
        Some((name, description)) => Some((name.to_string(), description.to_string())),
        None => Some((inner.to_string(), String::new())),
    }
}

/// Splits on the first dash run (ASCII hyphen, en dash or em dash) that
/// touches whitespace on at least one side.
///
/// Dashes inside words, as in `Dark-Mode`, do not count.
fn split_on_dash(s: &str) -> Option<(&str, &str)> {
    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        if !DASHES.contains(&chars[i].1) {
            i += 1;
            continue;
        }
        let mut j = i;
        while j < chars.len() && DASHES.contains(&chars[j].1) {
            j += 1;
        }
        let space_before = i > 0 && chars[i - 1].1.is_whitespace();
        let space_after = j < chars.len() && chars[j].1.is_whitespace();
        let name = s[..chars[i].0].trim();
        if (space_before || space_after) && !name.is_empty() {
            let rest = chars.get(j).map(|&(p, _)| p).unwrap_or(s.len());
            return Some((name, s[rest..].trim()));
        }
        i = j;
    }
    None
}

// =============================================================================
// Custom properties
// =============================================================================

/// Collects custom-property declarations from top-level rules.
///
/// Each token appears once, with its first value.
pub fn declared_variables(css: &str) -> Vec<(String, String)> {
    let mut variables: Vec<(String, String)> = Vec::new();
    for (name, value) in variable_declarations(css) {
        if !variables.iter().any(|(existing, _)| *existing == name) {
            variables.push((name, value));
        }
    }
    variables
}

/// Every custom-property declaration in top-level rules, in source order,
/// redeclarations included.
pub fn variable_declarations(css: &str) -> Vec<(String, String)> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);

    let mut collector = VariableCollector {
        variables: Vec::new(),
    };

    let rules = cssparser::StyleSheetParser::new(&mut parser, &mut collector);
    for _ in rules {}

    collector.variables
}

struct VariableCollector {
    variables: Vec<(String, String)>,
}

impl<'i> QualifiedRuleParser<'i> for VariableCollector {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        // Any selector will do.
        while input.next().is_ok() {}
        Ok(())
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let mut decl_parser = VariableDeclarationParser;
        let body = RuleBodyParser::new(input, &mut decl_parser);

        self.variables.extend(body.flatten());
        Ok(())
    }
}

impl<'i> AtRuleParser<'i> for VariableCollector {
    type Prelude = ();
    type AtRule = ();
    type Error = ();
}

struct VariableDeclarationParser;

impl<'i> DeclarationParser<'i> for VariableDeclarationParser {
    type Declaration = (String, String);
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        if !name.starts_with("--") || name.len() == 2 {
            return Err(input.new_custom_error::<(), ()>(()));
        }

        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        let value = input.slice_from(start).trim();
        let value = value
            .strip_suffix("!important")
            .map(str::trim_end)
            .unwrap_or(value);

        if value.is_empty() {
            return Err(input.new_custom_error::<(), ()>(()));
        }
        Ok((name.as_ref().to_string(), value.to_string()))
    }
}

impl<'i> AtRuleParser<'i> for VariableDeclarationParser {
    type Prelude = ();
    type AtRule = (String, String);
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for VariableDeclarationParser {
    type Prelude = ();
    type QualifiedRule = (String, String);
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, (String, String), ()> for VariableDeclarationParser {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}
