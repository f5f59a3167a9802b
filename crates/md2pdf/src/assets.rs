//! Local font assets.
//!
//! Fonts found under `<assets>/fonts/` are declared as `@font-face` rules in
//! the base layer so styles can use them without network access. Styles
//! keep their own remote URL fallbacks, so a missing assets directory only
//! changes which font file wins.
//!
//! The family name comes from the file stem up to the first `-`:
//! `Inter-SemiBold.woff2` is family `Inter`, weight 600.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

const FONT_FORMATS: &[(&str, &str)] = &[
    ("woff2", "woff2"),
    ("woff", "woff"),
    ("ttf", "truetype"),
    ("otf", "opentype"),
];

/// One discovered font file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFace {
    pub family: String,
    pub weight: u16,
    pub italic: bool,
    pub path: PathBuf,
    pub format: &'static str,
}

impl FontFace {
    fn from_path(path: PathBuf, format: &'static str) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?.to_string();
        let (family, variant) = match stem.split_once('-') {
            Some((family, variant)) => (family.to_string(), variant.to_ascii_lowercase()),
            None => (stem.clone(), String::new()),
        };
        if family.is_empty() {
            return None;
        }
        let italic = variant.contains("italic");
        let variant = variant.replace("italic", "");
        Some(Self {
            family,
            weight: weight_for(&variant),
            italic,
            path,
            format,
        })
    }

    pub fn to_css(&self) -> String {
        format!(
            "@font-face {{\n  font-family: \"{}\";\n  src: url(\"{}\") format(\"{}\");\n  font-weight: {};\n  font-style: {};\n}}\n",
            self.family,
            file_url(&self.path),
            self.format,
            self.weight,
            if self.italic { "italic" } else { "normal" }
        )
    }
}

fn weight_for(variant: &str) -> u16 {
    match variant {
        "thin" | "hairline" => 100,
        "extralight" | "ultralight" => 200,
        "light" => 300,
        "medium" => 500,
        "semibold" | "demibold" => 600,
        "bold" => 700,
        "extrabold" | "ultrabold" => 800,
        "black" | "heavy" => 900,
        _ => 400,
    }
}

fn file_url(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    let encoded = text.replace(' ', "%20").replace('"', "%22");
    if encoded.starts_with('/') {
        format!("file://{}", encoded)
    } else {
        format!("file:///{}", encoded)
    }
}

/// Fonts under `<assets_dir>/fonts`, sorted by file name within each format.
pub fn discover_fonts(assets_dir: &Path) -> Vec<FontFace> {
    let fonts_dir = assets_dir.join("fonts");
    if !fonts_dir.is_dir() {
        log::debug!("no local fonts at {}", fonts_dir.display());
        return Vec::new();
    }

    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let root = Pattern::escape(&fonts_dir.to_string_lossy());

    let mut faces = Vec::new();
    for &(ext, format) in FONT_FORMATS {
        let pattern = format!("{}/*.{}", root, ext);
        let Ok(paths) = glob::glob_with(&pattern, options) else {
            continue;
        };
        faces.extend(
            paths
                .filter_map(Result::ok)
                .filter_map(|path| FontFace::from_path(path, format)),
        );
    }
    log::debug!("found {} local font file(s)", faces.len());
    faces
}

/// `@font-face` rules for every local font.
pub fn font_face_css(assets_dir: &Path) -> String {
    discover_fonts(assets_dir)
        .iter()
        .map(FontFace::to_css)
        .collect::<Vec<_>>()
        .join("\n")
}
