//! YAML configuration.
//!
//! Every key is optional. A minimal file looks like this:
//!
//! ```yaml
//! style: academic
//! theme: sepia
//! styles_dir: ./styles
//! themes_dir: ./themes
//! page:
//!   size: Letter
//!   margin: 25mm
//! overrides:
//!   - pattern: "notes/*.md"
//!     theme: dark
//! discouraged:
//!   - style: modern
//!     theme: sepia
//!     reason: sepia washes out the accent colors
//! ```
//!
//! Relative paths are taken relative to the directory holding the file.
//! Command-line flags override file values.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use md2pdf_styles::{CompatibilityPolicy, PairingRule};

use crate::convert::OutputFormat;
use crate::document::PageOptions;
use crate::error::ConfigError;

/// File names looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAMES: &[&str] = &["md2pdf.yaml", "md2pdf.yml"];

pub const DEFAULT_STYLE: &str = "technical";
pub const DEFAULT_THEME: &str = "default";
pub const DEFAULT_RENDERER: &str = "weasyprint - -";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub style: String,
    pub theme: String,
    pub styles_dir: Option<PathBuf>,
    pub themes_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub processed_dir: Option<PathBuf>,
    pub format: OutputFormat,
    pub custom_css: Option<PathBuf>,
    pub print_css: Option<PathBuf>,
    pub header_dir: Option<PathBuf>,
    pub assets_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub strict: bool,
    pub jobs: Option<usize>,
    pub page: PageOptions,
    pub renderer: RendererConfig,
    pub word: WordConfig,
    pub overrides: Vec<Override>,
    pub discouraged: Vec<PairingRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            style: DEFAULT_STYLE.to_string(),
            theme: DEFAULT_THEME.to_string(),
            styles_dir: None,
            themes_dir: None,
            output_dir: None,
            processed_dir: None,
            format: OutputFormat::default(),
            custom_css: None,
            print_css: None,
            header_dir: None,
            assets_dir: None,
            cache_dir: None,
            strict: false,
            jobs: None,
            page: PageOptions::default(),
            renderer: RendererConfig::default(),
            word: WordConfig::default(),
            overrides: Vec::new(),
            discouraged: Vec::new(),
        }
    }
}

/// External HTML-to-PDF command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Shell command reading HTML on stdin and writing PDF on stdout.
    pub command: String,
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_RENDERER.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RendererConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// External Markdown-to-Word command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WordConfig {
    pub command: String,
    /// Reference `.docx` per style name.
    pub reference_docs: BTreeMap<String, PathBuf>,
}

impl Default for WordConfig {
    fn default() -> Self {
        Self {
            command: "pandoc".to_string(),
            reference_docs: BTreeMap::new(),
        }
    }
}

/// Per-file style/theme override, matched by glob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Override {
    pub pattern: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
}

impl Config {
    /// Parses YAML text. `origin` is only used in error messages.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads a file and rebases its relative paths onto the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&text, path)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads `explicit` if given, else the first of [`CONFIG_FILE_NAMES`]
    /// present in `cwd`, else defaults.
    ///
    /// Returns the path that was used, if any.
    pub fn discover(
        explicit: Option<&Path>,
        cwd: &Path,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        for name in CONFIG_FILE_NAMES {
            let candidate = cwd.join(name);
            if candidate.is_file() {
                let config = Self::load(&candidate)?;
                return Ok((config, Some(candidate)));
            }
        }
        Ok((Self::default(), None))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == Some(0) {
            return Err(ConfigError::Invalid {
                key: "jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.renderer.command.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "renderer.command".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.renderer.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "renderer.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        OverrideSet::compile(&self.overrides)?;
        Ok(())
    }

    fn rebase(&mut self, base: &Path) {
        let fields = [
            &mut self.styles_dir,
            &mut self.themes_dir,
            &mut self.output_dir,
            &mut self.processed_dir,
            &mut self.custom_css,
            &mut self.print_css,
            &mut self.header_dir,
            &mut self.assets_dir,
            &mut self.cache_dir,
        ];
        for field in fields {
            if let Some(path) = field.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
        for path in self.word.reference_docs.values_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Built-in rules followed by the configured ones.
    pub fn policy(&self) -> CompatibilityPolicy {
        let mut policy = CompatibilityPolicy::default();
        policy.extend(self.discouraged.iter().cloned());
        policy
    }

    pub fn override_set(&self) -> Result<OverrideSet, ConfigError> {
        OverrideSet::compile(&self.overrides)
    }
}

/// Compiled [`Override`]s.
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
    entries: Vec<(Pattern, Override)>,
}

impl OverrideSet {
    pub fn compile(overrides: &[Override]) -> Result<Self, ConfigError> {
        let entries = overrides
            .iter()
            .map(|o| {
                Pattern::new(&o.pattern)
                    .map(|p| (p, o.clone()))
                    .map_err(|source| ConfigError::Pattern {
                        pattern: o.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Style and theme for `input`. The first pattern matching the file name
    /// or the path wins; fields it leaves unset keep the defaults.
    pub fn resolve(&self, input: &Path, style: &str, theme: &str) -> (String, String) {
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let hit = self
            .entries
            .iter()
            .find(|(pattern, _)| pattern.matches(&file_name) || pattern.matches_path(input));

        match hit {
            Some((_, o)) => {
                log::debug!("override '{}' applies to {}", o.pattern, input.display());
                (
                    o.style.clone().unwrap_or_else(|| style.to_string()),
                    o.theme.clone().unwrap_or_else(|| theme.to_string()),
                )
            }
            None => (style.to_string(), theme.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.style, "technical");
        assert_eq!(config.theme, "default");
        assert_eq!(config.page.size, "A4");
        assert_eq!(config.page.margin, "2cm");
        assert_eq!(config.renderer.command, "weasyprint - -");
        assert_eq!(config.renderer.timeout(), Duration::from_secs(120));
        assert_eq!(config.format, OutputFormat::Pdf);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = Config::from_yaml("\n", Path::new("md2pdf.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let yaml = "style: academic\npage:\n  size: Letter\n";
        let config = Config::from_yaml(yaml, Path::new("md2pdf.yaml")).unwrap();
        assert_eq!(config.style, "academic");
        assert_eq!(config.theme, "default");
        assert_eq!(config.page.size, "Letter");
        assert_eq!(config.page.margin, "2cm");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = Config::from_yaml("colour: red\n", Path::new("md2pdf.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_jobs_is_rejected() {
        let err = Config::from_yaml("jobs: 0\n", Path::new("md2pdf.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "jobs"));
    }

    #[test]
    fn test_bad_override_pattern_is_rejected() {
        let yaml = "overrides:\n  - pattern: \"[unclosed\"\n    theme: dark\n";
        let err = Config::from_yaml(yaml, Path::new("md2pdf.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("md2pdf.yaml");
        fs::write(&path, "styles_dir: styles\ncache_dir: /abs/cache\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.styles_dir, Some(dir.path().join("styles")));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/abs/cache")));
    }

    #[test]
    fn test_discover_prefers_explicit_then_cwd() {
        let dir = TempDir::new().unwrap();
        let (config, used) = Config::discover(None, dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(used.is_none());

        fs::write(dir.path().join("md2pdf.yml"), "theme: dark\n").unwrap();
        let (config, used) = Config::discover(None, dir.path()).unwrap();
        assert_eq!(config.theme, "dark");
        assert_eq!(used, Some(dir.path().join("md2pdf.yml")));

        let explicit = dir.path().join("other.yaml");
        fs::write(&explicit, "theme: sepia\n").unwrap();
        let (config, _) = Config::discover(Some(&explicit), dir.path()).unwrap();
        assert_eq!(config.theme, "sepia");
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::discover(Some(&dir.path().join("nope.yaml")), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_overrides_first_match_wins() {
        let overrides = vec![
            Override {
                pattern: "notes/*.md".to_string(),
                style: None,
                theme: Some("dark".to_string()),
            },
            Override {
                pattern: "*.md".to_string(),
                style: Some("story".to_string()),
                theme: None,
            },
        ];
        let set = OverrideSet::compile(&overrides).unwrap();

        assert_eq!(
            set.resolve(Path::new("notes/today.md"), "technical", "default"),
            ("technical".to_string(), "dark".to_string())
        );
        assert_eq!(
            set.resolve(Path::new("chapter.md"), "technical", "default"),
            ("story".to_string(), "default".to_string())
        );
        assert_eq!(
            set.resolve(Path::new("readme.txt"), "technical", "default"),
            ("technical".to_string(), "default".to_string())
        );
    }

    #[test]
    fn test_policy_extends_builtin_rules() {
        let yaml = "discouraged:\n  - style: modern\n    theme: sepia\n    reason: washed out\n";
        let config = Config::from_yaml(yaml, Path::new("md2pdf.yaml")).unwrap();
        let policy = config.policy();
        assert!(!policy.classify("story", "dark").is_valid());
        assert!(!policy.classify("modern", "sepia").is_valid());
        assert!(policy.classify("modern", "dark").is_valid());
    }
}
