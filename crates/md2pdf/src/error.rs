//! Error types for configuration, rendering and conversion.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use md2pdf_styles::{LookupError, MergeError, StoreError};

/// Process exit codes.
pub mod exit {
    pub const SUCCESS: u8 = 0;
    /// Usage errors, configuration problems, anything not listed below.
    pub const FAILURE: u8 = 1;
    /// An input file is missing or unreadable.
    pub const BAD_INPUT: u8 = 2;
    /// Unknown style or theme, or a discouraged pairing in strict mode.
    pub const UNKNOWN_COMBINATION: u8 = 3;
    /// The renderer or Word exporter failed.
    pub const RENDERER: u8 = 4;
}

/// The configuration file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid override pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid value for '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

/// An external renderer or exporter failed.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` failed with {status}{}", stderr_tail(.stderr))]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`{command}` produced no output")]
    EmptyOutput { command: String },

    #[error("I/O error while rendering: {0}")]
    Io(#[from] io::Error),

    /// Failure reported by an in-process renderer.
    #[error("{0}")]
    Message(String),
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let last = trimmed.lines().last().unwrap_or_default();
    format!(": {}", last)
}

/// A single conversion failed.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("cannot read input {}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("combination '{style}' + '{theme}' is discouraged: {reason}")]
    Discouraged {
        style: String,
        theme: String,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("cannot write output {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ConvertError {
    /// The process exit code this error maps to.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConvertError::Input { .. } => exit::BAD_INPUT,
            ConvertError::Lookup(_) | ConvertError::Discouraged { .. } => {
                exit::UNKNOWN_COMBINATION
            }
            ConvertError::Render(_) => exit::RENDERER,
            ConvertError::Store(_)
            | ConvertError::Merge(_)
            | ConvertError::Output { .. }
            | ConvertError::Config(_) => exit::FAILURE,
        }
    }
}

impl From<md2pdf_styles::Error> for ConvertError {
    fn from(err: md2pdf_styles::Error) -> Self {
        match err {
            md2pdf_styles::Error::Store(e) => ConvertError::Store(e),
            md2pdf_styles::Error::Lookup(e) => ConvertError::Lookup(e),
            md2pdf_styles::Error::Discouraged {
                style,
                theme,
                reason,
            } => ConvertError::Discouraged {
                style,
                theme,
                reason,
            },
            md2pdf_styles::Error::Merge(e) => ConvertError::Merge(e),
        }
    }
}
