//! Error types for the drawx-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the drawx library.
#[derive(Error, Debug)]
pub enum DrawxError {
    /// Rule resolution error.
    #[error("rule error: {0}")]
    Rules(#[from] RuleError),

    /// Model response could not be interpreted.
    #[error("response error: {0}")]
    Response(#[from] ResponseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while resolving the effective rule set.
#[derive(Error, Debug)]
pub enum RuleError {
    /// The customer identifier is outside the known set of profiles.
    #[error("invalid customer '{0}' (expected auto, base, elten or rademaker)")]
    InvalidCustomer(String),

    /// A required rule document does not exist.
    #[error("rule document missing: {}", .0.display())]
    ConfigMissing(PathBuf),

    /// A rule document exists but could not be parsed.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// I/O failure while reading a rule document.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised at the structured-response parse boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// The model returned no text at all.
    #[error("empty response from model")]
    Empty,

    /// The text is not valid JSON for the declared schema.
    #[error("response does not match schema: {0}")]
    InvalidJson(String),

    /// The envelope parsed but carried no items.
    #[error("response contained no items")]
    NoItems,

    /// A required field is absent.
    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Result type for the drawx library.
pub type Result<T> = std::result::Result<T, DrawxError>;
