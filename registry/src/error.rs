//! Error types for fetching, resolution and installation.
//!
//! Two levels:
//!
//! - [`FetchError`] describes why one identifier could not be obtained from
//!   one source. The resolver catches these at the identifier boundary and
//!   turns them into diagnostic events; they never abort a run.
//! - [`Error`] is fatal for the whole run: manifest misconfiguration and
//!   filesystem failures during the write phase.

use lexicon_pm_core::{NsidError, ReadError, UnknownOutputTarget};
use thiserror::Error;

/// Why a single identifier could not be fetched from a single source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The identifier does not satisfy the NSID grammar.
    #[error(transparent)]
    InvalidIdentifier(#[from] NsidError),

    /// Local file absent or unreadable.
    #[error("failed to read {path}: {reason}")]
    NotFound { path: String, reason: String },

    /// No known-host entry serves this authority.
    #[error("unknown authority for github registry: {0}")]
    UnknownAuthority(String),

    /// No DID and endpoint combination produced a valid record.
    #[error("no lexicon record found for {0}")]
    NoRecordFound(String),

    /// A network request failed or returned a non-success status.
    #[error("failed to GET {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The source descriptor is not `local`, `pds`, `github` or a URL.
    #[error("unknown registry type: {0}")]
    UnknownRegistry(String),

    /// The fetched text is not a valid schema document for this identifier.
    #[error(transparent)]
    Invalid(#[from] ReadError),
}

impl FetchError {
    pub(crate) fn transport(url: impl Into<String>, reason: impl ToString) -> Self {
        FetchError::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a code generator.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Serializing a schema document into the generated source failed.
    #[error("failed to serialize {nsid}: {source}")]
    Serialize {
        nsid: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that abort a whole command.
#[derive(Debug, Error)]
pub enum Error {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Manifest is missing, already present, or structurally wrong.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// An output-target tag in the manifest is not recognised.
    #[error(transparent)]
    UnknownOutputTarget(#[from] UnknownOutputTarget),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A generator failed.
    #[error("generator error: {0}")]
    Generate(#[from] GenerateError),

    /// A single-identifier operation (such as registry inference) failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Persisting a temporary file into place failed.
    #[error("failed to persist {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
