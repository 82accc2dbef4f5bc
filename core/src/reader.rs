//! Reading schema documents from text.
//!
//! [`read_lexicon`] is the single entry point used for every source: local
//! files, raw hosts and registry records all pass through the same checks.
//!
//! 1. The text must parse as JSON ([`ReadError::Parse`]).
//! 2. It must carry a numeric `lexicon` marker ([`ReadError::NotASchema`]).
//! 3. If an identifier was expected, a string `id` must match it
//!    ([`ReadError::IdentityMismatch`]).
//! 4. The structure must validate ([`ReadError::Validation`], with every
//!    offending path).

use serde_json::Value;
use thiserror::Error;

use crate::lexicon::LexiconDoc;
use crate::validate::{IssueKind, ValidationIssue, validate_document};

/// Errors produced while reading a schema document.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The text is not valid JSON.
    #[error("{location}: failed to parse JSON: {source}")]
    Parse {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    /// The value is JSON but has no numeric `lexicon` marker.
    #[error("{location}: not a lexicon schema")]
    NotASchema { location: String },

    /// The declared `id` differs from the identifier the document was
    /// requested under.
    #[error("{location}: declared id `{declared}` does not match expected `{expected}`")]
    IdentityMismatch {
        location: String,
        expected: String,
        declared: String,
    },

    /// The structure violates the lexicon grammar.
    #[error("{location}: invalid lexicon schema:\n{}", format_issues(.issues))]
    Validation {
        location: String,
        issues: Vec<ValidationIssue>,
    },
}

impl ReadError {
    /// Returns the location label the error was raised for.
    pub fn location(&self) -> &str {
        match self {
            ReadError::Parse { location, .. }
            | ReadError::NotASchema { location }
            | ReadError::IdentityMismatch { location, .. }
            | ReadError::Validation { location, .. } => location,
        }
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses and validates a schema document from its text.
///
/// `location` is a human-readable label (a path or URL) used in errors.
/// When `expected` is given, a document whose string `id` differs is
/// rejected.
///
/// # Errors
///
/// See [`ReadError`] for the possible failures, in the order they are
/// checked.
///
/// # Examples
///
/// ```
/// use lexicon_pm_core::{read_lexicon, ReadError};
///
/// let text = r#"{"lexicon": 1, "id": "com.example.foo", "defs": {}}"#;
/// let doc = read_lexicon(text, "foo.json", Some("com.example.foo")).unwrap();
/// assert_eq!(doc.id, "com.example.foo");
///
/// let err = read_lexicon(text, "foo.json", Some("com.example.bar")).unwrap_err();
/// assert!(matches!(err, ReadError::IdentityMismatch { .. }));
/// ```
pub fn read_lexicon(
    text: &str,
    location: &str,
    expected: Option<&str>,
) -> Result<LexiconDoc, ReadError> {
    let value: Value = serde_json::from_str(text).map_err(|source| ReadError::Parse {
        location: location.to_string(),
        source,
    })?;
    read_lexicon_value(value, location, expected)
}

/// Same as [`read_lexicon`], for a document that is already a JSON value.
pub fn read_lexicon_value(
    value: Value,
    location: &str,
    expected: Option<&str>,
) -> Result<LexiconDoc, ReadError> {
    if !value.get("lexicon").is_some_and(Value::is_number) {
        return Err(ReadError::NotASchema {
            location: location.to_string(),
        });
    }

    if let (Some(expected), Some(declared)) = (expected, value.get("id").and_then(Value::as_str)) {
        if declared != expected {
            return Err(ReadError::IdentityMismatch {
                location: location.to_string(),
                expected: expected.to_string(),
                declared: declared.to_string(),
            });
        }
    }

    let issues = validate_document(&value);
    if !issues.is_empty() {
        return Err(ReadError::Validation {
            location: location.to_string(),
            issues,
        });
    }

    serde_json::from_value(value).map_err(|e| ReadError::Validation {
        location: location.to_string(),
        issues: vec![ValidationIssue {
            path: String::new(),
            kind: IssueKind::Malformed(e.to_string()),
        }],
    })
}
