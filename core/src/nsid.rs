//! Namespaced identifiers (NSIDs).
//!
//! An NSID is a reverse-domain dotted name such as `app.bsky.feed.post`. The
//! leading segments name the authority that owns the schema (read back to
//! front, `feed.bsky.app`) and the final segment names the schema itself.
//!
//! Every NSID maps 1:1 onto a relative file path, which is how schema files are
//! laid out on disk and on remote hosts:
//!
//! ```
//! use lexicon_pm_core::Nsid;
//!
//! let nsid: Nsid = "app.bsky.feed.post".parse().unwrap();
//! assert_eq!(nsid.authority(), "feed.bsky.app");
//! assert_eq!(nsid.name(), "post");
//! assert_eq!(nsid.to_path("json"), "app/bsky/feed/post.json");
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Maximum length of an NSID string.
pub const MAX_NSID_LEN: usize = 317;

static NSID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+(\.[a-zA-Z]([a-zA-Z0-9]{0,62})?)$",
    )
    .expect("static regex must compile")
});

/// Reasons an identifier fails the NSID grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NsidError {
    /// The input was empty or whitespace-only.
    #[error("NSID cannot be empty")]
    Empty,
    /// The input exceeds [`MAX_NSID_LEN`] characters.
    #[error("{0} is too long to be an NSID")]
    TooLong(String),
    /// The input has fewer than three dot-separated segments.
    #[error("{0} is not an NSID: needs at least three segments")]
    TooFewSegments(String),
    /// The input contains characters or segment shapes outside the grammar.
    #[error("{0} is not an NSID")]
    Invalid(String),
}

/// A validated namespaced identifier.
///
/// Immutable once parsed. Ordering and equality are by the dotted string,
/// which keeps collections keyed by NSID deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nsid {
    raw: String,
}

impl Nsid {
    /// Parses and validates an NSID.
    ///
    /// # Errors
    ///
    /// Returns an [`NsidError`] describing the first grammar violation.
    ///
    /// # Examples
    ///
    /// ```
    /// use lexicon_pm_core::{Nsid, NsidError};
    ///
    /// assert!(Nsid::parse("com.example.fooBar").is_ok());
    /// assert!(matches!(Nsid::parse("nodots"), Err(NsidError::TooFewSegments(_))));
    /// assert!(matches!(Nsid::parse("com.example.1abc"), Err(NsidError::Invalid(_))));
    /// ```
    pub fn parse(input: &str) -> Result<Self, NsidError> {
        if input.trim().is_empty() {
            return Err(NsidError::Empty);
        }
        if input.len() > MAX_NSID_LEN {
            return Err(NsidError::TooLong(input.to_string()));
        }
        if input.split('.').count() < 3 {
            return Err(NsidError::TooFewSegments(input.to_string()));
        }
        if !NSID_RE.is_match(input) {
            return Err(NsidError::Invalid(input.to_string()));
        }
        Ok(Self {
            raw: input.to_string(),
        })
    }

    /// Returns `true` if `input` satisfies the NSID grammar.
    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    /// Returns the dot-separated segments in declaration order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.raw.split('.')
    }

    /// Returns the authority domain: every segment except the name, reversed.
    pub fn authority(&self) -> String {
        let segments: Vec<&str> = self.segments().collect();
        let mut domain: Vec<&str> = segments[..segments.len() - 1].to_vec();
        domain.reverse();
        domain.join(".")
    }

    /// Returns the final segment.
    pub fn name(&self) -> &str {
        self.raw.rsplit('.').next().unwrap_or(&self.raw)
    }

    /// Returns the dotted string form.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the relative file path for this identifier, always
    /// `/`-separated regardless of platform.
    pub fn to_path(&self, extension: &str) -> String {
        format!("{}.{}", self.raw.replace('.', "/"), extension)
    }
}

impl fmt::Display for Nsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Nsid {
    type Err = NsidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Nsid {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Serialize for Nsid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Nsid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Nsid::parse(&raw).map_err(serde::de::Error::custom)
    }
}
