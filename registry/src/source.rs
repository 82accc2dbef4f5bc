//! Source descriptors and candidate ordering.
//!
//! Each manifest entry names one source for one identifier. Transitive
//! dependencies are not declared anywhere, so the resolver builds a candidate
//! list for them with [`candidate_order`].

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::FetchError;

/// A place a schema document can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Registry {
    /// The schema directory on the local filesystem.
    Local,
    /// The identity-backed registry reached through `_lexicon` DNS records.
    Pds,
    /// Raw files on a known git host, looked up by authority suffix.
    Github,
    /// An explicit http(s) URL, kept exactly as declared. A URL ending in `/`
    /// is a base that per-identifier paths are joined onto.
    Url(String),
}

impl Registry {
    /// Returns `true` for a URL source ending in `/`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lexicon_pm_registry::Registry;
    ///
    /// let base: Registry = "https://example.com/lexicons/".parse().unwrap();
    /// let exact: Registry = "https://example.com/foo.json".parse().unwrap();
    /// assert!(base.is_base_url());
    /// assert!(!exact.is_base_url());
    /// assert!(!Registry::Local.is_base_url());
    /// ```
    pub fn is_base_url(&self) -> bool {
        matches!(self, Registry::Url(raw) if raw.ends_with('/'))
    }

    /// Returns the descriptor string as written in a manifest.
    pub fn descriptor(&self) -> &str {
        match self {
            Registry::Local => "local",
            Registry::Pds => "pds",
            Registry::Github => "github",
            Registry::Url(raw) => raw,
        }
    }

    /// Resolves the URL to request for `relative_path`.
    ///
    /// Base URLs are joined with the path; other URLs are used verbatim.
    /// Returns `None` for non-URL sources.
    pub fn url_for(&self, relative_path: &str) -> Option<Result<Url, FetchError>> {
        let Registry::Url(raw) = self else {
            return None;
        };
        let parsed = Url::parse(raw).map_err(|e| FetchError::transport(raw.as_str(), e));
        Some(if self.is_base_url() {
            parsed.and_then(|base| {
                base.join(relative_path)
                    .map_err(|e| FetchError::transport(raw.as_str(), e))
            })
        } else {
            parsed
        })
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor())
    }
}

impl FromStr for Registry {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Registry::Local),
            "pds" => Ok(Registry::Pds),
            "github" => Ok(Registry::Github),
            other => match Url::parse(other) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    Ok(Registry::Url(other.to_string()))
                }
                _ => Err(FetchError::UnknownRegistry(other.to_string())),
            },
        }
    }
}

/// Builds the ordered candidate list used for a root's transitive
/// dependencies.
///
/// 1. The root's own source, if it is a base URL.
/// 2. Every other base URL declared in the manifest, in iteration order.
/// 3. The fixed `fallback` list, with [`Registry::Local`] moved to the end.
///
/// Duplicates are dropped, keeping the first occurrence.
///
/// # Examples
///
/// ```
/// use lexicon_pm_registry::{candidate_order, Registry};
///
/// let own: Registry = "https://a.example/".parse().unwrap();
/// let other: Registry = "https://b.example/".parse().unwrap();
/// let exact: Registry = "https://c.example/x.json".parse().unwrap();
/// let declared = [&own, &Registry::Local, &other, &exact, &own];
///
/// let order = candidate_order(&own, declared, &[Registry::Local, Registry::Pds]);
/// assert_eq!(order, vec![own.clone(), other, Registry::Pds, Registry::Local]);
/// ```
pub fn candidate_order<'a>(
    own: &Registry,
    declared: impl IntoIterator<Item = &'a Registry>,
    fallback: &[Registry],
) -> Vec<Registry> {
    let mut order: Vec<Registry> = Vec::new();
    let mut push = |registry: &Registry| {
        if !order.contains(registry) {
            order.push(registry.clone());
        }
    };

    if own.is_base_url() {
        push(own);
    }
    for registry in declared {
        if registry.is_base_url() {
            push(registry);
        }
    }
    for registry in fallback.iter().filter(|r| **r != Registry::Local) {
        push(registry);
    }
    push(&Registry::Local);

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptors() {
        assert_eq!("local".parse::<Registry>().unwrap(), Registry::Local);
        assert_eq!("pds".parse::<Registry>().unwrap(), Registry::Pds);
        assert_eq!("github".parse::<Registry>().unwrap(), Registry::Github);
        assert_eq!(
            "https://example.com/x/".parse::<Registry>().unwrap(),
            Registry::Url("https://example.com/x/".to_string())
        );
        assert!(matches!(
            "gitlab".parse::<Registry>(),
            Err(FetchError::UnknownRegistry(_))
        ));
        assert!(matches!(
            "ftp://example.com/".parse::<Registry>(),
            Err(FetchError::UnknownRegistry(_))
        ));
    }

    #[test]
    fn test_url_for_base_and_exact() {
        let base = Registry::Url("https://example.com/lexicons/".to_string());
        let url = base.url_for("com/example/foo.json").unwrap().unwrap();
        assert_eq!(url.as_str(), "https://example.com/lexicons/com/example/foo.json");

        let exact = Registry::Url("https://example.com/foo.json".to_string());
        let url = exact.url_for("com/example/foo.json").unwrap().unwrap();
        assert_eq!(url.as_str(), "https://example.com/foo.json");

        assert!(Registry::Local.url_for("a/b/c.json").is_none());
    }

    #[test]
    fn test_candidate_order_local_forced_last() {
        let order = candidate_order(
            &Registry::Local,
            [],
            &[Registry::Local, Registry::Pds, Registry::Github],
        );
        assert_eq!(order, vec![Registry::Pds, Registry::Github, Registry::Local]);
    }

    #[test]
    fn test_candidate_order_always_contains_local() {
        let order = candidate_order(&Registry::Pds, [], &[]);
        assert_eq!(order, vec![Registry::Local]);
    }
}
