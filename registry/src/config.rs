//! Resolver configuration.
//!
//! Optional YAML file (`.lexpm.yml` next to the manifest) controlling network
//! behaviour and the fallback order used for undeclared dependencies. Every
//! field has a default, so an empty or absent file is valid.
//!
//! # Example YAML
//!
//! ```yaml
//! http:
//!   timeout_secs: 10
//!   user_agent: lexpm/0.1
//! dns_resolver: https://dns.google/resolve
//! plc_directory: https://plc.directory
//! fallback_registries:
//!   - pds
//!   - github
//!   - local
//! schema_extension: json
//! output_extensions:
//!   - ts
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};
use crate::source::Registry;

/// File name looked up next to the manifest.
pub const CONFIG_FILE_NAME: &str = ".lexpm.yml";

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("lexpm/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Top-level resolver configuration.
///
/// # Examples
///
/// ```
/// use lexicon_pm_registry::{Registry, ResolverConfig};
///
/// let config: ResolverConfig = serde_yaml::from_str("fallback_registries: [local, github]").unwrap();
/// assert_eq!(config.http.timeout_secs, 30);
/// assert_eq!(config.fallback().unwrap(), vec![Registry::Github, Registry::Local]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub http: HttpConfig,
    /// DNS-over-HTTPS JSON endpoint used for `_lexicon` TXT lookups.
    pub dns_resolver: String,
    /// Directory serving `did:plc` documents.
    pub plc_directory: String,
    /// Sources tried for dependencies after any declared base URLs.
    pub fallback_registries: Vec<String>,
    /// Extension of schema files in the schema directory.
    pub schema_extension: String,
    /// Extensions of files owned by the generators in output directories.
    pub output_extensions: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            dns_resolver: "https://dns.google/resolve".to_string(),
            plc_directory: "https://plc.directory".to_string(),
            fallback_registries: vec!["pds".to_string(), "github".to_string(), "local".to_string()],
            schema_extension: "json".to_string(),
            output_extensions: vec!["ts".to_string()],
        }
    }
}

impl ResolverConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::Error::Io) if the file cannot be read, or
    /// [`Yaml`](crate::Error::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::Error::Io) if the file cannot be written, or
    /// [`Yaml`](crate::Error::Yaml) if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Parses the fallback list, moving `local` to the end.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::UnknownRegistry`] for an unrecognised entry.
    pub fn fallback(&self) -> std::result::Result<Vec<Registry>, FetchError> {
        let mut registries = self
            .fallback_registries
            .iter()
            .map(|r| r.parse::<Registry>())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        registries.retain(|r| *r != Registry::Local);
        registries.push(Registry::Local);
        Ok(registries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: ResolverConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert_eq!(
            config.fallback().unwrap(),
            vec![Registry::Pds, Registry::Github, Registry::Local]
        );
    }

    #[test]
    fn test_partial_http_section() {
        let config: ResolverConfig = serde_yaml::from_str("http:\n  timeout_secs: 5\n").unwrap();
        assert_eq!(config.http.timeout_secs, 5);
        assert!(config.http.user_agent.starts_with("lexpm/"));
    }

    #[test]
    fn test_unknown_fallback_registry() {
        let config: ResolverConfig = serde_yaml::from_str("fallback_registries: [gitlab]").unwrap();
        assert!(matches!(config.fallback(), Err(FetchError::UnknownRegistry(r)) if r == "gitlab"));
    }

    #[test]
    fn test_load_or_default_and_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        assert_eq!(ResolverConfig::load_or_default(&path).unwrap(), ResolverConfig::default());

        let mut config = ResolverConfig::default();
        config.fallback_registries = vec!["local".to_string()];
        config.save(&path).unwrap();
        assert_eq!(ResolverConfig::load_or_default(&path).unwrap(), config);
    }
}
