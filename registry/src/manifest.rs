//! Project manifest (`lexpm.json`).
//!
//! The manifest declares which output targets to generate and where, where
//! schema files live, and which source each root identifier comes from:
//!
//! ```json
//! {
//!   "apiTypes": { "TSClient": "./src/lexicon" },
//!   "schemaDir": "./lexicons",
//!   "lexicons": {
//!     "app.bsky.feed.post": "github",
//!     "com.example.foo": "local"
//!   }
//! }
//! ```
//!
//! Older single-target manifests (`apiType` + `outDir`) are folded into
//! `apiTypes` on load.

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use lexicon_pm_core::OutputTarget;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name of the manifest inside a project directory.
pub const MANIFEST_FILE_NAME: &str = "lexpm.json";

/// Default schema directory, relative to the project.
pub const DEFAULT_SCHEMA_DIR: &str = "./lexicons";

fn default_schema_dir() -> String {
    DEFAULT_SCHEMA_DIR.to_string()
}

/// Effect of [`Manifest::set_lexicon`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexiconChange {
    Added,
    Changed { previous: String },
    Unchanged,
}

/// The project manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Output-target tag → output directory.
    #[serde(default)]
    pub api_types: BTreeMap<String, String>,
    /// Schema directory, relative to the project.
    #[serde(default = "default_schema_dir")]
    pub schema_dir: String,
    /// Root identifier → source descriptor. Kept sorted.
    #[serde(default)]
    pub lexicons: BTreeMap<String, String>,
    #[serde(default, skip_serializing)]
    api_type: Option<String>,
    #[serde(default, skip_serializing)]
    out_dir: Option<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            api_types: BTreeMap::new(),
            schema_dir: default_schema_dir(),
            lexicons: BTreeMap::new(),
            api_type: None,
            out_dir: None,
        }
    }
}

impl Manifest {
    /// Creates a manifest with the given targets and schema directory.
    pub fn new(targets: BTreeMap<OutputTarget, String>, schema_dir: impl Into<String>) -> Self {
        Self {
            api_types: targets
                .into_iter()
                .map(|(target, dir)| (target.tag().to_string(), dir))
                .collect(),
            schema_dir: schema_dir.into(),
            ..Self::default()
        }
    }

    /// Loads a manifest from a JSON file, folding legacy keys.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::Error::Io) if the file cannot be read, or
    /// [`Json`](crate::Error::Json) if the content is not a manifest.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut manifest: Manifest = serde_json::from_reader(reader)?;
        manifest.fold_legacy();
        Ok(manifest)
    }

    /// Saves the manifest as pretty-printed JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::Error::Io) if the file cannot be written, or
    /// [`Json`](crate::Error::Json) if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    fn fold_legacy(&mut self) {
        if let (Some(tag), Some(dir)) = (self.api_type.take(), self.out_dir.take()) {
            self.api_types.entry(tag).or_insert(dir);
        }
    }

    /// Returns the declared output targets with their directories.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownOutputTarget`](crate::Error::UnknownOutputTarget) for
    /// an unrecognised tag. This is fatal for the whole run.
    pub fn output_targets(&self) -> Result<BTreeMap<OutputTarget, String>> {
        self.api_types
            .iter()
            .map(|(tag, dir)| -> Result<(OutputTarget, String)> { Ok((tag.parse()?, dir.clone())) })
            .collect()
    }

    /// Resolves the schema directory against the project directory.
    pub fn schema_path(&self, project: &Path) -> PathBuf {
        project.join(&self.schema_dir)
    }

    /// Records `registry` as the source of `nsid`.
    pub fn set_lexicon(&mut self, nsid: &str, registry: &str) -> LexiconChange {
        match self.lexicons.insert(nsid.to_string(), registry.to_string()) {
            None => LexiconChange::Added,
            Some(previous) if previous == registry => LexiconChange::Unchanged,
            Some(previous) => LexiconChange::Changed { previous },
        }
    }

    /// Removes `nsid`. Returns its previous source, if it was declared.
    pub fn remove_lexicon(&mut self, nsid: &str) -> Option<String> {
        self.lexicons.remove(nsid)
    }
}

/// Loads the manifest in `project`, failing with a hint if it is absent.
///
/// # Errors
///
/// Returns [`InvalidManifest`](crate::Error::InvalidManifest) when the file
/// does not exist, plus any [`Manifest::load`] error.
pub fn load_project_manifest(project: &Path) -> Result<Manifest> {
    let path = project.join(MANIFEST_FILE_NAME);
    if !path.exists() {
        return Err(Error::InvalidManifest(format!(
            "{} does not exist; run `lexpm init` first",
            path.display()
        )));
    }
    Manifest::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults() {
        let manifest: Manifest = serde_json::from_str("{}").unwrap();
        assert_eq!(manifest.schema_dir, "./lexicons");
        assert!(manifest.api_types.is_empty());
        assert!(manifest.lexicons.is_empty());
    }

    #[test]
    fn test_legacy_keys_are_folded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        std::fs::write(&path, r#"{"apiType": "TSServer", "outDir": "./src/server"}"#).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        let targets = manifest.output_targets().unwrap();
        assert_eq!(targets.get(&OutputTarget::Server).map(String::as_str), Some("./src/server"));

        manifest.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"apiTypes\""));
        assert!(!text.contains("outDir"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_unknown_target_is_fatal() {
        let manifest: Manifest = serde_json::from_str(r#"{"apiTypes": {"TSWeb": "./web"}}"#).unwrap();
        assert!(matches!(
            manifest.output_targets(),
            Err(Error::UnknownOutputTarget(_))
        ));
    }

    #[test]
    fn test_set_and_remove_lexicon() {
        let mut manifest = Manifest::default();
        assert_eq!(manifest.set_lexicon("com.example.foo", "local"), LexiconChange::Added);
        assert_eq!(manifest.set_lexicon("com.example.foo", "local"), LexiconChange::Unchanged);
        assert_eq!(
            manifest.set_lexicon("com.example.foo", "pds"),
            LexiconChange::Changed {
                previous: "local".to_string()
            }
        );
        assert_eq!(manifest.remove_lexicon("com.example.foo").as_deref(), Some("pds"));
        assert_eq!(manifest.remove_lexicon("com.example.foo"), None);
    }

    #[test]
    fn test_missing_project_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_project_manifest(dir.path()),
            Err(Error::InvalidManifest(_))
        ));
    }
}
