//! Fetching, resolving and installing lexicon schemas.
//!
//! - [`HttpFetcher`] implements [`SchemaFetcher`] for the four source kinds
//!   (`local`, `pds`, `github`, URL).
//! - [`Resolver`] walks the reference graph from the manifest roots, fetching
//!   each identifier once and trying candidate sources in order.
//! - [`diff`] and [`apply`] reconcile a directory with a set of files.
//! - [`Installer`] chains the above with an [`ApiGenerator`] per output
//!   target.
//!
//! The project side is described by [`Manifest`] (`lexpm.json`) and the
//! optional [`ResolverConfig`] (`.lexpm.yml`).

mod config;
mod error;
mod fallback;
mod fetch;
mod generate;
mod hosts;
mod identity;
mod infer;
mod install;
mod manifest;
mod reconcile;
mod resolve;
mod source;

pub use config::{CONFIG_FILE_NAME, HttpConfig, ResolverConfig};
pub use error::{Error, FetchError, GenerateError, Result};
pub use fallback::{Success, first_success};
pub use fetch::{HttpFetcher, SCHEMA_COLLECTION, SchemaFetcher};
pub use generate::{ApiGenerator, LexiconsModuleGenerator};
pub use hosts::{KNOWN_HOSTS, KnownHost, known_host};
pub use identity::{HttpIdentityResolver, IdentityResolver, did_document_url, dids_from_txt};
pub use infer::{infer_registry, parse_lexicon_arg};
pub use install::{InstallObserver, InstallOutcome, Installer, Stage};
pub use manifest::{DEFAULT_SCHEMA_DIR, LexiconChange, MANIFEST_FILE_NAME, Manifest, load_project_manifest};
pub use reconcile::{FileDiff, GeneratedFile, TreeWalker, apply, diff};
pub use resolve::{Resolution, ResolveEvent, ResolvedFile, ResolvedSchemaSet, Resolver};
pub use source::{Registry, candidate_order};
