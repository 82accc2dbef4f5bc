//! Core lexicon schema primitives.
//!
//! This crate holds everything about a single schema document that does not
//! need I/O:
//!
//! - [`Nsid`]: the namespaced identifier grammar and its mapping onto file
//!   paths.
//! - [`LexiconDoc`] / [`LexDef`]: the document model, a closed tagged enum
//!   over definition kinds.
//! - [`read_lexicon`]: text in, validated document or [`ReadError`] out.
//!   Structural validation ([`validate_document`]) reports every offending
//!   path, not just the first.
//! - [`extract_references`]: which other documents a document depends on for
//!   a given [`OutputTarget`].
//!
//! # Example
//!
//! ```
//! use lexicon_pm_core::*;
//!
//! let text = r#"{
//!     "lexicon": 1,
//!     "id": "com.example.foo",
//!     "defs": {
//!         "main": {
//!             "type": "record",
//!             "record": {
//!                 "type": "object",
//!                 "properties": { "bar": { "type": "ref", "ref": "com.example.bar" } }
//!             }
//!         }
//!     }
//! }"#;
//!
//! let nsid = Nsid::parse("com.example.foo").unwrap();
//! let doc = read_lexicon(text, &nsid.to_path("json"), Some(nsid.as_str())).unwrap();
//! let deps = extract_references(&doc, OutputTarget::Client);
//! assert_eq!(deps.into_iter().next().unwrap().as_str(), "com.example.bar");
//! ```

mod lexicon;
mod nsid;
mod reader;
mod refs;
mod target;
mod validate;

pub use lexicon::*;
pub use nsid::{MAX_NSID_LEN, Nsid, NsidError};
pub use reader::{ReadError, read_lexicon, read_lexicon_value};
pub use refs::{extract_references, reference_document};
pub use target::{OutputTarget, UnknownOutputTarget};
pub use validate::{IssueKind, ValidationIssue, validate_document};
