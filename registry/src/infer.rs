//! Choosing a source for a newly added identifier.

use std::path::Path;

use lexicon_pm_core::Nsid;
use tracing::debug;

use crate::error::FetchError;
use crate::hosts::known_host;
use crate::identity::IdentityResolver;
use crate::source::Registry;

/// Splits an `add` argument of the form `[registry:]nsid` at the last `:`.
///
/// # Examples
///
/// ```
/// use lexicon_pm_registry::parse_lexicon_arg;
///
/// assert_eq!(parse_lexicon_arg("com.example.foo"), (None, "com.example.foo"));
/// assert_eq!(parse_lexicon_arg("local:com.example.foo"), (Some("local"), "com.example.foo"));
/// assert_eq!(
///     parse_lexicon_arg("https://example.com/lexicons/:com.example.foo"),
///     (Some("https://example.com/lexicons/"), "com.example.foo")
/// );
/// ```
pub fn parse_lexicon_arg(arg: &str) -> (Option<&str>, &str) {
    match arg.rsplit_once(':') {
        Some((registry, nsid)) => (Some(registry), nsid),
        None => (None, arg),
    }
}

/// Picks a source for `nsid` when none was given.
///
/// Tried in order: `pds` if the authority publishes a DID, `github` if the
/// authority is in the known-host table, `local` if the schema file exists
/// under `schema_dir`.
///
/// # Errors
///
/// Returns [`FetchError::UnknownRegistry`] when nothing matches.
pub async fn infer_registry<I: IdentityResolver + ?Sized>(
    nsid: &Nsid,
    identity: &I,
    schema_dir: &Path,
    extension: &str,
) -> Result<Registry, FetchError> {
    let authority = nsid.authority();
    if !identity.dids_for_authority(&authority).await.is_empty() {
        debug!(nsid = %nsid, "Authority publishes a DID, using pds");
        return Ok(Registry::Pds);
    }
    if known_host(nsid).is_some() {
        debug!(nsid = %nsid, "Authority is a known host, using github");
        return Ok(Registry::Github);
    }
    if schema_dir.join(nsid.to_path(extension)).is_file() {
        debug!(nsid = %nsid, "Schema file exists, using local");
        return Ok(Registry::Local);
    }
    Err(FetchError::UnknownRegistry(nsid.to_string()))
}
