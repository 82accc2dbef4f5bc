//! Identity lookup for the `pds` registry.
//!
//! Publishing authorities advertise their DID in a `_lexicon.{authority}` TXT
//! record. Each DID resolves to a document listing service endpoints, and
//! each endpoint may hold a schema record. Every step here degrades to "no
//! candidates" rather than failing, so an unreachable resolver looks the same
//! as an authority that publishes nothing.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

/// Black-box lookups used by the `pds` registry and by registry inference.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Returns the DIDs advertised for `authority`, in answer order.
    async fn dids_for_authority(&self, authority: &str) -> Vec<String>;

    /// Returns the string service endpoints of `did`'s document.
    async fn service_endpoints(&self, did: &str) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct DnsResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DnsAnswer>,
}

#[derive(Debug, Deserialize)]
struct DnsAnswer {
    data: String,
}

#[derive(Debug, Deserialize)]
struct DidDocument {
    #[serde(default)]
    service: Vec<DidService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DidService {
    service_endpoint: serde_json::Value,
}

/// Extracts `did=` values from TXT record data, stripping DNS quoting.
///
/// # Examples
///
/// ```
/// use lexicon_pm_registry::dids_from_txt;
///
/// let dids = dids_from_txt(["\"did=did:plc:abc\"", "v=spf1", "did=did:web:example.com"]);
/// assert_eq!(dids, vec!["did:plc:abc", "did:web:example.com"]);
/// ```
pub fn dids_from_txt<'a>(records: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    records
        .into_iter()
        .map(|data| data.trim().trim_matches('"'))
        .filter_map(|data| data.strip_prefix("did="))
        .filter(|did| !did.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the URL of the DID document for `did`, or `None` for unsupported
/// methods.
pub fn did_document_url(did: &str, plc_directory: &str) -> Option<String> {
    if did.starts_with("did:plc:") {
        Some(format!("{}/{did}", plc_directory.trim_end_matches('/')))
    } else if let Some(host) = did.strip_prefix("did:web:") {
        let host = host.replace("%3A", ":");
        Some(format!("https://{host}/.well-known/did.json"))
    } else {
        None
    }
}

/// [`IdentityResolver`] backed by DNS-over-HTTPS and DID document fetches.
#[derive(Debug, Clone)]
pub struct HttpIdentityResolver {
    client: Client,
    dns_resolver: String,
    plc_directory: String,
}

impl HttpIdentityResolver {
    pub fn new(client: Client, dns_resolver: impl Into<String>, plc_directory: impl Into<String>) -> Self {
        Self {
            client,
            dns_resolver: dns_resolver.into(),
            plc_directory: plc_directory.into(),
        }
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn dids_for_authority(&self, authority: &str) -> Vec<String> {
        let name = format!("_lexicon.{authority}");
        let response = self
            .client
            .get(&self.dns_resolver)
            .query(&[("name", name.as_str()), ("type", "TXT")])
            .header(ACCEPT, "application/dns-json")
            .send()
            .await;

        let body: DnsResponse = match response {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(name = %name, error = %e, "Invalid DNS response");
                    return Vec::new();
                }
            },
            Ok(r) => {
                debug!(name = %name, status = %r.status(), "DNS lookup failed");
                return Vec::new();
            }
            Err(e) => {
                debug!(name = %name, error = %e, "DNS lookup failed");
                return Vec::new();
            }
        };

        let dids = dids_from_txt(body.answer.iter().map(|a| a.data.as_str()));
        debug!(name = %name, count = dids.len(), "Resolved lexicon authority");
        dids
    }

    async fn service_endpoints(&self, did: &str) -> Vec<String> {
        let Some(url) = did_document_url(did, &self.plc_directory) else {
            debug!(did = %did, "Unsupported DID method");
            return Vec::new();
        };

        let document: DidDocument = match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => match r.json().await {
                Ok(doc) => doc,
                Err(e) => {
                    debug!(did = %did, error = %e, "Invalid DID document");
                    return Vec::new();
                }
            },
            Ok(r) => {
                debug!(did = %did, status = %r.status(), "DID document fetch failed");
                return Vec::new();
            }
            Err(e) => {
                debug!(did = %did, error = %e, "DID document fetch failed");
                return Vec::new();
            }
        };

        string_endpoints(did, document)
    }
}

fn string_endpoints(did: &str, document: DidDocument) -> Vec<String> {
    document
        .service
        .into_iter()
        .filter_map(|service| match service.service_endpoint {
            serde_json::Value::String(endpoint) => Some(endpoint),
            other => {
                debug!(did = %did, endpoint = %other, "Skipping non-string service endpoint");
                None
            }
        })
        .collect()
}
