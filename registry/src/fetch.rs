//! Source fetching.
//!
//! A [`SchemaFetcher`] turns `(identifier, source)` into raw schema text. It
//! never retries and never falls back to another source; trying several
//! sources in order is the resolver's job (see [`first_success`]).
//!
//! [`first_success`]: crate::first_success

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use lexicon_pm_core::{Nsid, read_lexicon_value};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::error::FetchError;
use crate::hosts::known_host;
use crate::identity::{HttpIdentityResolver, IdentityResolver};
use crate::source::Registry;

/// Collection that holds published lexicon schema records.
pub const SCHEMA_COLLECTION: &str = "com.atproto.lexicon.schema";

/// Produces raw schema text for one identifier from one source.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    /// Fetches `nsid` from `registry`. `base` is the local schema directory.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] variant matching the source kind.
    async fn fetch(&self, nsid: &Nsid, registry: &Registry, base: &Path) -> Result<String, FetchError>;
}

#[derive(Debug, Deserialize)]
struct GetRecordResponse {
    value: serde_json::Value,
}

/// [`SchemaFetcher`] for all four source kinds over the filesystem and HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher<I = HttpIdentityResolver> {
    client: Client,
    identity: I,
    extension: String,
}

impl HttpFetcher<HttpIdentityResolver> {
    /// Builds a fetcher with one shared HTTP client configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns the client construction error (e.g. TLS backend failure).
    pub fn from_config(config: &ResolverConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .user_agent(config.http.user_agent.clone())
            .build()?;
        let identity = HttpIdentityResolver::new(
            client.clone(),
            config.dns_resolver.clone(),
            config.plc_directory.clone(),
        );
        Ok(Self::new(client, identity, config.schema_extension.clone()))
    }
}

impl<I: IdentityResolver> HttpFetcher<I> {
    pub fn new(client: Client, identity: I, extension: impl Into<String>) -> Self {
        Self {
            client,
            identity,
            extension: extension.into(),
        }
    }

    /// Returns the identity resolver used for `pds` lookups.
    pub fn identity(&self) -> &I {
        &self.identity
    }

    async fn fetch_local(&self, nsid: &Nsid, base: &Path) -> Result<String, FetchError> {
        let path = base.join(nsid.to_path(&self.extension));
        debug!(nsid = %nsid, path = %path.display(), "Reading local schema");
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| FetchError::NotFound {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    async fn fetch_github(&self, nsid: &Nsid) -> Result<String, FetchError> {
        let host = known_host(nsid).ok_or_else(|| FetchError::UnknownAuthority(nsid.authority()))?;
        self.get_text(&host.url(nsid)).await
    }

    async fn fetch_url(&self, nsid: &Nsid, registry: &Registry) -> Result<String, FetchError> {
        let url = registry
            .url_for(&nsid.to_path(&self.extension))
            .ok_or_else(|| FetchError::UnknownRegistry(registry.to_string()))??;
        self.get_text(url.as_str()).await
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(url = %url, "Fetching schema");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::transport(url, format!("status {status}")));
        }
        response.text().await.map_err(|e| FetchError::transport(url, e))
    }

    async fn fetch_pds(&self, nsid: &Nsid) -> Result<String, FetchError> {
        let authority = nsid.authority();
        let dids = self.identity.dids_for_authority(&authority).await;
        if dids.is_empty() {
            debug!(authority = %authority, "No DID published for authority");
        }

        for did in &dids {
            for endpoint in self.identity.service_endpoints(did).await {
                let uri = format!("at://{did}/{SCHEMA_COLLECTION}/{nsid}");
                match self.get_record(&endpoint, did, nsid).await {
                    Ok(mut value) => {
                        if let Some(record) = value.as_object_mut() {
                            record.remove("$type");
                        }
                        let text = serde_json::to_string_pretty(&value)
                            .map_err(|e| FetchError::transport(uri.as_str(), e))?;
                        match read_lexicon_value(value, &uri, Some(nsid.as_str())) {
                            Ok(_) => return Ok(text),
                            Err(e) => debug!(uri = %uri, error = %e, "Invalid lexicon record"),
                        }
                    }
                    Err(e) => debug!(uri = %uri, error = %e, "Could not get record"),
                }
            }
        }

        Err(FetchError::NoRecordFound(nsid.to_string()))
    }

    async fn get_record(&self, endpoint: &str, did: &str, nsid: &Nsid) -> Result<serde_json::Value, FetchError> {
        let url = format!(
            "{}/xrpc/com.atproto.repo.getRecord",
            endpoint.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .query(&[("repo", did), ("collection", SCHEMA_COLLECTION), ("rkey", nsid.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::transport(url.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::transport(url, format!("status {status}")));
        }
        let body: GetRecordResponse = response
            .json()
            .await
            .map_err(|e| FetchError::transport(url.as_str(), e))?;
        Ok(body.value)
    }
}

#[async_trait]
impl<I: IdentityResolver> SchemaFetcher for HttpFetcher<I> {
    async fn fetch(&self, nsid: &Nsid, registry: &Registry, base: &Path) -> Result<String, FetchError> {
        match registry {
            Registry::Local => self.fetch_local(nsid, base).await,
            Registry::Pds => self.fetch_pds(nsid).await,
            Registry::Github => self.fetch_github(nsid).await,
            Registry::Url(_) => self.fetch_url(nsid, registry).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    struct NoIdentity;

    #[async_trait]
    impl IdentityResolver for NoIdentity {
        async fn dids_for_authority(&self, _authority: &str) -> Vec<String> {
            Vec::new()
        }

        async fn service_endpoints(&self, _did: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    fn fetcher() -> HttpFetcher<NoIdentity> {
        HttpFetcher::new(client(), NoIdentity, "json")
    }

    #[tokio::test]
    async fn test_local_reads_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("com/example");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("foo.json"), "{}").unwrap();

        let nsid = Nsid::parse("com.example.foo").unwrap();
        let text = fetcher().fetch(&nsid, &Registry::Local, dir.path()).await.unwrap();
        assert_eq!(text, "{}");
    }

    #[tokio::test]
    async fn test_local_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let nsid = Nsid::parse("com.example.missing").unwrap();
        let err = fetcher().fetch(&nsid, &Registry::Local, dir.path()).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_github_unknown_authority() {
        let nsid = Nsid::parse("com.example.foo").unwrap();
        let err = fetcher()
            .fetch(&nsid, &Registry::Github, Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnknownAuthority(a) if a == "example.com"));
    }

    #[tokio::test]
    async fn test_pds_without_dids_is_no_record() {
        let nsid = Nsid::parse("com.example.foo").unwrap();
        let err = fetcher()
            .fetch(&nsid, &Registry::Pds, Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoRecordFound(id) if id == "com.example.foo"));
    }

    /// Every DID in `dids` is served by the single `endpoint`.
    struct StaticIdentity {
        dids: Vec<&'static str>,
        endpoint: String,
    }

    #[async_trait]
    impl IdentityResolver for StaticIdentity {
        async fn dids_for_authority(&self, _authority: &str) -> Vec<String> {
            self.dids.iter().map(|d| d.to_string()).collect()
        }

        async fn service_endpoints(&self, _did: &str) -> Vec<String> {
            vec![self.endpoint.clone()]
        }
    }

    /// Serves canned responses on a loopback port and returns its base URL.
    /// `route` receives the request target with `%3A` decoded.
    async fn serve(route: fn(&str) -> (u16, String)) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let target = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .replace("%3A", ":");
                let (status, body) = route(&target);
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    fn schema_value(id: &str, property: &str) -> serde_json::Value {
        serde_json::json!({
            "lexicon": 1,
            "id": id,
            "defs": {
                "main": { "type": "object", "properties": { property: { "type": "string" } } }
            }
        })
    }

    fn pds_routes(target: &str) -> (u16, String) {
        if !target.starts_with("/xrpc/com.atproto.repo.getRecord?") {
            return (404, "{}".to_string());
        }
        if !target.contains("collection=com.atproto.lexicon.schema") || !target.contains("rkey=com.example.foo") {
            return (400, "{}".to_string());
        }
        let record = |id: &str, property: &str| {
            let mut value = schema_value(id, property);
            value["$type"] = serde_json::json!(SCHEMA_COLLECTION);
            serde_json::json!({ "uri": "at://x", "value": value }).to_string()
        };
        if target.contains("repo=did:plc:down") {
            (500, r#"{"error": "InternalServerError"}"#.to_string())
        } else if target.contains("repo=did:plc:wrong") {
            (200, record("com.example.other", "wrong"))
        } else if target.contains("repo=did:plc:good") {
            (200, record("com.example.foo", "first"))
        } else if target.contains("repo=did:plc:late") {
            (200, record("com.example.foo", "second"))
        } else {
            (400, "{}".to_string())
        }
    }

    #[tokio::test]
    async fn test_pds_first_valid_record_wins() {
        let endpoint = serve(pds_routes).await;
        let identity = StaticIdentity {
            dids: vec!["did:plc:down", "did:plc:wrong", "did:plc:good", "did:plc:late"],
            endpoint,
        };
        let fetcher = HttpFetcher::new(client(), identity, "json");
        let nsid = Nsid::parse("com.example.foo").unwrap();

        let text = fetcher.fetch(&nsid, &Registry::Pds, Path::new(".")).await.unwrap();
        assert!(!text.contains("$type"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, schema_value("com.example.foo", "first"));
        assert_eq!(text, serde_json::to_string_pretty(&value).unwrap());
    }

    #[tokio::test]
    async fn test_pds_all_records_rejected_is_no_record() {
        let endpoint = serve(pds_routes).await;
        let identity = StaticIdentity {
            dids: vec!["did:plc:down", "did:plc:wrong"],
            endpoint,
        };
        let fetcher = HttpFetcher::new(client(), identity, "json");
        let nsid = Nsid::parse("com.example.foo").unwrap();

        let err = fetcher.fetch(&nsid, &Registry::Pds, Path::new(".")).await.unwrap_err();
        assert!(matches!(err, FetchError::NoRecordFound(id) if id == "com.example.foo"));
    }

    fn url_routes(target: &str) -> (u16, String) {
        match target {
            "/lexicons/com/example/foo.json" => (200, schema_value("com.example.foo", "a").to_string()),
            _ => (404, "not found".to_string()),
        }
    }

    #[tokio::test]
    async fn test_url_base_and_exact() {
        let base = serve(url_routes).await;
        let fetcher = fetcher();
        let nsid = Nsid::parse("com.example.foo").unwrap();
        let expected = schema_value("com.example.foo", "a").to_string();

        let registry = Registry::Url(format!("{base}/lexicons/"));
        let text = fetcher.fetch(&nsid, &registry, Path::new(".")).await.unwrap();
        assert_eq!(text, expected);

        let exact = Registry::Url(format!("{base}/lexicons/com/example/foo.json"));
        let other = Nsid::parse("com.example.whatever").unwrap();
        let text = fetcher.fetch(&other, &exact, Path::new(".")).await.unwrap();
        assert_eq!(text, expected);
    }

    #[tokio::test]
    async fn test_url_error_status_is_transport() {
        let base = serve(url_routes).await;
        let registry = Registry::Url(format!("{base}/lexicons/"));
        let nsid = Nsid::parse("com.example.bar").unwrap();

        let err = fetcher().fetch(&nsid, &registry, Path::new(".")).await.unwrap_err();
        match err {
            FetchError::Transport { url, reason } => {
                assert!(url.ends_with("/lexicons/com/example/bar.json"), "url: {url}");
                assert!(reason.contains("404"), "reason: {reason}");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
