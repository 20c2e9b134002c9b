//! HTTP data source.
//!
//! Talks to the league data API over HTTPS. Most endpoints answer with a
//! small `{"link": "..."}` envelope pointing at the real document, and large
//! documents (lap data) are split into chunks described by a `chunk_info`
//! object. Both indirections are resolved here so callers always receive the
//! complete document, with chunk rows concatenated under `_chunk_data`.

use crate::backend::DataSource;
use crate::cache::ResponseCache;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

/// Key under which resolved chunk rows are stored in the returned document.
pub(crate) const CHUNK_DATA: &str = "_chunk_data";

pub struct HttpSource {
    name: String,
    client: Client,
    /// API root without a trailing slash.
    base_url: String,
    cache: Option<ResponseCache>,
}
impl HttpSource {
    /// Create a new HTTP source.
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://members-ng.iracing.com`
    /// * `token` - Optional bearer token sent with every API request
    /// * `cache` - Optional response cache; without one every call hits the network
    ///
    /// # Errors
    ///
    /// Returns [`Client`](ErrorKind::Client) if the base URL is not http(s)
    /// or the token cannot be sent as a header.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        token: Option<&str>,
        timeout: Duration,
        cache: Option<ResponseCache>,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            exn::bail!(ErrorKind::Client(format!("base URL must be http(s): {base_url}")));
        }
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .or_raise(|| ErrorKind::Client("token is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("paddock/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Client("failed to build HTTP client".to_string()))?;
        Ok(Self {
            name: name.into(),
            client,
            base_url,
            cache,
        })
    }

    fn url(&self, path: &str) -> String {
        match path.starts_with('/') {
            true => format!("{}{path}", self.base_url),
            false => format!("{}/{path}", self.base_url),
        }
    }

    /// GET `url` and parse the body. `path` labels errors with the API
    /// resource that was asked for, not the (possibly signed) download URL.
    async fn get_json(&self, url: &str, path: &str) -> Result<Value> {
        let response = self.client.get(url).send().await.or_raise(|| ErrorKind::Transport(path.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.or_raise(|| ErrorKind::Transport(path.to_string()))?;
        serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidJson(path.to_string()))
    }

    async fn resolve(&self, path: &str) -> Result<Value> {
        let mut body = self.get_json(&self.url(path), path).await?;
        if let Some(link) = body.get("link").and_then(Value::as_str).map(str::to_owned) {
            tracing::trace!(path, "following link envelope");
            body = self.get_json(&link, path).await?;
        }
        if let Some(urls) = chunk_urls(path, &body)? {
            tracing::debug!(path, chunks = urls.len(), "downloading chunked response");
            let mut rows = Vec::new();
            for url in urls {
                match self.get_json(&url, path).await? {
                    Value::Array(chunk) => rows.extend(chunk),
                    _ => exn::bail!(ErrorKind::InvalidJson(path.to_string())),
                }
            }
            body.as_object_mut()
                .ok_or_raise(|| ErrorKind::InvalidJson(path.to_string()))?
                .insert(CHUNK_DATA.to_string(), Value::Array(rows));
        }
        Ok(body)
    }
}

/// Download URLs of every chunk described by the document's `chunk_info`,
/// or `None` when the document is not chunked.
fn chunk_urls(path: &str, body: &Value) -> Result<Option<Vec<String>>> {
    let info = match body.get("chunk_info") {
        None | Some(Value::Null) => return Ok(None),
        Some(info) => info,
    };
    let invalid = || ErrorKind::InvalidJson(path.to_string());
    let base = info.get("base_download_url").and_then(Value::as_str).ok_or_raise(invalid)?;
    let names = info.get("chunk_file_names").and_then(Value::as_array).ok_or_raise(invalid)?;
    let urls = names
        .iter()
        .map(|name| name.as_str().map(|name| format!("{base}{name}")))
        .collect::<Option<Vec<_>>>()
        .ok_or_raise(invalid)?;
    Ok(Some(urls))
}

#[async_trait]
impl DataSource for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, path: &str, ttl: Duration) -> Result<Vec<u8>> {
        if let Some(cache) = &self.cache
            && let Some(hit) = cache.get(path, ttl).await?
        {
            tracing::debug!(source = %self.name, path, "response cache hit");
            return Ok(hit);
        }
        tracing::debug!(source = %self.name, path, ttl_secs = ttl.as_secs(), "fetching");
        let body = self.resolve(path).await?;
        let bytes = serde_json::to_vec(&body).or_raise(|| ErrorKind::InvalidJson(path.to_string()))?;
        if let Some(cache) = &self.cache {
            cache.put(path, &bytes).await?;
        }
        Ok(bytes)
    }
}
