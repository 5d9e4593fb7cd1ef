//! Content loading for frames.
//!
//! A frame's target URL is a path on the analytics server. Fetching it returns
//! a JSON view descriptor (`{"view_path": ..., "data": ...}`) that tells the
//! widget which page to show in the iframe and what to hand it once loaded.

use futures_util::future::BoxFuture;
use reqwest::header::ACCEPT;
use std::time::Duration;
use url::Url;

use crate::frame::{FrameContent, LoadError};

/// Maximum response body size (10 MB).
const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Connect timeout for the analytics server. The overall load deadline is
/// owned by the frame, not the client.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Fetches the view descriptor behind a frame's target URL.
pub trait ContentLoader: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<FrameContent, LoadError>>;
}

/// Validate that an analytics server base URL is usable.
/// - Must parse
/// - Must be http:// or https://
pub(crate) fn validate_base_url(url: &str) -> Result<Url, String> {
    let parsed = Url::parse(url).map_err(|e| format!("Invalid URL \"{url}\": {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(format!("Scheme \"{scheme}\" is not allowed; use http or https")),
    }
}

/// Loads view descriptors from the analytics server over HTTP.
pub struct HttpContentLoader {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpContentLoader {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let base_url = validate_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;
        Ok(Self { client, base_url })
    }

    fn resolve(&self, target: &str) -> Result<Url, LoadError> {
        self.base_url
            .join(target)
            .map_err(|e| LoadError::network(format!("Invalid frame url \"{target}\": {e}")))
    }
}

impl ContentLoader for HttpContentLoader {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<FrameContent, LoadError>> {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let resolved = self.resolve(url);
        Box::pin(async move {
            let url = resolved?;
            let response = client
                .get(url.clone())
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| LoadError::network(format!("Request to {url} failed: {e}")))?;

            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| LoadError::network(format!("Failed to read response body: {e}")))?;

            if body.len() > MAX_RESPONSE_BYTES {
                return Err(LoadError::decode(format!(
                    "Response body exceeds maximum size ({} bytes > {} bytes)",
                    body.len(),
                    MAX_RESPONSE_BYTES
                )));
            }

            if !status.is_success() {
                return Err(LoadError::http(status.as_u16(), error_message(&body, status)));
            }

            let mut content = serde_json::from_slice::<FrameContent>(&body)
                .map_err(|e| LoadError::decode(format!("Malformed analytics response: {e}")))?;
            // The iframe is served by the dashboard host, so the view must
            // point back at the analytics server.
            let view_url = base_url.join(&content.view_path).map_err(|e| {
                LoadError::decode(format!("Invalid view path \"{}\": {e}", content.view_path))
            })?;
            content.view_path = view_url.to_string();
            Ok(content)
        })
    }
}

/// Pull a human-readable message out of an error response.
/// Prefers a JSON `message` field, then the raw body, then the status reason.
fn error_message(body: &[u8], status: reqwest::StatusCode) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body)
        && let Some(message) = json.get("message").and_then(|m| m.as_str())
    {
        return message.to_string();
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if !text.is_empty() {
        return text;
    }
    status.canonical_reason().unwrap_or("request failed").to_string()
}
