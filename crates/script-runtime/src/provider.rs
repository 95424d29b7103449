//! Script providers.
//!
//! - [`HttpScriptProvider`] fetches bodies from the tenant admin API
//! - [`InMemoryScriptProvider`] serves bodies registered in memory

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tenant_script_core::traits::ScriptProvider;
use tenant_script_core::{Error, Result, ScriptId, ScriptSource, TenantId};

/// Fetches scripts over HTTP.
///
/// Requests `GET {base_url}/admin/tenant-scripts/{script_id}?tenantId={tenant}`
/// and accepts any of the body spellings [`ScriptSource::from_json`] knows.
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::provider::HttpScriptProvider;
///
/// let provider = HttpScriptProvider::new("https://forms.example.com/");
/// assert_eq!(provider.base_url(), "https://forms.example.com");
/// ```
#[derive(Debug, Clone)]
pub struct HttpScriptProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScriptProvider {
    /// Creates a provider for the API rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a provider reusing an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// API root without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Script id is appended as one percent-encoded path segment.
    fn script_url(&self, script_id: &ScriptId) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| Error::SourceError {
            message: format!("Invalid script API URL {}: {e}", self.base_url),
            source: Some(Box::new(e)),
        })?;
        url.path_segments_mut()
            .map_err(|()| Error::SourceError {
                message: format!("Script API URL cannot have a path: {}", self.base_url),
                source: None,
            })?
            .pop_if_empty()
            .extend(["admin", "tenant-scripts", script_id.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl ScriptProvider for HttpScriptProvider {
    async fn fetch(&self, tenant: &TenantId, script_id: &ScriptId) -> Result<ScriptSource> {
        let url = self.script_url(script_id)?;
        tracing::debug!(tenant = %tenant, script = %script_id, "fetching script from {}", url);

        let response = self
            .client
            .get(url.clone())
            .query(&[("tenantId", tenant.as_str())])
            .send()
            .await
            .map_err(|e| Error::SourceError {
                message: format!("Failed to request {url}: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::ScriptNotFound {
                tenant_id: tenant.to_string(),
                script_id: script_id.to_string(),
            });
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::SourceError {
                message: format!("script request failed: {status} - {error_text}"),
                source: None,
            });
        }

        let payload: Value = response.json().await.map_err(|e| Error::SourceError {
            message: format!("Failed to read script response: {e}"),
            source: Some(Box::new(e)),
        })?;

        let source = ScriptSource::from_json(&payload, Some(tenant))?
            .with_identity(tenant.clone(), script_id.clone());
        tracing::debug!(script = %script_id, bytes = source.body().len(), "script fetched");
        Ok(source)
    }
}

/// Serves scripts registered in memory, keyed by tenant and script id.
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::provider::InMemoryScriptProvider;
/// use tenant_script_core::{ScriptId, TenantId};
///
/// let provider = InMemoryScriptProvider::new();
/// provider.insert(TenantId::new("acme"), ScriptId::new("onload"), "ui.toast('hi');");
/// assert_eq!(provider.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryScriptProvider {
    scripts: RwLock<HashMap<(TenantId, ScriptId), String>>,
}

impl InMemoryScriptProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a script body.
    pub fn insert(&self, tenant: TenantId, script_id: ScriptId, body: impl Into<String>) {
        self.scripts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((tenant, script_id), body.into());
    }

    /// Number of registered scripts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ScriptProvider for InMemoryScriptProvider {
    async fn fetch(&self, tenant: &TenantId, script_id: &ScriptId) -> Result<ScriptSource> {
        let scripts = self.scripts.read().unwrap_or_else(PoisonError::into_inner);
        scripts
            .get(&(tenant.clone(), script_id.clone()))
            .map(|body| {
                ScriptSource::inline(body.clone()).with_identity(tenant.clone(), script_id.clone())
            })
            .ok_or_else(|| Error::ScriptNotFound {
                tenant_id: tenant.to_string(),
                script_id: script_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns the request line it saw.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });
        (base, handle)
    }

    #[tokio::test]
    async fn test_http_fetch_accepts_any_body_key() {
        let (base, server) = serve_once("200 OK", r#"{"ScriptBody":"ui.toast('hi');"}"#).await;
        let provider = HttpScriptProvider::new(base);

        let source = provider
            .fetch(&TenantId::new("acme"), &ScriptId::new("onload"))
            .await
            .unwrap();
        assert_eq!(source.body(), "ui.toast('hi');");
        assert_eq!(source.script_id().map(ScriptId::as_str), Some("onload"));

        let request_line = server.await.unwrap();
        assert_eq!(
            request_line,
            "GET /admin/tenant-scripts/onload?tenantId=acme HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_http_script_id_is_one_path_segment() {
        let (base, server) = serve_once("200 OK", r#"{"script":"const a = 1;"}"#).await;
        let provider = HttpScriptProvider::new(format!("{base}/api/"));

        provider
            .fetch(&TenantId::new("acme"), &ScriptId::new("forms/on load?x#y"))
            .await
            .unwrap();

        let request_line = server.await.unwrap();
        assert_eq!(
            request_line,
            "GET /api/admin/tenant-scripts/forms%2Fon%20load%3Fx%23y?tenantId=acme HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_http_invalid_base_url() {
        let provider = HttpScriptProvider::new("not a url");
        let err = provider
            .fetch(&TenantId::new("acme"), &ScriptId::new("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceError { .. }));
    }

    #[tokio::test]
    async fn test_http_not_found() {
        let (base, _server) = serve_once("404 Not Found", "{}").await;
        let provider = HttpScriptProvider::new(base);
        let err = provider
            .fetch(&TenantId::new("acme"), &ScriptId::new("missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_http_server_error_is_source_error() {
        let (base, _server) = serve_once("500 Internal Server Error", "boom").await;
        let provider = HttpScriptProvider::new(base);
        let err = provider
            .fetch(&TenantId::new("acme"), &ScriptId::new("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceError { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_in_memory_scoped_by_tenant() {
        let provider = InMemoryScriptProvider::new();
        provider.insert(TenantId::new("acme"), ScriptId::new("s"), "const a = 1;");

        let source = provider
            .fetch(&TenantId::new("acme"), &ScriptId::new("s"))
            .await
            .unwrap();
        assert_eq!(source.body(), "const a = 1;");

        let err = provider
            .fetch(&TenantId::new("other"), &ScriptId::new("s"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
