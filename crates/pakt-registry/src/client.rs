use pakt_constants::{DEFAULT_REGISTRY, MAX_ATTEMPTS, USER_AGENT};
use pakt_error::{PackageManagerError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::metadata::{PackageMetadata, Tarball};

/// Source of package metadata and tarballs.
pub trait IndexClient: Send + Sync {
    fn package_metadata(&self, name: &str) -> impl Future<Output = Result<PackageMetadata>> + Send;

    /// Downloads the tarball of `name@version`; `url` is the location recorded
    /// when the version was resolved (`dist.tarball` or the lockfile).
    fn fetch_tarball(
        &self,
        name: &str,
        version: &str,
        url: &str,
    ) -> impl Future<Output = Result<Tarball>> + Send;
}

impl<T: IndexClient> IndexClient for Arc<T> {
    fn package_metadata(&self, name: &str) -> impl Future<Output = Result<PackageMetadata>> + Send {
        (**self).package_metadata(name)
    }

    fn fetch_tarball(
        &self,
        name: &str,
        version: &str,
        url: &str,
    ) -> impl Future<Output = Result<Tarball>> + Send {
        (**self).fetch_tarball(name, version, url)
    }
}

pub struct HttpIndexClient {
    registry: String,
    client: reqwest::Client,
    cache: Mutex<HashMap<String, PackageMetadata>>,
}

impl Default for HttpIndexClient {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY)
    }
}

impl HttpIndexClient {
    #[must_use]
    pub fn new(registry: &str) -> Self {
        Self {
            registry: registry.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .pool_max_idle_per_host(25)
                .pool_idle_timeout(Some(Duration::from_secs(90)))
                .timeout(Duration::from_secs(45))
                .connect_timeout(Duration::from_secs(20))
                .tcp_keepalive(Some(Duration::from_secs(60)))
                .tcp_nodelay(true)
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// GET with bounded retries; 429 and 5xx responses are retried with backoff.
    async fn get_with_retry(&self, url: &str, accept: &str, what: &str) -> Result<reqwest::Response> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let resp = match self.client.get(url).header("Accept", accept).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if attempts < MAX_ATTEMPTS {
                        let delay = std::cmp::min(1000 * u64::from(attempts), 5000);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        continue;
                    }
                    return Err(PackageManagerError::NetworkError(if e.is_timeout() {
                        format!("Request timeout for {what} after {attempts} attempts")
                    } else if e.is_connect() {
                        format!("Connection failed for {what}: {e}")
                    } else {
                        format!("Network error for {what}: {e}")
                    }));
                }
            };

            let status = resp.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(PackageManagerError::NotFound(what.to_string(), "*".to_string()));
            }
            if status.is_success() {
                return Ok(resp);
            }
            if attempts < MAX_ATTEMPTS
                && (status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
            {
                tokio::time::sleep(Duration::from_millis(1000 * u64::from(attempts))).await;
                continue;
            }
            return Err(PackageManagerError::NetworkError(format!(
                "HTTP {status} for {what}"
            )));
        }
    }
}

impl IndexClient for HttpIndexClient {
    async fn package_metadata(&self, name: &str) -> Result<PackageMetadata> {
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(name) {
                return Ok(cached.clone());
            }
        }

        let url = format!("{}/{}", self.registry, urlencoding::encode(name));
        let resp = self
            .get_with_retry(
                &url,
                "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8",
                name,
            )
            .await?;
        let text = resp
            .text()
            .await
            .map_err(|e| PackageManagerError::NetworkError(format!("Failed to read response for {name}: {e}")))?;
        let metadata: PackageMetadata = serde_json::from_str(&text).map_err(|e| {
            PackageManagerError::NetworkError(format!(
                "Failed to parse metadata for {name} (response length: {}): {e}",
                text.len()
            ))
        })?;

        self.cache
            .lock()
            .await
            .insert(name.to_string(), metadata.clone());
        Ok(metadata)
    }

    async fn fetch_tarball(&self, name: &str, version: &str, url: &str) -> Result<Tarball> {
        let what = format!("{name}@{version}");
        let resp = self
            .get_with_retry(url, "application/octet-stream", &what)
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PackageManagerError::NetworkError(format!("Failed to download {what}: {e}")))?;

        Ok(Tarball {
            bytes: bytes.to_vec(),
            integrity: None,
        })
    }
}
