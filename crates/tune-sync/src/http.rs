//! HTTP implementation of the gateway (`reqwest`).

use std::sync::Arc;

use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::{Client, RequestBuilder};
use smol_str::SmolStr;
use tracing::debug;
use tune_core::{Metadata, SyncError};

use crate::config::ServerConfig;
use crate::gateway::Gateway;
use crate::wire;

/// Gateway speaking to the rendering backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: SmolStr,
}

impl HttpGateway {
    /// Build a client with the configured base URL and request timeout.
    pub fn new(config: &ServerConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| SyncError::transport("build http client", None, err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Normalized base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket URL of the live-update stream, derived from the base URL.
    #[must_use]
    pub fn live_updates_url(&self) -> String {
        live_updates_url(&self.base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Vec<u8>, SyncError> {
        let response = request.send().await.map_err(|err| {
            SyncError::transport(
                operation,
                err.status().map(|status| status.as_u16()),
                err.to_string(),
            )
        })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| SyncError::transport(operation, Some(status.as_u16()), err.to_string()))?;
        debug!("{operation}: {status} ({} bytes)", body.len());
        if !status.is_success() {
            let message = wire::decode_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(SyncError::transport(
                operation,
                Some(status.as_u16()),
                message,
            ));
        }
        Ok(body.to_vec())
    }
}

impl Gateway for HttpGateway {
    async fn fetch_metadata(&self) -> Result<Metadata, SyncError> {
        let body = self
            .send("fetch metadata", self.client.get(self.url("/param")))
            .await?;
        wire::decode_metadata(&body)
    }

    async fn fetch_version(&self) -> Result<u64, SyncError> {
        let body = self
            .send("fetch version", self.client.get(self.url("/param/version")))
            .await?;
        wire::decode_version(&body)
    }

    async fn fetch_artifact(&self, version: u64) -> Result<Arc<[u8]>, SyncError> {
        let request = self
            .client
            .get(self.url("/result.png"))
            .query(&[("v", version)])
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache");
        let body = self
            .send(&format!("fetch artifact v{version}"), request)
            .await?;
        Ok(Arc::from(body))
    }

    async fn write_parameter(&self, key: &str, value: f64) -> Result<(), SyncError> {
        let operation = format!("write '{key}'");
        let body = wire::encode_write(key, value)?;
        debug!("{operation}: {body}");
        let request = self
            .client
            .put(self.url(&format!("/param/{}", urlencoding::encode(key))))
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.send(&operation, request).await.map(|_| ())
    }
}

/// Map `http(s)://host/base` to `ws(s)://host/base/param/live-updates`.
#[must_use]
pub fn live_updates_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let socket = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{socket}/param/live-updates")
}
