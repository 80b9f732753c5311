use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use ebms_core::EbmsError;

use super::{GatewayTransport, HttpReply};

/// Default request timeout, per the authority's interface description.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Production transport: reqwest with a fixed timeout and JSON bodies.
#[derive(Clone)]
pub struct HttpGateway {
    http_client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(timeout_secs: u64) -> Result<Arc<Self>, EbmsError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EbmsError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Arc::new(Self { http_client }))
    }

    pub fn with_default_timeout() -> Result<Arc<Self>, EbmsError> {
        Self::new(DEFAULT_TIMEOUT_SECS)
    }
}

#[async_trait]
impl GatewayTransport for HttpGateway {
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpReply, EbmsError> {
        let mut request = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EbmsError::Transport(format!("request to {url} timed out"))
            } else {
                EbmsError::Transport(format!("request to {url} failed: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| EbmsError::Transport(format!("failed to read reply from {url}: {e}")))?;

        tracing::debug!(url, status, "gateway reply received");
        Ok(HttpReply { status, body })
    }
}
