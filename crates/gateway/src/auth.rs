use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use ebms_core::EbmsError;

use super::{GatewayTransport, TokenStore};

/// Gateway login credentials.
///
/// Custom `Debug` redacts the password so the struct can be logged.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Obtains fresh bearer tokens from the login endpoint and installs them in
/// the shared [`TokenStore`].
pub struct Authenticator {
    transport: Arc<dyn GatewayTransport>,
    login_url: Option<String>,
    credentials: Option<Credentials>,
    tokens: TokenStore,
    /// Serializes refreshes so concurrent auth failures coalesce into one login.
    refresh_lock: Mutex<()>,
}

impl Authenticator {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        login_url: Option<String>,
        credentials: Option<Credentials>,
        tokens: TokenStore,
    ) -> Self {
        Self {
            transport,
            login_url,
            credentials,
            tokens,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Log in and install the obtained token.
    ///
    /// Configuration is checked before any network call; a missing endpoint
    /// or credentials is never silently retried.
    pub async fn login(&self) -> Result<String, EbmsError> {
        let url = self
            .login_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| EbmsError::Configuration("login_url is not set".to_string()))?;
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| EbmsError::Configuration("login credentials are not set".to_string()))?;

        let body = json!({
            "username": credentials.username,
            "password": credentials.password,
        });
        let reply = self.transport.post_json(url, None, &body).await?;
        if !reply.is_http_success() {
            return Err(EbmsError::Authentication(format!(
                "login endpoint answered HTTP {}: {}",
                reply.status, reply.body
            )));
        }

        let parsed: Value = serde_json::from_str(&reply.body)
            .map_err(|e| EbmsError::Authentication(format!("malformed login reply: {e}")))?;
        if parsed.get("success").and_then(Value::as_bool) != Some(true) {
            let msg = parsed
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("login rejected by gateway");
            return Err(EbmsError::Authentication(msg.to_string()));
        }
        let token = parsed
            .pointer("/result/token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                EbmsError::Authentication("login reply carries no token".to_string())
            })?;

        self.tokens.set(token).await;
        tracing::info!("new EBMS token obtained and stored");
        Ok(token.to_string())
    }

    /// Replace a token the gateway just refused.
    ///
    /// Single-flight: concurrent submissions that hit an auth failure at the
    /// same time line up here, and whoever loses the race reuses the token
    /// the winner installed instead of logging in again. The caller's retry
    /// always uses the returned token, never a pre-refresh read.
    pub async fn refresh(&self, stale: Option<&str>) -> Result<String, EbmsError> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(current) = self.tokens.get().await {
            if Some(current.as_str()) != stale {
                return Ok(current);
            }
        }
        self.login().await
    }
}
