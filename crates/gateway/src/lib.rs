use async_trait::async_trait;
use serde_json::Value;

use ebms_core::EbmsError;

pub mod auth;
pub mod client;
pub mod interpret;
pub mod mock;
pub mod token;

pub use auth::{Authenticator, Credentials};
pub use client::HttpGateway;
pub use token::TokenStore;

/// One HTTP exchange with the gateway. The body is kept as text so the
/// response interpreter owns all JSON tolerance.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Stateless transport to the gateway: POST a JSON body, get the reply.
///
/// Network-level failures (connect, timeout, interrupted body) surface as
/// [`EbmsError::Transport`]; any HTTP status is a successful exchange and is
/// classified by the caller.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpReply, EbmsError>;
}

/// The configured gateway endpoints. Every operation checks its own entry
/// and fails with [`EbmsError::Configuration`] before any network call.
#[derive(Debug, Clone, Default)]
pub struct EndpointSet {
    /// Invoice submission endpoint.
    pub api_url: Option<String>,
    pub login_url: Option<String>,
    pub cancel_url: Option<String>,
    /// Taxpayer-identifier (NIF) check endpoint.
    pub nif_check_url: Option<String>,
    pub get_invoice_url: Option<String>,
    /// Stock movement submission endpoint.
    pub stock_url: Option<String>,
}

impl EndpointSet {
    /// Resolve one endpoint or report which configuration entry is missing.
    pub fn require<'a>(
        url: &'a Option<String>,
        name: &str,
    ) -> Result<&'a str, EbmsError> {
        url.as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| EbmsError::Configuration(format!("{name} is not set")))
    }
}
