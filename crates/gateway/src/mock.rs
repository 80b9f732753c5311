//! Scripted transport for exercising the submission engine without a
//! network. Replies are consumed in order; every call is recorded so tests
//! can assert how many requests reached which endpoint and with which token.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use ebms_core::EbmsError;

use super::{GatewayTransport, HttpReply};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub bearer: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpReply, EbmsError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a reply with the given HTTP status and body.
    pub async fn push_reply(&self, status: u16, body: impl Into<String>) {
        self.replies
            .lock()
            .await
            .push_back(Ok(HttpReply { status, body: body.into() }));
    }

    /// Queue a transport-level failure.
    pub async fn push_error(&self, error: EbmsError) {
        self.replies.lock().await.push_back(Err(error));
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.url == url)
            .count()
    }
}

#[async_trait]
impl GatewayTransport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpReply, EbmsError> {
        self.calls.lock().await.push(RecordedCall {
            url: url.to_string(),
            bearer: bearer.map(str::to_string),
            body: body.clone(),
        });
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(EbmsError::Transport("script exhausted".to_string())))
    }
}
