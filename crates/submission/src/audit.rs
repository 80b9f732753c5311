use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// One line of the JSONL audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: String,
    pub event_type: String,
    /// Invoice number or stock item code the event concerns.
    pub document: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_sha256: Option<String>,
    /// Raw gateway response payload, kept verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl AuditEvent {
    pub fn new(event_type: &str, document: &str, state: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            event_type: event_type.to_string(),
            document: document.to_string(),
            state: state.to_string(),
            reference: None,
            error: None,
            payload_sha256: None,
            response: None,
        }
    }

    pub fn with_reference(mut self, reference: String) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_payload_hash(mut self, payload: &Value) -> Self {
        self.payload_sha256 = Some(hex::encode(Sha256::digest(payload.to_string())));
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }
}

/// Append-only audit trail. Write failures are the caller's to swallow;
/// an unwritable audit line must not fail the business operation.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(&self, event: &AuditEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json)?;
        tracing::debug!(event_type=%event.event_type, document=%event.document, "audit event written");
        Ok(())
    }
}
