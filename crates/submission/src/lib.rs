//! The submission state machine: orchestrates transport, authentication,
//! response interpretation and state commits for one ledger record at a
//! time.
//!
//! Status graph: `Draft → Sent` (submit success), `Draft → Error` (submit
//! failure), `Error → Sent` (re-submit), `Sent → Draft` (cancel success),
//! any → `Draft` (reset). There is no terminal state; a record can be
//! resubmitted indefinitely.
//!
//! Every operation takes the record by `&mut`, so precondition check and
//! state commit are atomic per record and the caller cannot double-submit
//! the same invoice concurrently; distinct records are independent.

mod audit;
mod notify;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use ebms_core::{
    EbmsError, EbmsFields, EbmsStatus, GatewayResult, InvoiceRecord, LedgerState,
    StockMovementRecord,
};
use ebms_gateway::interpret::{interpret_body, is_auth_failure};
use ebms_gateway::{Authenticator, Credentials, EndpointSet, GatewayTransport, HttpReply, TokenStore};

pub use audit::{AuditEvent, AuditLog};
pub use notify::{LogNotifier, Notifier};

/// Inbound status notification from the gateway (webhook payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusNotification {
    pub invoice_reference: String,
    pub status: NotificationStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Validated,
    Rejected,
}

/// Orchestrates one record's relationship with the EBMS gateway.
pub struct SubmissionEngine {
    transport: Arc<dyn GatewayTransport>,
    endpoints: EndpointSet,
    tokens: TokenStore,
    authenticator: Authenticator,
    notifier: Arc<dyn Notifier>,
    audit: AuditLog,
}

impl SubmissionEngine {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        endpoints: EndpointSet,
        credentials: Option<Credentials>,
        notifier: Arc<dyn Notifier>,
        audit_log: impl Into<PathBuf>,
    ) -> Self {
        let tokens = TokenStore::new();
        let authenticator = Authenticator::new(
            Arc::clone(&transport),
            endpoints.login_url.clone(),
            credentials,
            tokens.clone(),
        );
        Self {
            transport,
            endpoints,
            tokens,
            authenticator,
            notifier,
            audit: AuditLog::new(audit_log),
        }
    }

    /// Wire an engine from the persisted configuration, reading the gateway
    /// credentials from the OS keychain when present.
    pub fn from_config(
        cfg: &ebms_config::EbmsConfig,
        transport: Arc<dyn GatewayTransport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let credentials = ebms_config::gateway_credentials()
            .ok()
            .map(|(username, password)| Credentials { username, password });
        let endpoints = EndpointSet {
            api_url: cfg.endpoints.api_url.clone(),
            login_url: cfg.endpoints.login_url.clone(),
            cancel_url: cfg.endpoints.cancel_url.clone(),
            nif_check_url: cfg.endpoints.nif_check_url.clone(),
            get_invoice_url: cfg.endpoints.get_invoice_url.clone(),
            stock_url: cfg.endpoints.stock_url.clone(),
        };
        Self::new(transport, endpoints, credentials, notifier, cfg.audit_log.clone())
    }

    /// The shared bearer-token slot, exposed so hosts can seed or clear it.
    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    /// Submit an invoice to the gateway.
    ///
    /// The payload is built by the host's field mapper; the engine owns the
    /// protocol. Preconditions fail before any network call and leave the
    /// record untouched.
    pub async fn submit(
        &self,
        invoice: &mut InvoiceRecord,
        payload: Value,
    ) -> Result<GatewayResult, EbmsError> {
        if !invoice.kind.is_client_facing() {
            return Err(EbmsError::Precondition(format!(
                "document {} is not a client invoice (FN, FA or RC)",
                invoice.number
            )));
        }
        if invoice.state != LedgerState::Posted {
            return Err(EbmsError::Precondition(format!(
                "invoice {} must be posted before submission",
                invoice.number
            )));
        }
        if invoice.ebms.status == EbmsStatus::Sent {
            return Err(EbmsError::Precondition(format!(
                "invoice {} was already sent to EBMS",
                invoice.number
            )));
        }
        let url = EndpointSet::require(&self.endpoints.api_url, "api_url")?;

        let number = invoice.number.clone();
        self.run_submission(url, &number, &mut invoice.ebms, &payload, "invoice")
            .await
    }

    /// Submit a stock movement. Same protocol skeleton as invoices.
    pub async fn submit_stock_movement(
        &self,
        movement: &mut StockMovementRecord,
        payload: Value,
    ) -> Result<GatewayResult, EbmsError> {
        if movement.ebms.status == EbmsStatus::Sent {
            return Err(EbmsError::Precondition(format!(
                "stock movement for {} was already sent to EBMS",
                movement.item_code
            )));
        }
        let url = EndpointSet::require(&self.endpoints.stock_url, "stock_url")?;

        let item = movement.item_code.clone();
        self.run_submission(url, &item, &mut movement.ebms, &payload, "stock_movement")
            .await
    }

    /// Cancel a previously submitted invoice on the gateway side.
    ///
    /// Success resets the record to draft; any failure stores the message
    /// but leaves the status where it was.
    pub async fn cancel(&self, invoice: &mut InvoiceRecord) -> Result<(), EbmsError> {
        let url = EndpointSet::require(&self.endpoints.cancel_url, "cancel_url")?;
        if self.tokens.get().await.is_none() {
            return Err(EbmsError::Configuration("no bearer token available".to_string()));
        }

        let payload = json!({ "invoice_number": invoice.number });
        let outcome = match self.post_with_auth_retry(url, &payload).await {
            Ok(reply) => parse_reply(&reply).map(|body| interpret_body(&body)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) if result.success => {
                invoice.ebms.status = EbmsStatus::Draft;
                invoice.ebms.error_message = None;
                let _ = self.audit.record(
                    &AuditEvent::new("invoice_cancelled", &invoice.number, "draft")
                        .with_response(result.raw),
                );
                self.notifier
                    .notify_success(&format!("Invoice {} cancelled on EBMS", invoice.number));
                tracing::info!(invoice = %invoice.number, "invoice cancelled on EBMS");
                Ok(())
            }
            Ok(result) => {
                invoice.ebms.error_message = Some(result.message.clone());
                let _ = self.audit.record(
                    &AuditEvent::new("cancel_rejected", &invoice.number, "unchanged")
                        .with_error(result.message.clone()),
                );
                self.notifier.notify_failure(&format!(
                    "EBMS refused to cancel invoice {}: {}",
                    invoice.number, result.message
                ));
                Err(EbmsError::BusinessRejection(result.message))
            }
            Err(error) => {
                if let EbmsError::Transport(msg) | EbmsError::Authentication(msg) = &error {
                    invoice.ebms.error_message = Some(msg.clone());
                    let _ = self.audit.record(
                        &AuditEvent::new("cancel_failed", &invoice.number, "unchanged")
                            .with_error(msg.clone()),
                    );
                    self.notifier.notify_failure(&format!(
                        "Cancelling invoice {} on EBMS failed: {msg}",
                        invoice.number
                    ));
                }
                Err(error)
            }
        }
    }

    /// Unconditionally clear the record's EBMS state. Never fails, never
    /// touches the network.
    pub fn reset(&self, invoice: &mut InvoiceRecord) {
        invoice.ebms.reset();
        let _ = self
            .audit
            .record(&AuditEvent::new("status_reset", &invoice.number, "draft"));
        self.notifier
            .notify_success(&format!("Invoice {} EBMS status reset to draft", invoice.number));
    }

    /// Stateless validity check of a partner taxpayer identifier.
    pub async fn check_tax_id(&self, tax_id: &str) -> Result<bool, EbmsError> {
        let url = EndpointSet::require(&self.endpoints.nif_check_url, "nif_check_url")?;
        if self.tokens.get().await.is_none() {
            return Err(EbmsError::Configuration("no bearer token available".to_string()));
        }

        let reply = self
            .post_with_auth_retry(url, &json!({ "nif": tax_id }))
            .await?;
        let body = parse_reply(&reply)?;
        let valid = body.get("valid").and_then(Value::as_bool).unwrap_or(false);
        tracing::info!(tax_id, valid, "EBMS tax id check");
        Ok(valid)
    }

    /// Fetch the gateway's stored detail of a registered invoice.
    pub async fn get_invoice(&self, invoice_identifier: &str) -> Result<Value, EbmsError> {
        let url = EndpointSet::require(&self.endpoints.get_invoice_url, "get_invoice_url")?;
        if self.tokens.get().await.is_none() {
            return Err(EbmsError::Configuration("no bearer token available".to_string()));
        }

        let reply = self
            .post_with_auth_retry(url, &json!({ "invoice_identifier": invoice_identifier }))
            .await?;
        let body = parse_reply(&reply)?;
        let result = interpret_body(&body);
        if result.success {
            Ok(body)
        } else {
            Err(EbmsError::BusinessRejection(result.message))
        }
    }

    /// Apply an inbound gateway status notification to the invoice it
    /// references.
    pub fn apply_status_notification(
        &self,
        invoice: &mut InvoiceRecord,
        note: &StatusNotification,
    ) -> Result<(), EbmsError> {
        if invoice.ebms.reference.as_deref() != Some(note.invoice_reference.as_str()) {
            return Err(EbmsError::Validation(format!(
                "notification reference {} does not match invoice {}",
                note.invoice_reference, invoice.number
            )));
        }
        match note.status {
            NotificationStatus::Validated => {
                invoice.ebms.status = EbmsStatus::Sent;
                invoice.ebms.error_message = None;
                let _ = self.audit.record(
                    &AuditEvent::new("status_notification", &invoice.number, "sent")
                        .with_reference(note.invoice_reference.clone()),
                );
                self.notifier
                    .notify_success(&format!("Invoice {} validated by EBMS", invoice.number));
            }
            NotificationStatus::Rejected => {
                let message = note
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "rejected by EBMS".to_string());
                invoice.ebms.commit_error(message.clone());
                let _ = self.audit.record(
                    &AuditEvent::new("status_notification", &invoice.number, "error")
                        .with_reference(note.invoice_reference.clone())
                        .with_error(message.clone()),
                );
                self.notifier
                    .notify_failure(&format!("Invoice {} rejected by EBMS: {message}", invoice.number));
            }
        }
        Ok(())
    }

    /// Verify the stored electronic signature against the authority's
    /// public key. Read-only; the verdict is audited and notified.
    pub fn verify_signature(
        &self,
        invoice: &InvoiceRecord,
        public_key_pem: Option<&str>,
    ) -> Result<(), EbmsError> {
        let pem = public_key_pem
            .filter(|k| !k.is_empty())
            .ok_or_else(|| EbmsError::Configuration("EBMS public key is not set".to_string()))?;
        let raw = invoice.ebms.raw_result.as_ref().ok_or_else(|| {
            EbmsError::Validation(format!("invoice {} has no stored gateway result", invoice.number))
        })?;
        let signature = invoice
            .ebms
            .signature
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                EbmsError::Validation(format!(
                    "invoice {} has no electronic signature",
                    invoice.number
                ))
            })?;

        match ebms_core::signature::verify_result_signature(raw, signature, pem) {
            Ok(()) => {
                let _ = self
                    .audit
                    .record(&AuditEvent::new("signature_verified", &invoice.number, "valid"));
                self.notifier.notify_success(&format!(
                    "Electronic signature of invoice {} is valid",
                    invoice.number
                ));
                Ok(())
            }
            Err(error) => {
                let _ = self.audit.record(
                    &AuditEvent::new("signature_check_failed", &invoice.number, "invalid")
                        .with_error(error.to_string()),
                );
                self.notifier.notify_failure(&format!(
                    "Electronic signature of invoice {}: {error}",
                    invoice.number
                ));
                Err(error)
            }
        }
    }

    /// Shared submit skeleton for invoices and stock movements: one POST,
    /// at most one auth-triggered refresh + resend, interpretation, commit.
    async fn run_submission(
        &self,
        url: &str,
        document: &str,
        fields: &mut EbmsFields,
        payload: &Value,
        kind: &str,
    ) -> Result<GatewayResult, EbmsError> {
        let outcome = match self.post_with_auth_retry(url, payload).await {
            Ok(reply) => parse_reply(&reply).map(|body| interpret_body(&body)),
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(result) => result,
            Err(error) => {
                // Transport and authentication failures happened after an
                // attempt reached the gateway: the stored state must reflect
                // them. Configuration problems mean nothing was attempted.
                if let EbmsError::Transport(msg) | EbmsError::Authentication(msg) = &error {
                    fields.commit_error(msg.clone());
                    let _ = self.audit.record(
                        &AuditEvent::new(&format!("{kind}_submission_failed"), document, "error")
                            .with_error(msg.clone())
                            .with_payload_hash(payload),
                    );
                    self.notifier
                        .notify_failure(&format!("Sending {document} to EBMS failed: {msg}"));
                }
                return Err(error);
            }
        };

        if result.success {
            fields.commit_sent(&result, Utc::now());
            let _ = self.audit.record(
                &AuditEvent::new(&format!("{kind}_submitted"), document, "sent")
                    .with_reference(result.reference.clone())
                    .with_payload_hash(payload)
                    .with_response(result.raw.clone()),
            );
            self.notifier.notify_success(&format!(
                "{document} submitted to EBMS, reference {}",
                result.reference
            ));
            tracing::info!(document, reference = %result.reference, "submitted to EBMS");
            Ok(result)
        } else {
            fields.commit_error(result.message.clone());
            let _ = self.audit.record(
                &AuditEvent::new(&format!("{kind}_rejected"), document, "error")
                    .with_error(result.message.clone())
                    .with_response(result.raw.clone()),
            );
            self.notifier
                .notify_failure(&format!("EBMS rejected {document}: {}", result.message));
            Err(EbmsError::BusinessRejection(result.message))
        }
    }

    /// POST with the current token; on an auth-failure reply, refresh the
    /// token exactly once and resend the same payload exactly once. The
    /// retry uses the token the refresh produced, never a pre-refresh read.
    async fn post_with_auth_retry(
        &self,
        url: &str,
        payload: &Value,
    ) -> Result<HttpReply, EbmsError> {
        let token = match self.tokens.get().await {
            Some(t) => t,
            // No token yet: one login up front before the first POST.
            None => self.authenticator.refresh(None).await?,
        };
        let reply = self.transport.post_json(url, Some(&token), payload).await?;
        if !is_auth_failure(&reply) {
            return Ok(reply);
        }

        tracing::warn!(url, "EBMS token refused, refreshing and retrying once");
        let fresh = self.authenticator.refresh(Some(&token)).await?;
        let retry = self.transport.post_json(url, Some(&fresh), payload).await?;
        if is_auth_failure(&retry) {
            return Err(EbmsError::Authentication(
                "gateway refused the refreshed token".to_string(),
            ));
        }
        Ok(retry)
    }
}

/// Classify an HTTP exchange: any non-2xx status or unparseable body is a
/// transport-level failure.
fn parse_reply(reply: &HttpReply) -> Result<Value, EbmsError> {
    if !reply.is_http_success() {
        return Err(EbmsError::Transport(format!(
            "gateway answered HTTP {}: {}",
            reply.status, reply.body
        )));
    }
    serde_json::from_str(&reply.body)
        .map_err(|e| EbmsError::Transport(format!("malformed gateway reply: {e}")))
}
