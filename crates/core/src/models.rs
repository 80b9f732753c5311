use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where an invoice stands with the remote EBMS gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EbmsStatus {
    #[default]
    Draft,
    Sent,
    Error,
}

/// The EBMS-owned slice of a ledger record.
///
/// The host ledger owns the full invoice; this struct carries the fields the
/// submission engine reads and writes. Only the engine's commit helpers and
/// [`EbmsFields::reset`] change `status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EbmsFields {
    pub status: EbmsStatus,
    /// Registration reference issued by the gateway on success.
    pub reference: Option<String>,
    /// Base64 electronic signature issued by the gateway on success.
    pub signature: Option<String>,
    /// Verbatim "result" payload from the gateway. These exact bytes,
    /// re-serialized canonically, are the message the signature covers.
    pub raw_result: Option<Value>,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl EbmsFields {
    /// Commit a successful submission outcome.
    pub fn commit_sent(&mut self, result: &GatewayResult, now: DateTime<Utc>) {
        self.status = EbmsStatus::Sent;
        self.reference = Some(result.reference.clone());
        self.signature = Some(result.signature.clone());
        self.raw_result = Some(result.raw.clone());
        self.error_message = None;
        self.sent_at = Some(now);
    }

    /// Commit a failed attempt. The stored state reflects the last known
    /// outcome even though the call itself also reports the failure.
    pub fn commit_error(&mut self, message: impl Into<String>) {
        self.status = EbmsStatus::Error;
        self.error_message = Some(message.into());
    }

    /// Clear every EBMS field and return to `Draft`. Never fails.
    pub fn reset(&mut self) {
        *self = EbmsFields::default();
    }
}

/// Ledger document kinds the connector can encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    CustomerInvoice,
    CustomerRefund,
    CashReceipt,
    VendorBill,
    JournalEntry,
}

impl DocumentKind {
    /// Only client-facing documents may be submitted to the gateway.
    pub fn is_client_facing(&self) -> bool {
        matches!(
            self,
            DocumentKind::CustomerInvoice | DocumentKind::CustomerRefund | DocumentKind::CashReceipt
        )
    }

    /// Invoice type code in the authority nomenclature:
    /// FN = facture normale, FA = facture d'avoir, RC = reçu comptant.
    pub fn ebms_type_code(&self) -> Option<&'static str> {
        match self {
            DocumentKind::CustomerInvoice => Some("FN"),
            DocumentKind::CustomerRefund => Some("FA"),
            DocumentKind::CashReceipt => Some("RC"),
            DocumentKind::VendorBill | DocumentKind::JournalEntry => None,
        }
    }
}

/// Host ledger lifecycle state. Submission requires a posted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerState {
    Draft,
    Posted,
    Cancelled,
}

/// The view of an invoice the submission engine operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub number: String,
    pub kind: DocumentKind,
    pub state: LedgerState,
    #[serde(default)]
    pub ebms: EbmsFields,
}

impl InvoiceRecord {
    pub fn new(number: impl Into<String>, kind: DocumentKind, state: LedgerState) -> Self {
        Self {
            number: number.into(),
            kind,
            state,
            ebms: EbmsFields::default(),
        }
    }
}

/// Stock movement type codes from the authority specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    EntryNormal,
    EntryReturn,
    EntryInventory,
    EntryAdjustment,
    EntryTransfer,
    EntryOther,
    ExitNormal,
    ExitLoss,
    ExitSale,
    ExitDestruction,
    ExitConsumption,
    ExitAdjustment,
    ExitTransfer,
    ExitOther,
}

impl MovementType {
    pub fn code(&self) -> &'static str {
        match self {
            MovementType::EntryNormal => "EN",
            MovementType::EntryReturn => "ER",
            MovementType::EntryInventory => "EI",
            MovementType::EntryAdjustment => "EAJ",
            MovementType::EntryTransfer => "ET",
            MovementType::EntryOther => "EAU",
            MovementType::ExitNormal => "SN",
            MovementType::ExitLoss => "SP",
            MovementType::ExitSale => "SV",
            MovementType::ExitDestruction => "SD",
            MovementType::ExitConsumption => "SC",
            MovementType::ExitAdjustment => "SAJ",
            MovementType::ExitTransfer => "ST",
            MovementType::ExitOther => "SAU",
        }
    }
}

/// The view of a stock movement the engine operates on. Same protocol
/// skeleton as invoices, lower cardinality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovementRecord {
    pub item_code: String,
    pub movement_type: MovementType,
    #[serde(default)]
    pub ebms: EbmsFields,
}

/// Canonical gateway result, normalized from one HTTP response body
/// regardless of which of the gateway's response shapes produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResult {
    pub success: bool,
    pub reference: String,
    pub signature: String,
    pub message: String,
    /// The gateway's "result" object verbatim (or the whole body when the
    /// gateway answered flat), kept for signature verification.
    pub raw: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sent_result() -> GatewayResult {
        GatewayResult {
            success: true,
            reference: "OBR123".to_string(),
            signature: "SIG1".to_string(),
            message: "OK".to_string(),
            raw: json!({"reference": "OBR123"}),
        }
    }

    #[test]
    fn status_defaults_to_draft() {
        assert_eq!(EbmsFields::default().status, EbmsStatus::Draft);
    }

    #[test]
    fn commit_sent_sets_all_fields_and_clears_error() {
        let mut fields = EbmsFields::default();
        fields.commit_error("previous failure");
        fields.commit_sent(&sent_result(), Utc::now());
        assert_eq!(fields.status, EbmsStatus::Sent);
        assert_eq!(fields.reference.as_deref(), Some("OBR123"));
        assert_eq!(fields.signature.as_deref(), Some("SIG1"));
        assert!(fields.error_message.is_none());
        assert!(fields.sent_at.is_some());
        assert!(fields.raw_result.is_some());
    }

    #[test]
    fn reset_clears_everything_regardless_of_prior_status() {
        for prior in [EbmsStatus::Draft, EbmsStatus::Sent, EbmsStatus::Error] {
            let mut fields = EbmsFields::default();
            fields.commit_sent(&sent_result(), Utc::now());
            fields.status = prior;
            fields.error_message = Some("boom".to_string());
            fields.reset();
            assert_eq!(fields.status, EbmsStatus::Draft);
            assert!(fields.reference.is_none());
            assert!(fields.signature.is_none());
            assert!(fields.raw_result.is_none());
            assert!(fields.error_message.is_none());
            assert!(fields.sent_at.is_none());
        }
    }

    #[test]
    fn client_facing_kinds_have_type_codes() {
        assert_eq!(DocumentKind::CustomerInvoice.ebms_type_code(), Some("FN"));
        assert_eq!(DocumentKind::CustomerRefund.ebms_type_code(), Some("FA"));
        assert_eq!(DocumentKind::CashReceipt.ebms_type_code(), Some("RC"));
        assert_eq!(DocumentKind::VendorBill.ebms_type_code(), None);
        assert!(!DocumentKind::JournalEntry.is_client_facing());
    }

    #[test]
    fn movement_codes_match_authority_nomenclature() {
        assert_eq!(MovementType::EntryNormal.code(), "EN");
        assert_eq!(MovementType::ExitSale.code(), "SV");
        assert_eq!(MovementType::ExitOther.code(), "SAU");
    }
}
