use thiserror::Error;

/// Failure taxonomy for every EBMS operation.
///
/// `Configuration`, `Precondition` and `Validation` mean the operation was
/// never attempted against the gateway and the invoice record is untouched.
/// `Transport` and `BusinessRejection` are raised after an attempt, and for
/// submit/cancel the record additionally carries the error state.
#[derive(Debug, Error)]
pub enum EbmsError {
    /// A required endpoint, credential or key is not configured.
    #[error("missing EBMS configuration: {0}")]
    Configuration(String),

    /// The record is not in a state that allows the requested operation.
    #[error("operation not allowed: {0}")]
    Precondition(String),

    /// The gateway rejected the login, or rejected the refreshed token.
    #[error("EBMS authentication failed: {0}")]
    Authentication(String),

    /// Network failure, timeout, unexpected HTTP status or malformed body.
    #[error("EBMS transport failure: {0}")]
    Transport(String),

    /// The gateway answered but explicitly reported failure.
    #[error("rejected by EBMS: {0}")]
    BusinessRejection(String),

    /// Data required for the operation is missing from the record.
    #[error("nothing to verify: {0}")]
    Validation(String),

    /// The electronic signature could not be decoded or does not verify.
    #[error("signature does not match")]
    InvalidSignature,
}

impl EbmsError {
    /// Short stable tag used in audit records and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EbmsError::Configuration(_) => "configuration",
            EbmsError::Precondition(_) => "precondition",
            EbmsError::Authentication(_) => "authentication",
            EbmsError::Transport(_) => "transport",
            EbmsError::BusinessRejection(_) => "business_rejection",
            EbmsError::Validation(_) => "validation",
            EbmsError::InvalidSignature => "invalid_signature",
        }
    }
}
