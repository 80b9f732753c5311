//! Offline verification of the gateway's electronic signature.
//!
//! The authority signs the SHA-256 digest of the canonical serialization of
//! the result payload with its RSA key (PKCS#1 v1.5 padding). Verification
//! needs only the published public key; no network call is involved.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::to_canonical_bytes;
use crate::error::EbmsError;

/// Verify the authority's signature over a persisted result payload.
///
/// `raw_result` is the stored gateway result object, `signature_b64` the
/// base64 signature received with it, `public_key_pem` the authority's
/// public key in PEM (SubjectPublicKeyInfo) form.
///
/// An unparseable key is a configuration problem; undecodable signature
/// bytes and digest mismatches are both reported as [`EbmsError::InvalidSignature`].
pub fn verify_result_signature(
    raw_result: &Value,
    signature_b64: &str,
    public_key_pem: &str,
) -> Result<(), EbmsError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| EbmsError::Configuration(format!("invalid EBMS public key: {e}")))?;

    let message = to_canonical_bytes(raw_result);
    let signature = STANDARD
        .decode(signature_b64.trim())
        .map_err(|_| EbmsError::InvalidSignature)?;

    let digest = Sha256::digest(&message);
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        .map_err(|_| EbmsError::InvalidSignature)?;

    tracing::info!(bytes = message.len(), "EBMS signature verified");
    Ok(())
}
