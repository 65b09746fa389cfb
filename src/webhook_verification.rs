//! # Webhook Signature Verification
//!
//! HMAC-SHA256 verification of inbound transcript notifications. The signature is
//! computed over the raw request body and compared in constant time.

use axum::http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Primary signature header sent by the transcription provider.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";
/// Accepted alias for [`SIGNATURE_HEADER`].
pub const SIGNATURE_HEADER_ALIAS: &str = "x-signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Errors that can occur during webhook signature verification
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("Missing required signature header: {header}")]
    MissingSignature { header: String },

    #[error("Invalid signature format: {header}")]
    InvalidSignatureFormat { header: String },

    #[error("Signature verification failed")]
    VerificationFailed,
}

impl VerificationError {
    /// Returns the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

/// Result type for webhook verification
pub type VerificationResult<T> = Result<T, VerificationError>;

/// How a delivery was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// The HMAC matched the configured secret.
    Verified,
    /// No secret is configured for the tenant; the delivery is trusted as-is.
    Skipped,
}

/// Pull the signature value out of the request headers, preferring the primary name.
pub fn signature_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SIGNATURE_HEADER)
        .or_else(|| headers.get(SIGNATURE_HEADER_ALIAS))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

/// Computes the hex signature a sender holding `secret` would attach to `body`.
pub fn sign(body: &[u8], secret: &str) -> VerificationResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerificationError::VerificationFailed)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a transcript webhook signature.
///
/// With `secret == None` verification is skipped and logged at warn. Otherwise the
/// header must carry `sha256=<hex>` or bare hex of HMAC-SHA256(secret, body).
pub fn verify_signature(
    body: &[u8],
    signature_header: Option<&str>,
    secret: Option<&str>,
) -> VerificationResult<SignatureCheck> {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        warn!("webhook signature verification skipped: no secret configured");
        return Ok(SignatureCheck::Skipped);
    };

    debug!(body_size = body.len(), "Starting webhook signature verification");

    let signature = signature_header
        .filter(|value| !value.is_empty())
        .ok_or_else(|| VerificationError::MissingSignature {
            header: "X-Hub-Signature".to_string(),
        })?;

    let provided_hex = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);

    let provided_bytes =
        hex::decode(provided_hex).map_err(|_| VerificationError::InvalidSignatureFormat {
            header: "X-Hub-Signature contains invalid hex".to_string(),
        })?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerificationError::VerificationFailed)?;
    mac.update(body);
    let expected_bytes = mac.finalize().into_bytes();

    let expected_bytes_array: &[u8] = expected_bytes.as_ref();
    if subtle::ConstantTimeEq::ct_eq(expected_bytes_array, &provided_bytes[..]).into() {
        Ok(SignatureCheck::Verified)
    } else {
        Err(VerificationError::VerificationFailed)
    }
}
