//! Webhook signature verification.
//!
//! Senders sign the raw request body with HMAC-SHA256 using the shared
//! webhook secret and send the lowercase hex digest in `X-Signature`.
//! Verification runs on the exact bytes received, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{error, warn};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC of the body.
pub const SIGNATURE_HEADER: &str = "X-Signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing signature")]
    Missing,
    #[error("webhook secret is not configured")]
    SecretNotConfigured,
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a webhook body against its `X-Signature` value.
///
/// # Arguments
///
/// * `secret` - The shared webhook secret, `None` or blank when unset
/// * `body` - The raw, unparsed request body
/// * `signature` - The `X-Signature` header value, if present
///
/// A missing header is rejected before the secret is consulted, so an
/// unsigned request gets `Missing` even on a misconfigured server.
pub fn verify_signature(
    secret: Option<&str>,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), SignatureError> {
    let signature = match signature {
        Some(s) if !s.is_empty() => s,
        _ => {
            warn!(body_length = body.len(), "webhook_signature_missing");
            return Err(SignatureError::Missing);
        }
    };

    let secret = match secret {
        Some(k) if !k.trim().is_empty() => k,
        _ => {
            error!("webhook_secret_not_configured");
            return Err(SignatureError::SecretNotConfigured);
        }
    };

    let expected = match compute_signature(secret, body) {
        Some(sig) => sig,
        None => {
            warn!("webhook_signature_invalid_key");
            return Err(SignatureError::Mismatch);
        }
    };

    if !constant_time_compare(&expected, signature) {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "webhook_signature_mismatch"
        );
        return Err(SignatureError::Mismatch);
    }

    Ok(())
}

/// Lowercase hex HMAC-SHA256 of `body` under `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
