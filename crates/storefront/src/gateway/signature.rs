//! Callback signature computation and verification.
//!
//! The gateway signs its browser-delivered callback with HMAC-SHA256 over
//! `"{gateway_order_id}|{gateway_payment_id}"` using the shared webhook
//! secret. Verification recomputes the digest locally and compares in
//! constant time; a mismatch means the callback did not come from the
//! gateway and nothing may be mutated on its account.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

/// Callback signature failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The signing key could not be used.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// The provided signature does not match the computed one.
    #[error("signature mismatch")]
    Mismatch,
}

/// Compute the hex-encoded callback signature for a payment.
///
/// # Errors
///
/// Returns [`SignatureError::InvalidKey`] if the secret cannot key the MAC.
pub fn compute(
    secret: &SecretString,
    gateway_order_id: &str,
    gateway_payment_id: &str,
) -> Result<String, SignatureError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;

    mac.update(format!("{gateway_order_id}|{gateway_payment_id}").as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a gateway callback signature.
///
/// # Errors
///
/// Returns [`SignatureError::Mismatch`] if the signature does not match,
/// [`SignatureError::InvalidKey`] if the secret cannot key the MAC.
pub fn verify(
    secret: &SecretString,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    provided: &str,
) -> Result<(), SignatureError> {
    let expected = compute(secret, gateway_order_id, gateway_payment_id)?;

    if !constant_time_compare(&expected, provided) {
        return Err(SignatureError::Mismatch);
    }

    Ok(())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("test-webhook-secret-test-webhook")
    }

    #[test]
    fn test_computed_signature_verifies() {
        let sig = compute(&secret(), "order_abc", "pay_xyz").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify(&secret(), "order_abc", "pay_xyz", &sig).is_ok());
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let mut sig = compute(&secret(), "order_abc", "pay_xyz").unwrap();
        // Flip the last hex digit.
        let last = if sig.ends_with('0') { '1' } else { '0' };
        sig.pop();
        sig.push(last);

        assert_eq!(
            verify(&secret(), "order_abc", "pay_xyz", &sig),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_signature_binds_both_ids() {
        let sig = compute(&secret(), "order_abc", "pay_xyz").unwrap();

        assert_eq!(
            verify(&secret(), "order_other", "pay_xyz", &sig),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify(&secret(), "order_abc", "pay_other", &sig),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let sig = compute(&secret(), "order_abc", "pay_xyz").unwrap();
        let other = SecretString::from("another-webhook-secret-another00");

        assert_eq!(
            verify(&other, "order_abc", "pay_xyz", &sig),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc123", "abc12"));
        assert!(constant_time_compare("", ""));
    }
}
