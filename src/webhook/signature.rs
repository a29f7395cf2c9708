//! Webhook signature verification
//!
//! Marketplace deliveries carry an `X-Webhook-Signature` header: the hex
//! HMAC-SHA256 of the raw request body under the shared secret.
//! Verification is mandatory; unsigned or mismatched deliveries are
//! rejected before any processing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Verify the hex HMAC-SHA256 signature of a raw payload.
/// Comparison is constant-time via `Mac::verify_slice`.
pub fn verify_signature(payload: &[u8], signature_hex: &str, secret: &str) -> Result<(), &'static str> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(payload);

    let sig_bytes = hex::decode(signature_hex.trim()).map_err(|_| "Invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")
}

/// Sign a payload (used by tests and by operators generating test calls).
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let body = br#"{"marketplace":"lagoon","external_order_id":"42"}"#;
        let sig = sign(body, "test-secret");
        assert!(verify_signature(body, &sig, "test-secret").is_ok());
    }

    #[test]
    fn tampered_body_rejected() {
        let body = b"original";
        let sig = sign(body, "test-secret");
        assert!(verify_signature(b"tampered", &sig, "test-secret").is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let body = b"payload";
        let sig = sign(body, "secret-a");
        assert!(verify_signature(body, &sig, "secret-b").is_err());
    }

    #[test]
    fn garbage_signature_rejected() {
        assert!(verify_signature(b"payload", "not-hex!", "secret").is_err());
        assert!(verify_signature(b"payload", "", "secret").is_err());
    }
}
