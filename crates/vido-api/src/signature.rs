//! Webhook signature verification.
//!
//! The provider signs `"{unix_ts}.{raw_body}"` with HMAC-SHA256 and sends
//! `vido-signature: t=<unix_ts>,v1=<hex mac>`. Verification runs over the
//! RAW request bytes: decoding and re-encoding JSON is not guaranteed to
//! be byte-identical (key order, whitespace), which would break the MAC.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "vido-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,

    #[error("signature timestamp outside tolerance")]
    Stale,

    #[error("signature mismatch")]
    Mismatch,
}

/// Verifier bound to the shared signing secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<Vec<u8>>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Verify a signature header against the raw body bytes.
    pub fn verify(
        &self,
        header: &str,
        raw_body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let (timestamp, mac_hex) = parse_header(header)?;
        let expected = hex::decode(mac_hex).map_err(|_| SignatureError::Malformed)?;

        let age = (now.timestamp() - timestamp).unsigned_abs();
        if age > self.tolerance.as_secs() {
            return Err(SignatureError::Stale);
        }

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| SignatureError::Malformed)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(raw_body);
        // Constant-time comparison
        mac.verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Produce a header value for a body; used by the provider simulator
    /// in tests.
    pub fn sign(&self, raw_body: &[u8], timestamp: i64) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(raw_body);
        let digest = mac.finalize().into_bytes();
        format!("t={},v1={}", timestamp, hex::encode(digest))
    }
}

fn parse_header(header: &str) -> Result<(i64, &str), SignatureError> {
    let mut timestamp = None;
    let mut mac_hex = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => mac_hex = Some(v),
            _ => {}
        }
    }

    match (timestamp, mac_hex) {
        (Some(t), Some(m)) if !m.is_empty() => Ok((t, m)),
        _ => Err(SignatureError::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"type":"video.asset.ready","data":{"id":"a"}}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SECRET.as_bytes().to_vec(), Duration::from_secs(300))
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_round_trip_verifies() {
        let v = verifier();
        let header = v.sign(BODY, now().timestamp());
        assert_eq!(v.verify(&header, BODY, now()), Ok(()));
    }

    #[test]
    fn test_tampered_body_fails() {
        let v = verifier();
        let header = v.sign(BODY, now().timestamp());
        let tampered = br#"{"type":"video.asset.ready","data":{"id":"b"}}"#;
        assert_eq!(v.verify(&header, tampered, now()), Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_reencoded_body_fails() {
        // Same JSON, different whitespace: must not verify. This is why
        // the raw bytes are signed, never a re-serialized value.
        let v = verifier();
        let header = v.sign(BODY, now().timestamp());
        let reencoded = br#"{ "type": "video.asset.ready", "data": { "id": "a" } }"#;
        assert_eq!(
            v.verify(&header, reencoded, now()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_fails() {
        let v = verifier();
        let old = now().timestamp() - 3600;
        let header = v.sign(BODY, old);
        assert_eq!(v.verify(&header, BODY, now()), Err(SignatureError::Stale));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let other = WebhookVerifier::new(b"other".to_vec(), Duration::from_secs(300));
        let header = other.sign(BODY, now().timestamp());
        assert_eq!(
            verifier().verify(&header, BODY, now()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_malformed_headers_fail() {
        let v = verifier();
        for header in ["", "t=123", "v1=abcd", "t=abc,v1=12", "t=123,v1=zz"] {
            let result = v.verify(header, BODY, now());
            assert!(
                matches!(result, Err(SignatureError::Malformed)),
                "header {:?} gave {:?}",
                header,
                result
            );
        }
    }
}
