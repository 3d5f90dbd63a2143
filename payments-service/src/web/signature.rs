//! Stripe webhook signature verification.
//!
//! Stripe signs webhook requests using HMAC-SHA256.
//! Reference: https://docs.stripe.com/webhooks#verify-manually
//!
//! The `stripe-signature` header looks like
//! `t=1492774577,v1=5257a869...,v0=6ffbb59b...`. Several `v1` entries can be
//! present while a signing secret is being rolled; any one matching is enough.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the Stripe signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// The payload did not verify. Carries no detail on purpose.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid signature")]
pub struct SignatureInvalid;

impl From<SignatureInvalid> for WebhookError {
    fn from(_: SignatureInvalid) -> Self {
        WebhookError::SignatureInvalid
    }
}

/// Raw body bytes that passed signature verification.
///
/// Only [`verify_stripe_signature`] can build one, so anything downstream
/// that takes a `VerifiedPayload` never sees unauthenticated input.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedPayload<'a> {
    bytes: &'a [u8],
}

impl<'a> VerifiedPayload<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Verify a Stripe webhook signature against the current clock.
///
/// # Arguments
///
/// * `payload` - The request body exactly as received
/// * `header` - The `stripe-signature` header value
/// * `secret` - The endpoint signing secret (whsec_...)
/// * `tolerance_secs` - Maximum allowed skew of the signed timestamp
pub fn verify_stripe_signature<'a>(
    payload: &'a [u8],
    header: &str,
    secret: &str,
    tolerance_secs: u64,
) -> Result<VerifiedPayload<'a>, SignatureInvalid> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    verify_at(payload, header, secret, tolerance_secs, now)
}

/// Verification with an explicit clock, in unix seconds.
pub fn verify_at<'a>(
    payload: &'a [u8],
    header: &str,
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<VerifiedPayload<'a>, SignatureInvalid> {
    if secret.is_empty() || header.is_empty() {
        warn!(
            has_secret = !secret.is_empty(),
            has_header = !header.is_empty(),
            "stripe_signature_missing_fields"
        );
        return Err(SignatureInvalid);
    }

    let parsed = match SignatureHeader::parse(header) {
        Some(h) => h,
        None => {
            warn!(header_length = header.len(), "stripe_signature_unparsable_header");
            return Err(SignatureInvalid);
        }
    };

    let age = now.abs_diff(parsed.timestamp);
    if age > tolerance_secs {
        warn!(
            signed_at = parsed.timestamp,
            current_time = now,
            age_seconds = age,
            tolerance_seconds = tolerance_secs,
            "stripe_signature_outside_tolerance"
        );
        return Err(SignatureInvalid);
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("stripe_signature_invalid_key");
            return Err(SignatureInvalid);
        }
    };
    mac.update(parsed.timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Stripe emits lowercase hex only; verify_slice compares in constant time
    let valid = parsed.v1.iter().any(|candidate| {
        if !is_lower_hex(candidate) {
            return false;
        }
        match hex::decode(candidate) {
            Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    });

    if !valid {
        warn!(
            candidates = parsed.v1.len(),
            payload_length = payload.len(),
            "stripe_signature_mismatch"
        );
        return Err(SignatureInvalid);
    }

    debug!(signed_at = parsed.timestamp, "stripe_signature_verified");
    Ok(VerifiedPayload { bytes: payload })
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Parsed `stripe-signature` header.
#[derive(Debug, PartialEq)]
struct SignatureHeader<'h> {
    timestamp: i64,
    v1: Vec<&'h str>,
}

impl<'h> SignatureHeader<'h> {
    /// Returns `None` unless there is exactly one parsable `t` and at least one `v1`.
    fn parse(header: &'h str) -> Option<Self> {
        let mut timestamp = None;
        let mut v1 = Vec::new();

        for part in header.split(',') {
            let (key, value) = part.split_once('=')?;
            match key.trim() {
                "t" => {
                    if timestamp.is_some() {
                        return None;
                    }
                    timestamp = Some(value.trim().parse::<i64>().ok()?);
                }
                "v1" => v1.push(value.trim()),
                // v0 and future schemes are ignored
                _ => {}
            }
        }

        if v1.is_empty() {
            return None;
        }

        Some(Self {
            timestamp: timestamp?,
            v1,
        })
    }
}

/// Build a header the way Stripe would, for tests.
#[cfg(test)]
pub(crate) fn sign_for_test(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"charge.succeeded"}"#;

    #[test]
    fn test_verify_signature_valid() {
        let header = sign_for_test(SECRET, NOW, BODY);
        let verified = verify_at(BODY, &header, SECRET, 300, NOW).unwrap();
        assert_eq!(verified.as_bytes(), BODY);
    }

    #[test]
    fn test_verify_signature_against_system_clock() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let header = sign_for_test(SECRET, now, BODY);
        assert!(verify_stripe_signature(BODY, &header, SECRET, 300).is_ok());
    }

    #[test]
    fn test_any_flipped_payload_byte_is_rejected() {
        let header = sign_for_test(SECRET, NOW, BODY);
        for i in 0..BODY.len() {
            let mut tampered = BODY.to_vec();
            tampered[i] ^= 0x01;
            assert_eq!(
                verify_at(&tampered, &header, SECRET, 300, NOW).unwrap_err(),
                SignatureInvalid,
                "byte {} flipped",
                i
            );
        }
    }

    #[test]
    fn test_any_altered_header_char_is_rejected() {
        let header = sign_for_test(SECRET, NOW, BODY);
        for i in 0..header.len() {
            let mut tampered = header.clone().into_bytes();
            tampered[i] = if tampered[i] == b'0' { b'1' } else { b'0' };
            let tampered = String::from_utf8(tampered).unwrap();
            assert!(
                verify_at(BODY, &tampered, SECRET, 300, NOW).is_err(),
                "header char {} altered: {}",
                i,
                tampered
            );
        }
    }

    #[test]
    fn test_any_case_flipped_header_byte_is_rejected() {
        let header = sign_for_test(SECRET, NOW, BODY);
        for i in 0..header.len() {
            let mut tampered = header.clone().into_bytes();
            tampered[i] ^= 0x20;
            let tampered = String::from_utf8(tampered).unwrap();
            assert!(
                verify_at(BODY, &tampered, SECRET, 300, NOW).is_err(),
                "header byte {} case-flipped: {:?}",
                i,
                tampered
            );
        }
    }

    #[test]
    fn test_uppercase_signature_is_rejected() {
        let good = sign_for_test(SECRET, NOW, BODY);
        let (prefix, sig) = good.split_once(",v1=").unwrap();
        let header = format!("{},v1={}", prefix, sig.to_uppercase());
        assert!(verify_at(BODY, &header, SECRET, 300, NOW).is_err());
        assert!(is_lower_hex(sig));
        assert!(!is_lower_hex("ABCD"));
    }

    #[test]
    fn test_verify_signature_wrong_secret() {
        let header = sign_for_test("whsec_other", NOW, BODY);
        assert!(verify_at(BODY, &header, SECRET, 300, NOW).is_err());
    }

    #[test]
    fn test_verify_signature_stale() {
        let header = sign_for_test(SECRET, NOW - 301, BODY);
        assert!(verify_at(BODY, &header, SECRET, 300, NOW).is_err());
        let header = sign_for_test(SECRET, NOW - 300, BODY);
        assert!(verify_at(BODY, &header, SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn test_verify_signature_future() {
        let header = sign_for_test(SECRET, NOW + 301, BODY);
        assert!(verify_at(BODY, &header, SECRET, 300, NOW).is_err());
    }

    #[test]
    fn test_verify_signature_missing_fields() {
        let header = sign_for_test(SECRET, NOW, BODY);
        assert!(verify_at(BODY, "", SECRET, 300, NOW).is_err());
        assert!(verify_at(BODY, &header, "", 300, NOW).is_err());
        assert!(verify_at(BODY, "t=1700000000", SECRET, 300, NOW).is_err());
        assert!(verify_at(BODY, "v1=abcd", SECRET, 300, NOW).is_err());
        assert!(verify_at(BODY, "garbage", SECRET, 300, NOW).is_err());
    }

    #[test]
    fn test_verify_signature_any_v1_matches() {
        let good = sign_for_test(SECRET, NOW, BODY);
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t={},v1={},v1={},v0=deadbeef", NOW, "00".repeat(32), good_sig);
        assert!(verify_at(BODY, &header, SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn test_verify_signature_non_hex_candidate() {
        let header = format!("t={},v1=not-hex", NOW);
        assert!(verify_at(BODY, &header, SECRET, 300, NOW).is_err());
    }

    #[test]
    fn test_parse_header() {
        let parsed = SignatureHeader::parse("t=12, v1=aa ,v1=bb,v0=cc,scheme=x").unwrap();
        assert_eq!(parsed.timestamp, 12);
        assert_eq!(parsed.v1, vec!["aa", "bb"]);
        assert!(SignatureHeader::parse("t=1,t=2,v1=aa").is_none());
        assert!(SignatureHeader::parse("t=x,v1=aa").is_none());
    }
}
