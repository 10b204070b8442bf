//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header carries a timestamp and one or more `v1`
//! signatures: `t=1700000000,v1=5257a869...,v1=...`. Each `v1` value is the hex
//! HMAC-SHA256 of `"<t>.<raw body>"` keyed with the endpoint secret. An event
//! is accepted only if one signature matches and the timestamp is recent.

use crate::domain::ports::GatewayResult;
use crate::domain::webhook::WebhookEvent;
use crate::error::GatewayError;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);
const EXPECTED_SCHEME: &str = "v1";

type HmacSha256 = Hmac<Sha256>;

fn reject(message: &str) -> GatewayError {
    GatewayError::SignatureVerification(message.to_string())
}

fn signed_payload_mac(secret: &str, timestamp: &str, payload: &[u8]) -> GatewayResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| reject("Invalid webhook secret"))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Builds a signature header for `payload`, in the format Stripe sends.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> GatewayResult<String> {
    let timestamp = timestamp.to_string();
    let mac = signed_payload_mac(secret, &timestamp, payload)?;
    Ok(format!(
        "t={},{}={}",
        timestamp,
        EXPECTED_SCHEME,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Checks `header` against `payload` as of `now` (unix seconds).
///
/// A zero `tolerance` disables the timestamp check.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: Duration,
    now: i64,
) -> GatewayResult<()> {
    if secret.is_empty() {
        return Err(reject("Webhook secret is empty"));
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = Some(value),
            EXPECTED_SCHEME => signatures.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return Err(reject(
            "Unable to extract timestamp and signatures from header",
        ));
    };
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| reject("Unable to extract timestamp and signatures from header"))?;
    if signatures.is_empty() {
        return Err(reject("No signatures found with expected scheme"));
    }

    let mac = signed_payload_mac(secret, timestamp, payload)?;
    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err(reject(
            "No signatures found matching the expected signature for payload",
        ));
    }

    let tolerance_secs = i64::try_from(tolerance.as_secs()).unwrap_or(i64::MAX);
    if !tolerance.is_zero() && signed_at < now.saturating_sub(tolerance_secs) {
        return Err(reject("Timestamp outside the tolerance zone"));
    }

    Ok(())
}

/// Verifies the signature and parses the event body.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: Duration,
) -> GatewayResult<WebhookEvent> {
    verify_signature(payload, header, secret, tolerance, Utc::now().timestamp())?;
    serde_json::from_slice(payload)
        .map_err(|e| GatewayError::SignatureVerification(format!("Malformed event payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_signature() {
        let header = sign(PAYLOAD, SECRET, NOW).unwrap();
        assert!(verify_signature(PAYLOAD, &header, SECRET, DEFAULT_TOLERANCE, NOW).is_ok());
    }

    #[test]
    fn test_any_matching_signature_is_accepted() {
        let valid = sign(PAYLOAD, SECRET, NOW).unwrap();
        let good_sig = valid.split_once("v1=").unwrap().1;
        let header = format!("t={NOW},v1=deadbeef,v0=abc,v1={good_sig}");
        assert!(verify_signature(PAYLOAD, &header, SECRET, DEFAULT_TOLERANCE, NOW).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(PAYLOAD, SECRET, NOW).unwrap();
        let tampered = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_2"}}}"#;
        let err = verify_signature(tampered, &header, SECRET, DEFAULT_TOLERANCE, NOW).unwrap_err();
        assert!(err.to_string().contains("No signatures found matching"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign(PAYLOAD, "whsec_other", NOW).unwrap();
        assert!(verify_signature(PAYLOAD, &header, SECRET, DEFAULT_TOLERANCE, NOW).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let header = sign(PAYLOAD, SECRET, NOW - 301).unwrap();
        let err = verify_signature(PAYLOAD, &header, SECRET, DEFAULT_TOLERANCE, NOW).unwrap_err();
        assert!(err.to_string().contains("tolerance"));

        // Zero tolerance disables the check
        assert!(verify_signature(PAYLOAD, &header, SECRET, Duration::ZERO, NOW).is_ok());
    }

    #[test]
    fn test_huge_tolerance_accepts_old_timestamps() {
        let header = sign(PAYLOAD, SECRET, 0).unwrap();
        let tolerance = Duration::from_secs(u64::MAX);
        assert!(verify_signature(PAYLOAD, &header, SECRET, tolerance, NOW).is_ok());
        assert!(verify_signature(PAYLOAD, &header, SECRET, tolerance, i64::MIN).is_ok());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let unsigned = format!("t={NOW}");
        for header in ["", "garbage", "v1=abcd", "t=notanumber,v1=abcd", unsigned.as_str()] {
            assert!(
                verify_signature(PAYLOAD, header, SECRET, DEFAULT_TOLERANCE, NOW).is_err(),
                "header {header:?} should be rejected"
            );
        }
        let header = format!("t={NOW},v1=not-hex");
        assert!(verify_signature(PAYLOAD, &header, SECRET, DEFAULT_TOLERANCE, NOW).is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let header = sign(PAYLOAD, SECRET, NOW).unwrap();
        assert!(verify_signature(PAYLOAD, &header, "", DEFAULT_TOLERANCE, NOW).is_err());
    }

    #[test]
    fn test_construct_event() {
        let now = Utc::now().timestamp();
        let header = sign(PAYLOAD, SECRET, now).unwrap();
        let event = construct_event(PAYLOAD, &header, SECRET, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.data.object["id"], "pi_1");
    }

    #[test]
    fn test_construct_event_rejects_signed_garbage() {
        let payload = b"not json";
        let header = sign(payload, SECRET, Utc::now().timestamp()).unwrap();
        let err = construct_event(payload, &header, SECRET, DEFAULT_TOLERANCE).unwrap_err();
        assert!(matches!(err, GatewayError::SignatureVerification(_)));
    }
}
