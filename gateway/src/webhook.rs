//! Webhook authenticity and parsing
//!
//! The processor's callback payload is loosely typed; everything is parsed
//! into [`ProcessorEvent`] right here at the boundary, and anything that does
//! not map cleanly is rejected before it can reach the ledger.

use crate::{Error, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Shared-secret webhook signature scheme
///
/// The processor signs each delivery with `hex(SHA-256(secret || body))`.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    /// Create verifier for a shared secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Compute the expected signature for a payload
    pub fn sign(&self, body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(body);
        hex_encode(&hasher.finalize())
    }

    /// Verify a delivery's signature (constant-time comparison)
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        constant_time_eq(self.sign(body).as_bytes(), signature.as_bytes())
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// What a webhook delivery reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorEventKind {
    /// Charge paid
    Paid,
    /// Charge failed, expired, or was cancelled
    Failed,
}

/// Typed webhook event
#[derive(Debug, Clone)]
pub struct ProcessorEvent {
    /// Merchant reference (our payment ID), when it parses as one
    ///
    /// A reference that is not a valid ID cannot match any payment; it is
    /// carried as `None` so the adapter can acknowledge and ignore it.
    pub reference: Option<Uuid>,

    /// Outcome
    pub kind: ProcessorEventKind,
}

/// Raw payload shape as the processor sends it
#[derive(Debug, Deserialize)]
struct RawEvent {
    reference: String,
    status: String,
}

/// Parse a webhook body into a typed event
///
/// Unknown statuses are rejected rather than guessed at.
pub fn parse_event(body: &[u8]) -> Result<ProcessorEvent> {
    let raw: RawEvent = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedEvent(format!("Bad payload: {}", e)))?;

    let kind = match raw.status.as_str() {
        "paid" => ProcessorEventKind::Paid,
        "failed" | "expired" | "cancelled" => ProcessorEventKind::Failed,
        other => {
            return Err(Error::MalformedEvent(format!("Unknown status: {}", other)));
        }
    };

    Ok(ProcessorEvent {
        reference: Uuid::parse_str(&raw.reference).ok(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let verifier = WebhookVerifier::new("top-secret");
        let body = br#"{"reference":"abc","status":"paid"}"#;

        let signature = verifier.sign(body);
        assert!(verifier.verify(body, &signature));
        assert!(!verifier.verify(body, "deadbeef"));
        assert!(!verifier.verify(b"tampered", &signature));

        // A different secret produces a different signature
        let other = WebhookVerifier::new("other-secret");
        assert!(!other.verify(body, &signature));
    }

    #[test]
    fn test_parse_paid_event() {
        let reference = Uuid::now_v7();
        let body = format!(r#"{{"reference":"{}","status":"paid"}}"#, reference);

        let event = parse_event(body.as_bytes()).unwrap();
        assert_eq!(event.reference, Some(reference));
        assert_eq!(event.kind, ProcessorEventKind::Paid);
    }

    #[test]
    fn test_parse_failure_variants() {
        for status in ["failed", "expired", "cancelled"] {
            let body = format!(r#"{{"reference":"{}","status":"{}"}}"#, Uuid::now_v7(), status);
            let event = parse_event(body.as_bytes()).unwrap();
            assert_eq!(event.kind, ProcessorEventKind::Failed);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        assert!(matches!(
            parse_event(b"not json"),
            Err(Error::MalformedEvent(_))
        ));
        assert!(matches!(
            parse_event(br#"{"reference":"x"}"#),
            Err(Error::MalformedEvent(_))
        ));
        let body = format!(r#"{{"reference":"{}","status":"sideways"}}"#, Uuid::now_v7());
        assert!(matches!(
            parse_event(body.as_bytes()),
            Err(Error::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_unparseable_reference_is_carried_as_none() {
        let event = parse_event(br#"{"reference":"not-a-uuid","status":"paid"}"#).unwrap();
        assert_eq!(event.reference, None);
    }
}
