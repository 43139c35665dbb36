//! HMAC-SHA256 signing of delivery documents.
//!
//! The signed bytes are exactly the request body: the compact JSON encoding
//! of `{"event", "payload", "timestamp"}` in that field order, with object
//! keys sorted at every depth. Signatures travel as lowercase hex in
//! `X-Webhook-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::VerificationError;
use crate::types::DeliveryPayload;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// Canonical body bytes for a delivery document.
pub fn canonical_bytes(data: &DeliveryPayload) -> Vec<u8> {
    // Struct fields and a string-keyed Map cannot fail to serialize.
    serde_json::to_vec(data).unwrap_or_default()
}

/// Sign a delivery document with `secret`.
pub fn sign(data: &DeliveryPayload, secret: &[u8]) -> String {
    sign_bytes(&canonical_bytes(data), secret)
}

/// Sign raw body bytes with `secret`.
pub fn sign_bytes(body: &[u8], secret: &[u8]) -> String {
    let mut mac = keyed_mac(secret);
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check `signature` against a delivery document.
///
/// Never errors: malformed signatures simply fail to match.
pub fn verify(data: &DeliveryPayload, signature: &str, secret: &[u8]) -> bool {
    verify_body(&canonical_bytes(data), signature, secret)
}

/// Check `signature` against raw body bytes in constant time.
///
/// Only the exact form `sign_bytes` produces is accepted: 64 lowercase hex
/// characters, no surrounding whitespace.
pub fn verify_body(body: &[u8], signature: &str, secret: &[u8]) -> bool {
    if !is_lowercase_hex_digest(signature) {
        return false;
    }
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };

    let mut mac = keyed_mac(secret);
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

fn is_lowercase_hex_digest(signature: &str) -> bool {
    signature.len() == 64
        && signature
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn keyed_mac(secret: &[u8]) -> HmacSha256 {
    // HMAC takes keys of any length; the fallback only satisfies the type.
    HmacSha256::new_from_slice(secret).unwrap_or_else(|_| HmacSha256::new(&Default::default()))
}

/// Basic timestamp freshness check for receivers.
pub fn is_timestamp_fresh(timestamp_secs: u64, now_secs: u64, max_age_secs: u64) -> bool {
    if now_secs >= timestamp_secs {
        now_secs - timestamp_secs <= max_age_secs
    } else {
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedSignature {
    pub signature: Option<String>,
    pub event: Option<String>,
}

/// Pull the signature and event headers out of a header list.
pub fn parse_signature_headers<'a, I>(headers: I) -> ParsedSignature
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut parsed = ParsedSignature::default();

    for (name, value) in headers {
        if name.eq_ignore_ascii_case(SIGNATURE_HEADER) {
            parsed.signature = Some(value.to_string());
        } else if name.eq_ignore_ascii_case(EVENT_HEADER) {
            parsed.event = Some(value.to_string());
        }
    }

    parsed
}

/// Verify an incoming webhook request and decode its body.
pub fn verify_webhook_request<'a, I>(
    headers: I,
    body: &[u8],
    secret: &[u8],
) -> Result<DeliveryPayload, VerificationError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let parsed = parse_signature_headers(headers);
    let signature = parsed.signature.ok_or(VerificationError::MissingSignature)?;

    if !verify_body(body, &signature, secret) {
        return Err(VerificationError::InvalidSignature);
    }

    let document: DeliveryPayload =
        serde_json::from_slice(body).map_err(|_| VerificationError::MalformedBody)?;

    if let Some(event) = parsed.event {
        if event != document.event {
            return Err(VerificationError::EventMismatch);
        }
    }

    Ok(document)
}
