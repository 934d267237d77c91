//! Xero webhook signature verification.
//!
//! Xero signs every delivery with HMAC-SHA256 over the raw request body,
//! keyed by the webhook signing key, and sends the base64 digest in the
//! `x-xero-signature` header.
//! Reference: https://developer.xero.com/documentation/guides/webhooks/configuring-your-server/

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 HMAC of the body.
pub const SIGNATURE_HEADER: &str = "x-xero-signature";

/// Result of checking a delivery's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVerdict {
    Valid,
    MissingHeader,
    MalformedHeader,
    EmptySecret,
    Mismatch,
}

impl SignatureVerdict {
    pub fn is_valid(self) -> bool {
        matches!(self, SignatureVerdict::Valid)
    }

    /// Human-readable reason for logs.
    pub fn reason(self) -> &'static str {
        match self {
            SignatureVerdict::Valid => "signature verified",
            SignatureVerdict::MissingHeader => "missing signature header",
            SignatureVerdict::MalformedHeader => "malformed signature header",
            SignatureVerdict::EmptySecret => "signing secret is empty",
            SignatureVerdict::Mismatch => "signature mismatch",
        }
    }
}

/// Verify a Xero webhook signature.
///
/// # Arguments
///
/// * `headers` - Request headers; the signature header is matched case-insensitively
/// * `body` - The exact bytes received, before any parsing
/// * `signing_key` - The webhook key configured in the Xero developer portal
///
/// Malformed input is reported as a failed verdict, never as a fault.
pub fn verify(headers: &HeaderMap, body: &[u8], signing_key: &str) -> SignatureVerdict {
    let verdict = check(headers, body, signing_key);

    if !verdict.is_valid() {
        warn!(
            reason = verdict.reason(),
            body_length = body.len(),
            "xero_signature_rejected"
        );
    }

    verdict
}

fn check(headers: &HeaderMap, body: &[u8], signing_key: &str) -> SignatureVerdict {
    let header = match headers.get(SIGNATURE_HEADER) {
        Some(v) => v,
        None => return SignatureVerdict::MissingHeader,
    };

    let provided = match header.to_str() {
        Ok(s) => s.trim(),
        Err(_) => return SignatureVerdict::MalformedHeader,
    };

    if provided.is_empty() {
        return SignatureVerdict::MissingHeader;
    }

    let provided = match STANDARD.decode(provided) {
        Ok(bytes) => bytes,
        Err(_) => return SignatureVerdict::MalformedHeader,
    };

    if signing_key.is_empty() {
        return SignatureVerdict::EmptySecret;
    }

    let mut mac = match HmacSha256::new_from_slice(signing_key.as_bytes()) {
        Ok(m) => m,
        Err(_) => return SignatureVerdict::Mismatch,
    };
    mac.update(body);

    // verify_slice compares in constant time
    match mac.verify_slice(&provided) {
        Ok(()) => SignatureVerdict::Valid,
        Err(_) => SignatureVerdict::Mismatch,
    }
}

/// Compute the header value Xero would send for `body`.
pub fn sign(body: &[u8], signing_key: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}
