use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, Result};
use crate::models::session::SessionClaims;

type HmacSha256 = Hmac<Sha256>;

/// Signs `payload_b64` with HMAC-SHA256 and returns the base64url signature.
///
/// The MAC covers the base64url-encoded payload, not the raw JSON, so the
/// signed bytes are exactly the bytes transported in the token.
pub fn sign(key: &[u8], payload_b64: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| AppError::Internal("HMAC key rejected".to_string()))?;
    mac.update(payload_b64);
    Ok(B64.encode(mac.finalize().into_bytes()))
}

/// Verifies a base64url signature over `payload_b64`.
///
/// Comparison happens inside `Mac::verify_slice`, which is constant-time.
/// Any malformed input verifies as `false`; this function never errors.
pub fn verify(key: &[u8], payload_b64: &[u8], signature_b64: &str) -> bool {
    let Ok(signature) = B64.decode(signature_b64) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(payload_b64);
    mac.verify_slice(&signature).is_ok()
}

/// Encodes claims into `payloadB64Url.signatureB64Url`.
pub fn encode(key: &[u8], claims: &SessionClaims) -> Result<String> {
    let json = sonic_rs::to_string(claims)
        .map_err(|e| AppError::Internal(format!("Claims serialization failed: {}", e)))?;
    let payload_b64 = B64.encode(json.as_bytes());
    let signature_b64 = sign(key, payload_b64.as_bytes())?;
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Decodes a token back into claims, or `None` when anything about it is
/// wrong: shape, signature, base64, JSON, or field types.
///
/// The signature is checked before the payload is parsed; unverified bytes
/// never reach the JSON decoder.
pub fn decode(key: &[u8], token: &str) -> Option<SessionClaims> {
    let (payload_b64, signature_b64) = split_token(token)?;
    if !verify(key, payload_b64.as_bytes(), signature_b64) {
        return None;
    }
    let payload = B64.decode(payload_b64).ok()?;
    sonic_rs::from_slice(&payload).ok()
}

/// Splits a token into exactly two non-empty dot-separated segments.
fn split_token(token: &str) -> Option<(&str, &str)> {
    let mut segments = token.split('.');
    let payload = segments.next()?;
    let signature = segments.next()?;
    if segments.next().is_some() || payload.is_empty() || signature.is_empty() {
        return None;
    }
    Some((payload, signature))
}
