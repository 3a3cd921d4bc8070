//! Tolerant ID-token payload decoding
//!
//! Only the payload segment is decoded; signatures are never verified here
//! (the token came straight from the token endpoint over TLS). Malformed
//! tokens decode to `None` so callers can treat them as absent instead of
//! failing the surrounding flow.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tracing::debug;

/// Decode the payload segment of a JWT to its JSON text.
///
/// Returns `None` for anything that is not a three-segment token with a
/// base64url UTF-8 payload.
#[must_use]
pub fn decode_payload(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    // Tokens are unpadded base64url per RFC 7515; strip any stray padding.
    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    String::from_utf8(bytes).ok()
}

/// Decode and parse the payload segment of a JWT into JSON claims.
///
/// Returns `None` when the token or its JSON payload is malformed.
#[must_use]
pub fn claims(token: &str) -> Option<serde_json::Value> {
    let payload = decode_payload(token)?;
    match serde_json::from_str(&payload) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!("ID token payload is not valid JSON: {err}");
            None
        }
    }
}
