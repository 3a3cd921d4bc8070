//! PKCE (Proof Key for Code Exchange) and flow-artifact generation
//!
//! Implements RFC 7636 verifier/challenge pairs plus the random `state`
//! (anti-CSRF) and `nonce` (replay protection) values that ride along the
//! authorization redirect.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate 32 cryptographically random bytes, base64url encoded without
/// padding (43 characters).
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a code verifier.
///
/// Per RFC 7636, verifiers must be 43-128 characters long; 32 random bytes
/// encode to exactly 43.
#[must_use]
pub fn generate_code_verifier() -> String {
    random_token()
}

/// Generate the code challenge for a verifier.
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier))).
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a random `state` token for CSRF protection.
#[must_use]
pub fn generate_state() -> String {
    random_token()
}

/// Generate a random `nonce` for ID-token replay protection.
#[must_use]
pub fn generate_nonce() -> String {
    random_token()
}

/// PKCE verifier/challenge pair for one authorization round trip.
///
/// The verifier is persisted locally until the code exchange; the challenge
/// is sent in the authorization request.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Random string, kept secret until token exchange.
    pub code_verifier: String,

    /// SHA256 hash of `code_verifier`, base64url encoded. Sent in the
    /// authorization request for server validation.
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh verifier/challenge pair.
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge }
    }

    /// Get the challenge method (always "S256").
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}
