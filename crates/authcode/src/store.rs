//! Credential Store: cookie tier + ephemeral tier
//!
//! Access and refresh tokens live in a same-site cookie jar; everything the
//! flow needs only between redirect-out and code exchange (verifier, state,
//! nonce, expiry, ID token, post-login path) lives in an ephemeral key-value
//! tier. All keys are namespaced by a caller-supplied prefix so multiple
//! realms can coexist. Neither tier enforces expiry itself beyond what the
//! backing cookie mechanism provides; flow logic clears ephemeral entries
//! explicitly.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use parking_lot::Mutex;

const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";
const ACCESS_TOKEN_EXPIRY: &str = "access_token_expiry";
const ID_TOKEN: &str = "id_token";
const VERIFIER: &str = "authcode_v";
const STATE: &str = "authcode_state";
const NONCE: &str = "authcode_nonce";
const RETURN_PATH: &str = "authcode_authentication_redirect";

/// Attributes for a cookie-tier entry.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    /// Cookie path.
    pub path: String,

    /// Absolute expiry; `None` means session-scoped.
    pub expires: Option<DateTime<Utc>>,
}

impl CookieOptions {
    /// Session-scoped cookie on path `/`.
    #[must_use]
    pub fn session() -> Self {
        Self { path: "/".to_string(), expires: None }
    }

    /// Cookie on path `/` expiring at the given instant.
    #[must_use]
    pub fn expiring(expires: DateTime<Utc>) -> Self {
        Self { path: "/".to_string(), expires: Some(expires) }
    }
}

/// Two-tier persistence used by the flow.
///
/// Implementations back the cookie tier with a real cookie jar and the
/// ephemeral tier with local storage; [`InMemoryStore`] provides a
/// deterministic in-process substitute for tests and non-browser hosts.
pub trait CredentialStore: Send + Sync {
    /// Read a cookie-tier value.
    fn cookie(&self, key: &str) -> Option<String>;

    /// Write a cookie-tier value.
    fn set_cookie(&self, key: &str, value: &str, options: CookieOptions);

    /// Remove a cookie-tier value.
    fn remove_cookie(&self, key: &str);

    /// Read an ephemeral-tier value.
    fn item(&self, key: &str) -> Option<String>;

    /// Write an ephemeral-tier value.
    fn set_item(&self, key: &str, value: &str);

    /// Remove an ephemeral-tier value.
    fn remove_item(&self, key: &str);
}

/// In-memory [`CredentialStore`] for tests and headless hosts.
///
/// Cookie attributes are accepted but not enforced, matching a browser jar
/// read from the same document.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    cookies: Mutex<HashMap<String, String>>,
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryStore {
    fn cookie(&self, key: &str) -> Option<String> {
        self.cookies.lock().get(key).cloned()
    }

    fn set_cookie(&self, key: &str, value: &str, _options: CookieOptions) {
        self.cookies.lock().insert(key.to_string(), value.to_string());
    }

    fn remove_cookie(&self, key: &str) {
        self.cookies.lock().remove(key);
    }

    fn item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items.lock().insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items.lock().remove(key);
    }
}

/// Prefix-scoped typed access to one realm's persisted flow state.
///
/// `take_*` accessors implement the read-once contract for redirect
/// artifacts: the value is deleted as it is read.
#[derive(Clone)]
pub struct FlowStorage {
    store: Arc<dyn CredentialStore>,
    prefix: String,
}

impl FlowStorage {
    /// Scope a store to a realm prefix.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, prefix: impl Into<String>) -> Self {
        Self { store, prefix: prefix.into() }
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Current access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.store.cookie(&self.key(ACCESS_TOKEN))
    }

    /// Persist the access token as a session cookie.
    pub fn set_access_token(&self, token: &str) {
        self.store.set_cookie(&self.key(ACCESS_TOKEN), token, CookieOptions::session());
    }

    /// Current refresh token, if any.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.store.cookie(&self.key(REFRESH_TOKEN))
    }

    /// Persist the refresh token for roughly four months.
    pub fn set_refresh_token(&self, token: &str) {
        let expires = Utc::now().checked_add_months(Months::new(4)).unwrap_or_else(Utc::now);
        self.store.set_cookie(&self.key(REFRESH_TOKEN), token, CookieOptions::expiring(expires));
    }

    /// Remove the refresh token.
    pub fn remove_refresh_token(&self) {
        self.store.remove_cookie(&self.key(REFRESH_TOKEN));
    }

    /// Stored access-token expiry, if present and parseable.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.item(&self.key(ACCESS_TOKEN_EXPIRY))?;
        DateTime::parse_from_rfc3339(&raw).ok().map(|dt| dt.with_timezone(&Utc))
    }

    /// Persist the access-token expiry timestamp.
    pub fn set_expiry(&self, expiry: DateTime<Utc>) {
        self.store.set_item(&self.key(ACCESS_TOKEN_EXPIRY), &expiry.to_rfc3339());
    }

    /// Stored ID token, if any.
    #[must_use]
    pub fn id_token(&self) -> Option<String> {
        self.store.item(&self.key(ID_TOKEN))
    }

    /// Persist the ID token.
    pub fn set_id_token(&self, token: &str) {
        self.store.set_item(&self.key(ID_TOKEN), token);
    }

    /// Remove the ID token.
    pub fn remove_id_token(&self) {
        self.store.remove_item(&self.key(ID_TOKEN));
    }

    /// Persist the PKCE verifier for the outstanding redirect.
    pub fn set_verifier(&self, verifier: &str) {
        self.store.set_item(&self.key(VERIFIER), verifier);
    }

    /// Consume the PKCE verifier (read once, then delete).
    #[must_use]
    pub fn take_verifier(&self) -> Option<String> {
        self.take_item(VERIFIER)
    }

    /// Remove any stale PKCE verifier.
    pub fn remove_verifier(&self) {
        self.store.remove_item(&self.key(VERIFIER));
    }

    /// Persist the `state` value for the outstanding redirect.
    pub fn set_state(&self, state: &str) {
        self.store.set_item(&self.key(STATE), state);
    }

    /// Consume the `state` value (read once, then delete).
    #[must_use]
    pub fn take_state(&self) -> Option<String> {
        self.take_item(STATE)
    }

    /// Remove any stale `state` value.
    pub fn remove_state(&self) {
        self.store.remove_item(&self.key(STATE));
    }

    /// Persist the `nonce` value for the outstanding redirect.
    pub fn set_nonce(&self, nonce: &str) {
        self.store.set_item(&self.key(NONCE), nonce);
    }

    /// Consume the `nonce` value (read once, then delete).
    #[must_use]
    pub fn take_nonce(&self) -> Option<String> {
        self.take_item(NONCE)
    }

    /// Remove any stale `nonce` value.
    pub fn remove_nonce(&self) {
        self.store.remove_item(&self.key(NONCE));
    }

    /// Recorded post-login redirect path without consuming it.
    #[must_use]
    pub fn return_path(&self) -> Option<String> {
        self.store.item(&self.key(RETURN_PATH))
    }

    /// Record the post-login redirect path.
    pub fn set_return_path(&self, path: &str) {
        self.store.set_item(&self.key(RETURN_PATH), path);
    }

    /// Consume the post-login redirect path.
    #[must_use]
    pub fn take_return_path(&self) -> Option<String> {
        self.take_item(RETURN_PATH)
    }

    /// Remove access, refresh and ID tokens. Run at flow start, at logout
    /// and on retry.
    pub fn clear_tokens(&self) {
        self.store.remove_cookie(&self.key(ACCESS_TOKEN));
        self.store.remove_cookie(&self.key(REFRESH_TOKEN));
        self.store.remove_item(&self.key(ID_TOKEN));
    }

    fn take_item(&self, name: &str) -> Option<String> {
        let key = self.key(name);
        let value = self.store.item(&key);
        if value.is_some() {
            self.store.remove_item(&key);
        }
        value
    }
}

impl std::fmt::Debug for FlowStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowStorage").field("prefix", &self.prefix).finish()
    }
}
