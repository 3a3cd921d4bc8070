//! Flow functions
//!
//! Stateless operations over the credential store: presence/expiry checks,
//! request signing, and the two destructive-then-redirect flows (code flow
//! start and logout). A redirect is a process boundary; nothing runs after
//! one until the browser comes back.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

use crate::config::AuthConfig;
use crate::host::{Navigator, Redirect};
use crate::pkce::{generate_nonce, generate_state, PkceChallenge};
use crate::store::FlowStorage;
use crate::urls::{authorize_url, build_redirect_uri, logout_url, origin_of, AuthorizeArtifacts};

/// True when authorization has been completed: a refresh token is present,
/// or an access token is present and not expired.
#[must_use]
pub fn is_logged_in(storage: &FlowStorage) -> bool {
    if has_refresh_token(storage) {
        return true;
    }
    has_access_token(storage) && !has_token_expired(storage)
}

/// True when an access token is stored.
#[must_use]
pub fn has_access_token(storage: &FlowStorage) -> bool {
    storage.access_token().is_some()
}

/// True when a refresh token is stored.
#[must_use]
pub fn has_refresh_token(storage: &FlowStorage) -> bool {
    storage.refresh_token().is_some()
}

/// True when a stored expiry timestamp has passed.
///
/// Absence is not expiry: with no recorded expiry (or no token at all) this
/// returns false; callers check presence separately.
#[must_use]
pub fn has_token_expired(storage: &FlowStorage) -> bool {
    match storage.expiry() {
        Some(expiry) => chrono::Utc::now() >= expiry,
        None => false,
    }
}

/// Add `Authorization: Bearer <access_token>` to the headers if an access
/// token is present; no-op otherwise.
pub fn sign_request(headers: &mut HeaderMap, storage: &FlowStorage) {
    if let Some(token) = storage.access_token() {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(AUTHORIZATION, value);
        }
    }
}

/// Begin authorization by redirecting to the authorization endpoint.
///
/// Clears all tokens, records the post-login return path (unless this is a
/// retry that already recorded one), persists fresh PKCE/state/nonce
/// artifacts for the enabled protections (clearing stale ones for disabled
/// protections), and issues a full-page redirect.
pub fn do_authorization_code_flow(
    config: &AuthConfig,
    navigator: &dyn Navigator,
    storage: &FlowStorage,
    return_to: Option<&str>,
    is_retry: bool,
) -> Redirect {
    storage.clear_tokens();

    if !is_retry || storage.return_path().is_none() {
        let current = navigator.current_url();
        let return_path = match return_to {
            Some(path) => path.to_string(),
            None => {
                let mut path = current.path().to_string();
                if let Some(query) = current.query() {
                    path.push('?');
                    path.push_str(query);
                }
                path
            }
        };
        storage.set_return_path(&return_path);
    }

    let origin = origin_of(&navigator.current_url());
    let redirect_uri = build_redirect_uri(&origin, &config.callback_path);

    let mut artifacts = AuthorizeArtifacts::default();

    if config.use_pkce {
        let challenge = PkceChallenge::generate();
        storage.set_verifier(&challenge.code_verifier);
        artifacts.code_challenge = Some(challenge.code_challenge);
    } else {
        storage.remove_verifier();
    }

    if config.use_state {
        let state = generate_state();
        storage.set_state(&state);
        artifacts.state = Some(state);
    } else {
        storage.remove_state();
    }

    if config.use_nonce {
        let nonce = generate_nonce();
        storage.set_nonce(&nonce);
        artifacts.nonce = Some(nonce);
    } else {
        storage.remove_nonce();
    }

    let url = authorize_url(config, &redirect_uri, &artifacts);
    debug!("redirecting to authorization endpoint");
    navigator.redirect(&url)
}

/// Begin logout by redirecting to the logout endpoint.
///
/// Clears all tokens first. When no logout endpoint is configured, the
/// browser is sent straight to the post-logout redirect URI.
pub fn do_logout_flow(
    config: &AuthConfig,
    navigator: &dyn Navigator,
    storage: &FlowStorage,
) -> Redirect {
    storage.clear_tokens();

    let origin = origin_of(&navigator.current_url());
    let redirect_uri =
        build_redirect_uri(&origin, config.logout_callback_path.as_deref().unwrap_or(""));

    let url = match &config.logout_url {
        Some(endpoint) => logout_url(endpoint, &redirect_uri, &config.client_id),
        None => redirect_uri,
    };
    debug!("redirecting to logout endpoint");
    navigator.redirect(&url)
}
