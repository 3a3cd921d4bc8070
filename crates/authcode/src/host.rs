//! Host collaborator interfaces
//!
//! The flow never renders, routes, or prompts by itself: the embedding
//! application supplies navigation, an optional history abstraction, a
//! confirmation prompt, and observer callbacks through these traits.

use url::Url;

use crate::client::TokenGrant;
use crate::provider::AuthError;

/// Marker for an issued full-page navigation.
///
/// A redirect ends the current document; nothing that runs after issuing
/// one may assume it executes. Functions producing a `Redirect` should be
/// the caller's last action.
#[derive(Debug)]
#[must_use = "a redirect is a process boundary; return immediately after issuing one"]
pub struct Redirect(pub(crate) ());

impl Redirect {
    /// Created by [`Navigator`] implementations when a navigation has been
    /// issued.
    #[must_use]
    pub fn issued() -> Self {
        Self(())
    }
}

/// Browser-location collaborator.
pub trait Navigator: Send + Sync {
    /// The URL of the current document, including query and fragment.
    fn current_url(&self) -> Url;

    /// Replace the current document with the given URL (full-page
    /// navigation).
    fn redirect(&self, url: &str) -> Redirect;
}

/// Optional routing collaborator used to swap the visible location without
/// a full page load once tokens are in hand.
pub trait History: Send + Sync {
    /// Replace the current location with `path` + `query` (query includes
    /// its leading `?` or is empty).
    fn replace(&self, path: &str, query: &str);
}

/// Synchronous user confirmation, used when a session expires mid-use.
pub trait Prompter: Send + Sync {
    /// Present `text` and return `true` to retry sign-in now, `false` to
    /// defer.
    fn confirm(&self, text: &str) -> bool;
}

/// A prompter that always chooses to retry immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRetry;

impl Prompter for AlwaysRetry {
    fn confirm(&self, _text: &str) -> bool {
        true
    }
}

/// Observer callbacks fired at protocol milestones. All methods default to
/// no-ops; implement only what you need.
pub trait AuthEvents: Send + Sync {
    /// About to redirect to the authorization endpoint for a code.
    fn on_get_auth_code(&self) {}

    /// An authorization code arrived on the callback URL.
    fn on_receive_auth_code(&self, _code: &str) {}

    /// Tokens were obtained (initial acquisition, by code or by refresh
    /// token).
    fn on_token_obtained(&self, _grant: &TokenGrant) {}

    /// Initial token acquisition failed.
    fn on_token_obtained_error(&self, _error: &AuthError) {}

    /// A background refresh succeeded.
    fn on_token_refreshed(&self, _grant: &TokenGrant) {}

    /// A background refresh failed.
    fn on_token_refreshed_error(&self, _error: &AuthError) {}
}

/// Observer that ignores every milestone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl AuthEvents for NoEvents {}
