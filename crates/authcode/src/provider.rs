//! Authentication state machine
//!
//! Orchestrates the flow functions against host lifecycle events and a
//! self-rescheduling refresh timer, and owns the decision of what the host
//! should render. Entry points are [`AuthCodeProvider::mount`], the
//! required-auth transition, and the timer tick; each runs the same
//! `process_auth` protocol against the credential store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration as StdDuration;

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{TokenClient, TokenClientError, TokenGrant};
use crate::config::{AuthConfig, ProviderOptions};
use crate::flow;
use crate::host::{AlwaysRetry, AuthEvents, History, Navigator, NoEvents, Prompter, Redirect};
use crate::jwt;
use crate::store::{CredentialStore, FlowStorage};
use crate::urls::{build_redirect_uri, origin_of, uri_param};

/// Errors surfaced through the observer callbacks and the error view.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The `state` returned on the callback URL does not match the recorded
    /// value. Reported, but the exchange still proceeds.
    #[error("state does not match")]
    StateMismatch,

    /// The ID token's `nonce` claim does not match the recorded value.
    /// Fatal to token persistence: nothing is committed.
    #[error("nonce does not match")]
    NonceMismatch,

    /// The token endpoint round trip failed.
    #[error(transparent)]
    Token(#[from] TokenClientError),
}

/// What the host should currently render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// A sign-in round trip is pending; show a loader.
    Loading {
        /// Loader text.
        text: String,
    },

    /// A logout redirect has been issued; show a loader.
    SigningOut {
        /// Loader text.
        text: String,
    },

    /// Sign-in failed; terminal until [`AuthCodeProvider::retry`].
    SignInError {
        /// Error message.
        text: String,
        /// Label for the retry action.
        retry_label: String,
    },

    /// Authentication is settled; render the protected content.
    Content,
}

/// Host collaborator bundle for one provider instance.
#[derive(Clone)]
pub struct Host {
    /// Browser-location collaborator.
    pub navigator: Arc<dyn Navigator>,

    /// Optional routing collaborator; absent falls back to full navigation.
    pub history: Option<Arc<dyn History>>,

    /// Session-expiry confirmation prompt.
    pub prompter: Arc<dyn Prompter>,

    /// Protocol milestone observers.
    pub events: Arc<dyn AuthEvents>,
}

impl Host {
    /// Bundle with default collaborators: no history, retry-now prompting,
    /// no observers.
    #[must_use]
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            history: None,
            prompter: Arc::new(AlwaysRetry),
            events: Arc::new(NoEvents),
        }
    }

    /// Attach a routing collaborator.
    #[must_use]
    pub fn with_history(mut self, history: Arc<dyn History>) -> Self {
        self.history = Some(history);
        self
    }

    /// Replace the session-expiry prompt.
    #[must_use]
    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// Attach milestone observers.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn AuthEvents>) -> Self {
        self.events = events;
        self
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").field("history", &self.history.is_some()).finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct ProviderState {
    loading: bool,
    signin_error: bool,
    logging_out: bool,
}

/// The authentication state machine.
///
/// One instance per realm; instances with distinct storage prefixes are
/// fully independent. The instance owns at most one live refresh timer;
/// every re-arm aborts the previous one, and teardown releases it.
pub struct AuthCodeProvider {
    config: AuthConfig,
    options: ProviderOptions,
    storage: FlowStorage,
    client: TokenClient,
    host: Host,
    authentication_required: AtomicBool,
    state: Mutex<ProviderState>,
    refresh_timer: Mutex<Option<(JoinHandle<()>, StdDuration)>>,
    timer_generation: AtomicU64,
    weak: Weak<AuthCodeProvider>,
}

impl AuthCodeProvider {
    /// Create a provider. The initial view state is `Loading`.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        options: ProviderOptions,
        store: Arc<dyn CredentialStore>,
        host: Host,
    ) -> Arc<Self> {
        let storage = FlowStorage::new(store, options.storage_prefix.clone());
        let authentication_required = AtomicBool::new(options.authentication_required);
        Arc::new_cyclic(|weak| Self {
            config,
            options,
            storage,
            client: TokenClient::new(),
            host,
            authentication_required,
            state: Mutex::new(ProviderState {
                loading: true,
                signin_error: false,
                logging_out: false,
            }),
            refresh_timer: Mutex::new(None),
            timer_generation: AtomicU64::new(0),
            weak: weak.clone(),
        })
    }

    /// Entry point on mount: run the authentication protocol once.
    pub async fn mount(&self) {
        self.process_auth(false).await;
    }

    /// Flip `authentication_required`; the false-to-true transition re-runs
    /// the authentication protocol.
    pub async fn set_authentication_required(&self, required: bool) {
        let previous = self.authentication_required.swap(required, Ordering::SeqCst);
        if required && !previous {
            self.process_auth(false).await;
        }
    }

    /// Decide, from persisted state and the current URL, whether to resolve
    /// immediately, refresh silently, exchange a callback code, redirect
    /// out, or pass through anonymously.
    pub async fn process_auth(&self, is_refresh: bool) {
        debug!("processing authentication state");

        let mut token_expired = false;
        if let Some(expiry) = self.storage.expiry() {
            let now = Utc::now();
            if now >= expiry {
                token_expired = true;
            } else if let Ok(remaining) = (expiry - now).to_std() {
                // Token still valid: line up the silent refresh for the
                // remaining lifetime, then fall through.
                self.arm_refresh_timer(remaining);
            }
        }

        if self.storage.access_token().is_some() && !token_expired {
            debug!("access token present and valid");
            self.stop_loading();
        } else if self.storage.refresh_token().is_some() {
            debug!("refresh token present, fetching new access token");
            self.do_refresh_flow(is_refresh).await;
        } else if is_refresh {
            // Nothing usable mid-session.
            self.session_expired();
        } else {
            let href = self.host.navigator.current_url();
            let code = uri_param(href.as_str(), "code").filter(|c| !c.is_empty());
            if let Some(code) = code {
                debug!("authorization code detected, fetching token");
                self.host.events.on_receive_auth_code(&code);
                self.trade_code_for_token(&code).await;
            } else if self.authentication_required.load(Ordering::SeqCst) {
                debug!("redirecting to authorization endpoint");
                let _redirect = self.get_auth_code(false);
            } else {
                // Anonymous pass-through.
                self.stop_loading();
            }
        }
    }

    /// Begin the logout flow: render the sign-out loader and redirect to
    /// the logout endpoint.
    pub fn begin_logout(&self) -> Redirect {
        self.state.lock().logging_out = true;
        flow::do_logout_flow(&self.config, self.host.navigator.as_ref(), &self.storage)
    }

    /// Restart sign-in from scratch: clear tokens and redirect for a fresh
    /// code, keeping any recorded post-login path. This is the error view's
    /// retry action.
    pub fn retry(&self) -> Redirect {
        self.storage.clear_tokens();
        self.state.lock().signin_error = false;
        self.get_auth_code(true)
    }

    /// What the host should currently render.
    #[must_use]
    pub fn view(&self) -> ViewState {
        let state = *self.state.lock();
        if state.signin_error {
            ViewState::SignInError {
                text: self.options.sign_in_error_text.clone(),
                retry_label: "Retry".to_string(),
            }
        } else if state.logging_out {
            ViewState::SigningOut { text: self.options.sign_out_text.clone() }
        } else if state.loading {
            ViewState::Loading { text: self.options.sign_in_text.clone() }
        } else {
            ViewState::Content
        }
    }

    /// Convenience presence check over this provider's storage.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        flow::is_logged_in(&self.storage)
    }

    /// The prefix-scoped storage backing this instance.
    #[must_use]
    pub fn storage(&self) -> &FlowStorage {
        &self.storage
    }

    /// Whether a silent-refresh timer is currently scheduled.
    #[must_use]
    pub fn refresh_timer_armed(&self) -> bool {
        self.refresh_timer.lock().as_ref().is_some_and(|(handle, _)| !handle.is_finished())
    }

    /// Delay the current refresh timer was armed with, if one is scheduled.
    #[must_use]
    pub fn refresh_timer_delay(&self) -> Option<StdDuration> {
        self.refresh_timer.lock().as_ref().map(|(_, delay)| *delay)
    }

    /// Release the refresh timer. Called automatically on drop.
    pub fn shutdown(&self) {
        if let Some((handle, _)) = self.refresh_timer.lock().take() {
            handle.abort();
        }
    }

    fn get_auth_code(&self, is_retry: bool) -> Redirect {
        self.host.events.on_get_auth_code();
        self.state.lock().loading = true;
        flow::do_authorization_code_flow(
            &self.config,
            self.host.navigator.as_ref(),
            &self.storage,
            self.options.return_to.as_deref(),
            is_retry,
        )
    }

    async fn trade_code_for_token(&self, code: &str) {
        let href = self.host.navigator.current_url();
        debug!("code url: {href}");

        if self.config.use_state {
            let callback_state = uri_param(href.as_str(), "state");
            // Recorded state is single-use: consumed whatever the outcome.
            let recorded_state = self.storage.take_state();
            if callback_state == recorded_state {
                debug!("state matches");
            } else {
                // Reported, not fatal: the exchange still proceeds. A
                // stricter server will reject the POST on its own terms.
                warn!(
                    expected = recorded_state.as_deref().unwrap_or(""),
                    received = callback_state.as_deref().unwrap_or(""),
                    "state does not match"
                );
                self.host.events.on_token_obtained_error(&AuthError::StateMismatch);
                self.state.lock().signin_error = true;
            }
        }

        let verifier = if self.config.use_pkce { self.storage.take_verifier() } else { None };
        let redirect_uri = self.redirect_uri();

        let exchange = self
            .client
            .exchange_code(&self.config, &redirect_uri, code, verifier.as_deref())
            .await;
        match exchange {
            Ok(grant) => match self.set_tokens(&grant, false) {
                Ok(()) => {
                    info!("tokens obtained from authorization code");
                    self.host.events.on_token_obtained(&grant);
                }
                Err(err) => {
                    error!("token persistence failed: {err}");
                    self.host.events.on_token_obtained_error(&err);
                    self.state.lock().signin_error = true;
                }
            },
            Err(err) => {
                error!("access token error: {err}");
                // The outstanding nonce is bound to this exchange; it is
                // consumed even when the exchange fails.
                self.storage.remove_nonce();
                self.host.events.on_token_obtained_error(&AuthError::Token(err));
                self.state.lock().signin_error = true;
            }
        }
    }

    async fn do_refresh_flow(&self, is_refresh: bool) {
        let Some(refresh_token) = self.storage.refresh_token() else {
            return;
        };
        let redirect_uri = self.redirect_uri();

        match self.client.refresh(&self.config, &redirect_uri, &refresh_token).await {
            Ok(grant) => match self.set_tokens(&grant, true) {
                Ok(()) => {
                    if is_refresh {
                        info!("access token refreshed");
                        self.host.events.on_token_refreshed(&grant);
                    } else {
                        info!("tokens obtained from refresh token");
                        self.host.events.on_token_obtained(&grant);
                    }
                }
                Err(err) => self.refresh_failed(is_refresh, err),
            },
            Err(err) => self.refresh_failed(is_refresh, AuthError::Token(err)),
        }
    }

    fn refresh_failed(&self, is_refresh: bool, err: AuthError) {
        error!("refresh token error: {err}");
        if is_refresh {
            // Background refresh: leave the session alone until it expires
            // naturally.
            self.host.events.on_token_refreshed_error(&err);
        } else {
            if self.authentication_required.load(Ordering::SeqCst) {
                self.state.lock().signin_error = true;
            } else {
                // Silent downgrade to unauthenticated.
                self.stop_loading();
                self.storage.remove_refresh_token();
                self.storage.remove_id_token();
            }
            self.host.events.on_token_obtained_error(&err);
        }
    }

    /// Persist a token grant: verify the nonce, store the ID token, compute
    /// the biased expiry, write the token cookies, re-arm the refresh timer
    /// and, on initial acquisition, return to the recorded post-login path.
    ///
    /// # Errors
    /// Returns [`AuthError::NonceMismatch`] before anything is committed
    /// when the ID token's nonce claim does not match the recorded value.
    fn set_tokens(&self, grant: &TokenGrant, is_refresh: bool) -> Result<(), AuthError> {
        // The recorded nonce is deleted as it is read, whether or not the
        // response carried an ID token.
        let recorded_nonce = self.storage.take_nonce();

        if let Some(id_token) = &grant.id_token {
            if self.config.use_nonce {
                if let Some(expected) = &recorded_nonce {
                    // Unparseable payloads are treated as an absent token
                    // rather than failing the flow.
                    if let Some(claims) = jwt::claims(id_token) {
                        let actual = claims.get("nonce").and_then(|v| v.as_str());
                        if actual != Some(expected.as_str()) {
                            warn!(expected = %expected, actual = ?actual, "nonce does not match");
                            return Err(AuthError::NonceMismatch);
                        }
                        debug!("nonce matches");
                    }
                }
            }
            self.storage.set_id_token(id_token);
        }

        // 2 minute refresh buffer, floored at 1 minute.
        let minutes = (grant.expires_in.unwrap_or(3600) / 60 - 2).max(1);
        let expiry = Utc::now() + chrono::Duration::minutes(minutes);
        debug!("token expiry minutes: {minutes}");
        self.storage.set_expiry(expiry);

        self.storage.set_access_token(&grant.access_token);

        // Rotation is optional server-side: when the response omitted a
        // refresh token, re-persist the one already held.
        let refresh_token = grant.refresh_token.clone().or_else(|| self.storage.refresh_token());
        if let Some(token) = &refresh_token {
            self.storage.set_refresh_token(token);
        }

        // Always one minute from now, not the computed expiry.
        self.arm_refresh_timer(StdDuration::from_millis(60_000));

        if !is_refresh {
            self.storage.remove_verifier();

            let return_path = self.storage.take_return_path().unwrap_or_default();
            let (path, query) = match return_path.find('?') {
                Some(idx) => (&return_path[..idx], &return_path[idx..]),
                None => (return_path.as_str(), ""),
            };
            if let Some(history) = &self.host.history {
                history.replace(path, query);
            } else {
                let _redirect = self.host.navigator.redirect(&return_path);
            }
        }

        self.stop_loading();
        Ok(())
    }

    fn session_expired(&self) {
        if self.host.prompter.confirm(&self.options.refresh_error_text) {
            let _redirect = self.retry();
        } else {
            // Deferred: ask again in a minute.
            self.arm_refresh_timer(StdDuration::from_secs(60));
        }
    }

    /// Schedule `process_auth(true)` after `delay`, aborting any previously
    /// scheduled tick so at most one timer is ever live.
    fn arm_refresh_timer(&self, delay: StdDuration) {
        // The slot lock is held across the spawn so the new tick cannot
        // observe the slot before its own handle is stored.
        let mut slot = self.refresh_timer.lock();
        let generation = self.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = self.weak.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(provider) = weak.upgrade() else {
                return;
            };
            // Detach this tick's own handle before running it. A re-arm
            // from inside the tick must only ever abort a pending sleep,
            // never the tick itself.
            if provider.timer_generation.load(Ordering::SeqCst) == generation {
                drop(provider.refresh_timer.lock().take());
            }
            provider.process_auth(true).await;
        });
        if let Some((previous, _)) = slot.replace((handle, delay)) {
            previous.abort();
        }
    }

    fn redirect_uri(&self) -> String {
        let origin = origin_of(&self.host.navigator.current_url());
        build_redirect_uri(&origin, &self.config.callback_path)
    }

    fn stop_loading(&self) {
        let mut state = self.state.lock();
        if state.loading {
            state.loading = false;
        }
    }
}

impl Drop for AuthCodeProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AuthCodeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCodeProvider")
            .field("storage", &self.storage)
            .field("state", &*self.state.lock())
            .finish()
    }
}
