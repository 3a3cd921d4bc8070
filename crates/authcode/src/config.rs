//! Authentication realm configuration and provider options

/// Configuration for one authentication realm.
///
/// Immutable for the lifetime of a flow instance. Multiple independent
/// configs may coexist; persisted keys are disambiguated by the
/// `storage_prefix` on [`ProviderOptions`].
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// URL of the authorization endpoint (login screen).
    pub auth_url: String,

    /// URL of the token endpoint.
    pub token_url: String,

    /// URL of the logout endpoint, if the server supports one.
    pub logout_url: Option<String>,

    /// Local path redirected back to after authenticating.
    pub callback_path: String,

    /// Local path redirected back to after logging out.
    pub logout_callback_path: Option<String>,

    /// OAuth client id.
    pub client_id: String,

    /// OAuth client secret, for confidential clients only.
    pub client_secret: Option<String>,

    /// Scope to request (space-separated). May be empty.
    pub scope: String,

    /// Enable proof key for code exchange.
    pub use_pkce: bool,

    /// Enable `state` matching.
    pub use_state: bool,

    /// Enable `nonce` matching against the ID token.
    pub use_nonce: bool,
}

impl AuthConfig {
    /// Create a configuration with PKCE, `state` and `nonce` enabled.
    #[must_use]
    pub fn new(
        auth_url: String,
        token_url: String,
        callback_path: String,
        client_id: String,
    ) -> Self {
        Self {
            auth_url,
            token_url,
            logout_url: None,
            callback_path,
            logout_callback_path: None,
            client_id,
            client_secret: None,
            scope: String::new(),
            use_pkce: true,
            use_state: true,
            use_nonce: true,
        }
    }

    /// Set the scope to request.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the client secret (confidential clients).
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Set the logout endpoint and the local path to return to afterwards.
    #[must_use]
    pub fn with_logout(
        mut self,
        logout_url: impl Into<String>,
        callback_path: impl Into<String>,
    ) -> Self {
        self.logout_url = Some(logout_url.into());
        self.logout_callback_path = Some(callback_path.into());
        self
    }

    /// Enable or disable PKCE.
    #[must_use]
    pub fn with_pkce(mut self, enabled: bool) -> Self {
        self.use_pkce = enabled;
        self
    }

    /// Enable or disable `state` matching.
    #[must_use]
    pub fn with_state(mut self, enabled: bool) -> Self {
        self.use_state = enabled;
        self
    }

    /// Enable or disable `nonce` matching.
    #[must_use]
    pub fn with_nonce(mut self, enabled: bool) -> Self {
        self.use_nonce = enabled;
        self
    }
}

/// Options controlling a provider instance.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// When true the code flow is required and a redirect is issued if no
    /// credential is available. When false, unauthenticated callers pass
    /// through.
    pub authentication_required: bool,

    /// Namespace for every persisted key. Give each concurrent realm a
    /// unique prefix.
    pub storage_prefix: String,

    /// Path to redirect back to once a token has been obtained. Defaults to
    /// the path that started the flow.
    pub return_to: Option<String>,

    /// Loader text while signing in.
    pub sign_in_text: String,

    /// Loader text while signing out.
    pub sign_out_text: String,

    /// Message shown when sign-in fails.
    pub sign_in_error_text: String,

    /// Prompt shown when the session has expired mid-use.
    pub refresh_error_text: String,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            authentication_required: true,
            storage_prefix: String::new(),
            return_to: None,
            sign_in_text: "Signing you in...".to_string(),
            sign_out_text: "Signing you out...".to_string(),
            sign_in_error_text: "Sorry, we were unable to sign you in. Please try again later."
                .to_string(),
            refresh_error_text: "Your session has expired.\nSign in again to continue."
                .to_string(),
        }
    }
}
