//! OAuth2 Authorization Code flow client with PKCE, `state` and `nonce`
//! protection, silent token refresh and session-expiry recovery.
//!
//! The crate is split along the flow's natural seams:
//! - [`config`]: realm configuration and provider options
//! - [`pkce`]: PKCE verifier/challenge, `state` and `nonce` generation
//! - [`store`]: the two-tier credential store and its typed facade
//! - [`urls`]: redirect URL construction and callback parameter extraction
//! - [`client`]: token endpoint HTTP client
//! - [`jwt`]: unverified JWT payload extraction for the nonce check
//! - [`flow`]: stateless flow functions over the store
//! - [`host`]: traits the embedding application implements
//! - [`provider`]: the authentication state machine tying it all together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use authcode::{AuthCodeProvider, AuthConfig, Host, InMemoryStore, ProviderOptions};
//! # use authcode::{Navigator, Redirect};
//! # struct AppNavigator;
//! # impl Navigator for AppNavigator {
//! #     fn current_url(&self) -> url::Url { url::Url::parse("https://app.example.com/").unwrap() }
//! #     fn redirect(&self, _url: &str) -> Redirect { Redirect::issued() }
//! # }
//!
//! # async fn run() {
//! let config = AuthConfig::new(
//!     "https://auth.example.com/authorize".to_string(),
//!     "https://auth.example.com/oauth/token".to_string(),
//!     "/callback".to_string(),
//!     "my-client-id".to_string(),
//! )
//! .with_scope("openid profile");
//!
//! let provider = AuthCodeProvider::new(
//!     config,
//!     ProviderOptions::default(),
//!     Arc::new(InMemoryStore::new()),
//!     Host::new(Arc::new(AppNavigator)),
//! );
//! provider.mount().await;
//! # }
//! ```

pub mod client;
pub mod config;
pub mod flow;
pub mod host;
pub mod jwt;
pub mod pkce;
pub mod provider;
pub mod store;
pub mod urls;

pub use client::{TokenClient, TokenClientError, TokenGrant};
pub use config::{AuthConfig, ProviderOptions};
pub use host::{AuthEvents, History, Navigator, Prompter, Redirect};
pub use provider::{AuthCodeProvider, AuthError, Host, ViewState};
pub use store::{CookieOptions, CredentialStore, FlowStorage, InMemoryStore};
