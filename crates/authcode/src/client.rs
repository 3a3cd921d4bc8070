//! Token endpoint HTTP client
//!
//! Form-encoded POSTs for the authorization-code exchange and the
//! refresh-token grant. A response only counts as a success when it carries
//! an `access_token` and no `error` field, whatever the HTTP status says.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::AuthConfig;

/// Raw token endpoint response (RFC 6749 §5).
#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// A validated, successful token grant.
#[derive(Debug, Clone, Serialize)]
pub struct TokenGrant {
    /// Short-lived credential for API calls.
    pub access_token: String,

    /// Longer-lived credential for silent refresh. Servers may omit it on
    /// rotation-less refresh responses.
    pub refresh_token: Option<String>,

    /// Identity assertion (JWT), when OpenID Connect is in play.
    pub id_token: Option<String>,

    /// Access-token lifetime in seconds, when the server states one.
    pub expires_in: Option<i64>,

    /// Granted scopes, when echoed back.
    pub scope: Option<String>,
}

/// Error type for token endpoint operations.
#[derive(Debug, Error)]
pub enum TokenClientError {
    /// The HTTP round trip itself failed.
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status and no parseable
    /// OAuth error body.
    #[error("token endpoint returned status {status}")]
    Endpoint {
        /// HTTP status code.
        status: u16,
    },

    /// The endpoint reported an OAuth error (RFC 6749 §5.2).
    #[error("{0}")]
    OAuth(String),

    /// The response parsed but carried no `access_token`.
    #[error("access token not present in token response")]
    MissingAccessToken,

    /// The response body was not valid token-response JSON.
    #[error("malformed token response: {0}")]
    Parse(String),
}

/// HTTP client for the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
}

impl Default for TokenClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenClient {
    /// Create a client with a 30 second request timeout.
    #[must_use]
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// `redirect_uri` must exactly match the one used to obtain the code.
    /// The verifier is included only when PKCE was used and one is on
    /// record.
    ///
    /// # Errors
    /// Returns an error for transport failures, OAuth error responses, or
    /// responses missing `access_token`.
    pub async fn exchange_code(
        &self,
        config: &AuthConfig,
        redirect_uri: &str,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenGrant, TokenClientError> {
        let mut params = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("client_id".to_string(), config.client_id.clone()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
            ("code".to_string(), code.to_string()),
        ];
        if !config.scope.is_empty() {
            params.push(("scope".to_string(), config.scope.clone()));
        }
        if let Some(secret) = &config.client_secret {
            params.push(("client_secret".to_string(), secret.clone()));
        }
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier".to_string(), verifier.to_string()));
        }

        debug!("exchanging authorization code at {}", config.token_url);
        self.post_token_request(&config.token_url, &params).await
    }

    /// Obtain a fresh access token from a refresh token.
    ///
    /// # Errors
    /// Returns an error for transport failures, OAuth error responses, or
    /// responses missing `access_token`.
    pub async fn refresh(
        &self,
        config: &AuthConfig,
        redirect_uri: &str,
        refresh_token: &str,
    ) -> Result<TokenGrant, TokenClientError> {
        let mut params = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("client_id".to_string(), config.client_id.clone()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
            ("refresh_token".to_string(), refresh_token.to_string()),
        ];
        if !config.scope.is_empty() {
            params.push(("scope".to_string(), config.scope.clone()));
        }
        if let Some(secret) = &config.client_secret {
            params.push(("client_secret".to_string(), secret.clone()));
        }

        debug!("refreshing access token at {}", config.token_url);
        self.post_token_request(&config.token_url, &params).await
    }

    async fn post_token_request(
        &self,
        token_url: &str,
        params: &[(String, String)],
    ) -> Result<TokenGrant, TokenClientError> {
        let response = self.http.post(token_url).form(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed: Result<RawTokenResponse, _> = serde_json::from_str(&body);

        if !status.is_success() {
            // Prefer the OAuth error payload when the server sent one.
            if let Ok(raw) = &parsed {
                if let Some(message) = oauth_error_message(raw) {
                    return Err(TokenClientError::OAuth(message));
                }
            }
            return Err(TokenClientError::Endpoint { status: status.as_u16() });
        }

        let raw = parsed.map_err(|e| TokenClientError::Parse(e.to_string()))?;

        if let Some(message) = oauth_error_message(&raw) {
            return Err(TokenClientError::OAuth(message));
        }

        let access_token = raw.access_token.ok_or(TokenClientError::MissingAccessToken)?;
        Ok(TokenGrant {
            access_token,
            refresh_token: raw.refresh_token,
            id_token: raw.id_token,
            expires_in: raw.expires_in,
            scope: raw.scope,
        })
    }
}

fn oauth_error_message(raw: &RawTokenResponse) -> Option<String> {
    let error = raw.error.as_ref()?;
    Some(match &raw.error_description {
        Some(description) => format!("{error}: {description}"),
        None => error.clone(),
    })
}
