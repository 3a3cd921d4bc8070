//! URL building and parameter extraction for the redirect round trips

use url::Url;

use crate::config::AuthConfig;

/// Security artifacts attached to one authorization redirect.
///
/// Each field is `Some` only when the corresponding protection is enabled in
/// the [`AuthConfig`].
#[derive(Debug, Default)]
pub struct AuthorizeArtifacts {
    /// S256 code challenge derived from the persisted verifier.
    pub code_challenge: Option<String>,
    /// Anti-CSRF correlation value.
    pub state: Option<String>,
    /// ID-token replay protection value.
    pub nonce: Option<String>,
}

/// Extract `scheme://host[:port]` from a URL.
#[must_use]
pub fn origin_of(url: &Url) -> String {
    let mut origin = format!("{}://", url.scheme());
    if let Some(host) = url.host_str() {
        origin.push_str(host);
    }
    if let Some(port) = url.port() {
        origin.push_str(&format!(":{port}"));
    }
    origin
}

/// Resolve a callback path to a full redirect URI.
///
/// Paths that already carry an http(s) scheme are returned unchanged;
/// anything else is resolved against the supplied origin.
#[must_use]
pub fn build_redirect_uri(origin: &str, path: &str) -> String {
    let upper = path.to_uppercase();
    if upper.contains("HTTP://") || upper.contains("HTTPS://") {
        path.to_string()
    } else {
        format!("{origin}{path}")
    }
}

/// Build the authorization endpoint URL for one redirect.
#[must_use]
pub fn authorize_url(
    config: &AuthConfig,
    redirect_uri: &str,
    artifacts: &AuthorizeArtifacts,
) -> String {
    let mut url = config.auth_url.clone();
    url.push_str("?client_id=");
    url.push_str(&config.client_id);
    url.push_str("&response_type=code");
    if !config.scope.is_empty() {
        url.push_str("&scope=");
        url.push_str(&urlencoding::encode(&config.scope));
    }
    url.push_str("&redirect_uri=");
    url.push_str(&urlencoding::encode(redirect_uri));

    if let Some(challenge) = &artifacts.code_challenge {
        url.push_str("&code_challenge=");
        url.push_str(challenge);
        url.push_str("&code_challenge_method=S256");
    }
    if let Some(state) = &artifacts.state {
        url.push_str("&state=");
        url.push_str(state);
    }
    if let Some(nonce) = &artifacts.nonce {
        url.push_str("&nonce=");
        url.push_str(nonce);
    }

    url
}

/// Build the logout endpoint URL with the post-logout redirect URI.
#[must_use]
pub fn logout_url(logout_endpoint: &str, redirect_uri: &str, client_id: &str) -> String {
    let encoded = urlencoding::encode(redirect_uri);
    let mut url = logout_endpoint.to_string();
    url.push_str("?post_logout_redirect_uri=");
    url.push_str(&encoded);
    url.push_str("&returnTo=");
    url.push_str(&encoded);
    url.push_str("&client_id=");
    url.push_str(client_id);
    url
}

/// Get the value of a named parameter from a URL's query or fragment.
///
/// Returns `None` when the parameter is absent, `Some("")` when it is
/// present without a value. Values are percent-decoded with `+` treated as
/// a space.
#[must_use]
pub fn uri_param(url: &str, name: &str) -> Option<String> {
    let bytes = url.as_bytes();
    let mut search_from = 0;
    while let Some(found) = url[search_from..].find(name) {
        let start = search_from + found;
        let end = start + name.len();
        let delimited = start > 0 && matches!(bytes[start - 1], b'?' | b'&' | b'#');
        if delimited {
            match bytes.get(end) {
                None | Some(b'&') | Some(b'#') => return Some(String::new()),
                Some(b'=') => {
                    let rest = &url[end + 1..];
                    let value_end = rest.find(['&', '#']).unwrap_or(rest.len());
                    let raw = rest[..value_end].replace('+', " ");
                    let decoded = urlencoding::decode(&raw)
                        .map_or_else(|_| raw.clone(), |decoded| decoded.into_owned());
                    return Some(decoded);
                }
                // Prefix of a longer parameter name, keep scanning.
                Some(_) => {}
            }
        }
        search_from = start + 1;
    }
    None
}
