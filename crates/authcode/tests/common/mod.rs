//! Shared test doubles for the integration suites.
#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use url::Url;

use authcode::{AuthError, AuthEvents, History, Navigator, Prompter, Redirect, TokenGrant};

/// Route crate logs to the test writer; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Navigator over a settable URL that records every redirect instead of
/// navigating.
pub struct MockNavigator {
    url: Mutex<Url>,
    redirects: Mutex<Vec<String>>,
}

impl MockNavigator {
    pub fn at(url: &str) -> Self {
        Self {
            url: Mutex::new(Url::parse(url).expect("test url must parse")),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock() = Url::parse(url).expect("test url must parse");
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().clone()
    }

    pub fn last_redirect(&self) -> Option<String> {
        self.redirects.lock().last().cloned()
    }
}

impl Navigator for MockNavigator {
    fn current_url(&self) -> Url {
        self.url.lock().clone()
    }

    fn redirect(&self, url: &str) -> Redirect {
        self.redirects.lock().push(url.to_string());
        Redirect::issued()
    }
}

/// History double that records `replace` calls.
#[derive(Default)]
pub struct MockHistory {
    replacements: Mutex<Vec<(String, String)>>,
}

impl MockHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replacements(&self) -> Vec<(String, String)> {
        self.replacements.lock().clone()
    }
}

impl History for MockHistory {
    fn replace(&self, path: &str, query: &str) {
        self.replacements.lock().push((path.to_string(), query.to_string()));
    }
}

/// Prompter with a fixed answer that records the texts it was shown.
pub struct ScriptedPrompter {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn answering(answer: bool) -> Self {
        Self { answer, prompts: Mutex::new(Vec::new()) }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, text: &str) -> bool {
        self.prompts.lock().push(text.to_string());
        self.answer
    }
}

/// Observer that records milestone names in order.
#[derive(Default)]
pub struct RecordingEvents {
    milestones: Mutex<Vec<String>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn milestones(&self) -> Vec<String> {
        self.milestones.lock().clone()
    }
}

impl AuthEvents for RecordingEvents {
    fn on_get_auth_code(&self) {
        self.milestones.lock().push("get_auth_code".to_string());
    }

    fn on_receive_auth_code(&self, code: &str) {
        self.milestones.lock().push(format!("receive_auth_code:{code}"));
    }

    fn on_token_obtained(&self, _grant: &TokenGrant) {
        self.milestones.lock().push("token_obtained".to_string());
    }

    fn on_token_obtained_error(&self, error: &AuthError) {
        self.milestones.lock().push(format!("token_obtained_error:{error}"));
    }

    fn on_token_refreshed(&self, _grant: &TokenGrant) {
        self.milestones.lock().push("token_refreshed".to_string());
    }

    fn on_token_refreshed_error(&self, error: &AuthError) {
        self.milestones.lock().push(format!("token_refreshed_error:{error}"));
    }
}

/// Build an unsigned JWT whose payload carries the given claims.
pub fn make_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

/// Build an ID token carrying the given nonce claim.
pub fn make_id_token(nonce: &str) -> String {
    make_jwt(&serde_json::json!({ "sub": "user-1", "nonce": nonce }))
}
