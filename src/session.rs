//! Authenticated HTTP session: cookie jar, CSRF token, login/logout.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Config;

const LOGIN_PATH: &str = "accounts/login/ajax/";
const LOGOUT_PATH: &str = "accounts/logout/";
const CSRF_COOKIE: &str = "csrftoken";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login request failed")]
    Request(#[from] reqwest::Error),
    #[error("login handshake returned no CSRF cookie")]
    MissingCsrf,
    #[error("login rejected for {0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    authenticated: bool,
}

/// Process-wide session shared by the pagination flow and, read-only, by
/// download jobs. Auth state lives behind a mutex so the feed walk can log
/// out on unavailability without exclusive ownership.
pub struct Session {
    client: Client,
    base_url: String,
    csrf_token: Mutex<Option<String>>,
}

impl Session {
    /// Build the cookie-jar client. No network activity yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying TLS client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            csrf_token: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn is_logged_in(&self) -> bool {
        self.csrf_token.lock().await.is_some()
    }

    /// Authenticate against the login endpoint.
    ///
    /// Primes the cookie jar with a GET of the base URL to obtain the CSRF
    /// cookie, then posts the credential form with the `X-CSRFToken` header.
    /// The token rotated by a successful login is retained for logout.
    ///
    /// # Errors
    ///
    /// `AuthError::MissingCsrf` if the handshake sets no CSRF cookie,
    /// `AuthError::Rejected` on a non-success status or an
    /// `authenticated: false` body.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let prime = self
            .client
            .get(format!("{}/", self.base_url))
            .header("Referer", format!("{}/", self.base_url))
            .send()
            .await?;
        let csrf = cookie_value(&prime, CSRF_COOKIE).ok_or(AuthError::MissingCsrf)?;

        let response = self
            .client
            .post(format!("{}/{LOGIN_PATH}", self.base_url))
            .header("X-CSRFToken", &csrf)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(username.to_string()));
        }

        let rotated = cookie_value(&response, CSRF_COOKIE).unwrap_or(csrf);
        let body: LoginResponse = response.json().await?;
        if !body.authenticated {
            return Err(AuthError::Rejected(username.to_string()));
        }

        *self.csrf_token.lock().await = Some(rotated);
        debug!(user = %username, "Logged in");
        Ok(())
    }

    /// Log out, if logged in. Idempotent; a failed logout request is logged
    /// and swallowed so teardown never masks the error that triggered it.
    pub async fn logout(&self) {
        let Some(token) = self.csrf_token.lock().await.take() else {
            return;
        };

        let result = self
            .client
            .post(format!("{}/{LOGOUT_PATH}", self.base_url))
            .form(&[("csrfmiddlewaretoken", token.as_str())])
            .send()
            .await;

        match result {
            Ok(_) => debug!("Logged out"),
            Err(e) => warn!("Logout request failed: {e:#}"),
        }
    }
}

fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .cookies()
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}
