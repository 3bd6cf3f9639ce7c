//! Google OAuth 2.0 authorization-code client.
//!
//! # Flow
//!
//! 1. Generate a random `state`, store it in the session
//! 2. Redirect the browser to [`GoogleOAuthClient::authorization_url`]
//! 3. On callback, compare the returned `state` with the stored one
//! 4. Exchange the code with [`GoogleOAuthClient::exchange_code`]
//! 5. Fetch the profile with [`GoogleOAuthClient::fetch_profile`]

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use crate::config::GoogleOAuthConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Errors from the Google OAuth exchange.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Google sign-in is not configured.
    #[error("google sign-in is not configured")]
    NotConfigured,

    /// The `state` parameter was missing or did not match the session.
    #[error("oauth state mismatch")]
    StateMismatch,

    /// Google redirected back with an error instead of a code.
    #[error("authorization denied: {0}")]
    Denied(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Google returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The profile has no verified email address.
    #[error("google account email is not verified")]
    UnverifiedEmail,
}

/// Profile fields read from the `userinfo` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    /// Stable Google account id.
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google OAuth client.
///
/// Cheap to clone; the HTTP client and credentials are shared.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    config: GoogleOAuthConfig,
    redirect_uri: String,
}

impl GoogleOAuthClient {
    #[must_use]
    pub fn new(http: reqwest::Client, config: GoogleOAuthConfig, redirect_uri: String) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                config,
                redirect_uri,
            }),
        }
    }

    /// Build the consent-screen URL for a given CSRF `state`.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        let params = [
            ("client_id", self.inner.config.client_id.as_str()),
            ("redirect_uri", self.inner.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", state),
            ("prompt", "select_account"),
        ];
        url::Url::parse_with_params(AUTHORIZE_URL, &params)
            .map_or_else(|_| AUTHORIZE_URL.to_string(), String::from)
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Api` if Google rejects the code.
    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.config.client_id.as_str()),
            ("client_secret", self.inner.config.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", self.inner.redirect_uri.as_str()),
        ];

        let response = self.inner.http.post(TOKEN_URL).form(&params).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(OAuthError::Api { status, message });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Fetch the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::UnverifiedEmail` if Google has not verified the
    /// address, since accounts are linked by email.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<GoogleProfile, OAuthError> {
        let response = self
            .inner
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(OAuthError::Api { status, message });
        }

        let profile: GoogleProfile = response.json().await?;
        if !profile.email_verified {
            return Err(OAuthError::UnverifiedEmail);
        }
        Ok(profile)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_authorization_url_encodes_params() {
        let client = GoogleOAuthClient::new(
            reqwest::Client::new(),
            GoogleOAuthConfig {
                client_id: "123.apps.googleusercontent.com".to_string(),
                client_secret: SecretString::from("GOCSPX-abc"),
            },
            "https://gerinmah.mn/api/auth/google/callback".to_string(),
        );
        let url = client.authorization_url("st4te");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=123.apps.googleusercontent.com"));
        assert!(url.contains(
            "redirect_uri=https%3A%2F%2Fgerinmah.mn%2Fapi%2Fauth%2Fgoogle%2Fcallback"
        ));
        assert!(url.contains("scope=openid+email+profile"));
        assert!(url.contains("state=st4te"));
        assert!(!url.contains("GOCSPX"));
    }

    #[test]
    fn test_profile_defaults_unverified() {
        let profile: GoogleProfile =
            serde_json::from_str(r#"{"sub":"1","email":"a@b.mn"}"#).unwrap();
        assert!(!profile.email_verified);
    }
}
