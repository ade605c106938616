//! Login and logout: the two places credentials are created and torn down
//! outside the refresh flow.

use crate::api::client::ApiClient;
use crate::api::error::{ApiError, ErrorResponse};
use crate::api::store::{CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::api::types::{CredentialPair, LoginRequest, LoginResponse};

/// Login endpoint, relative to the base URL.
pub const LOGIN_PATH: &str = "/auth/login";

impl<S: CredentialStore> ApiClient<S> {
    /// Exchange email and password for a token pair and persist it.
    ///
    /// Sent without the interceptors: there is no access token yet, and a
    /// 401 here means bad credentials, not an expired session.
    pub async fn login(&self, email: &str, password: &str) -> Result<CredentialPair, ApiError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::Validation("Please fill in all fields".to_string()));
        }

        log::info!("Logging in");
        let url = self.config().resolve(LOGIN_PATH);
        let resp = self
            .raw()
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            let error = ErrorResponse::capture(&reqwest::Method::POST, &url, resp).await;
            log::warn!("Login failed with status {}", error.status);
            return Err(ApiError::Http(error));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|source| ApiError::Decode { url, source })?;

        let store = self.store();
        store.set(ACCESS_TOKEN_KEY, &login.token).await?;
        match login.refresh_token.as_deref() {
            Some(refresh) if !refresh.is_empty() => store.set(REFRESH_TOKEN_KEY, refresh).await?,
            // A stale refresh token must not outlive the session it belonged to.
            _ => store.delete(REFRESH_TOKEN_KEY).await?,
        }

        log::info!("Login successful");
        Ok(CredentialPair {
            access_token: login.token.clone(),
            refresh_token: login.refresh_token.clone(),
        })
    }

    /// Delete both stored tokens. Idempotent.
    pub async fn logout(&self) -> Result<(), ApiError> {
        log::info!("Logging out");
        self.store().delete(ACCESS_TOKEN_KEY).await?;
        self.store().delete(REFRESH_TOKEN_KEY).await?;
        Ok(())
    }

    /// Whether an access token is currently stored.
    ///
    /// Store read errors count as logged out.
    pub async fn is_logged_in(&self) -> bool {
        matches!(self.store().get(ACCESS_TOKEN_KEY).await, Ok(Some(_)))
    }
}
