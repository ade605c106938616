//! HTTP client with bearer-token injection and single-shot refresh on 401.
//!
//! Every request goes through the same interceptor chain:
//! the access token is read from the credential store and attached, the
//! request is dispatched, and a 401 on a request that has not been replayed
//! yet triggers one call to `/auth/refresh-token`. On success the original
//! request is replayed once with the new token. On failure both stored tokens
//! are purged and the caller gets `ApiError::CredentialLost`.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::store::{CredentialStore, KeychainStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::api::types::{bearer_value, build_form, Body, FormPart, RefreshRequest, RefreshResponse, RequestDescriptor};
use crate::config::{ClientConfig, Verbosity};
use crate::redact;

/// Refresh endpoint, relative to the base URL.
pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// Authenticated client for the LMS API.
///
/// Generic over its credential store so tests can substitute a
/// [`crate::api::store::MemoryStore`] or a failing mock.
pub struct ApiClient<S = KeychainStore> {
    http: Client,
    config: ClientConfig,
    store: S,
    /// Serializes token refreshes so concurrent 401s share one refresh call.
    refresh_gate: Mutex<()>,
}

impl<S: CredentialStore> ApiClient<S> {
    /// Build a client from `config`, persisting tokens in `store`.
    pub fn new(config: ClientConfig, store: S) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ApiError::Build)?;

        log::info!(
            "API client configured for {} ({:?}, {:?})",
            config.base_url(),
            config.environment(),
            config.platform()
        );

        Ok(Self {
            http,
            config,
            store,
            refresh_gate: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Underlying transport, without interceptors.
    pub(crate) fn raw(&self) -> &Client {
        &self.http
    }

    /// Send a request through the interceptor chain.
    ///
    /// A 401 is retried at most once, after a successful token refresh.
    pub async fn send(&self, mut request: RequestDescriptor) -> Result<Response, ApiError> {
        loop {
            let sent_token = self.intercept_request(&mut request).await;
            let url = self.config.resolve(request.url());
            let resp = self.dispatch(&url, &request).await?;

            let status = resp.status();
            if status.is_success() {
                log::info!("API Response Success: {} {}", request.method(), url);
                return Ok(resp);
            }

            let error = ErrorResponse::capture(request.method(), &url, resp).await;
            self.log_failure(&error);

            if status != StatusCode::UNAUTHORIZED {
                return Err(ApiError::Http(error));
            }
            if request.retried() {
                return Err(ApiError::Unauthorized(error));
            }
            request.mark_retried();

            match self.renew_access_token(sent_token.as_deref()).await {
                Some(token) if request.set_bearer(&token) => {
                    log::info!("Replaying {} {} with refreshed token", request.method(), url);
                }
                Some(_) => {
                    // Only a token fresh from the refresh endpoint gets here.
                    log::warn!("Refreshed token is not a valid header value");
                    self.purge_credentials().await;
                    return Err(ApiError::CredentialLost(error));
                }
                None => return Err(ApiError::CredentialLost(error)),
            }
        }
    }

    /// Send a request and decode its JSON response body.
    pub async fn json<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T, ApiError> {
        let resp = self.send(request).await?;
        let url = resp.url().to_string();
        resp.json().await.map_err(|source| ApiError::Decode { url, source })
    }

    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.send(RequestDescriptor::get(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, ApiError> {
        self.send(RequestDescriptor::delete(path)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, ApiError> {
        self.send(RequestDescriptor::post(path).with_json(body)?).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, ApiError> {
        self.send(RequestDescriptor::put(path).with_json(body)?).await
    }

    /// POST a multipart form (file uploads).
    pub async fn post_multipart(&self, path: &str, parts: Vec<FormPart>) -> Result<Response, ApiError> {
        self.send(RequestDescriptor::post(path).with_multipart(parts)).await
    }

    /// Request interceptor: merge default headers, attach the stored access
    /// token, and drop the JSON content type for multipart bodies.
    ///
    /// Returns the token that was attached, if any.
    async fn intercept_request(&self, request: &mut RequestDescriptor) -> Option<String> {
        let headers = request.headers_mut();
        for (name, value) in self.config.default_headers() {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }

        let token = match self.store.get(ACCESS_TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                log::warn!("Error getting token: {}", e);
                None
            }
        };

        let attached = match token {
            Some(t) if request.set_bearer(&t) => Some(t),
            Some(_) => {
                log::warn!("Stored access token is not a valid header value, sending without it");
                request.headers_mut().remove(AUTHORIZATION);
                None
            }
            None => None,
        };

        if request.body().is_multipart() {
            request.clear_content_type();
        }

        log::info!("API Request: {} {}", request.method(), request.url());
        if self.config.verbosity() == Verbosity::Verbose {
            log::debug!("Request headers: {}", redact::format_headers(request.headers()));
        }

        attached
    }

    async fn dispatch(&self, url: &str, request: &RequestDescriptor) -> Result<Response, ApiError> {
        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(request.headers().clone());

        builder = match request.body() {
            Body::Empty => builder,
            Body::Json(value) => builder.body(serde_json::to_vec(value)?),
            Body::Multipart(parts) => {
                let form = build_form(parts).map_err(|e| ApiError::Validation(format!("Invalid multipart form: {}", e)))?;
                builder.multipart(form)
            }
        };

        builder.send().await.map_err(|source| {
            log::error!(
                "API Error: {} {}: {}",
                request.method(),
                url,
                redact::redact_bearer(&source.to_string())
            );
            ApiError::Transport {
                url: url.to_string(),
                source,
            }
        })
    }

    /// Obtain a new access token after a 401, or purge credentials if that
    /// is impossible. `stale` is the token the failed request carried.
    ///
    /// Runs under `refresh_gate`: a waiter whose request carried a token, and
    /// that now finds a different usable token stored, reuses it instead of
    /// refreshing again. A request sent without a token always refreshes.
    async fn renew_access_token(&self, stale: Option<&str>) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;

        if let Some(stale) = stale {
            if let Ok(Some(current)) = self.store.get(ACCESS_TOKEN_KEY).await {
                if current != stale && bearer_value(&current).is_some() {
                    log::debug!("Access token was renewed by a concurrent request");
                    return Some(current);
                }
            }
        }

        let refresh_token = match self.store.get(REFRESH_TOKEN_KEY).await {
            Ok(Some(token)) => Some(token),
            Ok(None) => {
                log::info!("No refresh token stored, clearing credentials");
                None
            }
            Err(e) => {
                log::warn!("Failed to read refresh token: {}", e);
                None
            }
        };

        if let Some(refresh_token) = refresh_token {
            if let Some(token) = self.request_new_token(&refresh_token).await {
                match self.store.set(ACCESS_TOKEN_KEY, &token).await {
                    Ok(()) => {
                        log::info!("Access token refreshed");
                        return Some(token);
                    }
                    Err(e) => log::warn!("Failed to store refreshed token: {}", e),
                }
            }
        }

        self.purge_credentials().await;
        None
    }

    /// POST the refresh token on the raw transport, bypassing the
    /// interceptors so a failing refresh can never recurse.
    async fn request_new_token(&self, refresh_token: &str) -> Option<String> {
        let url = self.config.resolve(REFRESH_PATH);
        let resp = match self
            .http
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                log::error!("Error refreshing token: {}", e);
                return None;
            }
        };

        if !resp.status().is_success() {
            log::warn!("Token refresh failed with status {}", resp.status());
            return None;
        }

        match resp.json::<RefreshResponse>().await {
            Ok(body) => body.token.filter(|t| !t.is_empty()),
            Err(e) => {
                log::warn!("Failed to parse refresh response: {}", e);
                None
            }
        }
    }

    /// Delete both tokens. Failures are logged; the caller's error wins.
    async fn purge_credentials(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.store.delete(key).await {
                log::warn!("Failed to delete {}: {}", key, e);
            }
        }
    }

    fn log_failure(&self, error: &ErrorResponse) {
        match self.config.verbosity() {
            Verbosity::Verbose => log::error!(
                "API Error: {} {} status={} body={}",
                error.method,
                error.url,
                error.status,
                redact::redact_json_tokens(&error.body)
            ),
            Verbosity::Terse => log::error!("API Error: {} {} status={}", error.method, error.url, error.status),
        }
    }
}
