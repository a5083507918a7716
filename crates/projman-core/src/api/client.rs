//! API client for the ProjectManager REST API.
//!
//! This module provides the `ApiClient` struct for the auth endpoints
//! (login, register, token refresh/verify, current user) and generic JSON
//! helpers for any further authenticated call.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{Credentials, Registration};
use crate::models::User;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL of the API, the backend's development address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const LOGIN_PATH: &str = "auth/login/";
const REGISTER_PATH: &str = "auth/register/";
const TOKEN_REFRESH_PATH: &str = "auth/token/refresh/";
const TOKEN_VERIFY_PATH: &str = "auth/token/verify/";
const ME_PATH: &str = "auth/me/";

/// Body returned by the login and register endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    user: User,
}

/// API client for the ProjectManager backend.
///
/// The bearer token is per-client state: every request built by this client
/// carries `Authorization: Bearer <token>` while a token is set.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("authorized", &self.token.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: Self::parse_base_url(base_url)?,
            token: None,
        })
    }

    /// Relative endpoint paths are joined onto the base, so it must end
    /// with a slash or its last segment would be replaced.
    fn parse_base_url(base_url: &str) -> Result<Url> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let url = Url::parse(&normalized)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("API base URL cannot be used as a base: {}", base_url);
        }
        Ok(url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Stop sending an authorization header
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The `Authorization` header value this client attaches, if any.
    pub fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid endpoint {}: {}", path, e)))
    }

    fn authorize(&self, request: RequestBuilder, authorized: bool) -> RequestBuilder {
        match self.token {
            Some(ref token) if authorized => request.bearer_auth(token),
            _ => request,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "API request rejected");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response, url: &Url) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    /// GET `path` (relative to the base URL) and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "GET");

        let response = self.authorize(self.client.get(url.clone()), true).send().await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response, &url).await
    }

    /// POST a JSON body to `path` (relative to the base URL) and decode the
    /// JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_post(path, body, true).await
    }

    /// Token endpoints authenticate by body. The backend rejects any request
    /// whose bearer fails to decode, so a stale token must not ride along.
    async fn post_anonymous<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_post(path, body, false).await
    }

    async fn send_post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        authorized: bool,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!(url = %url, authorized, "POST");

        let response = self
            .authorize(self.client.post(url.clone()), authorized)
            .json(body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response, &url).await
    }

    // ===== Auth Endpoints =====

    async fn post_auth<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<AuthResponse, ApiError> {
        let auth: AuthResponse = self.post_anonymous(path, body).await?;
        if auth.access.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Auth response carried an empty access token".to_string(),
            ));
        }
        Ok(auth)
    }

    /// Exchange credentials for tokens and the user record
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.post_auth(LOGIN_PATH, credentials).await
    }

    /// Create an account; answers with the same shape as `login`
    pub async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        self.post_auth(REGISTER_PATH, registration).await
    }

    /// Trade a refresh token for a new access token
    pub async fn refresh_access(&self, refresh: &str) -> Result<String, ApiError> {
        let response: RefreshResponse = self
            .post_anonymous(TOKEN_REFRESH_PATH, &RefreshRequest { refresh })
            .await?;
        if response.access.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Refresh response carried an empty access token".to_string(),
            ));
        }
        Ok(response.access)
    }

    /// Ask the server whether `token` is still valid.
    ///
    /// A 401 answer means "invalid" and is not an error.
    pub async fn verify_token(&self, token: &str) -> Result<bool, ApiError> {
        match self
            .post_anonymous::<serde_json::Value, _>(TOKEN_VERIFY_PATH, &VerifyRequest { token })
            .await
        {
            Ok(_) => Ok(true),
            Err(ApiError::Rejected { status, .. }) if status == StatusCode::UNAUTHORIZED => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch the profile of the user this client is authorized as
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let me: MeResponse = self.get(ME_PATH).await?;
        Ok(me.user)
    }
}
