use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, AuthResponse};
use crate::config::{Config, StorageBackend};
use crate::models::User;

use super::storage::{FileStorage, KeyringStorage, Storage};
use super::{Credentials, Registration};

/// Storage key for the raw access token
pub const TOKEN_KEY: &str = "token";

/// Storage key for the JSON-serialized user record
pub const USER_KEY: &str = "user";

/// Storage key for the raw refresh token
pub const REFRESH_KEY: &str = "refresh";

/// Keychain service name used by the keyring backend
pub const KEYRING_SERVICE: &str = "projman";

/// Authentication state: an access token and the user it belongs to.
///
/// The session is authenticated exactly when the token is non-empty.
#[derive(Clone, Default, PartialEq)]
pub struct Session {
    token: String,
    user: Option<User>,
    refresh: Option<String>,
}

impl Session {
    /// The empty session
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    /// Access token, empty when anonymous
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh.as_deref()
    }

    fn auth_success(&mut self, token: String, user: User, refresh: Option<String>) {
        self.token = token;
        self.user = Some(user);
        self.refresh = refresh;
    }

    fn logout(&mut self) {
        self.token.clear();
        self.user = None;
        self.refresh = None;
    }

    /// Rebuild the session left in storage by a previous run.
    ///
    /// Never fails: unreadable storage or a user record that does not parse
    /// yields the anonymous session.
    pub fn restore(storage: &dyn Storage) -> Self {
        let token = match storage.get(TOKEN_KEY) {
            Ok(token) => token.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored token, starting anonymous");
                return Self::anonymous();
            }
        };

        let user = match storage.get(USER_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Option<User>>(&raw) {
                Ok(user) => user,
                Err(e) => {
                    warn!(error = %e, "Stored user record is malformed, starting anonymous");
                    return Self::anonymous();
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored user, starting anonymous");
                return Self::anonymous();
            }
        };

        let refresh = if token.is_empty() {
            None
        } else {
            storage.get(REFRESH_KEY).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read stored refresh token");
                None
            })
        };

        let session = Self { token, user, refresh };
        debug!(
            authenticated = session.is_authenticated(),
            has_user = session.user.is_some(),
            "Session restored"
        );
        session
    }
}

/// The single owner of the session state.
///
/// Holds the session, the durable storage it is mirrored to, and the API
/// client whose authorization tracks the session token. Actions that change
/// the session take `&mut self`; state is committed only after the network
/// call has succeeded, so a failed action leaves the session untouched.
pub struct SessionStore {
    api: ApiClient,
    storage: Box<dyn Storage>,
    session: Session,
}

impl SessionStore {
    /// Create a store, restoring any session persisted by a previous run.
    pub fn new(mut api: ApiClient, storage: Box<dyn Storage>) -> Self {
        let session = Session::restore(storage.as_ref());
        if session.is_authenticated() {
            api.set_token(session.token.clone());
        } else {
            api.clear_token();
        }
        Self {
            api,
            storage,
            session,
        }
    }

    /// Build the API client and storage backend described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = ApiClient::new(&config.api_base_url, config.request_timeout())?;
        let storage: Box<dyn Storage> = match config.storage {
            StorageBackend::File => {
                let dir = config.data_dir().context("Could not determine data directory")?;
                debug!(?dir, "Using file storage");
                Box::new(FileStorage::new(dir))
            }
            StorageBackend::Keyring => {
                debug!(service = KEYRING_SERVICE, "Using keyring storage");
                Box::new(KeyringStorage::new(KEYRING_SERVICE))
            }
        };
        Ok(Self::new(api, storage))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.user()
    }

    /// HTTP client carrying this session's authorization
    pub fn client(&self) -> &ApiClient {
        &self.api
    }

    /// Header value attached to outgoing requests, if any
    pub fn authorization(&self) -> Option<String> {
        self.api.authorization()
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Log in with `credentials` and make the returned token the session's.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        debug!(first_credential = %credentials.first_credential, "Logging in");
        let response = self.api.login(credentials).await.inspect_err(|e| {
            warn!(error = %e, "Login failed");
        })?;
        self.authenticate(&response);
        info!(user = %response.user.display_name(), "Login successful");
        Ok(response)
    }

    /// Register an account and start a session for it.
    pub async fn register(&mut self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        debug!(username = %registration.username, "Registering");
        let response = self.api.register(registration).await.inspect_err(|e| {
            warn!(error = %e, "Registration failed");
        })?;
        self.authenticate(&response);
        info!(user = %response.user.display_name(), "Registration successful");
        Ok(response)
    }

    /// End the session. Always succeeds; storage failures are only logged.
    pub fn logout(&mut self) {
        self.session.logout();
        for key in [TOKEN_KEY, USER_KEY, REFRESH_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove stored session entry");
            }
        }
        self.api.clear_token();
        info!("Logged out");
    }

    /// Exchange the held refresh token for a new access token.
    pub async fn refresh(&mut self) -> Result<String, ApiError> {
        let refresh = self
            .session
            .refresh_token()
            .filter(|r| !r.is_empty())
            .ok_or(ApiError::NoRefreshToken)?
            .to_string();

        let access = self.api.refresh_access(&refresh).await?;

        self.persist(TOKEN_KEY, &access);
        self.api.set_token(access.clone());
        self.session.token = access.clone();
        debug!("Access token refreshed");
        Ok(access)
    }

    /// Ask the server whether the current token is still accepted.
    /// An anonymous session is never valid and makes no request.
    pub async fn verify(&self) -> Result<bool, ApiError> {
        if !self.session.is_authenticated() {
            return Ok(false);
        }
        self.api.verify_token(&self.session.token).await
    }

    /// Reload the user record from the server and persist it.
    pub async fn fetch_current_user(&mut self) -> Result<User, ApiError> {
        let user = self.api.current_user().await?;
        if self.session.is_authenticated() {
            self.persist_user(&user);
            self.session.user = Some(user.clone());
        }
        Ok(user)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Persist, authorize, then commit. Persistence failures are logged and
    /// do not undo the login.
    fn authenticate(&mut self, response: &AuthResponse) {
        self.persist(TOKEN_KEY, &response.access);
        self.persist_user(&response.user);
        match response.refresh.as_deref() {
            Some(refresh) => self.persist(REFRESH_KEY, refresh),
            None => {
                if let Err(e) = self.storage.remove(REFRESH_KEY) {
                    warn!(error = %e, "Failed to remove stale refresh token");
                }
            }
        }

        self.api.set_token(response.access.clone());

        self.session.auth_success(
            response.access.clone(),
            response.user.clone(),
            response.refresh.clone(),
        );
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            warn!(key, error = %e, "Failed to persist session entry");
        }
    }

    fn persist_user(&self, user: &User) {
        match serde_json::to_string(user) {
            Ok(raw) => self.persist(USER_KEY, &raw),
            Err(e) => warn!(error = %e, "Failed to serialize user record"),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("user", &self.user)
            .field("has_refresh", &self.refresh.is_some())
            .finish()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("api", &self.api)
            .field("authenticated", &self.session.is_authenticated())
            .field("user", &self.session.user)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStorage;
    use std::time::Duration;

    fn api() -> ApiClient {
        ApiClient::new("http://127.0.0.1:9/api/", Duration::from_secs(1)).unwrap()
    }

    fn store_with(entries: &[(&str, &str)]) -> SessionStore {
        let storage = MemoryStorage::with_entries(entries.iter().copied());
        SessionStore::new(api(), Box::new(storage))
    }

    #[test]
    fn test_debug_hides_tokens() {
        let store = store_with(&[("token", "secret-access"), ("refresh", "secret-refresh")]);
        for rendered in [format!("{:?}", store.session()), format!("{:?}", store)] {
            assert!(!rendered.contains("secret-access"), "{rendered}");
            assert!(!rendered.contains("secret-refresh"), "{rendered}");
        }
        let rendered = format!("{:?}", store.session());
        assert!(rendered.contains("authenticated: true"));
        assert!(rendered.contains("has_refresh: true"));
    }

    #[test]
    fn test_empty_storage_is_anonymous() {
        let store = store_with(&[]);
        assert!(!store.is_authenticated());
        assert_eq!(store.session(), &Session::anonymous());
        assert_eq!(store.authorization(), None);
    }

    #[test]
    fn test_restore_token_and_user() {
        let store = store_with(&[("token", "T"), ("user", r#"{"id":1}"#), ("refresh", "R")]);
        assert!(store.is_authenticated());
        assert_eq!(store.session().token(), "T");
        assert_eq!(store.user(), Some(&User::with_id(1)));
        assert_eq!(store.session().refresh_token(), Some("R"));
        assert_eq!(store.authorization().as_deref(), Some("Bearer T"));
    }

    #[test]
    fn test_restore_token_without_user() {
        let store = store_with(&[("token", "T")]);
        assert!(store.is_authenticated());
        assert_eq!(store.user(), None);
    }

    #[test]
    fn test_restore_null_user() {
        let store = store_with(&[("token", "T"), ("user", "null")]);
        assert!(store.is_authenticated());
        assert_eq!(store.user(), None);
    }

    #[test]
    fn test_restore_malformed_user_is_anonymous() {
        let store = store_with(&[("token", "T"), ("user", "{not json")]);
        assert!(!store.is_authenticated());
        assert_eq!(store.user(), None);
        assert_eq!(store.authorization(), None);
    }

    #[test]
    fn test_restore_user_without_token_is_anonymous() {
        let store = store_with(&[("user", r#"{"id":1}"#), ("refresh", "R")]);
        assert!(!store.is_authenticated());
        assert_eq!(store.session().refresh_token(), None);
    }

    #[test]
    fn test_logout_clears_everything() {
        let mut store = store_with(&[("token", "T"), ("user", r#"{"id":1}"#), ("refresh", "R")]);
        store.logout();

        assert!(!store.is_authenticated());
        assert_eq!(store.session(), &Session::anonymous());
        assert_eq!(store.authorization(), None);
        for key in [TOKEN_KEY, USER_KEY, REFRESH_KEY] {
            assert_eq!(store.storage().get(key).unwrap(), None);
        }
    }

    #[test]
    fn test_logout_is_idempotent() {
        let mut store = store_with(&[]);
        store.logout();
        store.logout();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_session_invariant_across_transitions() {
        let mut session = Session::anonymous();
        assert_eq!(session.is_authenticated(), !session.token().is_empty());

        session.auth_success("T".to_string(), User::with_id(1), None);
        assert_eq!(session.is_authenticated(), !session.token().is_empty());
        assert!(session.is_authenticated());

        session.auth_success("U".to_string(), User::with_id(2), Some("R".to_string()));
        assert_eq!(session.token(), "U");
        assert_eq!(session.user(), Some(&User::with_id(2)));

        session.logout();
        assert_eq!(session.is_authenticated(), !session.token().is_empty());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_without_token_fails_fast() {
        let mut store = store_with(&[("token", "T")]);
        let err = store.refresh().await.unwrap_err();
        assert!(matches!(err, ApiError::NoRefreshToken));
        assert_eq!(store.session().token(), "T");
    }

    #[tokio::test]
    async fn test_verify_anonymous_is_false_without_request() {
        let store = store_with(&[]);
        assert!(!store.verify().await.unwrap());
    }
}
