//! Process-wide session state and the operations that mutate it

use crate::config::AuthConfig;
use crate::services::AuthService;
use authflow_http::{
    ApiClient, ApiClientBuilder, ClientError, CredentialStore, LoginRequest, ProfileResponse,
    RegisterRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Authenticated user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<ProfileResponse> for Profile {
    fn from(profile: ProfileResponse) -> Self {
        Self {
            id: profile.id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
        }
    }
}

/// Session snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub is_authenticated: bool,
    pub user: Option<Profile>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Holder of the live session, shared with the HTTP client as its credential store.
///
/// `epoch` advances whenever the session is torn down so late profile
/// responses for an ended session can be recognised and dropped.
struct SessionCell {
    tx: watch::Sender<Session>,
    epoch: AtomicU64,
}

impl SessionCell {
    fn new() -> Self {
        Self {
            tx: watch::Sender::new(Session::default()),
            epoch: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    fn update(&self, f: impl FnOnce(&mut Session)) {
        self.tx.send_modify(f);
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });
        LoadingGuard { cell: self }
    }

    fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.tx.send_replace(Session::default());
    }
}

impl CredentialStore for SessionCell {
    fn access_token(&self) -> Option<String> {
        self.tx.borrow().access_token.clone()
    }

    fn store_access_token(&self, token: String) {
        self.update(|s| {
            s.access_token = Some(token);
            s.is_authenticated = true;
        });
    }

    fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.update(|s| {
            s.access_token = None;
            s.is_authenticated = false;
            s.user = None;
        });
    }

    fn generation(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn store_if_current(&self, token: String, generation: u64) -> bool {
        self.tx.send_if_modified(|s| {
            if self.epoch.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.access_token = Some(token);
            s.is_authenticated = true;
            true
        })
    }
}

/// Clears `loading` when dropped, including when the operation is cancelled
struct LoadingGuard<'a> {
    cell: &'a SessionCell,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.cell.update(|s| s.loading = false);
    }
}

/// Single authoritative session plus the register/login/logout/refresh flows.
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    cell: Arc<SessionCell>,
    auth: AuthService,
    bootstrapped: AtomicBool,
}

impl SessionStore {
    /// Store talking to `base_url` with default client settings
    pub fn connect(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(ApiClient::builder().base_url(base_url))
    }

    /// Store talking to [`AuthConfig::DEFAULT_BASE_URL`]
    pub fn local() -> Result<Self, ClientError> {
        Self::connect(AuthConfig::DEFAULT_BASE_URL)
    }

    /// Build the client from `builder`, wiring its credentials to this store's session
    pub fn new(builder: ApiClientBuilder) -> Result<Self, ClientError> {
        let cell = Arc::new(SessionCell::new());
        let client = builder.credentials(cell.clone()).build()?;

        Ok(Self {
            inner: Arc::new(StoreInner {
                cell,
                auth: AuthService::new(client),
                bootstrapped: AtomicBool::new(false),
            }),
        })
    }

    /// Current session
    pub fn session(&self) -> Session {
        self.inner.cell.snapshot()
    }

    /// Watch session transitions
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.cell.tx.subscribe()
    }

    /// Whether an access token is held
    pub fn is_authenticated(&self) -> bool {
        self.inner.cell.tx.borrow().is_authenticated
    }

    /// HTTP client carrying this session's credentials
    pub fn api(&self) -> &ApiClient {
        self.inner.auth.client()
    }

    /// Create an account. The session stays anonymous.
    pub async fn register(&self, data: &RegisterRequest) -> Result<(), ClientError> {
        let _loading = self.inner.cell.begin_loading();

        self.inner.auth.register(data).await.map_err(|err| {
            self.record_error(&err);
            err
        })?;
        info!("account registered");
        Ok(())
    }

    /// Log in and start loading the profile in the background.
    ///
    /// A failed profile fetch leaves the session authenticated with no user.
    /// A logout issued while the login is in flight wins.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<(), ClientError> {
        let cell = &self.inner.cell;
        let _loading = cell.begin_loading();
        let epoch = cell.generation();

        let tokens = self.inner.auth.login(credentials).await.map_err(|err| {
            self.record_error(&err);
            err
        })?;

        if !cell.store_if_current(tokens.access_token, epoch) {
            debug!("session ended during login, discarding token");
            return Err(ClientError::SessionEnded);
        }
        info!("logged in");
        self.spawn_profile_fetch(epoch);
        Ok(())
    }

    /// End the session. Always leaves it anonymous, even when the backend call fails.
    pub async fn logout(&self) {
        if let Err(err) = self.inner.auth.logout().await {
            warn!(error = %err, "backend logout failed, clearing local session anyway");
        }
        self.inner.cell.reset();
        info!("logged out");
    }

    /// Restore the session from the refresh cookie.
    ///
    /// Joins a refresh already in flight. On failure the session is logged out
    /// before the error is returned.
    pub async fn refresh_token(&self) -> Result<(), ClientError> {
        let _loading = self.inner.cell.begin_loading();
        let epoch = self.inner.cell.generation();

        // The client has already written the new token into this session.
        match self.inner.auth.refresh_access_token().await {
            Ok(_) => {
                self.spawn_profile_fetch(epoch);
                Ok(())
            }
            Err(err) if err.is_session_ended() => {
                debug!("session ended during refresh");
                Err(err)
            }
            Err(err) => {
                debug!(error = %err, "refresh failed, forcing logout");
                self.logout().await;
                Err(err)
            }
        }
    }

    /// Fetch the profile and store it if the session that asked for it is still live
    pub async fn load_profile(&self) -> Result<Profile, ClientError> {
        self.load_profile_for(self.inner.cell.generation()).await
    }

    async fn load_profile_for(&self, epoch: u64) -> Result<Profile, ClientError> {
        let cell = &self.inner.cell;
        if cell.generation() != epoch {
            return Err(ClientError::SessionEnded);
        }

        let profile = Profile::from(self.inner.auth.get_profile().await?);

        let stored = cell.tx.send_if_modified(|s| {
            if s.is_authenticated && cell.epoch.load(Ordering::SeqCst) == epoch {
                s.user = Some(profile.clone());
                true
            } else {
                false
            }
        });
        if !stored {
            debug!("discarding profile for a session that has ended");
        }
        Ok(profile)
    }

    pub(crate) fn claim_bootstrap(&self) -> bool {
        !self.inner.bootstrapped.swap(true, Ordering::SeqCst)
    }

    fn spawn_profile_fetch(&self, epoch: u64) {
        let store = self.clone();
        tokio::spawn(async move {
            match store.load_profile_for(epoch).await {
                Ok(_) => {}
                Err(err) if err.is_session_ended() => debug!("skipping profile for an ended session"),
                Err(err) => warn!(error = %err, "profile fetch failed"),
            }
        });
    }

    fn record_error(&self, err: &ClientError) {
        let message = err.display_message();
        self.inner.cell.update(|s| s.error = Some(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_anonymous() {
        let session = Session::default();
        assert!(session.access_token.is_none());
        assert!(!session.is_authenticated);
        assert!(session.user.is_none());
        assert!(!session.loading);
        assert!(session.error.is_none());
    }

    #[test]
    fn credential_writes_keep_authenticated_in_step_with_token() {
        let cell = SessionCell::new();

        cell.store_access_token("tok123".into());
        let session = cell.snapshot();
        assert_eq!(session.access_token.as_deref(), Some("tok123"));
        assert!(session.is_authenticated);

        cell.clear();
        let session = cell.snapshot();
        assert!(session.access_token.is_none());
        assert!(!session.is_authenticated);
    }

    #[test]
    fn clearing_credentials_drops_the_user_and_advances_epoch() {
        let cell = SessionCell::new();
        cell.store_access_token("tok123".into());
        cell.update(|s| {
            s.user = Some(Profile {
                id: 1,
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "a@b.com".into(),
            });
        });

        cell.clear();
        assert!(cell.snapshot().user.is_none());
        assert_eq!(cell.epoch.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn loading_guard_releases_on_drop() {
        let cell = SessionCell::new();
        cell.update(|s| s.error = Some("old".into()));
        {
            let _guard = cell.begin_loading();
            let session = cell.snapshot();
            assert!(session.loading);
            assert!(session.error.is_none());
        }
        assert!(!cell.snapshot().loading);
    }

    #[test]
    fn bootstrap_can_be_claimed_once() {
        let store = SessionStore::local().unwrap();
        assert!(store.claim_bootstrap());
        assert!(!store.claim_bootstrap());
        assert!(!store.is_authenticated());
    }
}
