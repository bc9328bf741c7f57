use chrono::{Duration, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::greeting::{Greeter, RandomGreeter};
use super::SessionError;
use crate::api::{ApiError, AuthApi};
use crate::cache::{expiry_after, ExpiringCache, Storage};
use crate::models::{Credentials, Profile, Role, UserInfo};

/// Cache key under which the session token is persisted.
pub const ACCESS_TOKEN_KEY: &str = "Access-Token";

/// How long a persisted token stays valid after login.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// In-memory state of the current session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Empty when unauthenticated.
    pub token: String,
    pub name: String,
    pub welcome: String,
    pub avatar: String,
    pub roles: Option<Role>,
    pub info: Option<UserInfo>,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    /// Logged in, profile not fetched yet.
    ProfilePending,
    ProfileLoaded,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn is_profile_loaded(&self) -> bool {
        self.roles.is_some() && self.info.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        if !self.is_authenticated() {
            SessionStatus::Unauthenticated
        } else if self.is_profile_loaded() {
            SessionStatus::ProfileLoaded
        } else {
            SessionStatus::ProfilePending
        }
    }
}

/// Owns the session state and drives login, profile loading and logout.
///
/// Every operation takes `&mut self`, so a manager can only have one
/// operation in flight at a time. Operations run to completion once their
/// network call is dispatched; there is no cancellation or retry here.
///
/// Every state commit is pushed to receivers obtained from
/// [`subscribe`](Self::subscribe).
pub struct SessionManager<A, S, G = RandomGreeter> {
    api: A,
    cache: ExpiringCache<S>,
    greeter: G,
    token_ttl: Duration,
    state: SessionState,
    notifier: watch::Sender<SessionState>,
}

impl<A: AuthApi, S: Storage, G: Greeter> SessionManager<A, S, G> {
    pub fn new(api: A, cache: ExpiringCache<S>, greeter: G) -> Self {
        let (notifier, _) = watch::channel(SessionState::default());
        Self {
            api,
            cache,
            greeter,
            token_ttl: Duration::days(TOKEN_TTL_DAYS),
            state: SessionState::default(),
            notifier,
        }
    }

    /// Override how long a persisted token stays valid.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status()
    }

    /// Observe every state commit from now on.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.notifier.subscribe()
    }

    pub fn cache(&self) -> &ExpiringCache<S> {
        &self.cache
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Adopt a token persisted by an earlier login, if it has not expired.
    ///
    /// Returns whether a token was restored.
    pub fn restore(&mut self) -> bool {
        match self.cache.get(ACCESS_TOKEN_KEY) {
            Some(token) if !token.is_empty() => {
                debug!("Restored persisted session token");
                self.commit(|state| state.token = token);
                true
            }
            _ => false,
        }
    }

    /// Log in with `credentials`.
    ///
    /// On success the token is persisted for the configured TTL and becomes
    /// the session token. On failure nothing changes and the API error is
    /// returned as-is.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), SessionError> {
        let result = self.api.login(credentials).await?;

        if result.token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "login response did not include a token".to_string(),
            )
            .into());
        }

        let expires_at = expiry_after(Utc::now(), self.token_ttl);
        self.cache.set(ACCESS_TOKEN_KEY, &result.token, expires_at);
        self.commit(|state| state.token = result.token);

        info!(username = %credentials.username, %expires_at, "Login successful");
        Ok(())
    }

    /// Fetch and normalize the current user's profile.
    ///
    /// The profile must carry a role with at least one permission; otherwise
    /// this fails with [`SessionError::InvalidRole`]. State is only updated
    /// once the whole payload has normalized.
    pub async fn get_info(&mut self) -> Result<Profile, SessionError> {
        let raw = self.api.get_info(&self.state.token).await?;

        let profile = match Profile::from_raw(raw) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "Rejected user profile");
                return Err(e);
            }
        };
        let welcome = self.greeter.welcome();

        let committed = profile.clone();
        self.commit(move |state| {
            state.roles = Some(committed.role);
            state.info = Some(committed.info);
            state.name = committed.name;
            state.welcome = welcome;
            state.avatar = committed.avatar;
        });

        debug!(
            name = %profile.name,
            permissions = profile.role.permission_list.len(),
            "User profile loaded"
        );
        Ok(profile)
    }

    /// End the session.
    ///
    /// The server is told about the logout, but its answer does not matter:
    /// the token and roles are always cleared and the persisted token removed.
    /// Display fields (`name`, `welcome`, `avatar`, `info`) are left as they are.
    pub async fn logout(&mut self) {
        if let Err(e) = self.api.logout(&self.state.token).await {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }

        self.commit(|state| {
            state.token.clear();
            state.roles = None;
        });
        self.cache.remove(ACCESS_TOKEN_KEY);

        info!("Logged out");
    }

    fn commit(&mut self, f: impl FnOnce(&mut SessionState)) {
        f(&mut self.state);
        self.notifier.send_replace(self.state.clone());
    }
}
