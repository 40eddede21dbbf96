//! The signed-in user, shared by everything that needs to know who is
//! using the client.
//!
//! A [`Session`] is constructed explicitly and passed around (usually in
//! an `Arc`). It starts out *initializing*; views must not treat a missing
//! user as "logged out" until [`Session::initialize`] has finished, which
//! is what [`Session::should_redirect_to_login`] encodes.

use crate::auth_service::AuthService;
use crate::error::{AuthError, ClientError};
use crate::models::{LoginCredentials, Post, ProfileUpdate, RegisterData, User};
use crate::storage::SessionStore;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub current_user: Option<User>,
    pub is_initializing: bool,
}

impl SessionState {
    fn initializing() -> Self {
        Self {
            current_user: None,
            is_initializing: true,
        }
    }
}

pub struct Session {
    auth: AuthService,
    store: Arc<dyn SessionStore>,
    state: watch::Sender<SessionState>,
    /// Bumped by every login, register and logout. Held while the store
    /// and the published state change together.
    generation: Mutex<u64>,
}

impl Session {
    pub fn new(auth: AuthService, store: Arc<dyn SessionStore>) -> Self {
        let (state, _) = watch::channel(SessionState::initializing());
        Self {
            auth,
            store,
            state,
            generation: Mutex::new(0),
        }
    }

    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Restores the session from the persisted token.
    ///
    /// Never fails: "not logged in" is the normal outcome when there is no
    /// usable token. A token the server rejects is erased; a token that
    /// could not be checked (network down) is kept for the next start.
    pub async fn initialize(&self) -> Option<User> {
        let started = *self.generation();
        let result = self.auth.current_user().await;

        let generation = self.generation();
        if *generation != started {
            // A login or logout finished while `/User/me` was in flight.
            tracing::debug!("Session changed during initialization, discarding result");
            drop(generation);
            self.state.send_modify(|state| state.is_initializing = false);
            return self.current_user();
        }

        let user = match result {
            Ok(user) => {
                if let Err(e) = self.store.set_user(&user) {
                    tracing::warn!("Failed to cache restored user: {}", e);
                }
                tracing::info!(user_id = %user.id, "Session restored");
                Some(user)
            }
            Err(ClientError::Auth(AuthError::NotAuthenticated)) => {
                // A cached user without a token is left over from an
                // interrupted write.
                if let Err(e) = self.store.clear_user() {
                    tracing::warn!("Failed to drop orphaned user record: {}", e);
                }
                None
            }
            Err(err) => {
                if err.auth_error().is_some_and(AuthError::invalidates_session) {
                    tracing::info!("Persisted token rejected, clearing session");
                    self.clear_store();
                } else {
                    tracing::debug!("No session restored: {}", err);
                }
                None
            }
        };

        self.state.send_replace(SessionState {
            current_user: user.clone(),
            is_initializing: false,
        });
        drop(generation);
        user
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<User, ClientError> {
        let (user, token) = self.auth.login(credentials).await?;
        self.establish(user, &token)
    }

    pub async fn register(&self, data: &RegisterData) -> Result<User, ClientError> {
        let (user, token) = self.auth.register(data).await?;
        self.establish(user, &token)
    }

    fn establish(&self, user: User, token: &str) -> Result<User, ClientError> {
        let mut generation = self.generation();
        *generation += 1;

        self.store.set_token(token)?;
        if let Err(e) = self.store.set_user(&user) {
            self.clear_store();
            return Err(e);
        }

        tracing::info!(user_id = %user.id, "Signed in as {}", user.username);
        self.publish_user(Some(user.clone()));
        Ok(user)
    }

    pub fn logout(&self) {
        let mut generation = self.generation();
        *generation += 1;

        self.clear_store();
        self.publish_user(None);
        tracing::info!("Signed out");
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        let user = self.auth.update_profile(update).await?;
        self.store.set_user(&user)?;
        self.publish_user(Some(user.clone()));
        Ok(user)
    }

    fn publish_user(&self, user: Option<User>) {
        self.state.send_modify(|state| {
            state.current_user = user;
            state.is_initializing = false;
        });
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear persisted session: {}", e);
        }
    }

    // ==================== Наблюдение ====================

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().current_user.clone()
    }

    pub fn is_initializing(&self) -> bool {
        self.state.borrow().is_initializing
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().current_user.is_some()
    }

    /// True only once initialization finished without a user.
    pub fn should_redirect_to_login(&self) -> bool {
        let state = self.state.borrow();
        !state.is_initializing && state.current_user.is_none()
    }

    /// The signed-in user, or `AuthError::NotAuthenticated`.
    pub fn require_user(&self) -> Result<User, ClientError> {
        self.current_user()
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    /// Whether the signed-in user wrote `post`. For gating edit/delete
    /// controls only; the server makes the real decision.
    pub fn owns(&self, post: &Post) -> bool {
        self.state
            .borrow()
            .current_user
            .as_ref()
            .is_some_and(|user| post.is_authored_by(user))
    }

    /// Change notifications for views.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn wait_until_ready(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let ready = match rx.wait_for(|state| !state.is_initializing).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        ready
    }
}
