use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, AvatarUpload, BearerAuth, SignInResponse, UpdateUserRequest};
use crate::models::UserProfile;
use crate::storage::{SessionStorage, StorageError};
use crate::validation::{fields, profile_rules, FormValues};

use super::SessionError;

/// Remote calls the session manager depends on.
///
/// `ApiClient` is the production implementation.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Default bearer header shared with the HTTP client
    fn bearer(&self) -> &BearerAuth;

    async fn create_session(&self, email: &str, password: &str) -> Result<SignInResponse, ApiError>;

    async fn update_user(&self, update: &UpdateUserRequest) -> Result<(), ApiError>;

    /// Returns the stored avatar file name
    async fn upload_avatar(&self, upload: &AvatarUpload) -> Result<String, ApiError>;
}

/// Opaque bearer credential issued on sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Session lifecycle as seen by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Startup load in progress; show a neutral loading view
    Restoring,
    Unauthenticated,
    Authenticated {
        profile: UserProfile,
        token: SessionToken,
    },
}

impl SessionState {
    pub fn is_restoring(&self) -> bool {
        matches!(self, SessionState::Restoring)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated { profile, .. } => Some(profile),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&SessionToken> {
        match self {
            SessionState::Authenticated { token, .. } => Some(token),
            _ => None,
        }
    }
}

/// Input from the profile form.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: String,
    pub old_password: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl ProfileUpdate {
    fn form_values(&self) -> FormValues {
        FormValues::new()
            .with(fields::NAME, self.name.as_str())
            .with(fields::OLD_PASSWORD, self.old_password.clone().unwrap_or_default())
            .with(fields::PASSWORD, self.password.clone().unwrap_or_default())
            .with(
                fields::PASSWORD_CONFIRM,
                self.password_confirm.clone().unwrap_or_default(),
            )
    }

    fn into_request(self) -> UpdateUserRequest {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        UpdateUserRequest {
            name: self.name.trim().to_string(),
            password: non_blank(self.password),
            old_password: non_blank(self.old_password),
        }
    }
}

/// Single authority for the session state.
///
/// The state lives in a `watch` channel; front ends call `subscribe` and
/// re-render on change. Transitions are not queued, so callers must not
/// run two of them at once.
pub struct SessionManager {
    api: Arc<dyn SessionApi>,
    storage: SessionStorage,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn SessionApi>, storage: SessionStorage) -> Self {
        let (state, _) = watch::channel(SessionState::Restoring);
        Self {
            api,
            storage,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.state.borrow().profile().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    fn is_restoring(&self) -> bool {
        self.state.borrow().is_restoring()
    }

    // ===== Restore =====

    /// Rebuild the session from storage. Runs once at startup; later calls
    /// return the current state untouched.
    ///
    /// Never fails: unreadable or half-written records are cleared and
    /// treated as signed out.
    pub async fn restore(&self) -> SessionState {
        if !self.is_restoring() {
            warn!("Session already restored, ignoring restore request");
            return self.state();
        }

        match self.load_persisted() {
            Some((profile, token)) => {
                self.api.bearer().set(token.as_str());
                info!(user_id = %profile.id, "Session restored");
                self.state
                    .send_replace(SessionState::Authenticated { profile, token });
            }
            None => {
                self.api.bearer().clear();
                self.state.send_replace(SessionState::Unauthenticated);
            }
        }

        self.state()
    }

    fn load_persisted(&self) -> Option<(UserProfile, SessionToken)> {
        match (self.storage.get_user(), self.storage.get_token()) {
            (Ok(Some(profile)), Ok(Some(token))) => Some((profile, SessionToken::new(token))),
            (Ok(None), Ok(None)) => {
                debug!("No stored session");
                None
            }
            (Ok(user), Ok(token)) => {
                warn!(
                    has_user = user.is_some(),
                    has_token = token.is_some(),
                    "Found orphaned session record, clearing"
                );
                self.clear_persisted();
                None
            }
            (user, token) => {
                for err in [user.err(), token.err()].into_iter().flatten() {
                    warn!(error = %err, "Stored session unreadable, treating as signed out");
                }
                self.clear_persisted();
                None
            }
        }
    }

    // ===== Sign in / out =====

    /// Create a session with the API and persist it.
    ///
    /// On any error the state is left as it was.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, SessionError> {
        if self.is_restoring() {
            return Err(SessionError::RestoreInProgress);
        }
        if self.is_authenticated() {
            return Err(SessionError::AlreadyAuthenticated);
        }

        let response = self
            .api
            .create_session(email.trim(), password)
            .await
            .map_err(|e| {
                warn!(error = %e, "Sign in failed");
                SessionError::from(e)
            })?;

        let (profile, token) = match (response.user, response.token) {
            (Some(profile), Some(token)) if !token.trim().is_empty() => (profile, token),
            (user, token) => {
                error!(
                    has_user = user.is_some(),
                    has_token = token.is_some(),
                    "Sign in response incomplete"
                );
                return Err(SessionError::InvalidResponse(
                    "Sign in response is missing the user or token".to_string(),
                ));
            }
        };

        if let Err(e) = self.persist(&profile, &token) {
            error!(error = %e, "Failed to save session");
            self.clear_persisted();
            return Err(e.into());
        }

        self.api.bearer().set(&token);
        info!(user_id = %profile.id, "Signed in");
        self.state.send_replace(SessionState::Authenticated {
            profile: profile.clone(),
            token: SessionToken::new(token),
        });
        Ok(profile)
    }

    fn persist(&self, profile: &UserProfile, token: &str) -> Result<(), StorageError> {
        self.storage.save_user(profile)?;
        self.storage.save_token(token)
    }

    /// Leave the session. Always ends `Unauthenticated`; storage failures
    /// are logged only.
    pub async fn sign_out(&self) {
        let was_authenticated = self.is_authenticated();
        self.state.send_replace(SessionState::Unauthenticated);
        self.api.bearer().clear();
        self.clear_persisted();
        if was_authenticated {
            info!("Signed out");
        }
    }

    /// Remove both records, attempting each even if the other fails.
    fn clear_persisted(&self) {
        if let Err(e) = self.storage.remove_user() {
            error!(error = %e, "Failed to remove stored user");
        }
        if let Err(e) = self.storage.remove_token() {
            error!(error = %e, "Failed to remove stored token");
        }
    }

    // ===== Profile =====

    /// Replace the profile in memory, then persist it.
    ///
    /// The in-memory change is kept even if the write fails; the error tells
    /// the caller it may not survive a restart.
    pub async fn update_profile(&self, profile: UserProfile) -> Result<(), SessionError> {
        let mut applied = false;
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated { profile: current, .. } => {
                *current = profile.clone();
                applied = true;
                true
            }
            _ => false,
        });

        if !applied {
            return Err(SessionError::NotAuthenticated);
        }

        self.storage.save_user(&profile).map_err(|e| {
            warn!(error = %e, "Profile updated in memory but not saved");
            SessionError::from(e)
        })
    }

    /// Validate the profile form, send it to the API and apply the new name.
    pub async fn save_profile(&self, update: ProfileUpdate) -> Result<UserProfile, SessionError> {
        let current = self.profile().ok_or(SessionError::NotAuthenticated)?;
        profile_rules().validate(&update.form_values())?;

        let request = update.into_request();
        self.api.update_user(&request).await.map_err(|e| {
            warn!(error = %e, "Profile update rejected");
            SessionError::from(e)
        })?;

        let updated = current.with_name(request.name);
        self.update_profile(updated.clone()).await?;
        info!(user_id = %updated.id, "Profile updated");
        Ok(updated)
    }

    /// Upload a new profile photo and record its reference.
    pub async fn change_avatar(&self, path: &Path) -> Result<UserProfile, SessionError> {
        let current = self.profile().ok_or(SessionError::NotAuthenticated)?;
        let upload = AvatarUpload::from_path(path, &current.name)?;

        let avatar = self.api.upload_avatar(&upload).await.map_err(|e| {
            warn!(error = %e, "Avatar upload failed");
            SessionError::from(e)
        })?;

        let updated = current.with_avatar(avatar);
        self.update_profile(updated.clone()).await?;
        Ok(updated)
    }
}
