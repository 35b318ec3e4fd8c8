//! Accounts, sessions and the signup/login flows.

use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use async_trait::async_trait;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::UserProfile;
use crate::store::{self, DocumentStore};

pub const MIN_PASSWORD_LEN: usize = 6;

/// A stored account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl From<&Account> for Session {
    fn from(account: &Account) -> Self {
        Self {
            uid: account.uid.clone(),
            email: account.email.clone(),
            display_name: account.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// The provider has not reported yet.
    #[default]
    Loading,
    SignedOut,
    SignedIn(Session),
}

/// Which root view the presentation layer shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Splash,
    Auth,
    Main,
}

impl AuthState {
    #[must_use]
    pub fn gate(&self) -> View {
        match self {
            Self::Loading => View::Splash,
            Self::SignedOut => View::Auth,
            Self::SignedIn(_) => View::Main,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) => Some(session),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub display_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            &self.display_name,
            &self.email,
            &self.password,
            &self.confirm_password,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(Error::validation("Please fill in all fields"));
        }
        if self.password != self.confirm_password {
            return Err(Error::validation("Passwords do not match"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Session-based identity backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    async fn send_password_reset(&self, email: &str) -> Result<()>;

    /// Applies to the signed-in account.
    async fn update_display_name(&self, display_name: &str) -> Result<Session>;

    fn current(&self) -> AuthState;

    fn subscribe(&self) -> watch::Receiver<AuthState>;
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Accounts in the local SQLite database. The signed-in uid is kept in the
/// settings table so a session survives restarts.
pub struct LocalIdentityProvider {
    db: Arc<Database>,
    state: watch::Sender<AuthState>,
}

impl LocalIdentityProvider {
    pub fn new(db: Arc<Database>) -> anyhow::Result<Self> {
        let initial = match db.session_uid()? {
            Some(uid) => match db.get_account(&uid)? {
                Some(account) => AuthState::SignedIn(Session::from(&account)),
                None => {
                    db.set_session_uid(None)?;
                    AuthState::SignedOut
                }
            },
            None => AuthState::SignedOut,
        };
        Ok(Self {
            db,
            state: watch::channel(initial).0,
        })
    }

    fn start_session(&self, account: &Account) -> Result<Session> {
        self.db.set_session_uid(Some(&account.uid))?;
        let session = Session::from(account);
        self.state.send_replace(AuthState::SignedIn(session.clone()));
        Ok(session)
    }

    fn signed_in_uid(&self) -> Result<String> {
        self.current()
            .session()
            .map(|s| s.uid.clone())
            .ok_or_else(|| Error::auth("Not signed in"))
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(Error::auth("Invalid email address"));
        }
        let hash = hash_password(password)?;
        let account = self
            .db
            .insert_account(email, &hash)?
            .ok_or_else(|| Error::auth("Email is already in use"))?;
        info!(uid = %account.uid, "Account created");
        self.start_session(&account)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let account = self.db.find_account_by_email(email.trim())?;
        match account {
            Some(account) if verify_password(password, &account.password_hash)? => {
                self.start_session(&account)
            }
            _ => Err(Error::auth("Invalid email or password")),
        }
    }

    async fn sign_out(&self) -> Result<()> {
        self.db.set_session_uid(None)?;
        self.state.send_replace(AuthState::SignedOut);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        let account = self
            .db
            .find_account_by_email(email.trim())?
            .ok_or_else(|| Error::auth("No account found for that email"))?;
        self.db.create_password_reset(&account.uid)?;
        info!(uid = %account.uid, "Password reset requested");
        Ok(())
    }

    async fn update_display_name(&self, display_name: &str) -> Result<Session> {
        let uid = self.signed_in_uid()?;
        self.db.update_account_profile(&uid, Some(display_name), None)?;
        let account = self
            .db
            .get_account(&uid)?
            .ok_or_else(|| Error::auth("Account no longer exists"))?;
        let session = Session::from(&account);
        self.state.send_replace(AuthState::SignedIn(session.clone()));
        Ok(session)
    }

    fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

/// Signup, login and session flows over an identity provider and the
/// profile collection.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
}

impl AuthService {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { provider, store }
    }

    /// Create the account, name it, and write the profile document.
    pub async fn signup(&self, form: &SignupForm) -> Result<UserProfile> {
        form.validate()?;
        let session = self.provider.sign_up(&form.email, &form.password).await?;
        let display_name = form.display_name.trim();
        self.provider.update_display_name(display_name).await?;

        let profile = UserProfile::new_account(&session.uid, &session.email, display_name);
        self.store
            .set(store::USERS, &session.uid, serde_json::to_value(&profile)?)
            .await?;
        Ok(profile)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(Error::validation("Please fill in all fields"));
        }
        self.provider.sign_in(email, password).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.provider.sign_out().await
    }

    pub async fn reset_password(&self, email: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(Error::validation("Please enter your email"));
        }
        self.provider.send_password_reset(email).await
    }

    /// Renames the account and mirrors the name onto the profile document.
    pub async fn update_display_name(&self, display_name: &str) -> Result<Session> {
        if display_name.trim().is_empty() {
            return Err(Error::validation("Display name must not be empty"));
        }
        let session = self.provider.update_display_name(display_name.trim()).await?;
        self.store
            .update(
                store::USERS,
                &session.uid,
                serde_json::json!({ "displayName": display_name.trim() }),
            )
            .await?;
        Ok(session)
    }

    #[must_use]
    pub fn session(&self) -> AuthState {
        self.provider.current()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.provider.subscribe()
    }

    /// The signed-in uid, or an auth error.
    pub fn require_uid(&self) -> Result<String> {
        self.session()
            .session()
            .map(|s| s.uid.clone())
            .ok_or_else(|| Error::auth("Not signed in. Run `stride login` first"))
    }
}
