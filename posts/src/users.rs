use postmap_core::auth::{AuthError, AuthProvider};
use postmap_core::error::{ErrorCode, PostmapError};
use postmap_core::model::{User, UserId};
use postmap_core::password::{hash_password, verify_password};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{StoreError, UserStore};
use thiserror::Error;
use tracing::{info, warn};

pub const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Invalid user: {0}")]
    Validation(String),
    #[error("A user with email {0} already exists")]
    EmailTaken(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User {0} not found")]
    NotFound(UserId),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
    #[error("Password task failed: {0}")]
    Task(String),
}

impl PostmapError for UserError {
    fn error_code(&self) -> ErrorCode {
        match self {
            UserError::Validation(_) => ErrorCode::InvalidArgument,
            UserError::EmailTaken(_) => ErrorCode::AlreadyExists,
            UserError::InvalidCredentials => ErrorCode::Unauthenticated,
            UserError::NotFound(_) => ErrorCode::NotFound,
            UserError::Store(err) => err.error_code(),
            UserError::Auth(err) => err.error_code(),
            UserError::Task(_) => ErrorCode::Internal,
        }
    }
}

/// Email and password, as sent to signup and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    fn validate(&self) -> Result<(), UserError> {
        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(UserError::Validation(format!("invalid email: {email}")));
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(UserError::Validation(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
}

/// Account signup, password login and account lookup.
pub struct UserService {
    store: Arc<dyn UserStore>,
    auth: Arc<dyn AuthProvider>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    pub async fn signup(&self, credentials: Credentials) -> Result<User, UserError> {
        credentials.validate()?;
        let email = credentials.email.trim().to_string();

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(UserError::EmailTaken(email));
        }

        let password_hash = hash_off_runtime(credentials.password).await?;
        let user = match self.store.insert(email.clone(), password_hash).await {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => return Err(UserError::EmailTaken(email)),
            Err(err) => return Err(err.into()),
        };
        info!(user_id = user.id, "Registered user");
        Ok(user)
    }

    pub async fn login(&self, credentials: Credentials) -> Result<AccessToken, UserError> {
        let user = self
            .store
            .find_by_email(credentials.email.trim())
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        if !verify_off_runtime(credentials.password, user.password_hash.clone()).await? {
            warn!(user_id = user.id, "Rejected login with wrong password");
            return Err(UserError::InvalidCredentials);
        }

        let access_token = self.auth.issue_token(user.id)?;
        info!(user_id = user.id, "User logged in");
        Ok(AccessToken { access_token })
    }

    /// Resolves a bearer header to the signed-in user.
    pub async fn authenticate(&self, bearer: &str) -> Result<User, UserError> {
        let user_id = self.auth.verify(bearer)?;
        self.find_by_id(user_id).await
    }

    pub async fn find_by_id(&self, id: UserId) -> Result<User, UserError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    pub async fn delete(&self, id: UserId) -> Result<(), UserError> {
        match self.store.remove(id).await {
            Ok(()) => {
                info!(user_id = id, "Deleted user");
                Ok(())
            }
            Err(StoreError::UserNotFound(_)) => Err(UserError::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }
}

// Argon2 is CPU-bound, so it runs on the blocking pool.
async fn hash_off_runtime(password: String) -> Result<String, UserError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| UserError::Task(err.to_string()))?
        .map_err(UserError::from)
}

async fn verify_off_runtime(password: String, stored_hash: String) -> Result<bool, UserError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|err| UserError::Task(err.to_string()))?
        .map_err(UserError::from)
}
