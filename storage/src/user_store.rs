use crate::post_store::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postmap_core::model::{User, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Persistence for accounts. Emails are unique, compared case-insensitively.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn insert(&self, email: String, password_hash: String) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn remove(&self, id: UserId) -> Result<(), StoreError>;

    /// Stores a generated introduction and when it was generated.
    async fn set_introduction(
        &self,
        id: UserId,
        introduction: String,
        generated_at: DateTime<Utc>,
    ) -> Result<User, StoreError>;
}

pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
    next_id: AtomicU64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, email: String, password_hash: String) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|user| same_email(&user.email, &email)) {
            return Err(StoreError::Conflict(format!("email {email} is taken")));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let user = User {
            id,
            email,
            password_hash,
            ai_introduction: None,
            last_introduction_generated: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| same_email(&user.email, email))
            .cloned())
    }

    async fn remove(&self, id: UserId) -> Result<(), StoreError> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::UserNotFound(id))
    }

    async fn set_introduction(
        &self,
        id: UserId,
        introduction: String,
        generated_at: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::UserNotFound(id))?;
        user.ai_introduction = Some(introduction);
        user.last_introduction_generated = Some(generated_at);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}
