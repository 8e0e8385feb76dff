use async_trait::async_trait;
use database::QueryContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{NewUser, UpdateUser, User};

/// Repository trait for User persistence.
///
/// Ids arrive as raw strings from the transport and are parsed here, so a
/// malformed id is reported as `InvalidId` without touching storage. Every
/// call runs under `ctx`: a cancelled or expired context ends it with
/// `UserError::Cancelled`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All users; empty when there are none.
    async fn get(&self, ctx: &QueryContext) -> UserResult<Vec<User>>;

    async fn get_one_by_id(&self, ctx: &QueryContext, id: &str) -> UserResult<User>;

    /// Mints a fresh id; the store never reuses one.
    async fn create(&self, ctx: &QueryContext, input: NewUser) -> UserResult<User>;

    /// Removing an id that does not exist is `NotFound`.
    async fn delete(&self, ctx: &QueryContext, id: &str) -> UserResult<()>;

    /// Renaming an id that does not exist is `NotFound`.
    async fn update(&self, ctx: &QueryContext, id: &str, input: UpdateUser) -> UserResult<()>;
}

/// Parses a transport id into a UUID.
pub fn parse_user_id(id: &str) -> UserResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| UserError::InvalidId(id.to_string()))
}

/// In-memory implementation of UserRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, ctx: &QueryContext) -> UserResult<Vec<User>> {
        ctx.run(async {
            let users = self.users.read().await;
            let mut all: Vec<User> = users.values().cloned().collect();
            // v7 ids sort by creation time
            all.sort_by_key(|u| u.id);
            Ok(all)
        })
        .await
    }

    async fn get_one_by_id(&self, ctx: &QueryContext, id: &str) -> UserResult<User> {
        let id = parse_user_id(id)?;
        ctx.run(async {
            let users = self.users.read().await;
            users.get(&id).cloned().ok_or(UserError::NotFound(id))
        })
        .await
    }

    async fn create(&self, ctx: &QueryContext, input: NewUser) -> UserResult<User> {
        ctx.run(async {
            let user = User {
                id: Uuid::now_v7(),
                name: input.name,
            };
            self.users.write().await.insert(user.id, user.clone());
            Ok(user)
        })
        .await
    }

    async fn delete(&self, ctx: &QueryContext, id: &str) -> UserResult<()> {
        let id = parse_user_id(id)?;
        ctx.run(async {
            self.users
                .write()
                .await
                .remove(&id)
                .map(|_| ())
                .ok_or(UserError::NotFound(id))
        })
        .await
    }

    async fn update(&self, ctx: &QueryContext, id: &str, input: UpdateUser) -> UserResult<()> {
        let id = parse_user_id(id)?;
        ctx.run(async {
            match self.users.write().await.get_mut(&id) {
                Some(user) => {
                    user.name = input.name;
                    Ok(())
                }
                None => Err(UserError::NotFound(id)),
            }
        })
        .await
    }
}
