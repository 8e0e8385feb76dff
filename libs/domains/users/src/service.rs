use async_trait::async_trait;
use database::QueryContext;
use std::sync::Arc;
use tracing::instrument;

use crate::error::UserResult;
use crate::models::{NewUser, UpdateUser, User};
use crate::repository::UserRepository;

/// Operations the HTTP layer depends on.
#[async_trait]
pub trait UserService: Send + Sync {
    async fn get(&self, ctx: &QueryContext) -> UserResult<Vec<User>>;

    async fn get_one_by_id(&self, ctx: &QueryContext, id: &str) -> UserResult<User>;

    async fn create(&self, ctx: &QueryContext, input: NewUser) -> UserResult<User>;

    async fn delete(&self, ctx: &QueryContext, id: &str) -> UserResult<()>;

    async fn update(&self, ctx: &QueryContext, id: &str, input: UpdateUser) -> UserResult<()>;
}

/// Forwards to the repository and labels failures with the operation.
///
/// The wrapped error keeps its kind, so callers can still tell a missing
/// user from a broken database.
#[derive(Clone)]
pub struct UserController<R: UserRepository> {
    repository: Arc<R>,
}

impl<R: UserRepository> UserController<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }
}

#[async_trait]
impl<R: UserRepository> UserService for UserController<R> {
    #[instrument(skip_all)]
    async fn get(&self, ctx: &QueryContext) -> UserResult<Vec<User>> {
        self.repository
            .get(ctx)
            .await
            .map_err(|e| e.wrap("error retrieving users"))
    }

    #[instrument(skip(self, ctx))]
    async fn get_one_by_id(&self, ctx: &QueryContext, id: &str) -> UserResult<User> {
        self.repository
            .get_one_by_id(ctx, id)
            .await
            .map_err(|e| e.wrap(format!("error retrieving user with id {}", id)))
    }

    #[instrument(skip_all)]
    async fn create(&self, ctx: &QueryContext, input: NewUser) -> UserResult<User> {
        self.repository
            .create(ctx, input)
            .await
            .map_err(|e| e.wrap("error creating user"))
    }

    #[instrument(skip(self, ctx))]
    async fn delete(&self, ctx: &QueryContext, id: &str) -> UserResult<()> {
        self.repository
            .delete(ctx, id)
            .await
            .map_err(|e| e.wrap(format!("error deleting user with id {}", id)))
    }

    #[instrument(skip(self, ctx, input))]
    async fn update(&self, ctx: &QueryContext, id: &str, input: UpdateUser) -> UserResult<()> {
        self.repository
            .update(ctx, id, input)
            .await
            .map_err(|e| e.wrap(format!("error updating user with id {}", id)))
    }
}
