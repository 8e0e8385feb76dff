use async_trait::async_trait;
use database::QueryContext;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, Statement};
use uuid::Uuid;

use crate::{
    error::{UserError, UserResult},
    models::{NewUser, UpdateUser, User},
    repository::{UserRepository, parse_user_id},
};

const SELECT_USERS: &str = "SELECT id, name FROM users";
const SELECT_USER_BY_ID: &str = "SELECT id, name FROM users WHERE id = $1";
const INSERT_USER: &str = "INSERT INTO users (id, name) VALUES ($1, $2)";
const DELETE_USER: &str = "DELETE FROM users WHERE id = $1";
const UPDATE_USER: &str = "UPDATE users SET name = $1 WHERE id = $2";

/// PostgreSQL implementation of UserRepository.
///
/// Holds a clone of the shared pool and adds no locking of its own.
#[derive(Clone)]
pub struct PgUserRepository {
    db: DatabaseConnection,
}

impl PgUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Helper struct for deserializing user rows from the database
#[derive(Debug, FromQueryResult)]
struct UserRow {
    id: Uuid,
    name: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get(&self, ctx: &QueryContext) -> UserResult<Vec<User>> {
        let stmt = Statement::from_string(DbBackend::Postgres, SELECT_USERS);

        let rows = ctx
            .run(async {
                UserRow::find_by_statement(stmt)
                    .all(&self.db)
                    .await
                    .map_err(UserError::from)
            })
            .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn get_one_by_id(&self, ctx: &QueryContext, id: &str) -> UserResult<User> {
        let id = parse_user_id(id)?;
        let stmt =
            Statement::from_sql_and_values(DbBackend::Postgres, SELECT_USER_BY_ID, [id.into()]);

        let row = ctx
            .run(async {
                UserRow::find_by_statement(stmt)
                    .one(&self.db)
                    .await
                    .map_err(UserError::from)
            })
            .await?;

        row.map(User::from).ok_or(UserError::NotFound(id))
    }

    async fn create(&self, ctx: &QueryContext, input: NewUser) -> UserResult<User> {
        let user = User {
            id: Uuid::now_v7(),
            name: input.name,
        };
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            INSERT_USER,
            [user.id.into(), user.name.clone().into()],
        );

        ctx.run(async { self.db.execute_raw(stmt).await.map_err(UserError::from) })
            .await?;

        tracing::info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    async fn delete(&self, ctx: &QueryContext, id: &str) -> UserResult<()> {
        let id = parse_user_id(id)?;
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, DELETE_USER, [id.into()]);

        let result = ctx
            .run(async { self.db.execute_raw(stmt).await.map_err(UserError::from) })
            .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(id));
        }

        tracing::info!(user_id = %id, "Deleted user");
        Ok(())
    }

    async fn update(&self, ctx: &QueryContext, id: &str, input: UpdateUser) -> UserResult<()> {
        let id = parse_user_id(id)?;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            UPDATE_USER,
            [input.name.into(), id.into()],
        );

        let result = ctx
            .run(async { self.db.execute_raw(stmt).await.map_err(UserError::from) })
            .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(id));
        }

        Ok(())
    }
}
