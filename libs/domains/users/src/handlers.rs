use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use axum_helpers::{
    AppError, ValidatedJson,
    errors::responses::{
        BadRequestValidationResponse, InternalServerErrorResponse, NotFoundResponse,
        ServiceUnavailableResponse,
    },
};
use database::QueryContext;
use std::sync::Arc;
use std::time::Duration;
use utoipa::OpenApi;

use crate::error::{UserError, UserErrorKind, UserResult};
use crate::models::{MessageResponse, NewUser, UpdateUser, User};
use crate::service::UserService;

pub const TAG: &str = "users";

/// Per-request timeout used by [`router`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAPI documentation for Users API
#[derive(OpenApi)]
#[openapi(
    paths(list_users, create_user, get_user, update_user, delete_user),
    components(
        schemas(User, NewUser, UpdateUser, MessageResponse),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            InternalServerErrorResponse,
            ServiceUnavailableResponse
        )
    ),
    tags(
        (name = TAG, description = "User directory endpoints")
    )
)]
pub struct ApiDoc;

struct UsersState<S> {
    service: S,
    base: QueryContext,
    request_timeout: Duration,
}

impl<S> UsersState<S> {
    /// Child of the server's in-flight context, bounded by the request timeout.
    fn request_context(&self) -> QueryContext {
        self.base.child().with_timeout(self.request_timeout)
    }
}

/// Create the users router with all HTTP endpoints
pub fn router<S: UserService + 'static>(service: S) -> Router {
    router_with_context(service, QueryContext::new(), DEFAULT_REQUEST_TIMEOUT)
}

/// Like [`router`], but every request context derives from `base`.
///
/// Cancelling `base` aborts the storage calls of all in-flight requests.
pub fn router_with_context<S: UserService + 'static>(
    service: S,
    base: QueryContext,
    request_timeout: Duration,
) -> Router {
    let state = Arc::new(UsersState {
        service,
        base,
        request_timeout,
    });

    Router::new()
        .route("/", get(list_users::<S>).post(create_user::<S>))
        .route(
            "/{id}",
            get(get_user::<S>)
                .put(update_user::<S>)
                .delete(delete_user::<S>),
        )
        .with_state(state)
}

/// Reads and deletes report a malformed id as a missing user.
fn invalid_id_as_not_found(err: UserError) -> AppError {
    if err.kind() == UserErrorKind::Validation {
        AppError::NotFound(err.to_string())
    } else {
        err.into()
    }
}

/// List all users
#[utoipa::path(
    get,
    path = "",
    tag = TAG,
    responses(
        (status = 200, description = "List of users", body = Vec<User>),
        (status = 500, response = InternalServerErrorResponse),
        (status = 503, response = ServiceUnavailableResponse)
    )
)]
async fn list_users<S: UserService>(
    State(state): State<Arc<UsersState<S>>>,
) -> UserResult<Json<Vec<User>>> {
    let users = state.service.get(&state.request_context()).await?;
    Ok(Json(users))
}

/// Create a new user
///
/// Any `id` in the body is ignored; the server assigns one.
#[utoipa::path(
    post,
    path = "",
    tag = TAG,
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_user<S: UserService>(
    State(state): State<Arc<UsersState<S>>>,
    ValidatedJson(input): ValidatedJson<NewUser>,
) -> UserResult<impl IntoResponse> {
    let user = state
        .service
        .create(&state.request_context(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = String, Path, description = "User ID (UUID)")
    ),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_user<S: UserService>(
    State(state): State<Arc<UsersState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = state
        .service
        .get_one_by_id(&state.request_context(), &id)
        .await
        .map_err(invalid_id_as_not_found)?;
    Ok(Json(user))
}

/// Rename a user
#[utoipa::path(
    put,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = String, Path, description = "User ID (UUID)")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = MessageResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_user<S: UserService>(
    State(state): State<Arc<UsersState<S>>>,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> UserResult<Json<MessageResponse>> {
    state
        .service
        .update(&state.request_context(), &id, input)
        .await?;
    Ok(Json(MessageResponse::new(format!("user {} updated", id))))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = String, Path, description = "User ID (UUID)")
    ),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_user<S: UserService>(
    State(state): State<Arc<UsersState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .service
        .delete(&state.request_context(), &id)
        .await
        .map_err(invalid_id_as_not_found)?;
    Ok(Json(MessageResponse::new(format!("user {} deleted", id))))
}
