use axum::Router;
use database::QueryContext;
use domain_users::{PgUserRepository, UserController, handlers};
use std::time::Duration;

use crate::state::AppState;

pub mod health;

/// Creates the API routes without the `/api` prefix.
/// The `/api` prefix will be added by the `create_router` helper.
///
/// Every request context derives from `inflight`, bounded by `request_timeout`.
pub fn routes(state: &AppState, inflight: QueryContext, request_timeout: Duration) -> Router {
    let users = UserController::new(PgUserRepository::new(state.db.clone()));

    Router::new().nest(
        "/v1/users",
        handlers::router_with_context(users, inflight, request_timeout),
    )
}

/// Creates a router with the /ready endpoint that performs actual health checks.
///
/// This router has state applied and can be merged with the stateless app router
/// from `create_router`.
pub fn ready_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
