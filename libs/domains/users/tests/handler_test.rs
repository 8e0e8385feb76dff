//! Handler tests for Users domain
//!
//! These tests drive the users router directly:
//! - Request deserialization and validation
//! - HTTP status codes per operation
//! - Error bodies
//!
//! The router is backed by the in-memory repository so status mapping is
//! tested without a database. `test_postgres_backed_router_*` runs the same
//! surface against a real PostgreSQL container.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum_helpers::ErrorResponse;
use domain_users::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use test_utils::{TestDataBuilder, TestDatabase};
use tower::ServiceExt; // For oneshot()
use uuid::Uuid;

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn app() -> Router {
    handlers::router(UserController::new(InMemoryUserRepository::new()))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn create(app: &Router, name: &str) -> User {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/", json!({ "name": name })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response.into_body()).await
}

#[tokio::test]
async fn test_create_user_returns_201_and_ignores_client_id() {
    let app = app();
    let builder = TestDataBuilder::from_test_name("handler_create_201");
    let client_id = builder.unknown_id();

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            json!({ "id": client_id, "name": builder.name("user", "alice") }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let user: User = json_body(response.into_body()).await;
    assert_eq!(user.name, builder.name("user", "alice"));
    assert_ne!(user.id, client_id);
}

#[tokio::test]
async fn test_create_user_rejects_empty_name() {
    let response = app()
        .oneshot(json_request("POST", "/", json!({ "name": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = json_body(response.into_body()).await;
    assert_eq!(error.error, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_user_rejects_malformed_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_users_empty_then_one() {
    let app = app();

    let response = app.clone().oneshot(empty_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let users: Vec<User> = json_body(response.into_body()).await;
    assert!(users.is_empty());

    let created = create(&app, "Alice").await;

    let response = app.oneshot(empty_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let users: Vec<User> = json_body(response.into_body()).await;
    assert_eq!(users, vec![created]);
}

#[tokio::test]
async fn test_get_user_returns_200() {
    let app = app();
    let created = create(&app, "Alice").await;

    let response = app
        .oneshot(empty_request("GET", &format!("/{}", created.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let user: User = json_body(response.into_body()).await;
    assert_eq!(user, created);
}

#[tokio::test]
async fn test_get_user_missing_or_malformed_id_returns_404() {
    let app = app();

    for uri in [format!("/{}", Uuid::now_v7()), "/not-a-uuid".to_string()] {
        let response = app.clone().oneshot(empty_request("GET", &uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {}", uri);

        let error: ErrorResponse = json_body(response.into_body()).await;
        assert_eq!(error.error, "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_update_user_returns_200_and_renames() {
    let app = app();
    let created = create(&app, "Alice").await;
    let uri = format!("/{}", created.id);

    let response = app
        .clone()
        .oneshot(json_request("PUT", &uri, json!({ "name": "Alicia" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let message: MessageResponse = json_body(response.into_body()).await;
    assert_eq!(message.message, format!("user {} updated", created.id));

    let response = app.oneshot(empty_request("GET", &uri)).await.unwrap();
    let user: User = json_body(response.into_body()).await;
    assert_eq!(user.name, "Alicia");
}

#[tokio::test]
async fn test_update_user_status_mapping() {
    let app = app();

    let missing = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/{}", Uuid::now_v7()),
            json!({ "name": "x" }),
        ))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let malformed = app
        .clone()
        .oneshot(json_request("PUT", "/not-a-uuid", json!({ "name": "x" })))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json_body(malformed.into_body()).await;
    assert_eq!(error.error, "INVALID_ID");

    let created = create(&app, "Alice").await;
    let empty_name = app
        .oneshot(json_request(
            "PUT",
            &format!("/{}", created.id),
            json!({ "name": "" }),
        ))
        .await
        .unwrap();
    assert_eq!(empty_name.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_user_then_delete_again() {
    let app = app();
    let created = create(&app, "Alice").await;
    let uri = format!("/{}", created.id);

    let response = app.clone().oneshot(empty_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let message: MessageResponse = json_body(response.into_body()).await;
    assert_eq!(message.message, format!("user {} deleted", created.id));

    let again = app.clone().oneshot(empty_request("DELETE", &uri)).await.unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    let gone = app.oneshot(empty_request("GET", &uri)).await.unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_user_malformed_id_returns_404() {
    let response = app()
        .oneshot(empty_request("DELETE", "/not-a-uuid"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancelled_base_context_returns_503() {
    let base = database::QueryContext::new();
    base.cancel();
    let app = handlers::router_with_context(
        UserController::new(InMemoryUserRepository::new()),
        base,
        handlers::DEFAULT_REQUEST_TIMEOUT,
    );

    let response = app.oneshot(empty_request("GET", "/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let error: ErrorResponse = json_body(response.into_body()).await;
    assert_eq!(error.error, "REQUEST_CANCELLED");
}

// ============================================================================
// PostgreSQL-backed router
// ============================================================================

#[tokio::test]
async fn test_postgres_backed_router_crud() {
    let db = TestDatabase::new().await;
    let app = handlers::router(UserController::new(PgUserRepository::new(db.connection())));
    let builder = TestDataBuilder::from_test_name("handler_pg_crud");

    let created = create(&app, &builder.name("user", "pg")).await;
    let uri = format!("/{}", created.id);

    let response = app.clone().oneshot(empty_request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let user: User = json_body(response.into_body()).await;
    assert_eq!(user, created);

    let response = app
        .clone()
        .oneshot(json_request("PUT", &uri, json!({ "name": "renamed" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(empty_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(empty_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(db.count_rows("users").await, 0);
}
