use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use database::ContextError;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Coarse classification the HTTP layer maps to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserErrorKind {
    Validation,
    NotFound,
    Storage,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid user id '{0}'")]
    InvalidId(String),

    #[error("user {0} not found")]
    NotFound(Uuid),

    #[error("storage error: {0}")]
    Storage(#[from] DbErr),

    #[error("{0}")]
    Cancelled(#[from] ContextError),

    #[error("{context}: {source}")]
    Operation {
        context: String,
        #[source]
        source: Box<UserError>,
    },
}

pub type UserResult<T> = Result<T, UserError>;

impl UserError {
    /// Wraps the error with a description of the failed operation.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        UserError::Operation {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Kind of the innermost error; wrapping never changes it.
    pub fn kind(&self) -> UserErrorKind {
        match self.root() {
            UserError::InvalidId(_) => UserErrorKind::Validation,
            UserError::NotFound(_) => UserErrorKind::NotFound,
            UserError::Cancelled(_) => UserErrorKind::Cancelled,
            UserError::Storage(_) | UserError::Operation { .. } => UserErrorKind::Storage,
        }
    }

    pub fn root(&self) -> &UserError {
        let mut current = self;
        while let UserError::Operation { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    fn into_root(self) -> UserError {
        match self {
            UserError::Operation { source, .. } => source.into_root(),
            other => other,
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        let message = err.to_string();
        match err.into_root() {
            UserError::InvalidId(_) => AppError::InvalidId(message),
            UserError::NotFound(_) => AppError::NotFound(message),
            UserError::Cancelled(_) => AppError::Cancelled(message),
            UserError::Storage(e) => {
                tracing::error!("{}", message);
                AppError::Database(e)
            }
            UserError::Operation { .. } => AppError::InternalServerError(message),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_kind_survives_wrapping() {
        let id = Uuid::now_v7();
        let err = UserError::NotFound(id)
            .wrap("inner")
            .wrap(format!("error retrieving user with id {}", id));

        assert_eq!(err.kind(), UserErrorKind::NotFound);
        assert!(matches!(err.root(), UserError::NotFound(found) if *found == id));
        assert_eq!(
            err.to_string(),
            format!("error retrieving user with id {id}: inner: user {id} not found")
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            UserError::InvalidId("x".into()).kind(),
            UserErrorKind::Validation
        );
        assert_eq!(
            UserError::Storage(DbErr::Custom("boom".into())).kind(),
            UserErrorKind::Storage
        );
        assert_eq!(
            UserError::from(ContextError::DeadlineExceeded).kind(),
            UserErrorKind::Cancelled
        );
    }

    #[test]
    fn test_app_error_status_mapping() {
        let cases = [
            (UserError::InvalidId("x".into()), StatusCode::BAD_REQUEST),
            (UserError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (
                UserError::Storage(DbErr::Custom("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                UserError::Cancelled(ContextError::Cancelled),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            let app: AppError = err.wrap("error creating user").into();
            assert_eq!(app.status(), expected);
        }
    }
}
