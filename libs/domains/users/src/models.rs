use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// A directory entry. Only the name is mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Assigned by the store at creation
    pub id: Uuid,
    /// Display name, not unique
    pub name: String,
}

/// Payload for creating a user.
///
/// Has no `id` field: an id sent by the caller is dropped here and the
/// repository mints its own.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewUser {
    #[validate(length(min = 1, message = "name must not be empty"))]
    #[schema(example = "Alice")]
    pub name: String,
}

/// Payload for renaming a user.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1, message = "name must not be empty"))]
    #[schema(example = "Alice Liddell")]
    pub name: String,
}

/// Body returned by update and delete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
