//! Users Domain
//!
//! CRUD over a directory of users, each an id plus a display name.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, status mapping
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Controller  │  ← Adds operation context to errors
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access (trait + Postgres / in-memory)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← User, NewUser, UpdateUser
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_users::{handlers, InMemoryUserRepository, UserController};
//!
//! let controller = UserController::new(InMemoryUserRepository::new());
//! let router = handlers::router(controller);
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use error::{UserError, UserErrorKind, UserResult};
pub use handlers::ApiDoc;
pub use models::{MessageResponse, NewUser, UpdateUser, User};
pub use postgres::PgUserRepository;
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::{UserController, UserService};
