//! Shared application state.

use database::postgres::DatabaseConnection;

/// State for app-level handlers such as `/ready`.
///
/// Domain routers get their own dependencies at construction; this only
/// carries what the app itself probes.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub db: DatabaseConnection,
}
