/// Database error type shared by the connector and health checks.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Health check failed
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),
}
