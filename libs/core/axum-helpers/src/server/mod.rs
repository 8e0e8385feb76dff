//! Server infrastructure module.
//!
//! - [`create_router`]: docs, `/api` nesting, fallback and shared middleware
//! - [`health_router`] and [`run_health_checks`]: liveness and readiness
//! - [`HttpServer`]: start/stop lifecycle with a bounded graceful shutdown
//!
//! # Example
//!
//! ```ignore
//! use axum_helpers::server::{HttpServer, Server, create_router, health_router, shutdown_signal};
//! use core_config::{server::ServerConfig, app_info};
//!
//! let router = create_router::<ApiDoc>(api_routes).merge(health_router(app_info!()));
//!
//! let mut server = HttpServer::new(router, ServerConfig::default());
//! server.run(&CancellationToken::new()).await?;
//! shutdown_signal().await;
//! server.stop().await?;
//! ```

pub mod app;
pub mod health;
pub mod lifecycle;
pub mod shutdown;

pub use app::create_router;
pub use health::{HealthCheckFuture, HealthResponse, health_router, run_health_checks};
pub use lifecycle::{HttpServer, LifecycleError, LifecycleState, Server};
pub use shutdown::shutdown_signal;
