use axum_helpers::server::{
    HttpServer, LifecycleError, LifecycleState, Server, create_router, health_router,
    shutdown_signal,
};
use core_config::tracing::{init_tracing, install_color_eyre};
use database::QueryContext;
use eyre::WrapErr;
use migration::Migrator;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod api;
mod config;
mod openapi;
mod state;

use config::{Config, Environment};
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment, &config.logging);

    if let Some(name) = core_config::env_optional("APP_ENV")
        && let Err(e) = Environment::from_name(&name)
    {
        warn!("{}; running in {} mode", e, config.environment);
    }

    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .wrap_err("PostgreSQL connection failed")?;

    database::postgres::run_migrations::<Migrator>(&db, config.app.name)
        .await
        .wrap_err("Database migrations failed")?;

    let state = AppState { db };

    // Cancelled only when graceful shutdown runs out of time.
    let inflight = CancellationToken::new();

    let api_routes = api::routes(
        &state,
        QueryContext::from_token(inflight.clone()),
        config.server.request_timeout(),
    );

    // create_router adds docs/middleware to our composed routes
    let router = create_router::<openapi::ApiDoc>(api_routes);

    // - /health: liveness check with app name/version
    // - /ready: readiness check that pings the database
    let app = router
        .merge(health_router(config.app))
        .merge(api::ready_router(state.clone()));

    // Cancelled by SIGINT/SIGTERM, including while the listener is still binding.
    let root = CancellationToken::new();
    tokio::spawn({
        let root = root.clone();
        async move {
            shutdown_signal().await;
            root.cancel();
        }
    });

    let mut server = HttpServer::new(app, config.server.clone()).with_inflight_token(inflight);
    let mut states = server.subscribe();
    server.run(&root).await?;

    if stopped_before_shutdown(&root, &mut states).await {
        database::postgres::close(state.db, config.app.name).await;
        return Err(eyre::eyre!("server stopped before shutdown was requested"));
    }

    match server.stop().await {
        Ok(()) => {}
        Err(e @ LifecycleError::ForcedShutdown { .. }) => warn!("{}", e),
        Err(e) => return Err(e.into()),
    }

    database::postgres::close(state.db, config.app.name).await;

    info!("{} shutdown complete", config.app.name);
    Ok(())
}

/// Waits for `root` to be cancelled; `true` if the server stopped first.
async fn stopped_before_shutdown(
    root: &CancellationToken,
    states: &mut watch::Receiver<LifecycleState>,
) -> bool {
    tokio::select! {
        () = root.cancelled() => false,
        _ = states.wait_for(|state| *state == LifecycleState::Stopped) => true,
    }
}
