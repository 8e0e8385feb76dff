//! Start/stop lifecycle for the HTTP server.
//!
//! `run` binds and returns as soon as the listener is accepting, `stop`
//! drains in-flight requests for at most the configured grace period. The
//! two are decoupled: the caller decides what triggers `stop` (usually
//! [`shutdown_signal`](super::shutdown_signal)).
//!
//! Every request runs under a guard that races the handler against the
//! in-flight token. A forced shutdown therefore drops handlers still running
//! on connection tasks, not only the accept loop.

use async_trait::async_trait;
use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use core_config::{Environment, server::ServerConfig};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, warn};

use crate::errors::AppError;

/// How long `stop` waits for aborted handlers to be dropped.
const ABORT_DRAIN: Duration = Duration::from_secs(1);

/// Where a server is in its lifecycle. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("startup cancelled before the listener was bound")]
    Cancelled,

    #[error("graceful shutdown did not finish within {grace:?}; in-flight requests were aborted")]
    ForcedShutdown { grace: Duration },

    #[error("server is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: LifecycleState,
        actual: LifecycleState,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    #[error("server task failed: {0}")]
    Task(String),
}

/// A long-running network component with an explicit start and stop.
#[async_trait]
pub trait Server: Send {
    /// Starts serving and returns the bound address once accepting.
    async fn run(&mut self, token: &CancellationToken) -> Result<SocketAddr, LifecycleError>;

    /// Stops accepting, drains in-flight work within the grace period.
    async fn stop(&mut self) -> Result<(), LifecycleError>;

    fn state(&self) -> LifecycleState;
}

/// Axum server driven through [`Server`].
///
/// The in-flight token is what request handlers hang their storage calls
/// on; it is cancelled only when the grace period runs out.
///
/// # Example
/// ```ignore
/// let inflight = CancellationToken::new();
/// let mut server = HttpServer::new(router, config).with_inflight_token(inflight.clone());
///
/// let addr = server.run(&root).await?;
/// shutdown_signal().await;
/// server.stop().await?;
/// ```
pub struct HttpServer {
    router: Option<Router>,
    config: ServerConfig,
    inflight: CancellationToken,
    graceful: CancellationToken,
    requests: TaskTracker,
    state: Arc<watch::Sender<LifecycleState>>,
    task: Option<JoinHandle<io::Result<()>>>,
    local_addr: Option<SocketAddr>,
}

impl HttpServer {
    pub fn new(router: Router, config: ServerConfig) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            router: Some(router),
            config,
            inflight: CancellationToken::new(),
            graceful: CancellationToken::new(),
            requests: TaskTracker::new(),
            state: Arc::new(state),
            task: None,
            local_addr: None,
        }
    }

    /// Uses `token` as the in-flight token instead of a private one.
    pub fn with_inflight_token(mut self, token: CancellationToken) -> Self {
        self.inflight = token;
        self
    }

    pub fn inflight_token(&self) -> CancellationToken {
        self.inflight.clone()
    }

    /// Receives every state transition.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(?previous, ?next, "Server state changed");
    }

    fn expect_state(&self, expected: LifecycleState) -> Result<(), LifecycleError> {
        let actual = *self.state.borrow();
        if actual == expected {
            Ok(())
        } else {
            Err(LifecycleError::InvalidState { expected, actual })
        }
    }
}

#[async_trait]
impl Server for HttpServer {
    async fn run(&mut self, token: &CancellationToken) -> Result<SocketAddr, LifecycleError> {
        self.expect_state(LifecycleState::Idle)?;
        let Some(router) = self.router.take() else {
            return Err(LifecycleError::InvalidState {
                expected: LifecycleState::Idle,
                actual: LifecycleState::Stopped,
            });
        };
        self.transition(LifecycleState::Starting);

        let address = self.config.address();
        let bound = tokio::select! {
            biased;
            () = token.cancelled() => Err(LifecycleError::Cancelled),
            bound = TcpListener::bind(&address) => bound.map_err(|source| LifecycleError::Bind {
                address: address.clone(),
                source,
            }),
        };

        let listener = match bound.and_then(|listener| {
            let local = listener.local_addr().map_err(LifecycleError::Serve)?;
            Ok((listener, local))
        }) {
            Ok(bound) => bound,
            Err(e) => {
                error!("Server failed to start: {}", e);
                self.transition(LifecycleState::Stopped);
                return Err(e);
            }
        };
        let (listener, local) = listener;

        let guard = RequestGuard {
            inflight: self.inflight.clone(),
            requests: self.requests.clone(),
        };
        let app = with_request_tracing(
            router.layer(middleware::from_fn_with_state(guard, guard_request)),
            self.config.mode,
        );
        let graceful = self.graceful.clone();
        let serve = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(graceful.cancelled_owned());
        self.task = Some(tokio::spawn(publish_exit(
            async move { serve.await },
            self.state.clone(),
        )));

        self.local_addr = Some(local);
        self.transition(LifecycleState::Running);
        info!(mode = %self.config.mode, "Server listening on {}", local);

        Ok(local)
    }

    async fn stop(&mut self) -> Result<(), LifecycleError> {
        self.expect_state(LifecycleState::Running)?;
        let Some(mut task) = self.task.take() else {
            return Err(LifecycleError::Task("serve task missing".to_string()));
        };

        let grace = self.config.shutdown_grace();
        self.transition(LifecycleState::Stopping);
        info!("Stopping server (grace period: {:?})", grace);

        // Drops the listener right away; open connections finish their
        // current request and close.
        self.graceful.cancel();

        let outcome = match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(Ok(()))) => {
                info!("Server stopped gracefully");
                Ok(())
            }
            Ok(Ok(Err(e))) => {
                error!("Server exited with error: {}", e);
                Err(LifecycleError::Serve(e))
            }
            Ok(Err(join)) => {
                error!("Server task failed: {}", join);
                Err(LifecycleError::Task(join.to_string()))
            }
            Err(_) => {
                warn!(
                    "Graceful shutdown exceeded {:?}, cancelling in-flight requests",
                    grace
                );
                self.inflight.cancel();
                task.abort();

                // Guards drop their handlers on the next poll after the cancel.
                self.requests.close();
                if tokio::time::timeout(ABORT_DRAIN, self.requests.wait())
                    .await
                    .is_err()
                {
                    error!(
                        remaining = self.requests.len(),
                        "Aborted requests were not dropped in time"
                    );
                }
                Err(LifecycleError::ForcedShutdown { grace })
            }
        };

        self.transition(LifecycleState::Stopped);
        outcome
    }

    fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }
}

#[derive(Clone)]
struct RequestGuard {
    inflight: CancellationToken,
    requests: TaskTracker,
}

/// Runs the rest of the stack unless the in-flight token fires first.
async fn guard_request(
    State(guard): State<RequestGuard>,
    request: Request,
    next: Next,
) -> Response {
    let _tracked = guard.requests.token();
    tokio::select! {
        biased;
        () = guard.inflight.cancelled() => {
            AppError::ServiceUnavailable("server is shutting down".to_string()).into_response()
        }
        response = next.run(request) => response,
    }
}

/// Awaits the serve future and publishes `Stopped` if it ends on its own.
///
/// An exit during `stop` leaves the state to `stop`.
async fn publish_exit<F>(serve: F, state: Arc<watch::Sender<LifecycleState>>) -> io::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    let result = serve.await;
    let unexpected = state.send_if_modified(|current| {
        if *current == LifecycleState::Running {
            *current = LifecycleState::Stopped;
            true
        } else {
            false
        }
    });
    if unexpected {
        match &result {
            Ok(()) => warn!("Server exited before stop was requested"),
            Err(e) => error!("Server exited with error before stop was requested: {}", e),
        }
    }
    result
}

/// Per-request spans: debug in development, info in production, none in test.
fn with_request_tracing(router: Router, mode: Environment) -> Router {
    let level = match mode {
        Environment::Development => Level::DEBUG,
        Environment::Production => Level::INFO,
        Environment::Test => return router,
    };

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(level))
            .on_response(DefaultOnResponse::new().level(level)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig::new("127.0.0.1".to_string(), 0).with_mode(Environment::Test)
    }

    #[tokio::test]
    async fn test_new_server_is_idle() {
        let server = HttpServer::new(Router::new(), test_config());
        assert_eq!(server.state(), LifecycleState::Idle);
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_stop_before_run_is_invalid() {
        let mut server = HttpServer::new(Router::new(), test_config());

        match server.stop().await {
            Err(LifecycleError::InvalidState { expected, actual }) => {
                assert_eq!(expected, LifecycleState::Running);
                assert_eq!(actual, LifecycleState::Idle);
            }
            other => panic!("expected InvalidState, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_startup() {
        let mut server = HttpServer::new(Router::new(), test_config());
        let token = CancellationToken::new();
        token.cancel();

        let result = server.run(&token).await;
        assert!(matches!(result, Err(LifecycleError::Cancelled)));
        assert_eq!(server.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_run_then_stop_walks_states() {
        let mut server = HttpServer::new(Router::new(), test_config());
        let mut states = server.subscribe();

        let addr = server.run(&CancellationToken::new()).await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.state(), LifecycleState::Running);
        assert_eq!(*states.borrow_and_update(), LifecycleState::Running);

        server.stop().await.unwrap();
        assert_eq!(server.state(), LifecycleState::Stopped);
        assert!(!server.inflight_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_early_serve_exit_publishes_stopped() {
        let (state, mut states) = watch::channel(LifecycleState::Running);

        let result = publish_exit(
            async { Err(io::Error::other("accept failed")) },
            Arc::new(state),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(*states.borrow_and_update(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_exit_during_stop_leaves_state_alone() {
        let (state, states) = watch::channel(LifecycleState::Stopping);

        publish_exit(async { Ok(()) }, Arc::new(state))
            .await
            .unwrap();

        assert_eq!(*states.borrow(), LifecycleState::Stopping);
    }

    #[tokio::test]
    async fn test_run_twice_is_invalid() {
        let mut server = HttpServer::new(Router::new(), test_config());
        server.run(&CancellationToken::new()).await.unwrap();

        let second = server.run(&CancellationToken::new()).await;
        assert!(matches!(
            second,
            Err(LifecycleError::InvalidState {
                actual: LifecycleState::Running,
                ..
            })
        ));

        server.stop().await.unwrap();
    }
}
