use crate::logging::LogConfig;
use crate::Environment;
use std::io;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter, Layer, Registry};

/// Install color-eyre with a project-standard configuration.
///
/// Call this early in the main() before any fallible operations to ensure
/// colored error output. Safe to call multiple times.
///
/// Configuration:
/// - Shows file:line where errors occur
/// - Hides environment variables (less noise)
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Default filter when neither `RUST_LOG` nor `LOG_LEVEL` is set.
fn default_directive(environment: &Environment) -> &'static str {
    match environment {
        Environment::Production => "info,sqlx=warn",
        Environment::Development => "debug,hyper=info,sqlx=info",
        Environment::Test => "warn",
    }
}

/// Initialize tracing with environment-aware configuration and error span capture.
///
/// - **Production**: flattened JSON events, no module targets
/// - **Development**: pretty-printed output
/// - **Test**: compact single-line output
///
/// Filter precedence: `RUST_LOG`, then `LOG_LEVEL`, then the environment
/// default. With `LOG_PATH` set, events go to that file (rotated on startup)
/// instead of stdout.
///
/// Safe to call more than once: later calls are no-ops (common in tests).
pub fn init_tracing(environment: &Environment, log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            log.level_directive()
                .unwrap_or_else(|| default_directive(environment)),
        )
    });

    let (writer, ansi, open_error) = match log.open() {
        Ok(Some(file)) => (BoxMakeWriter::new(Mutex::new(file)), false, None),
        Ok(None) => (BoxMakeWriter::new(io::stdout), true, None),
        Err(e) => (BoxMakeWriter::new(io::stdout), true, Some(e)),
    };

    let output: Box<dyn Layer<Registry> + Send + Sync> = match environment {
        Environment::Production => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .flatten_event(true)
            .with_writer(writer)
            .boxed(),
        Environment::Development => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(ansi)
            .with_writer(writer)
            .pretty()
            .boxed(),
        Environment::Test => tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    };

    let result = tracing_subscriber::registry()
        .with(output)
        .with(tracing_error::ErrorLayer::default()) // Capture span traces on errors
        .with(filter)
        .try_init();

    match result {
        Ok(_) => {
            info!(%environment, log_path = ?log.path, "Tracing initialized");
            if let Some(e) = open_error {
                warn!(log_path = ?log.path, "Could not open log file, logging to stdout: {}", e);
            }
        }
        Err(_) => {
            debug!("Tracing already initialized, skipping re-initialization");
        }
    }
}
