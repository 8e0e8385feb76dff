use core_config::{AppInfo, FromEnv, app_info, logging::LogConfig, server::ServerConfig};
use database::postgres::PostgresConfig;

pub use core_config::Environment;

/// Application configuration, composed from the shared config components.
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    pub server: ServerConfig,
    pub logging: LogConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // DATABASE_URL is required
        let server = ServerConfig::from_env()?;
        let logging = LogConfig::from_env()?;

        Ok(Self {
            app: app_info!(),
            database,
            server,
            logging,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_defaults() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgresql://localhost/users")),
                ("APP_ENV", Some("test")),
                ("PORT", None),
                ("SHUTDOWN_GRACE_SECS", None),
                ("LOG_PATH", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.app.name, "users_api");
                assert_eq!(config.environment, Environment::Test);
                assert_eq!(config.server.mode, Environment::Test);
                assert_eq!(config.server.port, 8080);
                assert_eq!(config.server.shutdown_grace().as_secs(), 5);
                assert!(config.logging.path.is_none());
            },
        );
    }

    #[test]
    fn test_config_requires_database_url() {
        temp_env::with_var_unset("DATABASE_URL", || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("DATABASE_URL"));
        });
    }
}
