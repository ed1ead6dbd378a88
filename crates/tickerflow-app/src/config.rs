//! Application configuration.
//!
//! Configuration comes from the environment, with optional CLI overrides:
//! - `KAFKA_ADDRESS` (required): output broker as `host:port`
//! - `API_PORT` (default 4242): control-plane listen port
//! - `ENVIRONMENT` (`DEV` default, `PROD`): log format selection

use crate::error::{AppError, AppResult};

pub const DEFAULT_API_PORT: u16 = 4242;

/// Deployment environment, selecting the log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Kafka broker address (`host:port`).
    pub kafka_address: String,
    /// Control-plane listen port.
    pub api_port: u16,
    /// Deployment environment.
    pub environment: Environment,
}

impl AppConfig {
    /// Read configuration from the environment, applying overrides.
    pub fn from_env(
        kafka_override: Option<String>,
        port_override: Option<u16>,
    ) -> AppResult<Self> {
        let kafka_address = match kafka_override.or_else(|| read_env("KAFKA_ADDRESS")) {
            Some(addr) => addr,
            None => {
                return Err(AppError::Config(
                    "KAFKA_ADDRESS must be set, e.g. KAFKA_ADDRESS=127.0.0.1:9092".to_string(),
                ))
            }
        };
        validate_broker_address(&kafka_address)?;

        let api_port = match port_override {
            Some(port) => port,
            None => match read_env("API_PORT") {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| AppError::Config(format!("Invalid API_PORT: {raw}")))?,
                None => DEFAULT_API_PORT,
            },
        };

        let environment = match read_env("ENVIRONMENT").as_deref() {
            Some("PROD") => Environment::Prod,
            _ => Environment::Dev,
        };

        Ok(Self {
            kafka_address,
            api_port,
            environment,
        })
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn validate_broker_address(addr: &str) -> AppResult<()> {
    let valid = match addr.split_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "KAFKA_ADDRESS must be host:port, got {addr:?}"
        )))
    }
}
