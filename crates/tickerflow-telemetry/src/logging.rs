//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging.
///
/// `ENVIRONMENT=PROD` selects JSON output at info level; anything else
/// (including unset, the DEV default) selects verbose pretty output.
/// `RUST_LOG` overrides the default filter either way.
pub fn init_logging() -> TelemetryResult<()> {
    let is_production = std::env::var("ENVIRONMENT")
        .map(|v| v == "PROD")
        .unwrap_or(false);

    let default_filter = if is_production {
        "info"
    } else {
        "info,tickerflow=debug"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if is_production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?;
    }

    Ok(())
}
