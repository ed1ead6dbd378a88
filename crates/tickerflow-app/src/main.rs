//! Ticker aggregation pipeline - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Exchange ticker aggregator: subscribes to exchange feeds, blends them
/// per symbol and publishes the result to Kafka.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Kafka broker address (overrides KAFKA_ADDRESS).
    #[arg(long)]
    kafka_address: Option<String>,

    /// Control-plane port (overrides API_PORT).
    #[arg(long)]
    api_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    tickerflow_ws::init_crypto();

    let args = Args::parse();

    tickerflow_telemetry::init_logging()?;

    info!("Starting tickerflow v{}", env!("CARGO_PKG_VERSION"));

    let config = tickerflow_app::AppConfig::from_env(args.kafka_address, args.api_port)?;
    info!(
        kafka_address = %config.kafka_address,
        api_port = config.api_port,
        environment = ?config.environment,
        "Configuration loaded"
    );

    let app = tickerflow_app::Application::new(config);
    app.run().await?;

    Ok(())
}
