//! CO2 Sensor Server
//!
//! Serves `/data` and `/health` for the dashboard, replaying a CSV file of
//! readings or generating synthetic ones.

use clap::Parser;
use co2_dashboard::config::Config;
use co2_dashboard::logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "co2-sensor-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve CO2 readings over HTTP for the dashboard")]
struct ServerCli {
    /// Config file (default: ~/.config/co2-dashboard/config.toml or ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve synthetic readings instead of the CSV file
    #[arg(short, long)]
    mock: bool,

    /// CSV file with `timestamp,ppm` rows
    #[arg(long)]
    csv: Option<String>,

    /// Bind host
    #[arg(long)]
    host: Option<String>,

    /// Bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = ServerCli::parse();

    let mut config = Config::resolve(cli.config.as_deref())?;
    if cli.mock {
        config.server.mock = true;
    }
    if let Some(csv) = cli.csv {
        config.server.csv_path = csv;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    logging::init_tracing(&config.logging);
    tracing::info!("CO2 Sensor Server v{}", env!("CARGO_PKG_VERSION"));
    if config.server.mock {
        tracing::info!("Running in mock mode");
    } else {
        tracing::info!("Serving readings from {}", config.server.csv_path);
    }

    co2_dashboard::serve(config.server).await?;
    Ok(())
}
