//! CO2 Dashboard
//!
//! Polls a CO2 sensor server and redraws a live chart in the terminal.
//! Commands typed on stdin change the server address, window and interval.

use clap::Parser;
use co2_dashboard::config::generate_default_config;
use co2_dashboard::console::{self, Command, Input, Screen, View, HELP};
use co2_dashboard::server::shutdown_signal;
use co2_dashboard::*;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "co2-dashboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live CO2 chart and health indicator for a sensor server")]
#[command(after_help = "Logs are written to stderr; redirect them (2>dashboard.log) to keep the chart clean.")]
struct Cli {
    /// Config file (default: ~/.config/co2-dashboard/config.toml or ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sensor server base URL
    #[arg(short, long)]
    address: Option<String>,

    /// Number of most recent readings to draw
    #[arg(short = 'n', long)]
    last_n: Option<usize>,

    /// Data poll interval in milliseconds
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Health check interval in milliseconds
    #[arg(long)]
    health_interval_ms: Option<u64>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(address) = cli.address {
        config.dashboard.address = address;
    }
    if let Some(n) = cli.last_n {
        config.dashboard.last_n = n;
    }
    if let Some(ms) = cli.interval_ms {
        config.dashboard.refresh_interval_ms = ms;
    }
    if let Some(ms) = cli.health_interval_ms {
        config.dashboard.health_interval_ms = ms;
    }

    logging::init_tracing(&config.logging);
    tracing::info!("CO2 Dashboard v{}", env!("CARGO_PKG_VERSION"));

    let client = Arc::new(SensorClient::new(config.dashboard.request_timeout())?);
    let state = StateHandle::new(config.dashboard.address.clone());
    let shutdown = CancellationToken::new();

    let mut poller = Poller::new(
        client,
        state.clone(),
        config.dashboard.poll_settings(),
        shutdown.clone(),
    );
    poller.start().await?;

    let mut view = View {
        window: DisplayWindow::new(config.dashboard.last_n),
        refresh_interval: poller.settings().refresh_interval,
        size: ChartSize {
            width: config.dashboard.chart_width,
            height: config.dashboard.chart_height,
        },
        status: Some("Type 'help' for commands".to_string()),
    };

    let mut changes = state.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let signal = shutdown_signal();
    tokio::pin!(signal);

    let mut screen = Screen::default();
    draw(&mut screen, &state, &view).await;

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => {
                match console::read_input(line) {
                    Input::Command(Command::Quit) => break,
                    Input::Command(command) => {
                        if command == Command::Refresh {
                            screen.invalidate();
                        }
                        let status = apply_command(command, &mut poller, &mut view).await;
                        view.status = Some(status);
                    }
                    Input::Status(status) => view.status = Some(status),
                    Input::Blank => {}
                    Input::Closed => {
                        tracing::debug!("stdin closed");
                        stdin_open = false;
                    }
                }
            }
            _ = &mut signal => break,
        }

        draw(&mut screen, &state, &view).await;
    }

    shutdown.cancel();
    poller.stop().await;
    println!();
    tracing::info!("CO2 Dashboard shutdown complete");
    Ok(())
}

/// Apply a console command, returning the status line to show
async fn apply_command(command: Command, poller: &mut Poller, view: &mut View) -> String {
    match command {
        Command::Address(address) => {
            poller.set_address(&address).await;
            format!("Polling {}", poller.settings().address)
        }
        Command::LastN(n) => {
            view.window = DisplayWindow::new(n);
            format!("Showing the latest {} readings", n)
        }
        Command::Interval(interval) => match poller.set_refresh_interval(interval).await {
            Ok(()) => {
                view.refresh_interval = interval;
                format!("Refreshing every {} ms", interval.as_millis())
            }
            Err(e) => e.to_string(),
        },
        Command::Refresh => "Redrawn".to_string(),
        Command::Help => HELP.to_string(),
        Command::Quit => String::new(),
    }
}

async fn draw(screen: &mut Screen, state: &StateHandle, view: &View) {
    let snapshot = state.snapshot().await;
    let Some(frame) = screen.frame(&snapshot, view) else {
        return;
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(frame.as_bytes()).and_then(|()| stdout.flush()) {
        tracing::warn!("Failed to draw dashboard: {}", e);
    }
}
