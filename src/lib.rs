//! # CO2 Dashboard
//!
//! Live terminal dashboard for a CO2 sensor server.
//!
//! The dashboard polls `GET {address}/data` for readings and
//! `GET {address}/health` for liveness, each on its own timer, and redraws a
//! line chart of the latest readings plus a health line whenever either
//! changes.
//!
//! ## Modules
//!
//! - [`measurement`]: Readings, payload parsing and the display window
//! - [`client`]: HTTP client for the sensor server endpoints
//! - [`state`]: Shared dashboard state with stale-response protection
//! - [`poller`]: Cancellable periodic data and health polling
//! - [`chart`]: Text line chart rendering
//! - [`console`]: Command parsing and screen layout
//! - [`server`]: A small sensor server serving CSV or synthetic readings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use co2_dashboard::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(SensorClient::new(Duration::from_secs(5))?);
//!     let state = StateHandle::new("http://localhost:3000");
//!
//!     let mut poller = Poller::new(client, state.clone(), PollSettings::default(), CancellationToken::new());
//!     poller.start().await?;
//!
//!     tokio::time::sleep(Duration::from_secs(3)).await;
//!     let snapshot = state.snapshot().await;
//!     let window = DisplayWindow::new(10).apply(&snapshot.measurements);
//!     println!("{}", snapshot.health);
//!     println!("{}", render_chart(&window, ChartSize::default()));
//!
//!     poller.stop().await;
//!     Ok(())
//! }
//! ```

pub mod chart;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod measurement;
pub mod poller;
pub mod server;
pub mod state;

// Re-export top-level types for convenience
pub use chart::{render_chart, ChartSize};
pub use client::{DataFetch, HealthStatus, SensorClient, SensorSource};
pub use config::{Config, ConfigError, DashboardConfig, LoggingConfig, ServerConfig};
pub use console::{parse_command, render_screen, Command, CommandError, View};
pub use error::{PayloadError, SensorError, SensorResult};
pub use measurement::{parse_timestamp, Co2Payload, DisplayWindow, Measurement};
pub use poller::{PollError, PollSettings, Poller};
pub use server::{build_router, serve, ReadingSource, ServerError, ServerState};
pub use state::{Alert, Channel, DashboardState, StateHandle, Ticket};
