//! Poller
//!
//! Runs the two periodic jobs of the dashboard against the current address:
//! the data poll and the health check. Each job is a task owned by its own
//! [`CancellationToken`]; changing the address or an interval cancels the
//! affected task (including its in-flight requests) and starts a fresh one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::client::SensorSource;
use crate::state::{Channel, StateHandle};

/// Timer settings for the poller
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub address: String,
    pub refresh_interval: Duration,
    pub health_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            address: "http://localhost:3000".to_string(),
            refresh_interval: Duration::from_millis(1000),
            health_interval: Duration::from_millis(1000),
        }
    }
}

/// Errors from changing poller settings
#[derive(Debug, Error, PartialEq)]
pub enum PollError {
    #[error("Interval must be greater than zero")]
    ZeroInterval,
}

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollTask {
    async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Owns the data and health polling tasks
pub struct Poller {
    source: Arc<dyn SensorSource>,
    state: StateHandle,
    settings: PollSettings,
    shutdown: CancellationToken,
    data_task: Option<PollTask>,
    health_task: Option<PollTask>,
}

impl Poller {
    /// Create a poller. Tasks are tied to `shutdown` and stop with it.
    pub fn new(
        source: Arc<dyn SensorSource>,
        state: StateHandle,
        settings: PollSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            state,
            settings,
            shutdown,
            data_task: None,
            health_task: None,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// Start both polling tasks against the configured address
    pub async fn start(&mut self) -> Result<(), PollError> {
        validate(self.settings.refresh_interval)?;
        validate(self.settings.health_interval)?;

        self.settings.address = normalize_address(&self.settings.address);
        self.state.set_address(self.settings.address.clone()).await;
        self.restart_data().await;
        self.restart_health().await;

        tracing::info!(
            address = %self.settings.address,
            refresh_ms = self.settings.refresh_interval.as_millis() as u64,
            health_ms = self.settings.health_interval.as_millis() as u64,
            "Polling started"
        );
        Ok(())
    }

    /// Point both tasks at a new server
    pub async fn set_address(&mut self, address: &str) {
        let address = normalize_address(address);
        tracing::info!(%address, "Server address changed");

        // Stop first so nothing from the old address is issued in the new epoch
        self.stop_tasks().await;
        self.settings.address = address.clone();
        self.state.set_address(address).await;
        self.restart_data().await;
        self.restart_health().await;
    }

    /// Change the data poll period
    pub async fn set_refresh_interval(&mut self, interval: Duration) -> Result<(), PollError> {
        validate(interval)?;
        tracing::info!(refresh_ms = interval.as_millis() as u64, "Refresh interval changed");
        self.settings.refresh_interval = interval;
        self.restart_data().await;
        Ok(())
    }

    /// Change the health check period
    pub async fn set_health_interval(&mut self, interval: Duration) -> Result<(), PollError> {
        validate(interval)?;
        tracing::info!(health_ms = interval.as_millis() as u64, "Health interval changed");
        self.settings.health_interval = interval;
        self.restart_health().await;
        Ok(())
    }

    /// Cancel both tasks and wait for them to finish
    pub async fn stop(&mut self) {
        self.stop_tasks().await;
        tracing::info!("Polling stopped");
    }

    async fn stop_tasks(&mut self) {
        if let Some(task) = self.data_task.take() {
            task.stop().await;
        }
        if let Some(task) = self.health_task.take() {
            task.stop().await;
        }
    }

    async fn restart_data(&mut self) {
        if let Some(task) = self.data_task.take() {
            task.stop().await;
        }

        let source = Arc::clone(&self.source);
        let state = self.state.clone();
        let address = self.settings.address.clone();
        let epoch = self.state.epoch().await;

        self.data_task = Some(self.spawn("data", self.settings.refresh_interval, move || {
            let source = Arc::clone(&source);
            let state = state.clone();
            let address = address.clone();
            async move {
                let ticket = state.issue_in(Channel::Data, epoch).await;
                let result = source.fetch_data(&address).await;
                match &result {
                    Ok(fetch) => {
                        if !fetch.is_success() {
                            tracing::warn!(%address, status = fetch.status, "Error fetching data");
                        }
                        match &fetch.measurements {
                            Ok(points) => {
                                tracing::debug!(%address, points = points.len(), "Fetched data");
                            }
                            Err(e) => {
                                tracing::error!(%address, "Invalid data payload: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(%address, "Data poll failed: {}", e);
                    }
                }
                state.apply_data(ticket, result).await;
            }
        }));
    }

    async fn restart_health(&mut self) {
        if let Some(task) = self.health_task.take() {
            task.stop().await;
        }

        let source = Arc::clone(&self.source);
        let state = self.state.clone();
        let address = self.settings.address.clone();
        let epoch = self.state.epoch().await;

        self.health_task = Some(self.spawn("health", self.settings.health_interval, move || {
            let source = Arc::clone(&source);
            let state = state.clone();
            let address = address.clone();
            async move {
                let ticket = state.issue_in(Channel::Health, epoch).await;
                let health = source.check_health(&address).await;
                tracing::trace!(%address, ?health, "Health checked");
                state.apply_health(ticket, health).await;
            }
        }));
    }

    fn spawn<F, Fut>(&self, name: &'static str, period: Duration, job: F) -> PollTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.shutdown.child_token();
        let handle = tokio::spawn(poll_loop(name, period, cancel.clone(), job));
        PollTask { cancel, handle }
    }
}

/// Fire `job` every `period`, starting immediately, until cancelled.
///
/// Each run is spawned so a slow request may overlap the next tick; runs
/// still in flight when the token is cancelled are dropped.
async fn poll_loop<F, Fut>(name: &'static str, period: Duration, cancel: CancellationToken, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Polling loop for '{}' cancelled", name);
                break;
            }
            _ = ticker.tick() => {}
        }

        let run = job();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = run => {}
            }
        });
    }
}

fn validate(interval: Duration) -> Result<(), PollError> {
    if interval.is_zero() {
        Err(PollError::ZeroInterval)
    } else {
        Ok(())
    }
}

/// Trim whitespace and a trailing slash from a user-entered address
pub fn normalize_address(address: &str) -> String {
    address.trim().trim_end_matches('/').to_string()
}
