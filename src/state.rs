//! Dashboard State
//!
//! Shared state written by the polling tasks and read by the renderer.
//!
//! Every request is issued a [`Ticket`] before it is sent. A response is
//! only applied when its ticket belongs to the current address epoch and is
//! newer than the last ticket applied for the same endpoint, so a slow
//! response can never overwrite fresher data or data for a new address.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::client::{DataFetch, HealthStatus};
use crate::error::{SensorError, SensorResult};
use crate::measurement::Measurement;

/// Which endpoint a ticket was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Data,
    Health,
}

/// Sequence stamp carried by one in-flight request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub channel: Channel,
    pub epoch: u64,
    pub seq: u64,
}

/// User-facing alert raised when `/data` answers with a non-success status
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub message: String,
    pub status: u16,
    pub raised_at: DateTime<Utc>,
}

/// Everything the dashboard shows
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    /// Server the current epoch polls
    pub address: String,
    /// Bumped on every address change
    pub epoch: u64,
    pub measurements: Vec<Measurement>,
    pub health: HealthStatus,
    pub alert: Option<Alert>,
    /// Last failed data poll, cleared by the next successful one
    pub last_error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
    next_data_seq: u64,
    next_health_seq: u64,
    applied_data_seq: u64,
    applied_health_seq: u64,
}

impl DashboardState {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    fn issue(&mut self, channel: Channel, epoch: u64) -> Ticket {
        let next = match channel {
            Channel::Data => &mut self.next_data_seq,
            Channel::Health => &mut self.next_health_seq,
        };
        *next += 1;
        Ticket {
            channel,
            epoch,
            seq: *next,
        }
    }

    /// Accept the ticket if it is current and newer than anything applied
    fn accept(&mut self, ticket: Ticket) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        let applied = match ticket.channel {
            Channel::Data => &mut self.applied_data_seq,
            Channel::Health => &mut self.applied_health_seq,
        };
        if ticket.seq <= *applied {
            return false;
        }
        *applied = ticket.seq;
        true
    }
}

/// Cloneable handle to the shared dashboard state
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<RwLock<DashboardState>>,
    version: Arc<watch::Sender<u64>>,
}

impl StateHandle {
    pub fn new(address: impl Into<String>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(DashboardState::new(address))),
            version: Arc::new(version),
        }
    }

    /// Receiver that changes whenever the state does
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> DashboardState {
        self.inner.read().await.clone()
    }

    /// Switch to a new address, starting a new epoch.
    ///
    /// Measurements stay on screen until the new server answers.
    pub async fn set_address(&self, address: impl Into<String>) -> u64 {
        let epoch = {
            let mut state = self.inner.write().await;
            state.address = address.into();
            state.epoch += 1;
            state.alert = None;
            state.last_error = None;
            state.epoch
        };
        self.notify();
        epoch
    }

    /// Current address epoch
    pub async fn epoch(&self) -> u64 {
        self.inner.read().await.epoch
    }

    /// Stamp a request that is about to be sent, in the current epoch
    pub async fn issue(&self, channel: Channel) -> Ticket {
        let mut state = self.inner.write().await;
        let epoch = state.epoch;
        state.issue(channel, epoch)
    }

    /// Stamp a request for the address of `epoch`.
    ///
    /// Polling tasks capture the epoch when they start, so a request for an
    /// old address stays in the old epoch however late it is issued.
    pub async fn issue_in(&self, channel: Channel, epoch: u64) -> Ticket {
        self.inner.write().await.issue(channel, epoch)
    }

    /// Apply the outcome of a data poll. Returns false if it was stale.
    pub async fn apply_data(&self, ticket: Ticket, result: SensorResult<DataFetch>) -> bool {
        {
            let mut state = self.inner.write().await;
            if !state.accept(ticket) {
                tracing::debug!(seq = ticket.seq, epoch = ticket.epoch, "Discarding stale data response");
                return false;
            }

            match result {
                Ok(fetch) => {
                    state.alert = if fetch.is_success() {
                        None
                    } else {
                        Some(Alert {
                            message: "Error fetching data".to_string(),
                            status: fetch.status,
                            raised_at: Utc::now(),
                        })
                    };
                    match fetch.measurements {
                        Ok(measurements) => {
                            state.measurements = measurements;
                            state.last_error = None;
                            state.last_update = Some(Utc::now());
                        }
                        Err(e) => {
                            state.last_error = Some(SensorError::Payload(e).to_string());
                        }
                    }
                }
                Err(e) => {
                    state.last_error = Some(e.to_string());
                }
            }
        }
        self.notify();
        true
    }

    /// Apply the outcome of a health check. Returns false if it was stale.
    pub async fn apply_health(&self, ticket: Ticket, health: HealthStatus) -> bool {
        let changed = {
            let mut state = self.inner.write().await;
            if !state.accept(ticket) {
                tracing::debug!(seq = ticket.seq, epoch = ticket.epoch, "Discarding stale health response");
                return false;
            }
            let changed = state.health != health;
            state.health = health;
            changed
        };
        if changed {
            self.notify();
        }
        true
    }

    /// Wake up anything waiting on [`StateHandle::subscribe`]
    pub fn notify(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PayloadError;

    fn reading(ms: i64, value: f64) -> Measurement {
        Measurement::new(DateTime::from_timestamp_millis(ms).unwrap(), value)
    }

    fn fetch(status: u16, values: &[f64]) -> SensorResult<DataFetch> {
        Ok(DataFetch {
            status,
            measurements: Ok(values
                .iter()
                .enumerate()
                .map(|(i, v)| reading(i as i64, *v))
                .collect()),
        })
    }

    #[tokio::test]
    async fn test_apply_replaces_measurements() {
        let state = StateHandle::new("http://localhost:3000");

        let ticket = state.issue(Channel::Data).await;
        assert!(state.apply_data(ticket, fetch(200, &[400.0, 410.0])).await);

        let ticket = state.issue(Channel::Data).await;
        assert!(state.apply_data(ticket, fetch(200, &[500.0])).await);

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.measurements.len(), 1);
        assert_eq!(snapshot.measurements[0].value, 500.0);
        assert!(snapshot.alert.is_none());
        assert!(snapshot.last_update.is_some());
    }

    #[tokio::test]
    async fn test_out_of_order_response_is_discarded() {
        let state = StateHandle::new("http://localhost:3000");

        let slow = state.issue(Channel::Data).await;
        let fast = state.issue(Channel::Data).await;

        assert!(state.apply_data(fast, fetch(200, &[420.0])).await);
        assert!(!state.apply_data(slow, fetch(200, &[400.0])).await);

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.measurements[0].value, 420.0);
    }

    #[tokio::test]
    async fn test_previous_epoch_is_discarded() {
        let state = StateHandle::new("http://old:3000");

        let data = state.issue(Channel::Data).await;
        let health = state.issue(Channel::Health).await;
        let epoch = state.set_address("http://new:3000").await;
        assert_eq!(epoch, 1);

        assert!(!state.apply_data(data, fetch(200, &[400.0])).await);
        assert!(!state.apply_health(health, HealthStatus::Healthy).await);

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.address, "http://new:3000");
        assert!(snapshot.measurements.is_empty());
        assert_eq!(snapshot.health, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn test_ticket_issued_late_keeps_its_epoch() {
        let state = StateHandle::new("http://old:3000");
        let old_epoch = state.epoch().await;

        // Request for the old address stamped after the switch
        state.set_address("http://new:3000").await;
        let late = state.issue_in(Channel::Data, old_epoch).await;
        assert_eq!(late.epoch, old_epoch);
        assert!(!state.apply_data(late, fetch(200, &[999.0])).await);

        let current = state.issue_in(Channel::Data, state.epoch().await).await;
        assert!(state.apply_data(current, fetch(200, &[410.0])).await);
        assert_eq!(state.snapshot().await.measurements[0].value, 410.0);
    }

    #[tokio::test]
    async fn test_error_status_raises_alert_but_applies() {
        let state = StateHandle::new("http://localhost:3000");

        let ticket = state.issue(Channel::Data).await;
        state.apply_data(ticket, fetch(500, &[600.0])).await;

        let snapshot = state.snapshot().await;
        let alert = snapshot.alert.expect("alert raised");
        assert_eq!(alert.status, 500);
        assert_eq!(alert.message, "Error fetching data");
        assert_eq!(snapshot.measurements.len(), 1);

        let ticket = state.issue(Channel::Data).await;
        state.apply_data(ticket, fetch(200, &[600.0])).await;
        assert!(state.snapshot().await.alert.is_none());
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_previous_data() {
        let state = StateHandle::new("http://localhost:3000");

        let ticket = state.issue(Channel::Data).await;
        state.apply_data(ticket, fetch(200, &[450.0])).await;

        let ticket = state.issue(Channel::Data).await;
        state
            .apply_data(ticket, Err(SensorError::Timeout))
            .await;

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.measurements[0].value, 450.0);
        assert_eq!(snapshot.last_error.as_deref(), Some("Request timeout"));
    }

    #[tokio::test]
    async fn test_error_status_with_bad_body() {
        let state = StateHandle::new("http://localhost:3000");

        let ticket = state.issue(Channel::Data).await;
        state.apply_data(ticket, fetch(200, &[450.0])).await;

        let ticket = state.issue(Channel::Data).await;
        let bad = DataFetch {
            status: 500,
            measurements: Err(PayloadError::Json("expected value".to_string())),
        };
        state.apply_data(ticket, Ok(bad)).await;

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.alert.map(|a| a.status), Some(500));
        assert_eq!(snapshot.measurements[0].value, 450.0);
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("Invalid data payload: malformed JSON: expected value")
        );
    }

    #[tokio::test]
    async fn test_channels_sequence_independently() {
        let state = StateHandle::new("http://localhost:3000");

        let data = state.issue(Channel::Data).await;
        let health = state.issue(Channel::Health).await;
        assert_eq!(data.seq, 1);
        assert_eq!(health.seq, 1);

        assert!(state.apply_health(health, HealthStatus::Healthy).await);
        assert!(state.apply_data(data, fetch(200, &[])).await);
        assert!(state.snapshot().await.health.is_healthy());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let state = StateHandle::new("http://localhost:3000");
        let mut rx = state.subscribe();

        let ticket = state.issue(Channel::Health).await;
        state.apply_health(ticket, HealthStatus::Unhealthy).await;

        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        // Same health again is not a change
        let ticket = state.issue(Channel::Health).await;
        state.apply_health(ticket, HealthStatus::Unhealthy).await;
        assert!(!rx.has_changed().unwrap());
    }
}
