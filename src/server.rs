//! Sensor Server
//!
//! Minimal HTTP server exposing the endpoints the dashboard polls, built
//! with Axum.
//!
//! # Endpoints
//!
//! - `GET /health` - Plain `ok`
//! - `GET /data` - `{ "timestamps": [...], "co2values": [...] }`, replayed
//!   from a `timestamp,ppm` CSV file or generated in mock mode
//! - `GET /config` - Effective server configuration

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::measurement::{Co2Payload, Measurement};

/// Number of synthetic readings served in mock mode
pub const MOCK_READINGS: usize = 100;

/// Where `/data` readings come from
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingSource {
    Csv(PathBuf),
    Mock,
}

impl ReadingSource {
    pub fn from_config(config: &ServerConfig) -> Self {
        if config.mock {
            ReadingSource::Mock
        } else {
            ReadingSource::Csv(PathBuf::from(&config.csv_path))
        }
    }
}

/// Shared state for the sensor server handlers
#[derive(Debug, Clone)]
pub struct ServerState {
    pub source: ReadingSource,
    pub config: ServerConfig,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            source: ReadingSource::from_config(&config),
            config,
        }
    }
}

/// Sensor server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to read {path:?}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Bad CSV record {line}: {error}")]
    Record { line: usize, error: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!("{}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Build the sensor server router
pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/data", get(data))
        .route("/config", get(show_config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Start the sensor server
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let addr = config.addr();
    let router = build_router(ServerState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Sensor server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Sensor server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

/// GET /data
async fn data(State(state): State<Arc<ServerState>>) -> Result<Json<Co2Payload>, ServerError> {
    let payload = match &state.source {
        ReadingSource::Mock => mock_payload(Utc::now(), MOCK_READINGS),
        ReadingSource::Csv(path) => read_csv(path).await?,
    };
    Ok(Json(payload))
}

/// GET /config
async fn show_config(State(state): State<Arc<ServerState>>) -> String {
    let source = match &state.source {
        ReadingSource::Mock => "mock".to_string(),
        ReadingSource::Csv(path) => format!("csv {}", path.display()),
    };
    format!("LISTEN: {}\nSOURCE: {}\n", state.config.addr(), source)
}

/// Read a `timestamp,ppm` CSV file with a header row.
///
/// Timestamps are passed through untouched; the dashboard parses them.
pub async fn read_csv(path: &Path) -> Result<Co2Payload, ServerError> {
    let contents = tokio::fs::read(path).await.map_err(|e| ServerError::Read {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    let mut reader = csv::Reader::from_reader(contents.as_slice());
    let mut payload = Co2Payload::default();

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1
        let line = idx + 2;
        let record = result.map_err(|e| ServerError::Record {
            line,
            error: e.to_string(),
        })?;

        let (Some(timestamp), Some(ppm)) = (record.get(0), record.get(1)) else {
            return Err(ServerError::Record {
                line,
                error: "expected timestamp,ppm".to_string(),
            });
        };
        let ppm: f64 = ppm.trim().parse().map_err(|_| ServerError::Record {
            line,
            error: format!("invalid ppm {:?}", ppm),
        })?;

        payload.timestamps.push(timestamp.trim().to_string());
        payload.co2values.push(ppm);
    }

    Ok(payload)
}

/// Synthetic readings one second apart, the last one a second before `now`.
///
/// Values follow a slow wave between roughly 450 and 850 ppm.
pub fn mock_payload(now: DateTime<Utc>, count: usize) -> Co2Payload {
    (0..count)
        .map(|i| {
            let timestamp = now - Duration::seconds((count - i) as i64);
            let phase = timestamp.timestamp() as f64 * std::f64::consts::TAU / 300.0;
            let value = (650.0 + 200.0 * phase.sin()).round();
            Measurement::new(timestamp, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::io::Write;
    use tower::util::ServiceExt;

    fn create_test_app(source: ReadingSource) -> Router {
        let state = ServerState {
            source,
            config: ServerConfig::default(),
        };
        build_router(state)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_body(create_test_app(ReadingSource::Mock), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_mock_data() {
        let (status, body) = get_body(create_test_app(ReadingSource::Mock), "/data").await;
        assert_eq!(status, StatusCode::OK);

        let payload = Co2Payload::from_json(&body).unwrap();
        assert_eq!(payload.timestamps.len(), MOCK_READINGS);
        assert_eq!(payload.into_measurements().unwrap().len(), MOCK_READINGS);
    }

    #[tokio::test]
    async fn test_csv_data() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,ppm").unwrap();
        writeln!(file, "2024-05-01T10:00:00Z,612").unwrap();
        writeln!(file, "2024-05-01T10:00:05Z,618").unwrap();

        let app = create_test_app(ReadingSource::Csv(file.path().to_path_buf()));
        let (status, body) = get_body(app, "/data").await;
        assert_eq!(status, StatusCode::OK);

        let payload = Co2Payload::from_json(&body).unwrap();
        assert_eq!(payload.timestamps, vec!["2024-05-01T10:00:00Z", "2024-05-01T10:00:05Z"]);
        assert_eq!(payload.co2values, vec![612.0, 618.0]);
    }

    #[tokio::test]
    async fn test_missing_csv_is_server_error() {
        let app = create_test_app(ReadingSource::Csv(PathBuf::from("/no/such/values.csv")));
        let (status, body) = get_body(app, "/data").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("values.csv"));
    }

    #[tokio::test]
    async fn test_bad_csv_record() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,ppm").unwrap();
        writeln!(file, "2024-05-01T10:00:00Z,lots").unwrap();

        let err = read_csv(file.path()).await.unwrap_err();
        assert!(matches!(err, ServerError::Record { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_config_route() {
        let (status, body) = get_body(create_test_app(ReadingSource::Mock), "/config").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("SOURCE: mock"));
        assert!(body.contains("LISTEN: 0.0.0.0:3000"));
    }

    #[test]
    fn test_mock_payload_shape() {
        let now = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let measurements = mock_payload(now, 3).into_measurements().unwrap();

        assert_eq!(measurements.len(), 3);
        assert_eq!(measurements[2].timestamp, now - Duration::seconds(1));
        assert_eq!(measurements[0].timestamp, now - Duration::seconds(3));
        assert!(measurements.iter().all(|m| (450.0..=850.0).contains(&m.value)));
    }

    #[test]
    fn test_reading_source_from_config() {
        let mut config = ServerConfig::default();
        assert_eq!(
            ReadingSource::from_config(&config),
            ReadingSource::Csv(PathBuf::from("values.csv"))
        );
        config.mock = true;
        assert_eq!(ReadingSource::from_config(&config), ReadingSource::Mock);
    }
}
