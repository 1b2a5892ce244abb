//! Sensor error types
//!
//! Defines all errors that can occur while talking to a sensor server.

use thiserror::Error;

/// Errors that can occur while polling a sensor server
#[derive(Error, Debug)]
pub enum SensorError {
    /// Request could not be sent or the response body could not be read
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server did not answer within the configured timeout
    #[error("Request timeout")]
    Timeout,

    /// Server could not be reached at all
    #[error("Sensor server unavailable at {0}")]
    Unavailable(String),

    /// Response body was not a valid data payload
    #[error("Invalid data payload: {0}")]
    Payload(#[from] PayloadError),
}

/// Errors found while turning a `/data` body into measurements
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    /// Body was not JSON or was missing `timestamps`/`co2values`
    #[error("malformed JSON: {0}")]
    Json(String),

    /// `timestamps` and `co2values` have different lengths
    #[error("{timestamps} timestamps but {values} values")]
    LengthMismatch { timestamps: usize, values: usize },

    /// A timestamp could not be parsed
    #[error("unparseable timestamp {value:?} at index {index}")]
    InvalidTimestamp { index: usize, value: String },
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        PayloadError::Json(err.to_string())
    }
}

impl SensorError {
    /// Classify a reqwest error the way the dashboard reports it
    pub fn from_reqwest(err: reqwest::Error, address: &str) -> Self {
        if err.is_timeout() {
            SensorError::Timeout
        } else if err.is_connect() {
            SensorError::Unavailable(address.to_string())
        } else {
            SensorError::Request(err)
        }
    }
}

/// Result type alias for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;
