use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures of the locate flow. Each one ends the triggering action.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("No location shared yet. Use the 📍 button to send your location.")]
    GeolocationUnavailable,
    #[error("Error getting location: {0}")]
    GeolocationFailed(String),
    #[error("Please enter a valid radius.")]
    InvalidRadius(String),
    #[error("Cannot load bus stops: {0}")]
    Fetch(#[from] FetchError),
}
