//! HTTP client for the remote attendance service.
//!
//! All calls are single attempts: a failure is reported to the caller, which
//! decides whether to queue the record for a later drain pass.

mod client;
mod config;

pub use client::ApiClient;
pub use config::{ApiConfig, ConfigError};

use thiserror::Error;

/// A record could not be delivered.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Login failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("login rejected: {0}")]
    Rejected(String),

    #[error("login response carried no user id")]
    MissingUserId,
}
