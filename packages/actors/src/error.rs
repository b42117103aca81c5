//! Error types surfaced by the actor system.

use field_core::ValidationError;
use storage::StorageError;

use crate::messages::DrainSummary;

/// Why an intent or selection change was refused.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The record could not even be queued.
    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("actor error: {0}")]
    Actor(String),
}

impl From<DispatchError> for AttendanceError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Persistence(e) => AttendanceError::Persistence(e),
            DispatchError::Actor(msg) => AttendanceError::Actor(msg),
        }
    }
}

/// The dispatch engine's only hard failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("actor error: {0}")]
    Actor(String),
}

/// A drain pass stopped on a persistence failure.
///
/// `partial` counts what earlier sub-drains already delivered and saved.
#[derive(Debug, thiserror::Error)]
#[error("drain failed after {} deliveries: {source}", .partial.delivered)]
pub struct DrainError {
    pub partial: DrainSummary,
    #[source]
    pub source: StorageError,
}

/// Failures while starting the runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to spawn {actor} actor: {reason}")]
    Spawn { actor: &'static str, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid runtime config: {0}")]
    Invalid(String),
}
