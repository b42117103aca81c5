//! Validation failures surfaced to the technician before anything is sent.

use thiserror::Error;

use crate::attendance::{AttendanceStatus, Intent};

/// Rejected intents. Nothing is persisted or dispatched when one of these is
/// returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("a comment is required to {0}")]
    MissingComment(Intent),

    #[error("no work site selected")]
    MissingSite,

    #[error("no location fix available yet")]
    MissingLocation,

    #[error("{distance_m:.0} m from the site exceeds the {max_m:.0} m check-in radius")]
    OutOfRange { distance_m: f64, max_m: f64 },

    #[error("cannot {intent} while {status}")]
    IllegalTransition {
        status: AttendanceStatus,
        intent: Intent,
    },

    #[error("site and ticket cannot change while {0}")]
    SelectionLocked(AttendanceStatus),

    #[error("check out before logging out (currently {0})")]
    LogoutWhileActive(AttendanceStatus),
}
