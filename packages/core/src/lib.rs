//! Core domain types for the field attendance sync core.
//!
//! This crate contains shared types used across all packages:
//! - Session, Site and Ticket for the logged-in technician and reference data
//! - AttendanceStatus, Intent and AttendanceEvent for the status machine
//! - LocationFix, PendingLocationPing and the haversine distance
//! - QueuedRecord and SyncCounters for the dispatch/queue layer
//! - Events for real-time updates

mod attendance;
mod error;
mod events;
mod location;
mod record;
mod session;
pub mod wire;

pub use attendance::{AttendanceEvent, AttendanceKind, AttendanceStatus, Intent, require_comment};
pub use error::ValidationError;
pub use events::{SyncEvent, SyncTrigger};
pub use location::{
    EARTH_RADIUS_M, LocationFix, MAX_CHECK_IN_RADIUS_M, PendingLocationPing, haversine_distance,
};
pub use record::{QueuedRecord, RecordBody, RecordId, RecordKind, SyncCounters};
pub use session::{Session, Site, Ticket};
