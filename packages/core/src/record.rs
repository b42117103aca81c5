//! Records that travel through the dispatch engine and the durable queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::attendance::AttendanceEvent;
use crate::location::PendingLocationPing;

/// Unique identifier for a queued record, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Ulid);

impl RecordId {
    /// Create a new unique record ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a record ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of the two queues a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Attendance,
    LocationPing,
}

impl RecordKind {
    /// Drain order: attendance events go before location pings.
    pub const DRAIN_ORDER: [RecordKind; 2] = [RecordKind::Attendance, RecordKind::LocationPing];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Attendance => "attendance",
            RecordKind::LocationPing => "location_ping",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RecordBody {
    Attendance(AttendanceEvent),
    LocationPing(PendingLocationPing),
}

impl RecordBody {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordBody::Attendance(_) => RecordKind::Attendance,
            RecordBody::LocationPing(_) => RecordKind::LocationPing,
        }
    }
}

impl From<AttendanceEvent> for RecordBody {
    fn from(event: AttendanceEvent) -> Self {
        RecordBody::Attendance(event)
    }
}

impl From<PendingLocationPing> for RecordBody {
    fn from(ping: PendingLocationPing) -> Self {
        RecordBody::LocationPing(ping)
    }
}

/// A record as held in a durable queue; insertion order is retry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRecord {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub body: RecordBody,
}

impl QueuedRecord {
    pub fn new(body: impl Into<RecordBody>) -> Self {
        Self {
            id: RecordId::new(),
            created_at: Utc::now(),
            body: body.into(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.body.kind()
    }
}

/// Delivery counters shown in the sync status bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
    /// Records confirmed delivered, directly or by a drain pass.
    pub synced: u64,
    /// Records currently waiting in the durable queues.
    pub unsynced: u64,
}
