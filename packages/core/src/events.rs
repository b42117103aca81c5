//! Event types the UI subscribes to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AttendanceStatus, RecordId, RecordKind, SyncCounters};

/// What started a drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Connectivity went from offline to online.
    ConnectivityRestored,
    /// The app returned to the foreground.
    Foregrounded,
    /// A record was just delivered while others were still queued.
    PostDispatch,
    /// Periodic housekeeping tick.
    Periodic,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncTrigger::ConnectivityRestored => write!(f, "connectivity restored"),
            SyncTrigger::Foregrounded => write!(f, "foregrounded"),
            SyncTrigger::PostDispatch => write!(f, "post-dispatch"),
            SyncTrigger::Periodic => write!(f, "periodic"),
        }
    }
}

/// Events emitted by the sync core for real-time updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Online/offline state flipped.
    ConnectivityChanged {
        online: bool,
        timestamp: DateTime<Utc>,
    },
    /// The attendance status was committed.
    StatusChanged {
        old_status: AttendanceStatus,
        new_status: AttendanceStatus,
        timestamp: DateTime<Utc>,
    },
    /// A record reached the remote service.
    RecordDelivered {
        record_id: RecordId,
        kind: RecordKind,
        /// True when delivered by a drain pass rather than directly.
        deferred: bool,
        timestamp: DateTime<Utc>,
    },
    /// A record was put in the durable queue.
    RecordQueued {
        record_id: RecordId,
        kind: RecordKind,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// A drain pass started.
    SyncStarted {
        trigger: SyncTrigger,
        timestamp: DateTime<Utc>,
    },
    /// A drain pass finished.
    SyncFinished {
        delivered: u64,
        remaining: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// Synced/unsynced counters changed.
    CountersUpdated {
        counters: SyncCounters,
        timestamp: DateTime<Utc>,
    },
}

impl SyncEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SyncEvent::ConnectivityChanged { timestamp, .. } => *timestamp,
            SyncEvent::StatusChanged { timestamp, .. } => *timestamp,
            SyncEvent::RecordDelivered { timestamp, .. } => *timestamp,
            SyncEvent::RecordQueued { timestamp, .. } => *timestamp,
            SyncEvent::SyncStarted { timestamp, .. } => *timestamp,
            SyncEvent::SyncFinished { timestamp, .. } => *timestamp,
            SyncEvent::CountersUpdated { timestamp, .. } => *timestamp,
        }
    }

    /// Get the record ID associated with this event, if any.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            SyncEvent::RecordDelivered { record_id, .. } => Some(*record_id),
            SyncEvent::RecordQueued { record_id, .. } => Some(*record_id),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            SyncEvent::ConnectivityChanged { online, .. } => {
                if *online {
                    "Online".to_string()
                } else {
                    "Offline".to_string()
                }
            }
            SyncEvent::StatusChanged {
                old_status,
                new_status,
                ..
            } => format!("Status {} -> {}", old_status, new_status),
            SyncEvent::RecordDelivered {
                record_id,
                kind,
                deferred,
                ..
            } => {
                let how = if *deferred { " (deferred)" } else { "" };
                format!("{} record {} delivered{}", kind, record_id, how)
            }
            SyncEvent::RecordQueued {
                record_id,
                kind,
                reason,
                ..
            } => format!("{} record {} queued: {}", kind, record_id, reason),
            SyncEvent::SyncStarted { trigger, .. } => format!("Sync started ({})", trigger),
            SyncEvent::SyncFinished {
                delivered,
                remaining,
                error,
                ..
            } => match error {
                Some(e) => format!(
                    "Sync failed after {} delivered, {} pending: {}",
                    delivered, remaining, e
                ),
                None => format!("Sync finished: {} delivered, {} pending", delivered, remaining),
            },
            SyncEvent::CountersUpdated { counters, .. } => {
                format!("{} sent, {} pending", counters.synced, counters.unsynced)
            }
        }
    }
}
