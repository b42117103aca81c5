//! Message types for actor communication.

use field_core::{
    AttendanceEvent, AttendanceStatus, Intent, LocationFix, QueuedRecord, RecordKind, Site,
    SyncCounters, SyncTrigger, Ticket,
};
use ractor::RpcReplyPort;
use ractor::rpc::CallResult;
use storage::StorageError;

use crate::{AttendanceError, DrainError};
use crate::connectivity_actor::NetworkStatus;
use crate::dispatch::DispatchOutcome;

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Append a record to its durable queue.
    Enqueue {
        record: Box<QueuedRecord>,
        reason: String,
        reply: RpcReplyPort<Result<SyncCounters, StorageError>>,
    },

    /// A record was delivered directly, without being queued.
    Delivered {
        record: Box<QueuedRecord>,
        reply: RpcReplyPort<SyncCounters>,
    },

    /// Run one drain pass over both queues.
    Drain {
        reply: RpcReplyPort<Result<DrainSummary, DrainError>>,
    },

    GetCounters { reply: RpcReplyPort<SyncCounters> },

    /// Snapshot of the records waiting in one queue.
    Pending {
        kind: RecordKind,
        reply: RpcReplyPort<Vec<QueuedRecord>>,
    },
}

/// Totals for one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub delivered: u64,
    pub remaining: u64,
}

/// Messages for the SyncActor.
#[derive(Debug)]
pub enum SyncMessage {
    /// Start a drain pass unless one is running or the device is offline.
    Trigger {
        trigger: SyncTrigger,
        reply: Option<RpcReplyPort<TriggerOutcome>>,
    },

    /// Sent by the pass task when it is done, whatever the outcome. A failed
    /// pass still carries what it delivered before stopping.
    PassFinished {
        result: Result<DrainSummary, (DrainSummary, String)>,
    },

    IsSyncing { reply: RpcReplyPort<bool> },

    /// Periodic tick.
    Tick,
}

/// Answer to a sync trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    AlreadySyncing,
    Offline,
}

/// Messages for the ConnectivityActor.
#[derive(Debug)]
pub enum ConnectivityMessage {
    /// A snapshot from the platform's network-state stream.
    Update(NetworkStatus),
}

/// Messages for the AttendanceActor.
#[derive(Debug)]
pub enum AttendanceMessage {
    Intent {
        intent: Intent,
        comment: String,
        reply: RpcReplyPort<Result<IntentOutcome, AttendanceError>>,
    },

    SelectSite {
        site: Option<Site>,
        reply: RpcReplyPort<Result<(), AttendanceError>>,
    },

    SelectTicket {
        ticket: Option<Ticket>,
        reply: RpcReplyPort<Result<(), AttendanceError>>,
    },

    /// Latest position from the platform's location stream.
    LocationUpdate(LocationFix),

    /// Report timer tick.
    ReportLocation,

    GetSnapshot {
        reply: RpcReplyPort<AttendanceSnapshot>,
    },

    /// Clear the session; refused unless out.
    Logout {
        reply: RpcReplyPort<Result<(), AttendanceError>>,
    },
}

/// A committed transition.
#[derive(Debug, Clone)]
pub struct IntentOutcome {
    pub status: AttendanceStatus,
    pub event: AttendanceEvent,
    pub dispatch: DispatchOutcome,
    /// False when the new status or selection could not be saved; the
    /// transition holds for this run but a restart would not see it.
    pub persisted: bool,
}

/// What the attendance screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceSnapshot {
    pub status: AttendanceStatus,
    pub site: Option<Site>,
    pub ticket: Option<Ticket>,
    pub fix: Option<LocationFix>,
    pub reporting: bool,
}

/// Flatten a ractor RPC result into the reply or a printable failure.
pub(crate) fn call_reply<T, M>(
    actor: &str,
    result: Result<CallResult<T>, ractor::MessagingErr<M>>,
) -> Result<T, String> {
    match result {
        Ok(CallResult::Success(value)) => Ok(value),
        Ok(CallResult::Timeout) => Err(format!("{actor} actor timed out")),
        Ok(CallResult::SenderError) => Err(format!("{actor} actor dropped the reply")),
        Err(_) => Err(format!("{actor} actor is not running")),
    }
}
