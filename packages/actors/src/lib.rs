//! Actor system for the attendance sync core.
//!
//! # Architecture
//!
//! - `ConnectivityActor` - Folds network snapshots into an online flag
//! - `QueueActor` - Owns both durable queues and the delivery counters
//! - `SyncActor` - Runs at most one drain pass at a time
//! - `AttendanceActor` - Status machine, selection and location reporting
//! - `Dispatcher` - Single-attempt delivery with fallback to the queue
//! - `FieldRuntime` - Spawns and tears down all of the above for a session
//!
//! # Usage
//!
//! ```ignore
//! let runtime = FieldRuntime::start(config, app_state, session, Arc::new(client)).await?;
//! runtime.network_changed(NetworkStatus::online())?;
//! runtime.select_site(Some(site)).await?;
//! runtime.update_location(LocationFix::new(4.7, -74.05))?;
//! runtime.check_in("llegada a sitio").await?;
//! ```

mod attendance_actor;
mod config;
mod connectivity_actor;
mod dispatch;
mod error;
mod messages;
mod queue_actor;
mod runtime;
mod sync_actor;
mod transport;

pub use attendance_actor::AttendanceActor;
pub use config::RuntimeConfig;
pub use connectivity_actor::{ConnectivityActor, NetworkStatus};
pub use dispatch::{DispatchOutcome, Dispatcher, QueueReason};
pub use error::{AttendanceError, ConfigError, DispatchError, DrainError, RuntimeError};
pub use messages::{
    AttendanceMessage, AttendanceSnapshot, ConnectivityMessage, DrainSummary, IntentOutcome,
    QueueMessage, SyncMessage, TriggerOutcome,
};
pub use queue_actor::QueueActor;
pub use runtime::FieldRuntime;
pub use sync_actor::SyncActor;
pub use transport::{FnTransport, Transport, TransportFuture, TransportResult};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort};
