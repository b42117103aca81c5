//! Lifecycle owner for one logged-in session.

use std::sync::Arc;

use field_core::{
    Intent, LocationFix, QueuedRecord, RecordKind, Session, Site, SyncCounters, SyncEvent,
    SyncTrigger, Ticket,
};
use ractor::{Actor, ActorCell, ActorRef};
use storage::AppState;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::attendance_actor::{AttendanceActor, AttendanceActorArgs};
use crate::connectivity_actor::{ConnectivityActor, ConnectivityActorArgs, NetworkStatus};
use crate::dispatch::Dispatcher;
use crate::messages::{
    AttendanceMessage, AttendanceSnapshot, ConnectivityMessage, IntentOutcome, QueueMessage,
    SyncMessage, TriggerOutcome, call_reply,
};
use crate::queue_actor::{QueueActor, QueueActorArgs};
use crate::sync_actor::{SyncActor, SyncActorArgs};
use crate::transport::Transport;
use crate::{AttendanceError, RuntimeConfig, RuntimeError};

const EVENT_CAPACITY: usize = 256;

/// Owns the actors and timers of a session.
///
/// Started after login, torn down on logout or shutdown. Dropping the runtime
/// without calling [`FieldRuntime::shutdown`] leaves the actors running.
pub struct FieldRuntime {
    attendance: ActorRef<AttendanceMessage>,
    queue: ActorRef<QueueMessage>,
    sync: ActorRef<SyncMessage>,
    connectivity: ActorRef<ConnectivityMessage>,
    online: watch::Receiver<bool>,
    event_tx: broadcast::Sender<SyncEvent>,
    spawned: Spawned,
}

impl FieldRuntime {
    /// Spawn every actor for `session`, restoring queued records, status and
    /// selection from `app_state`. Starts offline.
    pub async fn start(
        config: RuntimeConfig,
        app_state: AppState,
        session: Session,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RuntimeError> {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (online_tx, online_rx) = watch::channel(false);
        let mut spawned = Spawned::default();

        let (queue, handle) = match Actor::spawn(
            None,
            QueueActor,
            QueueActorArgs {
                storage: app_state.storage().clone(),
                transport: transport.clone(),
                event_tx: event_tx.clone(),
            },
        )
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                spawned.abandon().await;
                return Err(spawn_err("queue", e));
            }
        };
        spawned.push(queue.get_cell(), handle);

        let (sync, handle) = match Actor::spawn(
            None,
            SyncActor,
            SyncActorArgs {
                queue: queue.clone(),
                online: online_rx.clone(),
                event_tx: event_tx.clone(),
                tick_interval: config.sync_interval,
            },
        )
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                spawned.abandon().await;
                return Err(spawn_err("sync", e));
            }
        };
        spawned.push(sync.get_cell(), handle);

        let (connectivity, handle) = match Actor::spawn(
            None,
            ConnectivityActor,
            ConnectivityActorArgs {
                online_tx,
                sync: sync.clone(),
                event_tx: event_tx.clone(),
            },
        )
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                spawned.abandon().await;
                return Err(spawn_err("connectivity", e));
            }
        };
        spawned.push(connectivity.get_cell(), handle);

        let dispatcher = Dispatcher::new(transport, online_rx.clone(), queue.clone(), sync.clone());
        let (attendance, handle) = match Actor::spawn(
            None,
            AttendanceActor,
            AttendanceActorArgs {
                session,
                app_state,
                dispatcher,
                event_tx: event_tx.clone(),
                report_interval: config.report_interval,
                max_check_in_radius_m: config.max_check_in_radius_m,
            },
        )
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                spawned.abandon().await;
                return Err(spawn_err("attendance", e));
            }
        };
        spawned.push(attendance.get_cell(), handle);

        tracing::info!("Field runtime started");
        Ok(Self {
            attendance,
            queue,
            sync,
            connectivity,
            online: online_rx,
            event_tx,
            spawned,
        })
    }

    /// Subscribe to sync events. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    pub async fn check_in(&self, comment: &str) -> Result<IntentOutcome, AttendanceError> {
        self.intent(Intent::CheckIn, comment).await
    }

    pub async fn check_out(&self, comment: &str) -> Result<IntentOutcome, AttendanceError> {
        self.intent(Intent::CheckOut, comment).await
    }

    pub async fn pause(&self, comment: &str) -> Result<IntentOutcome, AttendanceError> {
        self.intent(Intent::Pause, comment).await
    }

    pub async fn resume(&self, comment: &str) -> Result<IntentOutcome, AttendanceError> {
        self.intent(Intent::Resume, comment).await
    }

    pub async fn intent(
        &self,
        intent: Intent,
        comment: &str,
    ) -> Result<IntentOutcome, AttendanceError> {
        let comment = comment.to_string();
        let result = ractor::rpc::call(
            &self.attendance,
            |reply| AttendanceMessage::Intent {
                intent,
                comment,
                reply,
            },
            None,
        )
        .await;
        call_reply("attendance", result).map_err(AttendanceError::Actor)?
    }

    pub async fn select_site(&self, site: Option<Site>) -> Result<(), AttendanceError> {
        let result = ractor::rpc::call(
            &self.attendance,
            |reply| AttendanceMessage::SelectSite { site, reply },
            None,
        )
        .await;
        call_reply("attendance", result).map_err(AttendanceError::Actor)?
    }

    pub async fn select_ticket(&self, ticket: Option<Ticket>) -> Result<(), AttendanceError> {
        let result = ractor::rpc::call(
            &self.attendance,
            |reply| AttendanceMessage::SelectTicket { ticket, reply },
            None,
        )
        .await;
        call_reply("attendance", result).map_err(AttendanceError::Actor)?
    }

    /// Feed a fix from the location stream.
    pub fn update_location(&self, fix: LocationFix) -> Result<(), AttendanceError> {
        self.attendance
            .send_message(AttendanceMessage::LocationUpdate(fix))
            .map_err(|_| AttendanceError::Actor("attendance actor is not running".into()))
    }

    /// Feed a snapshot from the network-state stream.
    pub fn network_changed(&self, status: NetworkStatus) -> Result<(), AttendanceError> {
        self.connectivity
            .send_message(ConnectivityMessage::Update(status))
            .map_err(|_| AttendanceError::Actor("connectivity actor is not running".into()))
    }

    /// The app came back to the foreground.
    pub async fn foregrounded(&self) -> Result<TriggerOutcome, AttendanceError> {
        self.trigger_sync(SyncTrigger::Foregrounded).await
    }

    pub async fn trigger_sync(&self, trigger: SyncTrigger) -> Result<TriggerOutcome, AttendanceError> {
        let result = ractor::rpc::call(
            &self.sync,
            |reply| SyncMessage::Trigger {
                trigger,
                reply: Some(reply),
            },
            None,
        )
        .await;
        call_reply("sync", result).map_err(AttendanceError::Actor)
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub async fn is_syncing(&self) -> Result<bool, AttendanceError> {
        let result =
            ractor::rpc::call(&self.sync, |reply| SyncMessage::IsSyncing { reply }, None).await;
        call_reply("sync", result).map_err(AttendanceError::Actor)
    }

    pub async fn counters(&self) -> Result<SyncCounters, AttendanceError> {
        let result =
            ractor::rpc::call(&self.queue, |reply| QueueMessage::GetCounters { reply }, None)
                .await;
        call_reply("queue", result).map_err(AttendanceError::Actor)
    }

    /// Records of `kind` still waiting for delivery, oldest first.
    pub async fn pending(&self, kind: RecordKind) -> Result<Vec<QueuedRecord>, AttendanceError> {
        let result = ractor::rpc::call(
            &self.queue,
            |reply| QueueMessage::Pending { kind, reply },
            None,
        )
        .await;
        call_reply("queue", result).map_err(AttendanceError::Actor)
    }

    pub async fn snapshot(&self) -> Result<AttendanceSnapshot, AttendanceError> {
        let result = ractor::rpc::call(
            &self.attendance,
            |reply| AttendanceMessage::GetSnapshot { reply },
            None,
        )
        .await;
        call_reply("attendance", result).map_err(AttendanceError::Actor)
    }

    /// End the session and tear the runtime down.
    ///
    /// Refused while checked in or paused; the runtime keeps running in that
    /// case and is handed back with the error.
    pub async fn logout(self) -> Result<(), (Self, AttendanceError)> {
        let result = ractor::rpc::call(
            &self.attendance,
            |reply| AttendanceMessage::Logout { reply },
            None,
        )
        .await;
        match call_reply("attendance", result).map_err(AttendanceError::Actor) {
            Ok(Ok(())) => {
                self.shutdown().await;
                Ok(())
            }
            Ok(Err(e)) | Err(e) => Err((self, e)),
        }
    }

    /// Stop every actor and timer.
    pub async fn shutdown(self) {
        self.spawned.abandon().await;
        tracing::info!("Field runtime stopped");
    }
}

/// Actors started so far, stopped in reverse order of spawning.
#[derive(Default)]
struct Spawned {
    cells: Vec<ActorCell>,
    handles: Vec<JoinHandle<()>>,
}

impl Spawned {
    fn push(&mut self, cell: ActorCell, handle: JoinHandle<()>) {
        self.cells.push(cell);
        self.handles.push(handle);
    }

    async fn abandon(self) {
        for cell in self.cells.iter().rev() {
            cell.stop(None);
        }
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

fn spawn_err(actor: &'static str, e: ractor::SpawnErr) -> RuntimeError {
    RuntimeError::Spawn {
        actor,
        reason: e.to_string(),
    }
}
