//! Connectivity monitor.
//!
//! Folds the platform's network-state snapshots into a single online flag,
//! published on a watch channel so the dispatch engine and sync actor can read
//! it without a round-trip.

use chrono::Utc;
use field_core::{SyncEvent, SyncTrigger};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::{broadcast, watch};

use crate::messages::{ConnectivityMessage, SyncMessage};

/// One snapshot of the device's network state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStatus {
    pub is_connected: bool,
    pub is_internet_reachable: bool,
}

impl NetworkStatus {
    pub fn online() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: true,
        }
    }

    pub fn offline() -> Self {
        Self::default()
    }

    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable
    }
}

pub struct ConnectivityActorArgs {
    pub online_tx: watch::Sender<bool>,
    pub sync: ActorRef<SyncMessage>,
    pub event_tx: broadcast::Sender<SyncEvent>,
}

pub struct ConnectivityActorState {
    last: NetworkStatus,
    online_tx: watch::Sender<bool>,
    sync: ActorRef<SyncMessage>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl ConnectivityActorState {
    fn apply(&mut self, status: NetworkStatus) {
        if status == self.last {
            return;
        }
        let was_online = self.last.is_online();
        self.last = status;

        let online = status.is_online();
        if online == was_online {
            tracing::debug!("Network state changed without crossing online: {:?}", status);
            return;
        }

        self.online_tx.send_replace(online);
        let _ = self.event_tx.send(SyncEvent::ConnectivityChanged {
            online,
            timestamp: Utc::now(),
        });

        if online {
            tracing::info!("Connectivity restored");
            let _ = self.sync.send_message(SyncMessage::Trigger {
                trigger: SyncTrigger::ConnectivityRestored,
                reply: None,
            });
        } else {
            tracing::info!("Connectivity lost");
        }
    }
}

pub struct ConnectivityActor;

impl Actor for ConnectivityActor {
    type Msg = ConnectivityMessage;
    type State = ConnectivityActorState;
    type Arguments = ConnectivityActorArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        // Offline until the first snapshot says otherwise.
        args.online_tx.send_replace(false);
        Ok(ConnectivityActorState {
            last: NetworkStatus::offline(),
            online_tx: args.online_tx,
            sync: args.sync,
            event_tx: args.event_tx,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ConnectivityMessage::Update(status) => state.apply(status),
        }
        Ok(())
    }
}
