//! Sync actor: at most one drain pass at a time.

use std::time::Duration;

use chrono::Utc;
use field_core::{SyncEvent, SyncTrigger};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::messages::{DrainSummary, QueueMessage, SyncMessage, TriggerOutcome, call_reply};

pub struct SyncActorArgs {
    pub queue: ActorRef<QueueMessage>,
    pub online: watch::Receiver<bool>,
    pub event_tx: broadcast::Sender<SyncEvent>,
    pub tick_interval: Duration,
}

pub struct SyncActorState {
    queue: ActorRef<QueueMessage>,
    online: watch::Receiver<bool>,
    event_tx: broadcast::Sender<SyncEvent>,
    syncing: bool,
    ticker: Option<JoinHandle<()>>,
}

impl SyncActorState {
    fn trigger(&mut self, myself: &ActorRef<SyncMessage>, trigger: SyncTrigger) -> TriggerOutcome {
        if self.syncing {
            tracing::debug!("Sync already running, ignoring {} trigger", trigger);
            return TriggerOutcome::AlreadySyncing;
        }
        if !*self.online.borrow() {
            tracing::debug!("Offline, skipping {} sync", trigger);
            return TriggerOutcome::Offline;
        }

        self.syncing = true;
        tracing::info!("Sync started ({})", trigger);
        let _ = self.event_tx.send(SyncEvent::SyncStarted {
            trigger,
            timestamp: Utc::now(),
        });

        let queue = self.queue.clone();
        let myself = myself.clone();
        tokio::spawn(async move {
            let result = ractor::rpc::call(&queue, |reply| QueueMessage::Drain { reply }, None).await;
            let result = match call_reply("queue", result) {
                Ok(Ok(summary)) => Ok(summary),
                Ok(Err(e)) => Err((e.partial, e.to_string())),
                Err(e) => Err((DrainSummary::default(), e)),
            };
            // Always report back so the guard is released.
            let _ = myself.send_message(SyncMessage::PassFinished { result });
        });

        TriggerOutcome::Started
    }
}

pub struct SyncActor;

impl Actor for SyncActor {
    type Msg = SyncMessage;
    type State = SyncActorState;
    type Arguments = SyncActorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting sync actor (tick every {:?})", args.tick_interval);

        let myself_clone = myself.clone();
        let period = args.tick_interval;
        let ticker = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if myself_clone.send_message(SyncMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(SyncActorState {
            queue: args.queue,
            online: args.online,
            event_tx: args.event_tx,
            syncing: false,
            ticker: Some(ticker),
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SyncMessage::Trigger { trigger, reply } => {
                let outcome = state.trigger(&myself, trigger);
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }

            SyncMessage::PassFinished { result } => {
                state.syncing = false;
                let event = match result {
                    Ok(summary) => {
                        tracing::info!(
                            "Sync finished: {} delivered, {} remaining",
                            summary.delivered,
                            summary.remaining
                        );
                        SyncEvent::SyncFinished {
                            delivered: summary.delivered,
                            remaining: summary.remaining,
                            error: None,
                            timestamp: Utc::now(),
                        }
                    }
                    Err((partial, e)) => {
                        tracing::error!(
                            "Sync pass failed after {} deliveries: {}",
                            partial.delivered,
                            e
                        );
                        let remaining = ractor::rpc::call(
                            &state.queue,
                            |reply| QueueMessage::GetCounters { reply },
                            None,
                        )
                        .await;
                        let remaining = call_reply("queue", remaining)
                            .map(|c| c.unsynced)
                            .unwrap_or_default();
                        SyncEvent::SyncFinished {
                            delivered: partial.delivered,
                            remaining,
                            error: Some(e),
                            timestamp: Utc::now(),
                        }
                    }
                };
                let _ = state.event_tx.send(event);
            }

            SyncMessage::IsSyncing { reply } => {
                let _ = reply.send(state.syncing);
            }

            SyncMessage::Tick => {
                state.trigger(&myself, SyncTrigger::Periodic);
            }
        }

        Ok(())
    }
}
