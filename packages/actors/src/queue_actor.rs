//! Queue actor owning both durable queues and the delivery counters.

use std::sync::Arc;

use chrono::Utc;
use field_core::{QueuedRecord, RecordKind, SyncCounters, SyncEvent};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use storage::{DurableQueue, Storage, StorageError};
use tokio::sync::broadcast;

use crate::DrainError;
use crate::messages::{DrainSummary, QueueMessage};
use crate::transport::Transport;

/// Arguments for spawning the queue actor.
pub struct QueueActorArgs {
    pub storage: Storage,
    pub transport: Arc<dyn Transport>,
    pub event_tx: broadcast::Sender<SyncEvent>,
}

/// State for the queue actor.
pub struct QueueActorState {
    attendance: DurableQueue,
    pings: DurableQueue,
    /// Records confirmed by the remote service since start-up.
    synced: u64,
    transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl QueueActorState {
    fn queue_mut(&mut self, kind: RecordKind) -> &mut DurableQueue {
        match kind {
            RecordKind::Attendance => &mut self.attendance,
            RecordKind::LocationPing => &mut self.pings,
        }
    }

    fn queue(&self, kind: RecordKind) -> &DurableQueue {
        match kind {
            RecordKind::Attendance => &self.attendance,
            RecordKind::LocationPing => &self.pings,
        }
    }

    fn counters(&self) -> SyncCounters {
        SyncCounters {
            synced: self.synced,
            unsynced: (self.attendance.len() + self.pings.len()) as u64,
        }
    }

    fn broadcast(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event);
    }

    fn update_counters(&self) -> SyncCounters {
        let counters = self.counters();
        self.broadcast(SyncEvent::CountersUpdated {
            counters,
            timestamp: Utc::now(),
        });
        counters
    }

    async fn enqueue(
        &mut self,
        record: QueuedRecord,
        reason: String,
    ) -> Result<SyncCounters, StorageError> {
        let record_id = record.id;
        let kind = record.kind();
        self.queue_mut(kind).enqueue(record).await?;

        self.broadcast(SyncEvent::RecordQueued {
            record_id,
            kind,
            reason,
            timestamp: Utc::now(),
        });
        Ok(self.update_counters())
    }

    fn delivered(&mut self, record: &QueuedRecord) -> SyncCounters {
        self.synced += 1;
        self.broadcast(SyncEvent::RecordDelivered {
            record_id: record.id,
            kind: record.kind(),
            deferred: false,
            timestamp: Utc::now(),
        });
        self.update_counters()
    }

    /// Drain attendance events first, then location pings.
    ///
    /// Stops at the first persistence failure; counters and the error's
    /// partial summary reflect the sub-drains that completed.
    async fn drain_all(&mut self) -> Result<DrainSummary, DrainError> {
        let mut summary = DrainSummary::default();

        for kind in RecordKind::DRAIN_ORDER {
            let transport = self.transport.clone();
            let report = self
                .queue_mut(kind)
                .drain(move |record| {
                    let transport = transport.clone();
                    async move {
                        match transport.deliver(&record.body).await {
                            Ok(()) => true,
                            Err(e) => {
                                tracing::debug!(
                                    "Retry of {} record {} failed: {}",
                                    record.kind(),
                                    record.id,
                                    e
                                );
                                false
                            }
                        }
                    }
                })
                .await;
            let report = match report {
                Ok(report) => report,
                Err(source) => {
                    summary.remaining = self.counters().unsynced;
                    return Err(DrainError {
                        partial: summary,
                        source,
                    });
                }
            };

            self.synced += report.delivered.len() as u64;
            summary.delivered += report.delivered.len() as u64;
            for record in &report.delivered {
                self.broadcast(SyncEvent::RecordDelivered {
                    record_id: record.id,
                    kind,
                    deferred: true,
                    timestamp: Utc::now(),
                });
            }
            if !report.delivered.is_empty() {
                self.update_counters();
            }
        }

        summary.remaining = self.counters().unsynced;
        Ok(summary)
    }
}

/// Queue actor serializing every enqueue and drain.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueActorArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let attendance = DurableQueue::load(args.storage.clone(), RecordKind::Attendance).await?;
        let pings = DurableQueue::load(args.storage, RecordKind::LocationPing).await?;
        tracing::info!(
            "Starting queue actor ({} attendance, {} location records pending)",
            attendance.len(),
            pings.len()
        );

        let state = QueueActorState {
            attendance,
            pings,
            synced: 0,
            transport: args.transport,
            event_tx: args.event_tx,
        };
        state.update_counters();
        Ok(state)
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Enqueue {
                record,
                reason,
                reply,
            } => {
                let _ = reply.send(state.enqueue(*record, reason).await);
            }

            QueueMessage::Delivered { record, reply } => {
                let _ = reply.send(state.delivered(&record));
            }

            QueueMessage::Drain { reply } => {
                let _ = reply.send(state.drain_all().await);
            }

            QueueMessage::GetCounters { reply } => {
                let _ = reply.send(state.counters());
            }

            QueueMessage::Pending { kind, reply } => {
                let _ = reply.send(state.queue(kind).records().to_vec());
            }
        }

        Ok(())
    }
}
