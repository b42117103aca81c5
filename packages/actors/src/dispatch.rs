//! Dispatch engine: deliver now, or queue for the next drain pass.

use std::sync::Arc;

use api::TransportError;
use field_core::{QueuedRecord, SyncTrigger};
use ractor::ActorRef;
use tokio::sync::watch;

use crate::DispatchError;
use crate::messages::{QueueMessage, SyncMessage, call_reply};
use crate::transport::Transport;

/// Why a record went to the queue instead of the remote service.
#[derive(Debug, Clone)]
pub enum QueueReason {
    Offline,
    Transport(TransportError),
}

impl std::fmt::Display for QueueReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueReason::Offline => write!(f, "offline"),
            QueueReason::Transport(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Delivered,
    /// Saved locally; a later drain pass will retry it.
    Queued { reason: QueueReason },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered)
    }
}

/// Sends records with a single attempt, falling back to the durable queue.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    online: watch::Receiver<bool>,
    queue: ActorRef<QueueMessage>,
    sync: ActorRef<SyncMessage>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        online: watch::Receiver<bool>,
        queue: ActorRef<QueueMessage>,
        sync: ActorRef<SyncMessage>,
    ) -> Self {
        Self {
            transport,
            online,
            queue,
            sync,
        }
    }

    /// Deliver `record` or queue it.
    ///
    /// Transport failures never surface here; the only error is failing to
    /// queue.
    pub async fn dispatch(&self, record: QueuedRecord) -> Result<DispatchOutcome, DispatchError> {
        let online = *self.online.borrow();
        if !online {
            return self.enqueue(record, QueueReason::Offline).await;
        }

        match self.transport.deliver(&record.body).await {
            Ok(()) => {
                tracing::debug!("Delivered {} record {}", record.kind(), record.id);
                let counters = call_reply(
                    "queue",
                    ractor::rpc::call(
                        &self.queue,
                        |reply| QueueMessage::Delivered {
                            record: Box::new(record),
                            reply,
                        },
                        None,
                    )
                    .await,
                )
                .map_err(DispatchError::Actor)?;

                if counters.unsynced > 0 {
                    let _ = self.sync.send_message(SyncMessage::Trigger {
                        trigger: SyncTrigger::PostDispatch,
                        reply: None,
                    });
                }
                Ok(DispatchOutcome::Delivered)
            }
            Err(e) => {
                tracing::warn!(
                    "Delivery of {} record {} failed, queuing: {}",
                    record.kind(),
                    record.id,
                    e
                );
                self.enqueue(record, QueueReason::Transport(e)).await
            }
        }
    }

    async fn enqueue(
        &self,
        record: QueuedRecord,
        reason: QueueReason,
    ) -> Result<DispatchOutcome, DispatchError> {
        let reason_text = reason.to_string();
        call_reply(
            "queue",
            ractor::rpc::call(
                &self.queue,
                |reply| QueueMessage::Enqueue {
                    record: Box::new(record),
                    reason: reason_text,
                    reply,
                },
                None,
            )
            .await,
        )
        .map_err(DispatchError::Actor)??;

        Ok(DispatchOutcome::Queued { reason })
    }
}
