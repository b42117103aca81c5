//! Durable, ordered queue of records waiting for delivery.

use std::future::Future;

use field_core::{QueuedRecord, RecordKind};

use crate::{Key, Storage, StorageError};

/// Outcome of a drain pass over one queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    /// Records the sender confirmed, in queue order.
    pub delivered: Vec<QueuedRecord>,
    /// Records left in the queue, in queue order.
    pub remaining: Vec<QueuedRecord>,
}

/// An ordered sequence of records of a single kind, mirrored to storage.
///
/// Every mutation rewrites the whole persisted sequence. If that write fails
/// the in-memory sequence is rolled back, so memory and storage never diverge
/// in a way that loses records.
pub struct DurableQueue {
    kind: RecordKind,
    storage: Storage,
    records: Vec<QueuedRecord>,
}

impl DurableQueue {
    /// Load the persisted sequence for `kind`; a missing entry is an empty queue.
    pub async fn load(storage: Storage, kind: RecordKind) -> Result<Self, StorageError> {
        let records: Vec<QueuedRecord> = storage
            .get_json(Key::for_queue(kind))
            .await?
            .unwrap_or_default();

        if !records.is_empty() {
            tracing::info!("Loaded {} queued {} records", records.len(), kind);
        }

        Ok(Self {
            kind,
            storage,
            records,
        })
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in retry order.
    pub fn records(&self) -> &[QueuedRecord] {
        &self.records
    }

    /// Append a record and persist the sequence.
    pub async fn enqueue(&mut self, record: QueuedRecord) -> Result<(), StorageError> {
        debug_assert_eq!(record.kind(), self.kind);
        let record_id = record.id;
        self.records.push(record);

        if let Err(e) = self.persist().await {
            self.records.pop();
            tracing::error!("Failed to persist {} queue: {}", self.kind, e);
            return Err(e);
        }

        tracing::debug!(
            "Queued {} record {} ({} pending)",
            self.kind,
            record_id,
            self.records.len()
        );
        Ok(())
    }

    /// Offer every record to `sender` from the head, removing the ones it
    /// confirms.
    ///
    /// A refused record stays in place and the pass moves on to the next one.
    /// When this returns `Ok`, the persisted sequence equals
    /// `report.remaining`. When persisting fails, the queue is restored to its
    /// content before the pass and nothing is reported as delivered.
    pub async fn drain<F, Fut>(&mut self, mut sender: F) -> Result<DrainReport, StorageError>
    where
        F: FnMut(QueuedRecord) -> Fut,
        Fut: Future<Output = bool>,
    {
        if self.records.is_empty() {
            return Ok(DrainReport::default());
        }

        let before = std::mem::take(&mut self.records);
        let mut report = DrainReport::default();

        for record in &before {
            if sender(record.clone()).await {
                report.delivered.push(record.clone());
            } else {
                report.remaining.push(record.clone());
            }
        }

        if report.delivered.is_empty() {
            self.records = before;
            return Ok(report);
        }

        self.records = report.remaining.clone();
        if let Err(e) = self.persist().await {
            tracing::error!(
                "Failed to persist {} queue after draining {} records: {}",
                self.kind,
                report.delivered.len(),
                e
            );
            self.records = before;
            return Err(e);
        }

        tracing::debug!(
            "Drained {} {} records, {} remaining",
            report.delivered.len(),
            self.kind,
            report.remaining.len()
        );
        Ok(report)
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let key = Key::for_queue(self.kind);
        if self.records.is_empty() {
            self.storage.delete(key).await
        } else {
            self.storage.put_json(key, &self.records).await
        }
    }
}
