//! Delivery seam between the sync core and the remote service.

use std::future::Future;
use std::pin::Pin;

use api::{ApiClient, TransportError};
use field_core::RecordBody;

/// Result of a single delivery attempt.
pub type TransportResult = Result<(), TransportError>;

/// Future type for async deliveries.
pub type TransportFuture = Pin<Box<dyn Future<Output = TransportResult> + Send>>;

/// Sends one record to the remote service.
///
/// Implementations make exactly one attempt; retrying is the sync engine's job.
pub trait Transport: Send + Sync + 'static {
    fn deliver(&self, body: &RecordBody) -> TransportFuture;
}

impl Transport for ApiClient {
    fn deliver(&self, body: &RecordBody) -> TransportFuture {
        let client = self.clone();
        let body = body.clone();
        Box::pin(async move { client.post_record(&body).await })
    }
}

/// A function-based transport.
pub struct FnTransport<F>
where
    F: Fn(&RecordBody) -> TransportFuture + Send + Sync + 'static,
{
    deliver: F,
}

impl<F> FnTransport<F>
where
    F: Fn(&RecordBody) -> TransportFuture + Send + Sync + 'static,
{
    pub fn new(deliver: F) -> Self {
        Self { deliver }
    }
}

impl<F> Transport for FnTransport<F>
where
    F: Fn(&RecordBody) -> TransportFuture + Send + Sync + 'static,
{
    fn deliver(&self, body: &RecordBody) -> TransportFuture {
        (self.deliver)(body)
    }
}
