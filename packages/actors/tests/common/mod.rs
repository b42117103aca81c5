#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{FieldRuntime, NetworkStatus, RuntimeConfig, Transport, TransportFuture};
use api::TransportError;
use field_core::{
    AttendanceEvent, Intent, LocationFix, PendingLocationPing, QueuedRecord, RecordBody, Session,
    Site, SyncEvent,
};
use storage::{AppState, DurableQueue, Storage, StorageConfig};
use tokio::sync::{Notify, Semaphore, broadcast};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Script {
    delivered: Mutex<Vec<RecordBody>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
    entered: Notify,
}

/// In-process transport that records what it was asked to send.
///
/// Can be switched to fail every delivery, or held so deliveries block until
/// released.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    pub fn set_failing(&self, failing: bool) {
        self.script.failing.store(failing, Ordering::SeqCst);
    }

    /// Block every delivery until [`ScriptedTransport::release`].
    pub fn hold(&self) {
        *self.script.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.script.gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Resolves once a delivery has started.
    pub async fn entered(&self) {
        tokio::time::timeout(WAIT, self.script.entered.notified())
            .await
            .expect("no delivery started");
    }

    pub fn attempts(&self) -> usize {
        self.script.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<RecordBody> {
        self.script.delivered.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn deliver(&self, body: &RecordBody) -> TransportFuture {
        let script = self.script.clone();
        let body = body.clone();
        Box::pin(async move {
            script.attempts.fetch_add(1, Ordering::SeqCst);
            script.entered.notify_one();

            let gate = script.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.acquire()
                    .await
                    .map_err(|e| TransportError::Network(e.to_string()))?
                    .forget();
            }

            if script.failing.load(Ordering::SeqCst) {
                return Err(TransportError::Network("connection refused".into()));
            }
            script.delivered.lock().unwrap().push(body);
            Ok(())
        })
    }
}

pub async fn memory_state() -> AppState {
    AppState::new(Storage::new(StorageConfig::memory()).await.unwrap())
}

pub async fn fs_state(root: &std::path::Path) -> AppState {
    AppState::new(
        Storage::new(StorageConfig::filesystem(root))
            .await
            .unwrap(),
    )
}

pub fn session() -> Session {
    Session::new("7", "tok")
}

/// A site in northern Bogotá.
pub fn site() -> Site {
    Site {
        id: "42".into(),
        name: "Nodo Norte".into(),
        latitude: 4.7110,
        longitude: -74.0721,
    }
}

/// About 1 km from [`site`].
pub fn near_fix() -> LocationFix {
    LocationFix::new(4.7200, -74.0721)
}

/// Medellín, roughly 240 km from [`site`].
pub fn far_fix() -> LocationFix {
    LocationFix::new(6.2442, -75.5812)
}

pub fn attendance_record(intent: Intent, comment: &str) -> QueuedRecord {
    QueuedRecord::new(AttendanceEvent::new(
        intent,
        "7",
        &site(),
        None,
        comment,
        &near_fix(),
    ))
}

pub fn ping_record() -> QueuedRecord {
    QueuedRecord::new(PendingLocationPing::new("7", "42", &near_fix()))
}

/// Put records straight into their persisted queues, as a previous run would
/// have left them.
pub async fn seed(app_state: &AppState, records: Vec<QueuedRecord>) {
    for record in records {
        let mut queue = DurableQueue::load(app_state.storage().clone(), record.kind())
            .await
            .unwrap();
        queue.enqueue(record).await.unwrap();
    }
}

/// Timers long enough that they never fire during a test.
pub fn quiet_config() -> RuntimeConfig {
    RuntimeConfig::default()
        .with_report_interval(Duration::from_secs(3600))
        .with_sync_interval(Duration::from_secs(3600))
}

pub async fn start(app_state: AppState, transport: &ScriptedTransport) -> FieldRuntime {
    FieldRuntime::start(quiet_config(), app_state, session(), transport.as_transport())
        .await
        .unwrap()
}

/// Select [`site`] and report a fix next to it.
pub async fn ready_at_site(runtime: &FieldRuntime) {
    runtime.select_site(Some(site())).await.unwrap();
    runtime.update_location(near_fix()).unwrap();
}

/// Go online and wait for the pass the online edge starts.
pub async fn go_online(runtime: &FieldRuntime) {
    let mut rx = runtime.subscribe();
    runtime.network_changed(NetworkStatus::online()).unwrap();
    next_matching(&mut rx, |e| matches!(e, SyncEvent::SyncFinished { .. })).await;
}

pub async fn go_offline(runtime: &FieldRuntime) {
    runtime.network_changed(NetworkStatus::offline()).unwrap();
    eventually(|| async move { !runtime.is_online() }).await;
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Receive events until one matches.
pub async fn next_matching<F>(rx: &mut broadcast::Receiver<SyncEvent>, mut pred: F) -> SyncEvent
where
    F: FnMut(&SyncEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not received in time")
}
