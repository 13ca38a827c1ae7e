//! Shared test helpers for creating DownloadCoordinator instances in tests.

use crate::config::Config;
use crate::coordinator::DownloadCoordinator;
use crate::engine::{TransferEngine, TransferEventSink};
use crate::error::{Error, Result};
use crate::store::MemoryStore;
use crate::types::RequestId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use url::Url;

/// Engine that records calls and never transfers anything
///
/// Tests drive the coordinator by feeding synthetic events to its sink.
#[derive(Default)]
pub(crate) struct RecordingEngine {
    begun: Mutex<Vec<RequestId>>,
    cancelled: Mutex<Vec<RequestId>>,
    refuse: AtomicBool,
    report_cancel: AtomicBool,
    sink: OnceLock<Arc<dyn TransferEventSink>>,
}

impl RecordingEngine {
    pub(crate) fn begun(&self) -> Vec<RequestId> {
        self.begun.lock().unwrap().clone()
    }

    pub(crate) fn cancelled(&self) -> Vec<RequestId> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Make every following `begin` fail
    pub(crate) fn refuse_begin(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    /// Report `failed` for a cancelled transfer from inside `cancel`, like a real engine
    pub(crate) fn report_on_cancel(&self) {
        self.report_cancel.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransferEngine for RecordingEngine {
    async fn begin(&self, id: &RequestId, _source: &Url) -> Result<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::Engine("engine unavailable".to_string()));
        }
        self.begun.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn cancel(&self, id: &RequestId) -> Result<()> {
        self.cancelled.lock().unwrap().push(id.clone());
        if self.report_cancel.load(Ordering::SeqCst)
            && let Some(sink) = self.sink.get()
        {
            sink.failed(id.clone(), "transfer cancelled".to_string());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Config with every path inside `dir`
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.session.temp_dir = dir.join("temp");
    config.persistence.database_path = dir.join("background-dl.db");
    config.drain.timeout = Some(Duration::from_secs(5));
    config
}

/// Coordinator over `durable` with a recording engine
pub(crate) async fn coordinator_with(
    config: Config,
    durable: Arc<MemoryStore>,
) -> (DownloadCoordinator, Arc<RecordingEngine>) {
    let engine = Arc::new(RecordingEngine::default());
    let factory_engine = engine.clone();
    let coordinator = DownloadCoordinator::with_store(config, durable, move |sink| {
        let _ = factory_engine.sink.set(sink);
        Ok(factory_engine as Arc<dyn TransferEngine>)
    })
    .await
    .unwrap();
    (coordinator, engine)
}

/// Helper to create a test coordinator backed by an in-memory store.
/// Returns the coordinator, its engine, its store and the tempdir (which must be kept alive).
pub(crate) async fn create_test_coordinator() -> (
    DownloadCoordinator,
    Arc<RecordingEngine>,
    Arc<MemoryStore>,
    TempDir,
) {
    let temp_dir = tempdir().unwrap();
    let durable = Arc::new(MemoryStore::new());
    let (coordinator, engine) =
        coordinator_with(test_config(temp_dir.path()), durable.clone()).await;
    (coordinator, engine, durable, temp_dir)
}

pub(crate) fn source(name: &str) -> Url {
    Url::parse(&format!("https://example.com/files/{}", name)).unwrap()
}

/// Simulate a payload the engine left in its own temporary directory
pub(crate) fn engine_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let engine_dir = dir.join("engine");
    std::fs::create_dir_all(&engine_dir).unwrap();
    let path = engine_dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Wait for the first event matching `predicate`, skipping others
pub(crate) async fn wait_for_event(
    events: &mut tokio::sync::broadcast::Receiver<crate::types::Event>,
    predicate: impl Fn(&crate::types::Event) -> bool,
) -> crate::types::Event {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .unwrap();
        if predicate(&event) {
            return event;
        }
    }
}
