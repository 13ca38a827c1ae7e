//! Test configuration helpers for creating coordinators backed by the HTTP engine

use background_dl::{Config, DownloadCoordinator, HttpTransferEngine, TransferEngine};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Config with every path inside `dir`
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.session.temp_dir = dir.join("temp");
    config.session.request_timeout = Some(Duration::from_secs(10));
    config.persistence.database_path = dir.join("background-dl.db");
    config.drain.timeout = Some(Duration::from_secs(10));
    config
}

/// Create a SQLite-backed coordinator driving a real [`HttpTransferEngine`]
pub async fn create_http_coordinator(config: Config) -> DownloadCoordinator {
    let session = config.session.clone();
    DownloadCoordinator::new(config, move |sink| {
        Ok(Arc::new(HttpTransferEngine::new(&session, sink)?) as Arc<dyn TransferEngine>)
    })
    .await
    .expect("failed to create coordinator")
}

/// Create a coordinator in a fresh temp directory
///
/// Returns the coordinator and the tempdir (which must be kept alive).
pub async fn create_test_coordinator() -> (DownloadCoordinator, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let coordinator = create_http_coordinator(test_config(temp_dir.path())).await;
    (coordinator, temp_dir)
}
