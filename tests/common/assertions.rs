//! Custom test assertions for integration tests

use background_dl::Event;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Wait for the first event matching `predicate`
///
/// Returns `None` on timeout or when the channel closes.
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    predicate: impl Fn(&Event) -> bool,
) -> Option<Event> {
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Assert that a file exists and holds exactly `expected`
pub fn assert_file_contents(path: &Path, expected: &[u8]) {
    let actual = std::fs::read(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e));
    assert_eq!(actual, expected, "unexpected contents in {}", path.display());
}

/// Assert that a directory holds no entries (a missing directory counts as empty)
pub fn assert_dir_empty(path: &Path) {
    if let Ok(entries) = std::fs::read_dir(path) {
        let names: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.file_name()).collect();
        assert!(names.is_empty(), "{} is not empty: {:?}", path.display(), names);
    }
}
