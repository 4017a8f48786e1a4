// crates/nods-providers/src/watch.rs
// ============================================================================
// Module: Polling File Watcher
// Description: Modification-time watcher dispatching reload callbacks.
// Purpose: Drive hot reload of catalogue and store files.
// Dependencies: nods-core, tracing
// ============================================================================

//! ## Overview
//! [`PollingWatcher`] records each registered file's modification time and
//! length. [`PollingWatcher::poll_once`] compares them with the filesystem
//! and fires the callbacks of changed files; [`FileWatcher::listen`] runs
//! that poll on a background thread. The thread holds a weak reference and
//! exits once the watcher is dropped.

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::SystemTime;

use nods_core::FileWatcher;
use nods_core::ReloadCallback;
use nods_core::WatchError;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Observed file state: modification time and length.
type Fingerprint = Option<(SystemTime, u64)>;

/// One watched file.
struct WatchEntry {
    /// Watched path.
    path: PathBuf,
    /// Last observed state.
    seen: Fingerprint,
    /// Callback fired on change.
    on_change: ReloadCallback,
}

/// Shared watcher state.
#[derive(Default)]
struct WatchState {
    /// Registered entries.
    entries: Mutex<Vec<WatchEntry>>,
}

/// Polling file watcher.
pub struct PollingWatcher {
    /// Shared state.
    state: Arc<WatchState>,
    /// Poll interval for the background thread.
    interval: Duration,
    /// Set once the background thread has started.
    listening: AtomicBool,
}

impl PollingWatcher {
    /// Creates a watcher polling every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Arc::new(WatchState::default()),
            interval,
            listening: AtomicBool::new(false),
        }
    }

    /// Checks every watched file once and fires callbacks for changed files.
    ///
    /// Returns the number of callbacks fired.
    pub fn poll_once(&self) -> usize {
        poll_state(&self.state)
    }

    /// Returns the number of watched files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileWatcher for PollingWatcher {
    fn add(&self, path: &Path, on_change: ReloadCallback) -> Result<(), WatchError> {
        if path.as_os_str().is_empty() {
            return Err(WatchError::Register("empty path".to_string()));
        }
        let entry = WatchEntry {
            path: path.to_path_buf(),
            seen: fingerprint(path),
            on_change,
        };
        self.state.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
        debug!(path = %path.display(), "watching file");
        Ok(())
    }

    fn listen(&self) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        let state = Arc::downgrade(&self.state);
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name("nods-file-watch".to_string())
            .spawn(move || watch_loop(&state, interval));
        match spawned {
            Ok(_) => info!(interval_ms = interval.as_millis(), "file watcher listening"),
            Err(err) => {
                self.listening.store(false, Ordering::SeqCst);
                warn!(error = %err, "file watcher thread failed to start");
            }
        }
    }
}

/// Polls until the watcher is dropped.
fn watch_loop(state: &Weak<WatchState>, interval: Duration) {
    loop {
        thread::sleep(interval);
        let Some(state) = state.upgrade() else {
            debug!("file watcher stopped");
            return;
        };
        poll_state(&state);
    }
}

/// Compares fingerprints and fires callbacks outside the lock.
fn poll_state(state: &WatchState) -> usize {
    let changed: Vec<(PathBuf, ReloadCallback)> = {
        let mut entries = state.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter_mut()
            .filter_map(|entry| {
                let current = fingerprint(&entry.path);
                if current == entry.seen {
                    return None;
                }
                entry.seen = current;
                Some((entry.path.clone(), Arc::clone(&entry.on_change)))
            })
            .collect()
    };
    for (path, callback) in &changed {
        info!(path = %path.display(), "watched file changed");
        callback();
    }
    changed.len()
}

/// Reads the current fingerprint of `path`.
fn fingerprint(path: &Path) -> Fingerprint {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use nods_core::FileWatcher;
    use tempfile::TempDir;

    use super::PollingWatcher;

    /// Tests that a content change fires exactly once.
    #[test]
    fn change_fires_callback_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ipsum.json");
        fs::write(&path, b"[]").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let watcher = PollingWatcher::new(Duration::from_secs(60));
        let counter = Arc::clone(&hits);
        watcher
            .add(&path, Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert_eq!(watcher.poll_once(), 0);
        fs::write(&path, b"[{\"Item\":\"ip/ipsum/x\"}]").unwrap();
        assert_eq!(watcher.poll_once(), 1);
        assert_eq!(watcher.poll_once(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    /// Tests that a file appearing later counts as a change.
    #[test]
    fn created_file_is_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.json");
        let watcher = PollingWatcher::new(Duration::from_secs(60));
        watcher.add(&path, Arc::new(|| {})).unwrap();
        assert_eq!(watcher.poll_once(), 0);
        fs::write(&path, b"{}").unwrap();
        assert_eq!(watcher.poll_once(), 1);
        assert_eq!(watcher.len(), 1);
    }
}
