//! Linter cache: per-directory tool instances with throttled resolution.
//!
//! A directory without an instance is resolved inline, at most once per
//! throttle window. A directory with an instance answers immediately and may
//! spawn a background refresh whose outcome is reported on the event channel.
//! Nothing here polls for deleted binaries; callers evict after a failed
//! invocation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::fs::is_executable;
use crate::locator::BinaryLocator;

/// Channel capacity for background refresh events.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A resolved tool binary.
///
/// Instances are replaced, never mutated, when a directory is re-resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInstance {
    binary_path: PathBuf,
    valid: bool,
}

impl ToolInstance {
    #[must_use]
    pub fn new(binary_path: PathBuf, valid: bool) -> Self {
        Self { binary_path, valid }
    }

    /// Build an instance, deriving validity from the executable bit.
    pub async fn probe(binary_path: PathBuf) -> Self {
        let valid = is_executable(&binary_path).await;
        Self { binary_path, valid }
    }

    #[must_use]
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

#[derive(Debug, Default)]
struct CacheEntry {
    instance: Option<ToolInstance>,
    /// Stamped when a resolution completes, never on a throttled skip.
    last_updated: Option<Instant>,
    /// Advisory in-flight marker.
    updating: bool,
}

impl CacheEntry {
    fn is_throttled(&self, now: Instant, window: Duration) -> bool {
        self.last_updated
            .is_some_and(|at| now.saturating_duration_since(at) < window)
    }
}

/// Outcome of a background refresh.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// The directory now maps to a different instance (or none).
    Refreshed {
        directory: PathBuf,
        instance: Option<ToolInstance>,
    },
    RefreshFailed {
        directory: PathBuf,
        error: String,
    },
}

enum Plan {
    Hit(ToolInstance),
    HitAndRefresh(ToolInstance),
    Resolve,
    Throttled,
}

type Entries = Arc<Mutex<HashMap<PathBuf, CacheEntry>>>;

fn lock(
    entries: &Mutex<HashMap<PathBuf, CacheEntry>>,
) -> MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct LinterCache {
    entries: Entries,
    locator: Arc<BinaryLocator>,
    throttle: Duration,
    event_tx: mpsc::Sender<CacheEvent>,
}

impl LinterCache {
    /// Create a cache and the receiving end of its refresh event channel.
    pub fn new(
        locator: Arc<BinaryLocator>,
        throttle: Duration,
    ) -> (Self, mpsc::Receiver<CacheEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cache = Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            locator,
            throttle,
            event_tx,
        };
        (cache, event_rx)
    }

    /// Tool instance for `directory`, resolving it when due.
    pub async fn get(&self, directory: &Path) -> Option<ToolInstance> {
        match self.plan(directory) {
            Plan::Hit(instance) => Some(instance),
            Plan::HitAndRefresh(instance) => {
                self.spawn_refresh(directory.to_path_buf());
                Some(instance)
            }
            Plan::Throttled => {
                tracing::debug!(directory = %directory.display(), "Lookup throttled");
                None
            }
            Plan::Resolve => self.resolve(directory).await,
        }
    }

    fn plan(&self, directory: &Path) -> Plan {
        let now = Instant::now();
        let mut entries = lock(&self.entries);
        let entry = entries.entry(directory.to_path_buf()).or_default();
        let throttled = entry.is_throttled(now, self.throttle);
        match entry.instance.clone() {
            None if throttled => Plan::Throttled,
            None => {
                entry.updating = true;
                Plan::Resolve
            }
            Some(instance) if !entry.updating && !throttled => {
                entry.updating = true;
                Plan::HitAndRefresh(instance)
            }
            Some(instance) => Plan::Hit(instance),
        }
    }

    async fn resolve(&self, directory: &Path) -> Option<ToolInstance> {
        let instance = match self.locator.locate(directory).await {
            Ok(Some(path)) => Some(ToolInstance::probe(path).await),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(directory = %directory.display(), "Tool lookup failed: {e}");
                None
            }
        };

        match &instance {
            Some(found) => tracing::info!(
                directory = %directory.display(),
                binary = %found.binary_path().display(),
                valid = found.is_valid(),
                "Resolved lint tool"
            ),
            None => tracing::debug!(directory = %directory.display(), "No lint tool found"),
        }

        let mut entries = lock(&self.entries);
        let entry = entries.entry(directory.to_path_buf()).or_default();
        entry.instance.clone_from(&instance);
        entry.last_updated = Some(Instant::now());
        entry.updating = false;
        instance
    }

    fn spawn_refresh(&self, directory: PathBuf) {
        let entries = Arc::clone(&self.entries);
        let locator = Arc::clone(&self.locator);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let event = match locator.locate(&directory).await {
                Ok(found) => {
                    let fresh = match found {
                        Some(path) => Some(ToolInstance::probe(path).await),
                        None => None,
                    };
                    let mut guard = lock(&entries);
                    let entry = guard.entry(directory.clone()).or_default();
                    entry.last_updated = Some(Instant::now());
                    entry.updating = false;
                    if entry.instance == fresh {
                        None
                    } else {
                        entry.instance.clone_from(&fresh);
                        Some(CacheEvent::Refreshed {
                            directory,
                            instance: fresh,
                        })
                    }
                }
                Err(e) => {
                    let mut guard = lock(&entries);
                    let entry = guard.entry(directory.clone()).or_default();
                    entry.last_updated = Some(Instant::now());
                    entry.updating = false;
                    Some(CacheEvent::RefreshFailed {
                        directory,
                        error: e.to_string(),
                    })
                }
            };

            if let Some(event) = event
                && let Err(e) = event_tx.try_send(event)
            {
                tracing::debug!("Dropping cache refresh event: {e}");
            }
        });
    }

    /// Forget the instance for `directory` so the next `get` re-resolves
    /// immediately.
    pub fn evict(&self, directory: &Path) {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get_mut(directory) {
            tracing::debug!(directory = %directory.display(), "Evicting cached lint tool");
            entry.instance = None;
            entry.last_updated = None;
        }
    }

    /// Current instance without triggering any resolution.
    #[must_use]
    pub fn cached(&self, directory: &Path) -> Option<ToolInstance> {
        lock(&self.entries)
            .get(directory)
            .and_then(|entry| entry.instance.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessFut, ProcessOutput, ProcessRequest, ProcessRunner};
    use lintel_types::LookupSettings;
    use std::collections::VecDeque;
    use std::io;

    struct QueueRunner {
        responses: Mutex<VecDeque<ProcessOutput>>,
        calls: Mutex<usize>,
    }

    impl QueueRunner {
        fn new(responses: Vec<ProcessOutput>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl ProcessRunner for QueueRunner {
        fn run<'a>(&'a self, _request: &'a ProcessRequest) -> ProcessFut<'a> {
            *self.calls.lock().unwrap() += 1;
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ProcessOutput::exited(1, ""));
            Box::pin(async move { Ok::<_, io::Error>(response) })
        }
    }

    fn cache_with(runner: Arc<QueueRunner>) -> (LinterCache, mpsc::Receiver<CacheEvent>) {
        let locator = BinaryLocator::new(
            runner,
            LookupSettings::new("/opt/npm-which"),
            "eslint".to_string(),
        );
        LinterCache::new(Arc::new(locator), Duration::from_secs(60))
    }

    #[cfg(unix)]
    fn executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttles_repeated_misses() {
        let runner = QueueRunner::new(vec![]);
        let (cache, _rx) = cache_with(runner.clone());
        let dir = Path::new("/home/u/proj");

        assert!(cache.get(dir).await.is_none());
        assert!(cache.get(dir).await.is_none());
        assert_eq!(runner.calls(), 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get(dir).await.is_none());
        assert_eq!(runner.calls(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get(dir).await.is_none());
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_directories_are_independent() {
        let runner = QueueRunner::new(vec![]);
        let (cache, _rx) = cache_with(runner.clone());

        cache.get(Path::new("/home/u/a")).await;
        cache.get(Path::new("/home/u/b")).await;
        assert_eq!(runner.calls(), 2);
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn test_resolves_and_probes_instance() {
        let bin_dir = tempfile::tempdir().unwrap();
        let binary = executable(bin_dir.path(), "eslint");
        let runner = QueueRunner::new(vec![ProcessOutput::exited(
            0,
            binary.to_string_lossy().into_owned(),
        )]);
        let (cache, _rx) = cache_with(runner.clone());
        let dir = Path::new("/home/u/proj");

        let instance = cache.get(dir).await.unwrap();
        assert_eq!(instance.binary_path(), binary.as_path());
        assert!(instance.is_valid());

        // Within the window: served from cache, no refresh.
        let again = cache.get(dir).await.unwrap();
        assert_eq!(again, instance);
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_forces_immediate_resolution() {
        let runner = QueueRunner::new(vec![
            ProcessOutput::exited(0, "/missing/eslint"),
            ProcessOutput::exited(0, "/missing/eslint"),
        ]);
        let (cache, _rx) = cache_with(runner.clone());
        let dir = Path::new("/home/u/proj");

        let instance = cache.get(dir).await.unwrap();
        assert!(!instance.is_valid());
        assert!(cache.cached(dir).is_some());

        cache.evict(dir);
        assert!(cache.cached(dir).is_none());

        cache.get(dir).await.unwrap();
        assert_eq!(runner.calls(), 2);
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn test_background_refresh_replaces_changed_instance() {
        let bin_dir = tempfile::tempdir().unwrap();
        let old = executable(bin_dir.path(), "eslint-old");
        let new = executable(bin_dir.path(), "eslint-new");
        let runner = QueueRunner::new(vec![
            ProcessOutput::exited(0, old.to_string_lossy().into_owned()),
            ProcessOutput::exited(0, new.to_string_lossy().into_owned()),
        ]);
        let (cache, mut rx) = cache_with(runner.clone());
        let dir = Path::new("/home/u/proj");

        cache.get(dir).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        // Stale but present: answered immediately with the old instance.
        let served = cache.get(dir).await.unwrap();
        assert_eq!(served.binary_path(), old.as_path());

        match rx.recv().await.unwrap() {
            CacheEvent::Refreshed { directory, instance } => {
                assert_eq!(directory, dir);
                assert_eq!(instance.unwrap().binary_path(), new.as_path());
            }
            CacheEvent::RefreshFailed { error, .. } => panic!("refresh failed: {error}"),
        }
        assert_eq!(cache.cached(dir).unwrap().binary_path(), new.as_path());
        assert_eq!(runner.calls(), 2);
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_instance() {
        let bin_dir = tempfile::tempdir().unwrap();
        let binary = executable(bin_dir.path(), "eslint");
        let runner = QueueRunner::new(vec![
            ProcessOutput::exited(0, binary.to_string_lossy().into_owned()),
            ProcessOutput::exited(126, ""),
            ProcessOutput::exited(126, ""),
        ]);
        let (cache, mut rx) = cache_with(runner.clone());
        let dir = Path::new("/home/u/proj");

        cache.get(dir).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        let served = cache.get(dir).await.unwrap();
        assert_eq!(served.binary_path(), binary.as_path());

        match rx.recv().await.unwrap() {
            CacheEvent::RefreshFailed { directory, .. } => assert_eq!(directory, dir),
            CacheEvent::Refreshed { .. } => panic!("expected a failed refresh"),
        }
        // One lookup, then the self-healed retry.
        assert_eq!(runner.calls(), 3);
        assert_eq!(cache.cached(dir).unwrap().binary_path(), binary.as_path());

        // The failure still stamped the entry.
        cache.get(dir).await.unwrap();
        assert_eq!(runner.calls(), 3);
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn test_unchanged_refresh_emits_nothing() {
        let bin_dir = tempfile::tempdir().unwrap();
        let binary = executable(bin_dir.path(), "eslint");
        let path = binary.to_string_lossy().into_owned();
        let runner = QueueRunner::new(vec![
            ProcessOutput::exited(0, path.clone()),
            ProcessOutput::exited(0, path),
        ]);
        let (cache, mut rx) = cache_with(runner.clone());
        let dir = Path::new("/home/u/proj");

        cache.get(dir).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.get(dir).await.unwrap();

        // The refresh probes through the blocking pool; give it real time.
        for _ in 0..500 {
            tokio::task::yield_now().await;
            if !lock(&cache.entries)[dir].updating {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(runner.calls(), 2);
        assert!(rx.try_recv().is_err());

        // The refresh stamped the entry: no further refresh inside the window.
        cache.get(dir).await.unwrap();
        assert_eq!(runner.calls(), 2);
    }
}
