//! Named disposable resources.

use crate::error::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type Disposer = Box<dyn FnOnce() -> Result<()> + Send>;

/// What a registered resource is, for statistics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    MediaElement,
    DocumentFrame,
    Timer,
    Subscription,
    Other,
}

struct Resource {
    kind: ResourceKind,
    registered_at: Instant,
    disposer: Disposer,
}

/// Snapshot of what the manager currently tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStats {
    pub total: usize,
    pub media_elements: usize,
    pub document_frames: usize,
    pub timers: usize,
    pub subscriptions: usize,
    pub other: usize,
    /// Age of the oldest resource.
    pub oldest_age: Option<Duration>,
}

/// Registry of named resources, each with a disposer run exactly once.
///
/// Registering a name that is already present disposes the previous
/// resource first. Disposer failures are logged and never stop the sweep.
#[derive(Default)]
pub struct ResourceManager {
    resources: Mutex<HashMap<String, Resource>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, kind: ResourceKind, disposer: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let name = name.into();
        let previous = self.resources.lock().insert(
            name.clone(),
            Resource {
                kind,
                registered_at: Instant::now(),
                disposer: Box::new(disposer),
            },
        );

        if let Some(previous) = previous {
            debug!(resource = %name, "Replacing registered resource");
            dispose(&name, previous);
        }
    }

    /// Track a spawned task; disposal aborts it.
    pub fn register_timer(&self, name: impl Into<String>, handle: AbortHandle) {
        self.register(name, ResourceKind::Timer, move || {
            handle.abort();
            Ok(())
        });
    }

    /// Dispose one resource now. Returns `false` if the name is unknown.
    pub fn release(&self, name: &str) -> bool {
        let resource = self.resources.lock().remove(name);
        match resource {
            Some(resource) => {
                dispose(name, resource);
                true
            }
            None => false,
        }
    }

    /// Forget a resource without running its disposer.
    pub fn forget(&self, name: &str) -> bool {
        self.resources.lock().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.resources.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ResourceStats {
        let resources = self.resources.lock();
        let now = Instant::now();
        let mut stats = ResourceStats {
            total: resources.len(),
            ..ResourceStats::default()
        };

        for resource in resources.values() {
            match resource.kind {
                ResourceKind::MediaElement => stats.media_elements += 1,
                ResourceKind::DocumentFrame => stats.document_frames += 1,
                ResourceKind::Timer => stats.timers += 1,
                ResourceKind::Subscription => stats.subscriptions += 1,
                ResourceKind::Other => stats.other += 1,
            }
            let age = now.saturating_duration_since(resource.registered_at);
            stats.oldest_age = Some(stats.oldest_age.map_or(age, |oldest| oldest.max(age)));
        }
        stats
    }

    /// Dispose every resource registered longer than `max_age` ago.
    pub fn sweep_older_than(&self, max_age: Duration) -> usize {
        self.sweep_older_than_except(max_age, &[])
    }

    /// Like [`sweep_older_than`](Self::sweep_older_than), sparing the named
    /// resources whatever their age.
    pub fn sweep_older_than_except(&self, max_age: Duration, keep: &[&str]) -> usize {
        let now = Instant::now();
        let stale: Vec<(String, Resource)> = {
            let mut resources = self.resources.lock();
            let names: Vec<String> = resources
                .iter()
                .filter(|(name, _)| !keep.contains(&name.as_str()))
                .filter(|(_, resource)| now.saturating_duration_since(resource.registered_at) > max_age)
                .map(|(name, _)| name.clone())
                .collect();
            names
                .into_iter()
                .filter_map(|name| resources.remove(&name).map(|resource| (name, resource)))
                .collect()
        };

        let swept = stale.len();
        for (name, resource) in stale {
            dispose(&name, resource);
        }
        if swept > 0 {
            info!("Swept {} stale resources", swept);
        }
        swept
    }

    /// Dispose everything. A second call finds nothing to do.
    pub fn cleanup(&self) {
        let drained: Vec<(String, Resource)> = self.resources.lock().drain().collect();
        if drained.is_empty() {
            return;
        }
        debug!("Disposing {} resources", drained.len());
        for (name, resource) in drained {
            dispose(&name, resource);
        }
    }
}

fn dispose(name: &str, resource: Resource) {
    if let Err(e) = (resource.disposer)() {
        warn!(resource = %name, kind = ?resource.kind, "Failed to dispose resource: {}", e);
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("resources", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybackError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_disposer(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> Result<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_cleanup_runs_each_disposer_once() {
        let manager = ResourceManager::new();
        let disposed = Arc::new(AtomicUsize::new(0));

        manager.register("a", ResourceKind::Other, counter_disposer(&disposed));
        manager.register("b", ResourceKind::Subscription, counter_disposer(&disposed));

        manager.cleanup();
        manager.cleanup();

        assert_eq!(disposed.load(Ordering::SeqCst), 2);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_reregistration_disposes_previous() {
        let manager = ResourceManager::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        manager.register("handler", ResourceKind::MediaElement, counter_disposer(&first));
        manager.register("handler", ResourceKind::MediaElement, counter_disposer(&second));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_failing_disposer_does_not_stop_cleanup() {
        let manager = ResourceManager::new();
        let disposed = Arc::new(AtomicUsize::new(0));

        manager.register("bad", ResourceKind::Other, || {
            Err(PlaybackError::Persistence("boom".into()))
        });
        manager.register("good", ResourceKind::Other, counter_disposer(&disposed));

        manager.cleanup();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_and_forget() {
        let manager = ResourceManager::new();
        let disposed = Arc::new(AtomicUsize::new(0));

        manager.register("x", ResourceKind::Other, counter_disposer(&disposed));
        manager.register("y", ResourceKind::Other, counter_disposer(&disposed));

        assert!(manager.release("x"));
        assert!(!manager.release("x"));
        assert!(manager.forget("y"));
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_and_stats() {
        let manager = ResourceManager::new();
        let disposed = Arc::new(AtomicUsize::new(0));

        manager.register("old", ResourceKind::DocumentFrame, counter_disposer(&disposed));
        tokio::time::advance(Duration::from_secs(60)).await;
        manager.register("fresh", ResourceKind::MediaElement, counter_disposer(&disposed));

        let stats = manager.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.document_frames, 1);
        assert_eq!(stats.media_elements, 1);
        assert_eq!(stats.oldest_age, Some(Duration::from_secs(60)));

        assert_eq!(manager.sweep_older_than(Duration::from_secs(30)), 1);
        assert!(manager.contains("fresh"));
        assert!(!manager.contains("old"));
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(
            manager.sweep_older_than_except(Duration::from_secs(30), &["fresh"]),
            0
        );
        assert!(manager.contains("fresh"));
    }

    #[tokio::test]
    async fn test_timer_is_aborted() {
        let manager = ResourceManager::new();
        let (alive, dropped) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _alive = alive;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        manager.register_timer("heartbeat", handle.abort_handle());
        assert_eq!(manager.stats().timers, 1);
        manager.cleanup();

        // the sender is dropped only when the task is cancelled
        assert!(dropped.await.is_err());
    }
}
