//! Event listener bookkeeping.
//!
//! Every listener a handler installs on a platform node goes through a
//! [`ListenerManager`], so a single [`cleanup`](ListenerManager::cleanup)
//! detaches all of them. Targets are held weakly: a node that was already
//! dropped has nothing left to detach.

use bridge_traits::{DomEventKind, EventCallback, EventTarget, ListenerId, TargetId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

type Remover = Box<dyn FnOnce() -> bool + Send>;

struct Registration {
    target: TargetId,
    kind: DomEventKind,
    id: ListenerId,
    remover: Remover,
}

/// Registry of installed listeners.
pub struct ListenerManager {
    label: &'static str,
    registrations: Mutex<Vec<Registration>>,
    cleaning: AtomicBool,
}

impl ListenerManager {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            registrations: Mutex::new(Vec::new()),
            cleaning: AtomicBool::new(false),
        }
    }

    /// Install `callback` on `target` and remember how to remove it.
    pub fn add<T>(&self, target: &Arc<T>, kind: DomEventKind, callback: EventCallback) -> ListenerId
    where
        T: EventTarget + ?Sized + 'static,
    {
        let id = target.add_event_listener(kind, callback);
        let weak: Weak<T> = Arc::downgrade(target);
        let remover: Remover = Box::new(move || match weak.upgrade() {
            Some(target) => target.remove_event_listener(id),
            None => false,
        });

        trace!(manager = self.label, ?kind, listener = id.value(), "listener added");
        self.registrations.lock().push(Registration {
            target: target.target_id(),
            kind,
            id,
            remover,
        });
        id
    }

    /// Detach every listener installed on one target. Returns how many were
    /// still attached.
    pub fn remove_for_target(&self, target: TargetId) -> usize {
        let removed: Vec<Registration> = {
            let mut registrations = self.registrations.lock();
            let (matching, rest) = registrations
                .drain(..)
                .partition(|registration| registration.target == target);
            *registrations = rest;
            matching
        };

        let mut detached = 0;
        for registration in removed {
            trace!(kind = ?registration.kind, listener = registration.id.value(), "removing listener");
            if (registration.remover)() {
                detached += 1;
            }
        }
        detached
    }

    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detach everything. Safe to call repeatedly and from within a
    /// listener; a nested call returns immediately.
    pub fn cleanup(&self) {
        if self.cleaning.swap(true, Ordering::AcqRel) {
            return;
        }

        let drained: Vec<Registration> = std::mem::take(&mut *self.registrations.lock());
        let total = drained.len();
        let detached = drained
            .into_iter()
            .map(|registration| (registration.remover)())
            .filter(|detached| *detached)
            .count();

        if total > 0 {
            debug!(manager = self.label, total, detached, "listeners cleaned up");
        }
        self.cleaning.store(false, Ordering::Release);
    }
}

impl Drop for ListenerManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for ListenerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerManager")
            .field("label", &self.label)
            .field("listeners", &self.len())
            .finish()
    }
}
