use bridge_traits::dom::{DomEvent, DomEventKind, EventCallback, EventDisposition, ListenerId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

struct Entry {
    id: ListenerId,
    kind: DomEventKind,
    callback: EventCallback,
}

/// Listener table shared by every headless event target.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, kind: DomEventKind, callback: EventCallback) -> ListenerId {
        let id = ListenerId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.entries.lock().push(Entry { id, kind, callback });
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn count_for(&self, kind: DomEventKind) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    /// Invoke every listener for the event's kind. The table is snapshotted
    /// first so callbacks may add or remove listeners.
    pub(crate) fn dispatch(&self, event: &DomEvent) -> EventDisposition {
        let kind = event.kind();
        let callbacks: Vec<EventCallback> = self
            .entries
            .lock()
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.callback.clone())
            .collect();

        let mut disposition = EventDisposition::Continue;
        for callback in callbacks {
            if callback(event) == EventDisposition::PreventDefault {
                disposition = EventDisposition::PreventDefault;
            }
        }
        disposition
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
