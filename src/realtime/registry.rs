use crate::domain_model::EventKind;
use crate::logger::*;
use dashmap::DashMap;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub type Listener = dyn Fn(&Value) + Send + Sync;

struct ListenerEntry {
    id: u64,
    listener: Arc<Listener>,
    registrations: usize,
}

/// Per-kind listener lists, in registration order.
///
/// Registering the same `Arc` twice for one kind keeps a single entry with
/// a registration count: the listener still runs once per event, and it
/// leaves the list only after every registration has been removed.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<EventKind, Vec<ListenerEntry>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: EventKind, listener: Arc<Listener>) -> u64 {
        let mut entries = self.listeners.entry(kind).or_default();
        if let Some(entry) = entries
            .iter_mut()
            .find(|e| Arc::ptr_eq(&e.listener, &listener))
        {
            entry.registrations += 1;
            return entry.id;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        entries.push(ListenerEntry {
            id,
            listener,
            registrations: 1,
        });
        id
    }

    /// Drops one registration. Returns false when nothing matched.
    pub fn remove(&self, kind: EventKind, id: u64) -> bool {
        let Some(mut entries) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let Some(pos) = entries.iter().position(|e| e.id == id) else {
            return false;
        };
        entries[pos].registrations -= 1;
        if entries[pos].registrations == 0 {
            entries.remove(pos);
        }
        true
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, |entries| entries.len())
    }

    /// Runs every listener of `kind` with `data` and returns how many ran.
    /// The list is snapshotted first so listeners may (un)subscribe freely.
    pub fn dispatch(&self, kind: EventKind, data: &Value) -> usize {
        let listeners: Vec<Arc<Listener>> = match self.listeners.get(&kind) {
            Some(entries) => entries.iter().map(|e| e.listener.clone()).collect(),
            None => return 0,
        };
        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(data))).is_err() {
                error!(kind = %kind, "realtime listener panicked");
            }
        }
        listeners.len()
    }
}

/// Handle for one registration. Dropping it keeps the listener registered.
#[must_use = "the listener stays registered until `unsubscribe` is called"]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(registry: &Arc<ListenerRegistry>, kind: EventKind, id: u64) -> Self {
        Subscription {
            registry: Arc::downgrade(registry),
            kind,
            id,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.kind, self.id))
    }
}
