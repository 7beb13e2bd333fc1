use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;
use weft_types::SourceLocation;

use crate::gate::EnablementGate;
use crate::suppress;

const MIN_SWEEP_THRESHOLD: usize = 64;

trait Liveness: Send + Sync {
    fn is_alive(&self) -> bool;
}

impl<T: ?Sized + Send + Sync> Liveness for Weak<T> {
    fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }
}

struct Association {
    target: Box<dyn Liveness>,
    location: SourceLocation,
}

/// Object identity of an `Arc`: the address of its payload.
///
/// Addresses are stable keys because every association holds a `Weak` to its
/// allocation, so the address cannot be handed to another object until the
/// entry has been evicted.
fn identity<T: ?Sized>(target: &Arc<T>) -> usize {
    Arc::as_ptr(target).cast::<()>() as usize
}

/// Weak-keyed map from objects to the place that created them.
///
/// The store never keeps a target alive. Once the last strong reference to a
/// target is dropped its association is dead: [`purge`](Self::purge) (or the
/// sweep that runs as the table grows) evicts it.
pub struct SourceLocationStore {
    gate: EnablementGate,
    entries: RwLock<HashMap<usize, Association>>,
    sweep_at: AtomicUsize,
}

impl SourceLocationStore {
    pub fn new(gate: EnablementGate) -> Self {
        Self {
            gate,
            entries: RwLock::new(HashMap::new()),
            sweep_at: AtomicUsize::new(MIN_SWEEP_THRESHOLD),
        }
    }

    /// Associates `location` with `target`, replacing any earlier association.
    ///
    /// Does nothing when the gate is closed or the calling thread is suppressed.
    pub fn register<T>(&self, target: &Arc<T>, location: SourceLocation)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if !self.gate.is_enabled() || suppress::is_suppressed() {
            return;
        }

        let key = identity(target);
        let association = Association {
            target: Box::new(Arc::downgrade(target)),
            location,
        };

        let mut entries = self.entries.write();
        entries.insert(key, association);

        if entries.len() >= self.sweep_at.load(Ordering::Relaxed) {
            let evicted = sweep(&mut entries);
            let next = (entries.len() * 2).max(MIN_SWEEP_THRESHOLD);
            self.sweep_at.store(next, Ordering::Relaxed);
            trace!(evicted, live = entries.len(), next, "swept source location store");
        }
    }

    pub fn get<T: ?Sized>(&self, target: &Arc<T>) -> Option<SourceLocation> {
        let entries = self.entries.read();
        let association = entries.get(&identity(target))?;
        association
            .target
            .is_alive()
            .then(|| association.location.clone())
    }

    pub fn contains<T: ?Sized>(&self, target: &Arc<T>) -> bool {
        self.get(target).is_some()
    }

    /// Evicts every association whose target has been dropped and returns how
    /// many were removed.
    pub fn purge(&self) -> usize {
        sweep(&mut self.entries.write())
    }

    /// Entries currently held, including dead ones awaiting a purge.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Purges, then reports the number of live associations.
    pub fn live_len(&self) -> usize {
        let mut entries = self.entries.write();
        sweep(&mut entries);
        entries.len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.sweep_at.store(MIN_SWEEP_THRESHOLD, Ordering::Relaxed);
    }
}

fn sweep(entries: &mut HashMap<usize, Association>) -> usize {
    let before = entries.len();
    entries.retain(|_, association| association.target.is_alive());
    before - entries.len()
}
