//! Synchronous broadcast of structural changes in the element hierarchy.

use parking_lot::RwLock;
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;
use weft_types::TreeChangeKind;

use crate::gate::EnablementGate;

pub type ElementRef = Arc<dyn VisualTreeElement>;

pub type HandlerError = Box<dyn Error + Send + Sync>;

/// A node of the element hierarchy as seen by diagnostics.
pub trait VisualTreeElement: Any + Send + Sync {
    /// Current children, in visual order.
    fn visual_children(&self) -> Vec<ElementRef>;

    /// Short name shown to inspectors. Defaults to the type name without its path.
    fn tag_name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }
}

pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

pub fn same_element(a: &ElementRef, b: &ElementRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Position of `child` among the current children of `parent`.
pub fn index_of(parent: &ElementRef, child: &ElementRef) -> Option<usize> {
    parent
        .visual_children()
        .iter()
        .position(|candidate| same_element(candidate, child))
}

#[derive(Clone)]
pub struct TreeChangeEvent {
    pub parent: Option<ElementRef>,
    pub child: ElementRef,
    /// Position of the child under its parent; `None` when it could not be determined.
    pub index: Option<usize>,
    pub kind: TreeChangeKind,
}

impl fmt::Debug for TreeChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeChangeEvent")
            .field("parent", &self.parent.as_ref().map(|p| p.tag_name()))
            .field("child", &self.child.tag_name())
            .field("index", &self.index)
            .field("kind", &self.kind)
            .finish()
    }
}

pub trait TreeChangeHandler: Send + Sync {
    fn on_tree_change(&self, event: &TreeChangeEvent) -> Result<(), HandlerError>;
}

struct FnHandler<F>(F);

impl<F> TreeChangeHandler for FnHandler<F>
where
    F: Fn(&TreeChangeEvent) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_tree_change(&self, event: &TreeChangeEvent) -> Result<(), HandlerError> {
        (self.0)(event)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Never handed out by a broadcaster; returned where subscribing is a no-op.
    pub const INACTIVE: Self = Self(0);
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happens when a subscriber fails while an event is being delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop delivery and hand the failure to the mutating caller.
    #[default]
    Propagate,
    /// Log the failure (errors and panics alike) and keep delivering.
    Isolate,
}

impl FailurePolicy {
    /// Anything but `isolate` means [`FailurePolicy::Propagate`].
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("isolate") => Self::Isolate,
            _ => Self::Propagate,
        }
    }
}

#[derive(Debug)]
pub struct BroadcastError {
    pub subscription: SubscriptionId,
    pub source: HandlerError,
}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree change subscriber {} failed: {}", self.subscription, self.source)
    }
}

impl Error for BroadcastError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.source)
    }
}

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    handler: Arc<dyn TreeChangeHandler>,
}

/// Delivers tree change events on the mutating thread, in subscription order.
///
/// Publishing works on a snapshot of the subscriber list, so handlers may
/// subscribe or unsubscribe while an event is in flight; the change applies
/// from the next event on.
pub struct TreeChangeBroadcaster {
    gate: EnablementGate,
    policy: RwLock<FailurePolicy>,
    next_id: AtomicU64,
    subscribers: RwLock<Arc<[Subscriber]>>,
}

impl TreeChangeBroadcaster {
    pub fn new(gate: EnablementGate, policy: FailurePolicy) -> Self {
        Self {
            gate,
            policy: RwLock::new(policy),
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(Arc::from(Vec::new())),
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        *self.policy.read()
    }

    pub fn set_failure_policy(&self, policy: FailurePolicy) {
        *self.policy.write() = policy;
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&TreeChangeEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe_handler(Arc::new(FnHandler(handler)))
    }

    pub fn subscribe_handler(&self, handler: Arc<dyn TreeChangeHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.subscribers.write();
        let mut next = subscribers.to_vec();
        next.push(Subscriber { id, handler });
        *subscribers = next.into();
        id
    }

    /// Returns whether the subscription was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        if !subscribers.iter().any(|s| s.id == id) {
            return false;
        }
        let next: Vec<Subscriber> = subscribers.iter().filter(|s| s.id != id).cloned().collect();
        *subscribers = next.into();
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn clear(&self) {
        *self.subscribers.write() = Arc::from(Vec::new());
    }

    /// Announces that `child` was inserted under `parent`.
    ///
    /// Without an explicit `index` the child's current position among the
    /// parent's children is used.
    pub fn notify_added(
        &self,
        parent: Option<&ElementRef>,
        child: &ElementRef,
        index: Option<usize>,
    ) -> Result<(), BroadcastError> {
        if !self.gate.is_enabled() {
            return Ok(());
        }
        let Some(subscribers) = self.snapshot() else {
            return Ok(());
        };
        let index = index.or_else(|| parent.and_then(|parent| index_of(parent, child)));
        self.deliver(
            &subscribers,
            &TreeChangeEvent {
                parent: parent.cloned(),
                child: Arc::clone(child),
                index,
                kind: TreeChangeKind::Add,
            },
        )
    }

    /// Announces that `child` was removed from `parent`, where it sat at `index`.
    pub fn notify_removed(
        &self,
        parent: Option<&ElementRef>,
        child: &ElementRef,
        index: usize,
    ) -> Result<(), BroadcastError> {
        if !self.gate.is_enabled() {
            return Ok(());
        }
        let Some(subscribers) = self.snapshot() else {
            return Ok(());
        };
        self.deliver(
            &subscribers,
            &TreeChangeEvent {
                parent: parent.cloned(),
                child: Arc::clone(child),
                index: Some(index),
                kind: TreeChangeKind::Remove,
            },
        )
    }

    fn snapshot(&self) -> Option<Arc<[Subscriber]>> {
        let subscribers = Arc::clone(&self.subscribers.read());
        (!subscribers.is_empty()).then_some(subscribers)
    }

    fn deliver(
        &self,
        subscribers: &[Subscriber],
        event: &TreeChangeEvent,
    ) -> Result<(), BroadcastError> {
        let policy = self.failure_policy();
        for subscriber in subscribers {
            match policy {
                FailurePolicy::Propagate => {
                    subscriber
                        .handler
                        .on_tree_change(event)
                        .map_err(|source| BroadcastError {
                            subscription: subscriber.id,
                            source,
                        })?;
                }
                FailurePolicy::Isolate => {
                    let delivered =
                        catch_unwind(AssertUnwindSafe(|| subscriber.handler.on_tree_change(event)));
                    match delivered {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => warn!(
                            subscription = %subscriber.id,
                            %error,
                            "tree change subscriber failed"
                        ),
                        Err(_) => warn!(
                            subscription = %subscriber.id,
                            "tree change subscriber panicked"
                        ),
                    }
                }
            }
        }
        Ok(())
    }
}
