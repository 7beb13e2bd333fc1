//! Runtime diagnostics for element graphs: where each object was created,
//! and a live feed of structural changes for external inspectors.
//!
//! All work is gated by [`EnablementGate`]; with the gate closed every entry
//! point returns before allocating.

use std::panic::Location;
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub mod attribute;
pub mod config;
pub mod frames;
pub mod gate;
pub mod relay;
pub mod store;
pub mod suppress;
pub mod tree;

pub use attribute::{
    AttributionConfig, AttributionOutcome, CallStackAttributor, FrameClass, OverrideTable,
};
pub use config::{ConfigError, RuntimeConfig};
pub use frames::{BacktraceWalker, StackFrame, StackWalker, SyntheticStack};
pub use gate::EnablementGate;
pub use relay::{DiagnosticSink, MutationRelay, mutation_message};
pub use store::SourceLocationStore;
pub use suppress::{SuppressionGuard, enter_suppressed, is_suppressed, suppressed};
pub use tree::{
    BroadcastError, ElementRef, FailurePolicy, HandlerError, SubscriptionId, TreeChangeBroadcaster,
    TreeChangeEvent, TreeChangeHandler, VisualTreeElement,
};
pub use weft_types::{Locator, SourceLocation, TreeChangeKind};

/// One complete diagnostics runtime: store, attributor and broadcaster
/// sharing a gate.
pub struct Diagnostics {
    gate: EnablementGate,
    store: SourceLocationStore,
    attributor: CallStackAttributor,
    broadcaster: TreeChangeBroadcaster,
    configured: RuntimeConfig,
}

impl Diagnostics {
    pub fn new(gate: EnablementGate, config: RuntimeConfig) -> Self {
        Self::with_walker(gate, config, BacktraceWalker)
    }

    pub fn with_walker(
        gate: EnablementGate,
        config: RuntimeConfig,
        walker: impl StackWalker + 'static,
    ) -> Self {
        let attributor = CallStackAttributor::with_walker(gate, config.attribution.clone(), walker);
        attributor.set_overrides(config.overrides.clone());
        Self {
            gate,
            store: SourceLocationStore::new(gate),
            attributor,
            broadcaster: TreeChangeBroadcaster::new(gate, config.failure_policy),
            configured: config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(EnablementGate::process(), RuntimeConfig::from_env())
    }

    pub fn is_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    pub fn store(&self) -> &SourceLocationStore {
        &self.store
    }

    pub fn attributor(&self) -> &CallStackAttributor {
        &self.attributor
    }

    pub fn broadcaster(&self) -> &TreeChangeBroadcaster {
        &self.broadcaster
    }

    pub fn register_source_info<T>(&self, target: &Arc<T>, locator: Locator, line: u32, column: u32)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.store
            .register(target, SourceLocation::new(locator, line, column));
    }

    /// Records the caller's file, line and column for `target`.
    #[track_caller]
    pub fn register_caller<T>(&self, target: &Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if !self.gate.is_enabled() || is_suppressed() {
            return;
        }
        let caller = Location::caller();
        self.store.register(
            target,
            SourceLocation::new(file_locator(caller.file()), caller.line(), caller.column()),
        );
    }

    #[inline(never)]
    pub fn attribute_from_construction_context<T>(&self, target: &Arc<T>) -> AttributionOutcome
    where
        T: Send + Sync + 'static,
    {
        self.attributor.attribute(target, &self.store)
    }

    pub fn get_source_info<T: ?Sized>(&self, target: &Arc<T>) -> Option<SourceLocation> {
        self.store.get(target)
    }

    pub fn notify_added(
        &self,
        parent: Option<&ElementRef>,
        child: &ElementRef,
        index: Option<usize>,
    ) -> Result<(), BroadcastError> {
        self.broadcaster.notify_added(parent, child, index)
    }

    pub fn notify_removed(
        &self,
        parent: Option<&ElementRef>,
        child: &ElementRef,
        index: usize,
    ) -> Result<(), BroadcastError> {
        self.broadcaster.notify_removed(parent, child, index)
    }

    /// Forgets every association and subscriber and restores the configured
    /// override table and failure policy.
    pub fn reset(&self) {
        self.store.clear();
        self.broadcaster.clear();
        self.broadcaster
            .set_failure_policy(self.configured.failure_policy);
        self.attributor
            .set_overrides(self.configured.overrides.clone());
    }
}

fn file_locator(file: &str) -> Locator {
    if Path::new(file).is_absolute() {
        Locator::file(format!("file://{file}"))
    } else {
        Locator::file(file)
    }
}

static DIAGNOSTICS: OnceLock<Diagnostics> = OnceLock::new();

/// The process-wide runtime, configured from the environment on first use.
///
/// The gated free functions only reach it once the gate is open. The
/// subscription functions and [`set_overrides`] build it even with the gate
/// closed, so their first call reads [`config::OVERRIDES_ENV`] (and the file
/// it names) and [`config::SUBSCRIBER_FAILURES_ENV`] in a process that may
/// never enable diagnostics.
pub fn global() -> &'static Diagnostics {
    DIAGNOSTICS.get_or_init(Diagnostics::from_env)
}

#[inline]
pub fn is_enabled() -> bool {
    EnablementGate::process().is_enabled()
}

pub fn register_source_info<T>(target: &Arc<T>, locator: Locator, line: u32, column: u32)
where
    T: ?Sized + Send + Sync + 'static,
{
    if !is_enabled() {
        return;
    }
    global().register_source_info(target, locator, line, column);
}

#[track_caller]
pub fn register_caller<T>(target: &Arc<T>)
where
    T: ?Sized + Send + Sync + 'static,
{
    if !is_enabled() {
        return;
    }
    global().register_caller(target);
}

pub fn get_source_info<T: ?Sized>(target: &Arc<T>) -> Option<SourceLocation> {
    if !is_enabled() {
        return None;
    }
    global().get_source_info(target)
}

/// Attributes `target` to the code that called its constructor. Call it from
/// inside the constructor, after the object has been built.
#[inline(never)]
pub fn attribute_from_construction_context<T>(target: &Arc<T>) -> AttributionOutcome
where
    T: Send + Sync + 'static,
{
    if !is_enabled() {
        return AttributionOutcome::Disabled;
    }
    global().attribute_from_construction_context(target)
}

pub fn notify_added(
    parent: Option<&ElementRef>,
    child: &ElementRef,
    index: Option<usize>,
) -> Result<(), BroadcastError> {
    if !is_enabled() {
        return Ok(());
    }
    global().notify_added(parent, child, index)
}

pub fn notify_removed(
    parent: Option<&ElementRef>,
    child: &ElementRef,
    index: usize,
) -> Result<(), BroadcastError> {
    if !is_enabled() {
        return Ok(());
    }
    global().notify_removed(parent, child, index)
}

pub fn subscribe<F>(handler: F) -> SubscriptionId
where
    F: Fn(&TreeChangeEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    global().broadcaster().subscribe(handler)
}

pub fn subscribe_handler(handler: Arc<dyn TreeChangeHandler>) -> SubscriptionId {
    global().broadcaster().subscribe_handler(handler)
}

pub fn unsubscribe(id: SubscriptionId) -> bool {
    global().broadcaster().unsubscribe(id)
}

pub fn set_overrides(table: OverrideTable) {
    global().attributor().set_overrides(table);
}

pub fn reset() {
    if let Some(diagnostics) = DIAGNOSTICS.get() {
        diagnostics.reset();
    }
}
