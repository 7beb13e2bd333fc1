use ctor::ctor;
use std::sync::{Arc, Once};
use weft_runtime::{
    AttributionOutcome, BroadcastError, ElementRef, HandlerError, OverrideTable, SubscriptionId,
    TreeChangeEvent, TreeChangeHandler,
};
use weft_types::{Locator, SourceLocation};

static SOURCE_INFO_DISABLED_WARNING_ONCE: Once = Once::new();

#[ctor]
fn init_disabled_runtime() {
    emit_disabled_source_info_warning_once();
}

fn emit_disabled_source_info_warning_once() {
    let Some(value) = std::env::var_os("WEFT_SOURCE_INFO") else {
        return;
    };
    if value != "1" {
        return;
    }

    SOURCE_INFO_DISABLED_WARNING_ONCE.call_once(|| {
        eprintln!(
            "\n\x1b[1;31m\
======================================================================\n\
 WEFT WARNING: WEFT_SOURCE_INFO=1 is set, but weft diagnostics is disabled.\n\
 No source locations will be recorded in this build.\n\
 Enable the `diagnostics` cargo feature of `weft` to use them.\n\
======================================================================\x1b[0m\n"
        );
    });
}

#[must_use = "suppression ends as soon as the guard is dropped"]
pub struct SuppressionGuard;

#[inline(always)]
pub fn enter_suppressed() -> SuppressionGuard {
    SuppressionGuard
}

#[inline(always)]
pub fn is_suppressed() -> bool {
    false
}

#[inline(always)]
pub fn suppressed<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[inline(always)]
pub fn is_enabled() -> bool {
    false
}

#[inline(always)]
pub fn register_source_info<T>(_target: &Arc<T>, _locator: Locator, _line: u32, _column: u32)
where
    T: ?Sized + Send + Sync + 'static,
{
}

#[inline(always)]
pub fn register_caller<T>(_target: &Arc<T>)
where
    T: ?Sized + Send + Sync + 'static,
{
}

#[inline(always)]
pub fn get_source_info<T: ?Sized>(_target: &Arc<T>) -> Option<SourceLocation> {
    None
}

#[inline(always)]
pub fn attribute_from_construction_context<T>(_target: &Arc<T>) -> AttributionOutcome
where
    T: Send + Sync + 'static,
{
    AttributionOutcome::Disabled
}

#[inline(always)]
pub fn notify_added(
    _parent: Option<&ElementRef>,
    _child: &ElementRef,
    _index: Option<usize>,
) -> Result<(), BroadcastError> {
    Ok(())
}

#[inline(always)]
pub fn notify_removed(
    _parent: Option<&ElementRef>,
    _child: &ElementRef,
    _index: usize,
) -> Result<(), BroadcastError> {
    Ok(())
}

#[inline(always)]
pub fn subscribe<F>(_handler: F) -> SubscriptionId
where
    F: Fn(&TreeChangeEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    SubscriptionId::INACTIVE
}

#[inline(always)]
pub fn subscribe_handler(_handler: Arc<dyn TreeChangeHandler>) -> SubscriptionId {
    SubscriptionId::INACTIVE
}

#[inline(always)]
pub fn unsubscribe(_id: SubscriptionId) -> bool {
    false
}

#[inline(always)]
pub fn set_overrides(_table: OverrideTable) {}

#[inline(always)]
pub fn reset() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VisualTreeElement;

    struct Leaf;

    impl VisualTreeElement for Leaf {
        fn visual_children(&self) -> Vec<ElementRef> {
            Vec::new()
        }
    }

    #[test]
    fn every_entry_point_is_inert() {
        let leaf: ElementRef = Arc::new(Leaf);
        register_caller(&leaf);
        register_source_info(&leaf, Locator::file("leaf.rs"), 1, 1);

        assert!(!is_enabled());
        assert_eq!(get_source_info(&leaf), None);
        assert_eq!(
            attribute_from_construction_context(&Arc::new(Leaf)),
            AttributionOutcome::Disabled
        );
        notify_added(None, &leaf, Some(0)).expect("no-op add");
        notify_removed(None, &leaf, 0).expect("no-op remove");

        let id = subscribe(|_| Err("never called".into()));
        assert_eq!(id, SubscriptionId::INACTIVE);
        assert!(!unsubscribe(id));
    }

    #[test]
    fn suppression_guard_is_zero_sized() {
        assert_eq!(std::mem::size_of::<SuppressionGuard>(), 0);
        let _guard = enter_suppressed();
        assert!(!is_suppressed());
        assert_eq!(suppressed(|| 7), 7);
    }
}
