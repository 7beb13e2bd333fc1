use ctor::ctor;

pub use weft_runtime::{
    SuppressionGuard, attribute_from_construction_context, enter_suppressed, get_source_info,
    global, is_enabled, is_suppressed, notify_added, notify_removed, register_caller,
    register_source_info, reset, set_overrides, subscribe, subscribe_handler, suppressed,
    unsubscribe,
};

#[ctor]
fn init_diagnostics_runtime() {
    if weft_runtime::is_enabled() {
        let _ = weft_runtime::global();
    }
}
