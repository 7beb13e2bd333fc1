//! Per-thread suppression of source attribution.
//!
//! Framework code that constructs elements on the user's behalf enters a
//! suppressed scope so those objects are not attributed to whatever user
//! frame happens to be further up the stack.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static SUPPRESSION_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Keeps the current thread suppressed until dropped.
///
/// Guards nest: suppression clears only once every guard has been dropped.
#[must_use = "suppression ends as soon as the guard is dropped"]
pub struct SuppressionGuard {
    // The counter is thread-local, so the guard must be released on the
    // thread that created it.
    _not_send: PhantomData<*const ()>,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        let _ = SUPPRESSION_DEPTH.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

pub fn enter_suppressed() -> SuppressionGuard {
    let _ = SUPPRESSION_DEPTH.try_with(|depth| depth.set(depth.get() + 1));
    SuppressionGuard {
        _not_send: PhantomData,
    }
}

pub fn is_suppressed() -> bool {
    SUPPRESSION_DEPTH
        .try_with(|depth| depth.get() > 0)
        .unwrap_or(false)
}

/// Runs `f` with attribution suppressed on this thread.
pub fn suppressed<R>(f: impl FnOnce() -> R) -> R {
    let _guard = enter_suppressed();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_guards_compose() {
        assert!(!is_suppressed());
        let outer = enter_suppressed();
        let inner = enter_suppressed();
        drop(inner);
        assert!(is_suppressed(), "one guard still held");
        drop(outer);
        assert!(!is_suppressed());
    }

    #[test]
    fn guard_released_when_scope_panics() {
        let result = std::panic::catch_unwind(|| {
            let _guard = enter_suppressed();
            assert!(is_suppressed());
            panic!("element construction failed");
        });
        assert!(result.is_err());
        assert!(!is_suppressed());
    }

    #[test]
    fn suppression_is_per_thread() {
        let _guard = enter_suppressed();
        let other = std::thread::spawn(is_suppressed)
            .join()
            .expect("other thread should not panic");
        assert!(!other);
        assert!(is_suppressed());
    }

    #[test]
    fn suppressed_helper_scopes_closure() {
        let inside = suppressed(is_suppressed);
        assert!(inside);
        assert!(!is_suppressed());
    }
}
