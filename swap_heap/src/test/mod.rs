use std::sync::{Mutex, MutexGuard};

use crate::{init, term, SwapConfig};

mod chaining;
mod paging;

/// The engine and the fault handler are process-wide; tests touching them
/// cannot overlap.
static HEAP_TEST_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn lock_heap_tests() -> MutexGuard<'static, ()> {
    match HEAP_TEST_LOCK.lock() {
        // a previously panicked test poisoned the lock, the heap itself was
        // already reset by its TermGuard
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct TermGuard;

impl Drop for TermGuard {
    fn drop(&mut self) {
        term();
    }
}

/// Runs `f` against a fresh heap with room for `capacity` resident regions,
/// tearing the heap down afterwards even if `f` panics.
pub(crate) fn run_with_heap(test_name: &str, capacity: usize, f: impl FnOnce()) {
    let _lock = lock_heap_tests();

    init(
        format!("/tmp/{}.swapstore", test_name),
        SwapConfig {
            cache_capacity: capacity,
        },
    )
    .unwrap();

    let _term = TermGuard;
    f();
}
