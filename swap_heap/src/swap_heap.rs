use core::{
    mem::{self, MaybeUninit},
    ptr::{addr_of, addr_of_mut, null_mut, NonNull},
    sync::atomic::{AtomicBool, Ordering},
};
use std::path::PathBuf;

use libc::{c_int, c_void, siginfo_t, SA_SIGINFO, SIGSEGV, SIG_DFL, SIG_IGN};
use log::{info, warn};

use crate::{
    config::SwapConfig,
    error::SwapError,
    modules::{backing_store::FileBackingStore, fault_context},
    stats::SwapStats,
    swap_engine::{FaultOutcome, SwapEngine},
};

/*
 * ENGINE           - the process-wide paging engine, set between init and term
 * PREVIOUS_SIGSEGV - handler that was installed before ours, chained for
 *                    faults outside our regions
 * IN_HANDLER       - guards the no-recursive-fault invariant
 */
static mut ENGINE: Option<SwapEngine<FileBackingStore>> = None;
static mut PREVIOUS_SIGSEGV: MaybeUninit<libc::sigaction> = MaybeUninit::uninit();
static IN_HANDLER: AtomicBool = AtomicBool::new(false);

fn engine() -> Option<&'static mut SwapEngine<FileBackingStore>> {
    // one mutator plus synchronous fault delivery: faults are only raised by
    // mutator instructions, never while an engine method is on the stack, so
    // there is never a second live reference
    unsafe { (*addr_of_mut!(ENGINE)).as_mut() }
}

fn set_engine(value: Option<SwapEngine<FileBackingStore>>) {
    unsafe { *addr_of_mut!(ENGINE) = value };
}

/// Opens the backing store at `path`, prepares the paging engine and installs
/// the fault handler.
///
/// Has to be called before the first `allocate`. Panics if the engine is
/// already initialized.
pub fn init(path: impl Into<PathBuf>, config: SwapConfig) -> Result<(), SwapError> {
    if !fault_context::is_supported() {
        return Err(SwapError::UnsupportedPlatform);
    }
    assert!(engine().is_none(), "already initialized, call term() first");

    let store = FileBackingStore::new(path)?;
    set_engine(Some(SwapEngine::new(store, config.cache_capacity)));

    // the handler goes in last: every earlier failure leaves the previously
    // installed handler untouched
    if let Err(err) = install_handler() {
        set_engine(None);
        return Err(err);
    }

    info!(
        "paging engine ready, resident cache capacity: {} regions",
        config.cache_capacity
    );
    Ok(())
}

/// Uninstalls the fault handler, releases all remaining reservations and
/// closes the backing store.
///
/// Resident dirty regions are not flushed; drain with `while writeback()? {}`
/// beforehand if the bytes are still needed.
pub fn term() {
    assert!(engine().is_some(), "term() without init()");

    // the handler comes out first so no fault can reach a dropped engine
    let previous = unsafe { (*addr_of!(PREVIOUS_SIGSEGV)).as_ptr() };
    if unsafe { libc::sigaction(SIGSEGV, previous, null_mut()) } != 0 {
        warn!("could not restore the previous SIGSEGV handler");
    }

    set_engine(None);
}

/// Allocates `size` bytes of pageable memory.
///
/// The returned address is page-aligned and behaves like ordinary memory:
/// reads return previously written bytes even after the region was evicted to
/// the store in between.
pub fn allocate(size: usize) -> Result<NonNull<u8>, SwapError> {
    engine().expect("allocate() before init()").allocate(size)
}

/// Releases the region starting at `addr`.
///
/// Addresses that were never returned by `allocate`, or were already freed,
/// are ignored.
pub fn free(addr: *mut u8) -> Result<(), SwapError> {
    engine().expect("free() before init()").free(addr as usize)
}

/// Evicts the oldest resident region, flushing it to the store if dirty.
///
/// Returns whether a queue entry was consumed; `false` means the queue was
/// empty, so `while writeback()? {}` drains everything.
pub fn writeback() -> Result<bool, SwapError> {
    engine().expect("writeback() before init()").write_back()
}

/// Snapshot of the usage counters.
pub fn stats() -> SwapStats {
    engine().expect("stats() before init()").stats()
}

fn install_handler() -> Result<(), SwapError> {
    let mut action: libc::sigaction = unsafe { mem::zeroed() };
    action.sa_sigaction = fault_handler as usize;
    action.sa_flags = SA_SIGINFO;
    unsafe { libc::sigemptyset(&mut action.sa_mask) };

    let previous = unsafe { (*addr_of_mut!(PREVIOUS_SIGSEGV)).as_mut_ptr() };
    if unsafe { libc::sigaction(SIGSEGV, &action, previous) } != 0 {
        return Err(SwapError::SignalInstallFailed);
    }
    Ok(())
}

extern "C" fn fault_handler(sig: c_int, si: *mut siginfo_t, ctx: *mut c_void) {
    let fault_addr = unsafe { (*si).si_addr() } as usize;

    let Some(engine) = engine() else {
        unsafe { chain_previous(sig, si, ctx) };
        return;
    };

    let reentered = IN_HANDLER.swap(true, Ordering::SeqCst);
    debug_assert!(!reentered, "fault raised inside the fault handler");

    let kind = unsafe { fault_context::access_kind(ctx) };
    // no logging in here: the mutator may be suspended while holding the
    // logger's internal lock
    let outcome = engine.handle_fault(fault_addr, kind);

    IN_HANDLER.store(false, Ordering::SeqCst);

    match outcome {
        Ok(FaultOutcome::Handled) => {}
        Ok(FaultOutcome::NotOurs) => unsafe { chain_previous(sig, si, ctx) },
        Err(_) => {
            // nobody to return an error to in signal context; print is not
            // async-signal-safe, write(2) is
            let text = "swap_heap: fatal error while resolving a page fault\n";
            unsafe {
                libc::write(
                    libc::STDERR_FILENO,
                    text.as_ptr() as *const c_void,
                    text.len(),
                );
                libc::abort();
            }
        }
    }
}

/// Hands a fault we do not own to whatever was installed before `init`.
unsafe fn chain_previous(sig: c_int, si: *mut siginfo_t, ctx: *mut c_void) {
    let previous = (*addr_of!(PREVIOUS_SIGSEGV)).assume_init_ref();

    if previous.sa_flags & SA_SIGINFO != 0 {
        let handler: extern "C" fn(c_int, *mut siginfo_t, *mut c_void) =
            mem::transmute(previous.sa_sigaction);
        handler(sig, si, ctx);
        return;
    }

    match previous.sa_sigaction {
        SIG_DFL => {
            // reinstate the default disposition; the retried access raises
            // the fault again and the kernel applies it
            libc::sigaction(SIGSEGV, previous, null_mut());
        }
        SIG_IGN => {}
        handler => {
            let handler: extern "C" fn(c_int) = mem::transmute(handler);
            handler(sig);
        }
    }
}
