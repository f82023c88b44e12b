use core::mem;
use core::ptr::{null_mut, read_volatile, write_volatile};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use libc::{c_int, c_void, siginfo_t, MAP_ANONYMOUS, MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE, SA_SIGINFO, SIGSEGV};

use super::lock_heap_tests;
use crate::modules::virtual_memory::page_size;
use crate::{allocate, init, term, SwapConfig};

/// page the sentinel repairs, never handed to the allocator
static FOREIGN_PAGE: AtomicUsize = AtomicUsize::new(0);
static SENTINEL_HIT: AtomicBool = AtomicBool::new(false);

extern "C" fn sentinel_handler(_sig: c_int, si: *mut siginfo_t, _ctx: *mut c_void) {
    let fault_addr = unsafe { (*si).si_addr() } as usize;
    let page = FOREIGN_PAGE.load(Ordering::SeqCst);

    if fault_addr < page || fault_addr >= page + page_size() {
        // a fault this test did not provoke, nothing sensible left to do
        unsafe { libc::abort() };
    }

    SENTINEL_HIT.store(true, Ordering::SeqCst);
    unsafe {
        libc::mprotect(page as *mut c_void, page_size(), PROT_READ | PROT_WRITE);
    }
}

#[test]
fn test_foreign_fault_reaches_previous_handler() {
    let _lock = lock_heap_tests();

    let foreign = unsafe {
        libc::mmap(
            null_mut(),
            page_size(),
            PROT_NONE,
            MAP_PRIVATE | MAP_ANONYMOUS,
            -1,
            0,
        )
    } as *mut u8;
    assert_ne!(foreign as isize, -1, "mmap failed");
    FOREIGN_PAGE.store(foreign as usize, Ordering::SeqCst);
    SENTINEL_HIT.store(false, Ordering::SeqCst);

    // the sentinel goes in before init so the engine saves it as "previous"
    let mut sentinel: libc::sigaction = unsafe { mem::zeroed() };
    sentinel.sa_sigaction = sentinel_handler as usize;
    sentinel.sa_flags = SA_SIGINFO;
    unsafe { libc::sigemptyset(&mut sentinel.sa_mask) };

    let mut saved: libc::sigaction = unsafe { mem::zeroed() };
    assert_eq!(unsafe { libc::sigaction(SIGSEGV, &sentinel, &mut saved) }, 0);

    init(
        "/tmp/test_foreign_fault.swapstore",
        SwapConfig { cache_capacity: 2 },
    )
    .unwrap();

    // one owned region so the engine has a table to consult
    let owned = allocate(16).unwrap().as_ptr();
    unsafe { write_volatile(owned, 1) };

    // the engine does not know this page, the fault has to chain through to
    // the sentinel which repairs the protection
    unsafe { write_volatile(foreign, 0xEE) };

    assert!(SENTINEL_HIT.load(Ordering::SeqCst));
    assert_eq!(unsafe { read_volatile(foreign) }, 0xEE);

    // owned regions keep working after the detour
    assert_eq!(unsafe { read_volatile(owned) }, 1);

    term();

    // put the world back: drop the sentinel and the foreign page
    unsafe {
        libc::sigaction(SIGSEGV, &saved, null_mut());
        libc::munmap(foreign as *mut c_void, page_size());
    }
}
