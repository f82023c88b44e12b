use core::ptr::{null_mut, NonNull};

use libc::{
    c_void, madvise, mmap, mprotect, munmap, sysconf, MADV_DONTNEED, MAP_ANONYMOUS, MAP_FAILED,
    MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE, _SC_PAGE_SIZE,
};

use crate::error::SwapError;

/// Access protection of a reserved range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Protection {
    None,
    Read,
    ReadWrite,
}

impl Protection {
    fn as_prot_flags(self) -> libc::c_int {
        match self {
            Protection::None => PROT_NONE,
            Protection::Read => PROT_READ,
            Protection::ReadWrite => PROT_READ | PROT_WRITE,
        }
    }
}

pub(crate) fn page_size() -> usize {
    unsafe { sysconf(_SC_PAGE_SIZE) as usize }
}

/// Start of the page containing `addr`.
pub(crate) fn page_align_down(addr: usize) -> usize {
    addr & !(page_size() - 1)
}

/// `size` rounded up to a multiple of the page size.
pub(crate) fn page_align_up(size: usize) -> usize {
    round_up_to_nearest(size, page_size())
}

#[inline]
pub(crate) const fn round_up_to_nearest(num: usize, multiple: usize) -> usize {
    ((num + multiple - 1) / multiple) * multiple
}

/// Reserves `page_align_up(size)` bytes of private anonymous memory with no
/// read or write permission. The first access of any kind faults.
pub(crate) fn reserve(size: usize) -> Result<NonNull<u8>, SwapError> {
    let base_ptr = unsafe {
        mmap(
            null_mut(),
            page_align_up(size),
            PROT_NONE,
            MAP_PRIVATE | MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if base_ptr == MAP_FAILED {
        return Err(SwapError::OutOfAddressSpace);
    }

    NonNull::new(base_ptr as *mut u8).ok_or(SwapError::OutOfAddressSpace)
}

/// Sets the protection of the pages backing `[base, base + size)`.
///
/// ### Safety
///
/// `base` has to be the page-aligned start of a range obtained from `reserve`.
pub(crate) unsafe fn protect(
    base: *mut u8,
    size: usize,
    protection: Protection,
) -> Result<(), SwapError> {
    let code = mprotect(
        base as *mut c_void,
        page_align_up(size),
        protection.as_prot_flags(),
    );

    if code != 0 {
        return Err(SwapError::ProtectFailed);
    }
    Ok(())
}

/// Gives the physical frames backing `[base, base + size)` back to the kernel
/// while keeping the reservation. The range ends up with no access, so the
/// next touch faults.
///
/// ### Safety
///
/// Same contract as [`protect`].
pub(crate) unsafe fn discard(base: *mut u8, size: usize) -> Result<(), SwapError> {
    let code = madvise(base as *mut c_void, page_align_up(size), MADV_DONTNEED);

    if code != 0 {
        return Err(SwapError::DiscardFailed);
    }
    protect(base, size, Protection::None)
}

/// Releases the whole reservation.
///
/// ### Safety
///
/// `base` has to come from `reserve` and must not be touched afterwards.
pub(crate) unsafe fn release(base: *mut u8, size: usize) -> Result<(), SwapError> {
    let code = munmap(base as *mut c_void, page_align_up(size));

    if code != 0 {
        return Err(SwapError::ReleaseFailed);
    }
    Ok(())
}

/// Keeps a region readable while its bytes are flushed to the store.
///
/// Dropping the window restores no-access, so an aborted flush never leaves a
/// readable but already evicted mapping behind. [`ReadWindow::discard`]
/// consumes the window on the success path.
pub(crate) struct ReadWindow {
    base: *mut u8,
    size: usize,
}

impl ReadWindow {
    pub(crate) fn acquire(base: *mut u8, size: usize) -> Result<Self, SwapError> {
        unsafe { protect(base, size, Protection::Read)? };
        Ok(Self { base, size })
    }

    /// Drops the physical frames and leaves the range with no access.
    pub(crate) fn discard(self) -> Result<(), SwapError> {
        let (base, size) = (self.base, self.size);
        core::mem::forget(self);

        unsafe { discard(base, size) }
    }
}

impl Drop for ReadWindow {
    fn drop(&mut self) {
        // nothing can be reported from here, the caller already unwinds with
        // the store error
        let _ = unsafe { protect(self.base, self.size, Protection::None) };
    }
}
