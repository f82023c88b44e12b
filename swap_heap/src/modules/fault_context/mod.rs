#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod x86_64;

use libc::c_void;

/// Kind of access that raised a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccessKind {
    Read,
    Write,
}

/// Whether faults can be classified on this target.
///
/// Checked by `init` before anything is installed; on unsupported targets
/// initialization fails instead of installing a handler that cannot decide
/// what protection a faulting page needs.
pub(crate) const fn is_supported() -> bool {
    cfg!(all(target_os = "linux", target_arch = "x86_64"))
}

/// Classifies the access behind the fault described by `ctx`.
///
/// ### Safety
///
/// `ctx` has to be the context pointer the kernel handed to an `SA_SIGINFO`
/// signal handler on the current thread.
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub(crate) unsafe fn access_kind(ctx: *mut c_void) -> AccessKind {
    x86_64::access_kind(ctx)
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
pub(crate) unsafe fn access_kind(_ctx: *mut c_void) -> AccessKind {
    unreachable!("fault classification is not implemented for this target")
}
