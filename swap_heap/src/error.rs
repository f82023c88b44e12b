use thiserror::Error;

/// Errors surfaced by the allocator's public entry points.
///
/// All of these are fatal at the core level. Failures observed while the
/// fault handler is running cannot be returned to anyone and abort the
/// process instead.
#[derive(Debug, Error)]
pub enum SwapError {
    /// The kernel refused a fresh anonymous reservation.
    #[error("out of address space: anonymous reservation failed")]
    OutOfAddressSpace,
    /// Changing page protection failed.
    #[error("mprotect failed")]
    ProtectFailed,
    /// Returning a physical frame to the kernel failed.
    #[error("madvise failed")]
    DiscardFailed,
    /// Releasing a reservation failed.
    #[error("munmap failed")]
    ReleaseFailed,
    /// The backing store file could not be opened.
    #[error("could not open backing store: {0}")]
    StoreInitFailed(std::io::Error),
    /// Writing a region to the backing store failed.
    #[error("could not write region to backing store")]
    StorePutFailed,
    /// Reading a region from the backing store failed.
    #[error("could not read region from backing store")]
    StoreGetFailed,
    /// Deleting a store entry failed.
    #[error("could not delete region from backing store")]
    StoreDelFailed,
    /// The SIGSEGV handler could not be installed.
    #[error("sigaction failed")]
    SignalInstallFailed,
    /// Fault contexts cannot be classified on this target.
    #[error("fault classification is not supported on this platform")]
    UnsupportedPlatform,
}
