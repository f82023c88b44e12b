mod file_store;

pub use file_store::FileBackingStore;

use crate::error::SwapError;

/// Opaque handle to one stored region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreKey(pub(crate) u64);

/// Keyed blob store persisting non-resident regions.
///
/// Implementations operate on process-local state only: every operation may
/// run while the mutator is suspended inside a page fault.
pub trait BackingStoreModule {
    /// Stores `src` under a fresh key.
    fn put(&mut self, src: &[u8]) -> Result<StoreKey, SwapError>;

    /// Overwrites the entry at `key` with `src`.
    ///
    /// `src` must not be longer than the slice `key` was created with.
    fn put_at(&mut self, key: StoreKey, src: &[u8]) -> Result<(), SwapError>;

    /// Reads `dest.len()` bytes of the entry at `key` into `dest`.
    fn get(&mut self, key: StoreKey, dest: &mut [u8]) -> Result<(), SwapError>;

    /// Deletes the entry at `key`. Unknown keys are not an error.
    fn del(&mut self, key: StoreKey) -> Result<(), SwapError>;
}
