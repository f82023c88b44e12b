use std::collections::HashMap;

use crate::modules::backing_store::StoreKey;

/// Bookkeeping for one allocated region.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegionInfo {
    /// Store entry holding the region's bytes, present once the region was
    /// written back for the first time.
    pub(crate) key: Option<StoreKey>,

    /// Logical size in bytes as requested by the caller.
    pub(crate) size: usize,

    /// The in-RAM bytes differ from the stored copy.
    pub(crate) dirty: bool,

    /// The region is currently resident.
    pub(crate) cached: bool,
}

impl RegionInfo {
    /// A fresh region starts out resident: allocation admits it to the
    /// resident queue right away.
    pub(crate) fn fresh(size: usize) -> Self {
        Self {
            key: None,
            size,
            dirty: false,
            cached: true,
        }
    }
}

/// Maps every allocated region's page-aligned base address to its
/// bookkeeping.
///
/// Consulted on every fault, so lookups have to stay near-constant.
pub(crate) struct RegionTable {
    regions: HashMap<usize, RegionInfo>,
}

impl RegionTable {
    pub(crate) fn new() -> Self {
        Self {
            regions: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, base: usize, info: RegionInfo) {
        let previous = self.regions.insert(base, info);
        debug_assert!(previous.is_none(), "region {:#x} allocated twice", base);
    }

    pub(crate) fn lookup_mut(&mut self, base: usize) -> Option<&mut RegionInfo> {
        self.regions.get_mut(&base)
    }

    pub(crate) fn remove(&mut self, base: usize) -> Option<RegionInfo> {
        self.regions.remove(&base)
    }

    pub(crate) fn len(&self) -> usize {
        self.regions.len()
    }

    /// Hands out all remaining regions for teardown.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (usize, RegionInfo)> + '_ {
        self.regions.drain()
    }
}
