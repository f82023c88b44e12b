use core::ptr::NonNull;

use log::{debug, trace};

use crate::{
    modules::{
        backing_store::BackingStoreModule,
        fault_context::AccessKind,
        virtual_memory::{self, Protection, ReadWindow},
    },
    region_table::{RegionInfo, RegionTable},
    resident_queue::ResidentQueue,
    stats::SwapStats,
    SwapError,
};

/// What the fault handler should do after consulting the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaultOutcome {
    /// The faulting instruction can be retried.
    Handled,
    /// The fault is outside our jurisdiction, chain to the previous handler.
    NotOurs,
}

/// The paging state machine.
///
/// Owns the allocation table, the resident queue and the backing store;
/// `handle_fault` is the kernel-driven entry point, everything else is called
/// by the mutator. None of the methods touch pageable memory outside the
/// explicit load and flush windows, so the state machine can also be driven
/// directly by tests standing in for the kernel.
pub(crate) struct SwapEngine<S: BackingStoreModule> {
    table: RegionTable,
    queue: ResidentQueue,
    cache_capacity: usize,
    stats: SwapStats,
    store: S,
}

impl<S: BackingStoreModule> SwapEngine<S> {
    pub(crate) fn new(store: S, cache_capacity: usize) -> Self {
        assert!(
            cache_capacity > 0,
            "the resident cache needs room for at least one region"
        );

        Self {
            table: RegionTable::new(),
            queue: ResidentQueue::new(),
            cache_capacity,
            stats: SwapStats::default(),
            store,
        }
    }

    pub(crate) fn stats(&self) -> SwapStats {
        self.stats
    }

    /// Reserves `size` bytes of pageable memory.
    ///
    /// The region starts resident with no access; its very first touch
    /// faults and decides the initial protection.
    pub(crate) fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, SwapError> {
        assert!(size > 0, "cannot allocate an empty region");

        let base = virtual_memory::reserve(size)?;
        trace!("allocate {} bytes at {:#x}", size, base.as_ptr() as usize);

        self.table
            .insert(base.as_ptr() as usize, RegionInfo::fresh(size));
        self.admit(base.as_ptr() as usize)?;
        self.stats.allocs += 1;

        Ok(base)
    }

    /// Releases the region based at `addr`.
    ///
    /// Unknown addresses are ignored, so freeing twice is fine. The resident
    /// queue may keep holding the address; `write_back` skips such stale
    /// entries.
    pub(crate) fn free(&mut self, addr: usize) -> Result<(), SwapError> {
        let Some(info) = self.table.lookup_mut(addr) else {
            return Ok(());
        };
        let (key, size) = (info.key, info.size);

        trace!("free region {:#x} ({} bytes)", addr, size);

        if let Some(key) = key {
            self.store.del(key)?;
        }
        unsafe { virtual_memory::release(addr as *mut u8, size)? };
        self.table.remove(addr);
        self.stats.frees += 1;

        Ok(())
    }

    /// Appends `base` to the resident queue, evicting the oldest region if
    /// the cache would otherwise exceed its capacity.
    fn admit(&mut self, base: usize) -> Result<(), SwapError> {
        self.queue.admit(base);

        if self.queue.len() > self.cache_capacity {
            self.write_back()?;
        }
        Ok(())
    }

    /// Evicts the oldest queued region.
    ///
    /// Clean regions only lose their frame; dirty ones are flushed to the
    /// store first. Returns whether a queue entry was consumed, `false`
    /// means the queue was empty.
    pub(crate) fn write_back(&mut self) -> Result<bool, SwapError> {
        let Some(base) = self.queue.evict_front() else {
            return Ok(false);
        };

        let Self { table, store, stats, .. } = self;
        let Some(info) = table.lookup_mut(base) else {
            // the region was freed while still queued, nothing to flush
            return Ok(true);
        };

        info.cached = false;

        if !info.dirty {
            unsafe { virtual_memory::discard(base as *mut u8, info.size)? };
            stats.cache_hits += 1;
            return Ok(true);
        }

        // lift protection so the flush can read the bytes; the window puts
        // no-access back even if the store rejects the write
        let window = ReadWindow::acquire(base as *mut u8, info.size)?;
        let bytes = unsafe { core::slice::from_raw_parts(base as *const u8, info.size) };
        match info.key {
            Some(key) => store.put_at(key, bytes)?,
            None => info.key = Some(store.put(bytes)?),
        }
        info.dirty = false;

        window.discard()?;
        stats.writebacks += 1;

        Ok(true)
    }

    /// Classifies and resolves one page fault.
    ///
    /// Called with the faulting address and the decoded access kind while the
    /// mutator is suspended at the faulting instruction.
    pub(crate) fn handle_fault(
        &mut self,
        fault_addr: usize,
        kind: AccessKind,
    ) -> Result<FaultOutcome, SwapError> {
        let base = virtual_memory::page_align_down(fault_addr);

        let Some(info) = self.table.lookup_mut(base) else {
            return Ok(FaultOutcome::NotOurs);
        };
        if fault_addr - base >= info.size {
            // inside an owned page but past the region's logical extent, the
            // trailing bytes keep trapping
            return Ok(FaultOutcome::NotOurs);
        }

        let final_protection = match kind {
            AccessKind::Read => Protection::Read,
            AccessKind::Write => Protection::ReadWrite,
        };

        if kind == AccessKind::Write {
            info.dirty = true;
        }

        if info.cached {
            // already resident, the fault only asks for more access than the
            // current protection grants (fresh regions start with none)
            let size = info.size;
            unsafe { virtual_memory::protect(base as *mut u8, size, final_protection)? };
            return Ok(FaultOutcome::Handled);
        }

        // non-resident, materialize the region
        let size = info.size;
        let load_key = info.key;
        info.cached = true;

        if let Some(key) = load_key {
            // the load below needs the region both readable and writable
            unsafe { virtual_memory::protect(base as *mut u8, size, Protection::ReadWrite)? };
            let dest = unsafe { core::slice::from_raw_parts_mut(base as *mut u8, size) };
            self.store.get(key, dest)?;
        }

        self.admit(base)?;
        unsafe { virtual_memory::protect(base as *mut u8, size, final_protection)? };

        Ok(FaultOutcome::Handled)
    }
}

impl<S: BackingStoreModule> Drop for SwapEngine<S> {
    fn drop(&mut self) {
        let leaked = self.table.len();
        if leaked > 0 {
            debug!("releasing {} regions still allocated at teardown", leaked);
        }

        for (base, info) in self.table.drain() {
            let _ = unsafe { virtual_memory::release(base as *mut u8, info.size) };
        }
    }
}
