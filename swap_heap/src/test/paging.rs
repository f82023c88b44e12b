use core::mem::size_of;
use core::ptr::{read_volatile, write_volatile};

use super::run_with_heap;
use crate::modules::virtual_memory::page_size;
use crate::{allocate, free, stats, writeback};

#[test]
fn test_capacity_one_thrash() {
    run_with_heap("test_capacity_one_thrash", 1, || {
        let regions: Vec<*mut u32> = (0..4)
            .map(|_| allocate(size_of::<u32>()).unwrap().cast::<u32>().as_ptr())
            .collect();

        for (i, region) in regions.iter().enumerate() {
            unsafe { write_volatile(*region, i as u32 * 10) };
        }
        for (i, region) in regions.iter().enumerate() {
            assert_eq!(unsafe { read_volatile(*region) }, i as u32 * 10);
        }

        let stats = stats();
        assert_eq!(stats.allocs, 4);
        assert!(stats.writebacks >= 3, "writebacks: {}", stats.writebacks);
    });
}

#[test]
fn test_clean_eviction_costs_no_writeback() {
    run_with_heap("test_clean_eviction_costs_no_writeback", 1, || {
        let first = allocate(1).unwrap().as_ptr();
        // a read fault only, the region stays clean
        let _ = unsafe { read_volatile(first) };

        let _second = allocate(1).unwrap();

        let stats = stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.writebacks, 0);
    });
}

#[test]
fn test_write_promotion_without_store_io() {
    run_with_heap("test_write_promotion_without_store_io", 2, || {
        let region = allocate(1).unwrap().as_ptr();

        // read first so the region sits resident with read access, then the
        // write has to promote it in place
        let _ = unsafe { read_volatile(region) };
        unsafe { write_volatile(region, 0x77) };

        assert_eq!(stats().writebacks, 0);
        assert_eq!(unsafe { read_volatile(region) }, 0x77);
    });
}

#[test]
fn test_large_region_roundtrip() {
    run_with_heap("test_large_region_roundtrip", 2, || {
        let page = page_size();
        let size = 4 * page;
        let large = allocate(size).unwrap().as_ptr();

        for i in 0..size {
            unsafe { write_volatile(large.add(i), (i & 0xFF) as u8) };
        }

        // four single-page regions force the large one out
        let _small: Vec<_> = (0..4).map(|_| allocate(page).unwrap()).collect();

        for i in 0..size {
            assert_eq!(
                unsafe { read_volatile(large.add(i)) },
                (i & 0xFF) as u8,
                "byte {}",
                i
            );
        }

        assert!(stats().writebacks >= 1);
    });
}

#[test]
fn test_idempotent_free() {
    run_with_heap("test_idempotent_free", 4, || {
        let region = allocate(16).unwrap().as_ptr();

        free(region).unwrap();
        free(region).unwrap();

        let stats = stats();
        assert_eq!(stats.allocs, 1);
        assert_eq!(stats.frees, 1);
    });
}

#[test]
fn test_fresh_region_reads_zero_filled() {
    run_with_heap("test_fresh_region_reads_zero_filled", 2, || {
        let region = allocate(64).unwrap().as_ptr();

        for i in 0..64 {
            assert_eq!(unsafe { read_volatile(region.add(i)) }, 0);
        }
    });
}

#[test]
fn test_rapid_alternation_causes_no_spurious_writebacks() {
    run_with_heap("test_rapid_alternation_causes_no_spurious_writebacks", 2, || {
        let region = allocate(8).unwrap().as_ptr();
        unsafe { write_volatile(region, 1) };

        let baseline = stats().writebacks;
        for i in 0..10_000u32 {
            unsafe { write_volatile(region, i as u8) };
            assert_eq!(unsafe { read_volatile(region) }, i as u8);
        }

        assert_eq!(stats().writebacks, baseline);
    });
}

#[test]
fn test_explicit_writeback_drains() {
    run_with_heap("test_explicit_writeback_drains", 8, || {
        for i in 0..5u8 {
            let region = allocate(4).unwrap().as_ptr();
            unsafe { write_volatile(region, i) };
        }

        let mut evictions = 0;
        while writeback().unwrap() {
            evictions += 1;
        }
        assert_eq!(evictions, 5);
        assert_eq!(stats().writebacks, 5);

        // the queue is empty now, another call is a no-op
        assert!(!writeback().unwrap());
    });
}

#[test]
fn test_eviction_counters_add_up() {
    run_with_heap("test_eviction_counters_add_up", 3, || {
        const REGIONS: u64 = 10;

        for i in 0..REGIONS {
            let region = allocate(8).unwrap().as_ptr();
            unsafe { write_volatile(region, i as u8) };
        }

        let stats = stats();
        assert_eq!(stats.allocs, REGIONS);
        assert_eq!(stats.writebacks + stats.cache_hits, REGIONS - 3);
    });
}
