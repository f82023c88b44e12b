use core::ptr::{read_volatile, write_volatile};
use std::time::Instant;

use env_logger::{Builder, Env};
use rand::{rngs::SmallRng, RngCore, SeedableRng};
use swap_heap::{allocate, free, init, stats, term, writeback, SwapConfig};

const SEED: u64 = 5446535461589659585;
const REGION_SIZE: usize = 256;
const REGION_COUNT: usize = 512;
const CACHE_CAPACITY: usize = 32;
const STEPS: usize = 200_000;

fn main() {
    Builder::from_env(Env::default())
        .filter_level(log::LevelFilter::Warn)
        .format_module_path(false)
        .init();

    init(
        "/tmp/swap_benchmark.store",
        SwapConfig {
            cache_capacity: CACHE_CAPACITY,
        },
    )
    .unwrap();

    let mut rand = SmallRng::seed_from_u64(SEED);
    let regions: Vec<*mut u8> = (0..REGION_COUNT)
        .map(|_| allocate(REGION_SIZE).unwrap().as_ptr())
        .collect();
    let mut check_states = vec![0u8; REGION_COUNT];

    for (i, region) in regions.iter().enumerate() {
        let value = rand.next_u32() as u8;
        unsafe { write_volatile(*region, value) };
        check_states[i] = value;
    }

    let start = Instant::now();
    for _ in 0..STEPS {
        let i = rand.next_u32() as usize % REGION_COUNT;

        if rand.next_u32() % 4 == 0 {
            let value = rand.next_u32() as u8;
            unsafe { write_volatile(regions[i], value) };
            check_states[i] = value;
        } else {
            assert_eq!(unsafe { read_volatile(regions[i]) }, check_states[i]);
        }
    }
    let elapsed = start.elapsed();

    // flush everything before shutdown, then report
    while writeback().unwrap() {}

    println!(
        "{} steps over {} regions (cache: {}) in {:?}",
        STEPS, REGION_COUNT, CACHE_CAPACITY, elapsed
    );
    println!("{}", serde_json::to_string_pretty(&stats()).unwrap());

    for region in regions {
        free(region).unwrap();
    }
    term();
}
