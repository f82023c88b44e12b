use core::ptr::{read_volatile, write_volatile};

use env_logger::{Builder, Env};
use swap_heap::{allocate, free, init, stats, term, SwapConfig};

fn main() {
    Builder::from_env(Env::default())
        .filter_level(log::LevelFilter::Trace)
        .format_module_path(false)
        .init();

    init(
        "/tmp/swap_playground.store",
        SwapConfig { cache_capacity: 2 },
    )
    .unwrap();

    let a = allocate(64).unwrap().as_ptr();
    let b = allocate(64).unwrap().as_ptr();

    unsafe {
        write_volatile(a, 1);
        write_volatile(b, 2);
    }

    // a third region pushes the oldest one out to the store
    let c = allocate(64).unwrap().as_ptr();
    unsafe { write_volatile(c, 3) };

    unsafe {
        println!("a: {}", read_volatile(a));
        println!("b: {}", read_volatile(b));
        println!("c: {}", read_volatile(c));
    }

    println!("{:?}", stats());

    for region in [a, b, c] {
        free(region).unwrap();
    }
    term();
}
