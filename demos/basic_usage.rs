//! Basic usage of allocsite
//!
//! Allocates from a few call sites, prints the per-site dump, then releases
//! everything and shows a write past the end of a block being caught.

use allocsite::{tracked_alloc, tracked_new, tracked_release, tracked_zeroed, SiteAlloc, TrackingConfig};

fn load_names(alloc: &SiteAlloc) -> Vec<std::ptr::NonNull<u8>> {
    (0..4)
        .filter_map(|i| tracked_alloc!(alloc, 32 * (i + 1)).ok())
        .collect()
}

fn main() {
    let alloc = SiteAlloc::new(TrackingConfig::default());

    let names = load_names(&alloc);
    let table = match tracked_zeroed!(alloc, 256, 8) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("allocation failed: {}", err);
            return;
        }
    };
    let point = match tracked_new!(alloc, (1.5f64, -2.0f64)) {
        Ok(point) => point,
        Err(err) => {
            eprintln!("allocation failed: {}", err);
            return;
        }
    };

    println!("Live allocations by call site:");
    println!("{}", alloc.snapshot());

    unsafe {
        for name in &names {
            tracked_release!(alloc, name.as_ptr());
        }
        tracked_release!(alloc, table.as_ptr());
        tracked_release!(alloc, point.as_ptr());
    }

    println!("\nAfter releasing everything:");
    println!("{}", alloc.snapshot());

    // One byte too many lands in the guard padding and is reported on release.
    if let Ok(label) = tracked_alloc!(alloc, 13) {
        unsafe {
            std::ptr::write_bytes(label.as_ptr(), b'x', 14);
            tracked_release!(alloc, label.as_ptr());
        }
    }
    println!("\n{:?}", alloc.anomaly_counts());
}
