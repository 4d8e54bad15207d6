//! Build script for allocsite.
//!
//! Emits build-time notes about feature combinations that silently change
//! how anomalies are reported or which allocator is available.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_PARKING_LOT");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_LOG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DIAGNOSTICS");

    let log_enabled = env::var("CARGO_FEATURE_LOG").is_ok();
    let diagnostics_enabled = env::var("CARGO_FEATURE_DIAGNOSTICS").is_ok();
    let is_release = env::var("PROFILE").map(|p| p == "release").unwrap_or(false);
    let is_unix = env::var("CARGO_CFG_UNIX").is_ok();

    // The default sink is stderr, which is compiled out of release builds.
    if is_release && !log_enabled && !diagnostics_enabled {
        emit_note("anomalies are counted but not printed in this release build");
        emit_note("  enable the 'log' or 'diagnostics' feature to see them");
    }

    if !is_unix {
        emit_warning("no built-in raw allocator for this target");
        emit_note("  construct contexts with SiteAlloc::with_raw and your own RawAllocator");
    }
}

fn emit_note(msg: &str) {
    println!("cargo:warning=[allocsite] {}", msg);
}

fn emit_warning(msg: &str) {
    println!("cargo:warning=[allocsite] warning: {}", msg);
}
