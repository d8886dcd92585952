//! Build script for droidpy
//!
//! Links the Android system log library when targeting Android. The check
//! reads the target from Cargo's environment because `cfg!` in a build script
//! describes the host, not the target.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("android") {
        // android_logger writes through __android_log_write
        println!("cargo:rustc-link-lib=log");
    }
}
