// build.rs
// Optimize release builds for the CPU of the machine performing the compilation.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let profile = env::var("PROFILE").unwrap_or_else(|_| "debug".to_string());
    if profile == "release" {
        // Detect the build host's SIMD feature set (SSE/AVX on x86-64, NEON on
        // AArch64) and optimize the output binary specifically for it.
        println!("cargo:rustc-flags=-C target-cpu=native");
    }
}
