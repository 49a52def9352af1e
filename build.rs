use std::env;

// Linker scripts are only meaningful for the Cortex-M firmware image; host
// builds of the library (and its tests) must not see them.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let target = env::var("TARGET").unwrap_or_default();
    if !target.starts_with("thumb") {
        return;
    }

    let rustflags = env::var("CARGO_ENCODED_RUSTFLAGS").unwrap_or_default();
    if !rustflags.contains("link.x") {
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
    }
    if !rustflags.contains("defmt.x") {
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
    if !rustflags.contains("--nmagic") {
        println!("cargo:rustc-link-arg-bins=--nmagic");
    }
}
