#[allow(dead_code, unused_imports)]
#[path = "rust/config/mod.rs"]
mod config;

fn main() {
    // `cfg!(target_os)` here would describe the host running the build script,
    // not the target being compiled for.
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    let environment = config::Environment::from_process();
    let profile = config::select_profile(&target_os);
    let resolved = config::emit(&profile, &environment);

    for directive in resolved.cargo_directives() {
        println!("{directive}");
    }

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=rust/config/mod.rs");
    println!("cargo:rerun-if-changed=rust/config/matrix.rs");
    println!("cargo:rerun-if-changed=rust/config/resolve.rs");
    println!("cargo:rerun-if-changed=rust/config/emit.rs");
}
