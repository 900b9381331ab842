//! Leaf distance routines, one module per instruction-set tier.
//!
//! A tier module only exists when its `SIMSIMD_TARGET_*` flag resolved to `1`
//! for an architecture that can run it. Each module lists what it implements in
//! a `VARIANTS` slice, and [`REGISTRY`] collects the slices of every module that
//! made it into the build.

use crate::dispatch::KernelVariant;

pub(crate) mod serial;

#[cfg(all(target_arch = "x86_64", simsimd_target_haswell = "1"))]
mod haswell;
#[cfg(all(target_arch = "x86_64", simsimd_target_ice = "1"))]
mod ice;
#[cfg(all(target_arch = "aarch64", simsimd_target_neon = "1"))]
mod neon;
#[cfg(all(target_arch = "x86_64", simsimd_target_skylake = "1"))]
mod skylake;

pub(crate) static REGISTRY: &[&[KernelVariant]] = &[
    serial::VARIANTS,
    #[cfg(all(target_arch = "x86_64", simsimd_target_haswell = "1"))]
    haswell::VARIANTS,
    #[cfg(all(target_arch = "x86_64", simsimd_target_skylake = "1"))]
    skylake::VARIANTS,
    #[cfg(all(target_arch = "x86_64", simsimd_target_ice = "1"))]
    ice::VARIANTS,
    #[cfg(all(target_arch = "aarch64", simsimd_target_neon = "1"))]
    neon::VARIANTS,
];
