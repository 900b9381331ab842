//! # SimSIMD - Hardware-Accelerated Similarity Metrics and Distance Functions
//!
//! * Targets ARM NEON, x86 AVX2 and AVX-512 (VNNI, VPOPCNTDQ) hardware backends.
//! * Handles f64 double-, f32 single-, f16 and bf16 half-precision, i8 integral, and binary vectors.
//! * Picks the best kernel for the running CPU once, then every call is a table lookup.
//!
//! ## Implemented distance functions include:
//!
//! * Squared Euclidean (L2), Inner Product, and Cosine (Angular) spatial distances.
//! * Hamming (~ Manhattan) and Jaccard (~ Tanimoto) binary distances.
//! * Kullback-Leibler and Jensen-Shannon divergences for probability distributions.
//!
//! # Example
//!
//! ```rust
//! use simsimd::SpatialSimilarity;
//!
//! let a = &[1, 2, 3];
//! let b = &[4, 5, 6];
//!
//! // Compute cosine distance
//! let cosine = i8::cosine(a, b);
//!
//! // Compute inner product
//! let inner = i8::inner(a, b);
//!
//! // Compute squared Euclidean distance
//! let sqeuclidean = i8::sqeuclidean(a, b);
//! ```
//!
//! # Build configuration
//!
//! Which instruction sets get compiled in is decided by `build.rs` from the
//! target platform and the `SIMSIMD_*` environment variables, see [`config`].
//! What the build decided is available at runtime through
//! [`capabilities::build_configuration`].
//!
//! # Dispatch
//!
//! On first use the library probes the CPU and freezes one kernel per metric
//! and element type, see [`dispatch`]. Selection is logged through `tracing`.
#![allow(non_camel_case_types)]

pub mod capabilities;
pub mod config;
pub mod dispatch;
mod error;
mod kernels;
pub mod numerics;
pub mod scalars;

pub use capabilities::{FeatureSet, Tier};
pub use dispatch::{Distance, Dtype, Kernel, Metric};
pub use error::DispatchError;
pub use numerics::{BinarySimilarity, ProbabilitySimilarity, SpatialSimilarity};
pub use scalars::{bf16, f16};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_kernels() {
        dispatch::initialize().unwrap();
        let features = capabilities::detected();
        let configuration = capabilities::build_configuration();
        for metric in Metric::ALL {
            for dtype in Dtype::ALL {
                let registered = kernels::REGISTRY
                    .iter()
                    .flat_map(|variants| variants.iter())
                    .any(|variant| variant.metric == metric && variant.dtype == dtype);
                let Some(kernel) = dispatch::dispatch(metric, dtype) else {
                    assert!(!registered, "{metric} over {dtype} was left empty");
                    continue;
                };
                assert!(registered);
                assert!(kernel.tier().is_supported_by(features), "{metric} over {dtype}");
                assert!(kernel.tier().is_compiled_in(configuration), "{metric} over {dtype}");
                println!("{metric} over {dtype}: {}", kernel.tier());
            }
        }
    }

    #[test]
    fn test_examples_from_crate_docs() {
        let a = &[1i8, 2, 3];
        let b = &[4i8, 5, 6];
        assert_eq!(i8::inner(a, b), Some(32.0));
        assert_eq!(i8::sqeuclidean(a, b), Some(27.0));
        assert!(i8::cosine(a, a).unwrap().abs() < 1e-6);
    }
}
