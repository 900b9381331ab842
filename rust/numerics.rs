//! Safe slice-level entry points.
//!
//! - **Spatial similarity**: [`SpatialSimilarity`]
//! - **Binary similarity**: [`BinarySimilarity`]
//! - **Probability divergence**: [`ProbabilitySimilarity`]
//!
//! Every call goes through the process-wide dispatch table, populating it on
//! first use. Mismatched lengths yield `None`.

use crate::dispatch::{self, Distance, Dtype, Kernel, Metric};
use crate::scalars::{bf16, f16};

fn kernel(metric: Metric, dtype: Dtype) -> Kernel {
    let table = dispatch::initialize().unwrap_or_else(|error| panic!("{error}"));
    table
        .get(metric, dtype)
        .unwrap_or_else(|| panic!("no kernel registered for `{metric}` over `{dtype}`"))
}

fn compute<T>(metric: Metric, dtype: Dtype, a: &[T], b: &[T]) -> Option<Distance> {
    if a.len() != b.len() {
        return None;
    }
    let kernel = kernel(metric, dtype);
    // Both slices hold `a.len()` elements of the dtype the kernel was registered for.
    Some(unsafe { kernel.call(a.as_ptr().cast(), b.as_ptr().cast(), a.len()) })
}

// region: SpatialSimilarity

/// Dot products, angular and squared Euclidean distances between vectors.
pub trait SpatialSimilarity: Sized {
    fn dot(a: &[Self], b: &[Self]) -> Option<Distance>;

    /// Angular distance: `0` for parallel vectors, `1` for orthogonal ones,
    /// clamped at `0` from below.
    ///
    /// `f32::cos` and `f64::cos` resolve to the inherent trigonometric methods,
    /// so call this one as `<f32 as SpatialSimilarity>::cos` or use [`cosine`](Self::cosine).
    ///
    /// ```
    /// use simsimd::SpatialSimilarity;
    ///
    /// let a = [1.0f64, 0.0];
    /// let b = [0.0f64, 1.0];
    /// assert_eq!(f64::cosine(&a, &b), Some(1.0));
    /// assert_eq!(<f64 as SpatialSimilarity>::cos(&a, &a), Some(0.0));
    /// ```
    fn cos(a: &[Self], b: &[Self]) -> Option<Distance>;

    fn sqeuclidean(a: &[Self], b: &[Self]) -> Option<Distance>;

    /// Alias for `dot`.
    fn inner(a: &[Self], b: &[Self]) -> Option<Distance> {
        Self::dot(a, b)
    }

    /// Alias for `cos`.
    fn cosine(a: &[Self], b: &[Self]) -> Option<Distance> {
        Self::cos(a, b)
    }

    /// Alias for `sqeuclidean`.
    fn l2sq(a: &[Self], b: &[Self]) -> Option<Distance> {
        Self::sqeuclidean(a, b)
    }
}

macro_rules! impl_spatial {
    ($($t:ty => $dtype:expr),* $(,)?) => {
        $(
            impl SpatialSimilarity for $t {
                fn dot(a: &[Self], b: &[Self]) -> Option<Distance> {
                    compute(Metric::Dot, $dtype, a, b)
                }

                fn cos(a: &[Self], b: &[Self]) -> Option<Distance> {
                    compute(Metric::Cosine, $dtype, a, b)
                }

                fn sqeuclidean(a: &[Self], b: &[Self]) -> Option<Distance> {
                    compute(Metric::SqEuclidean, $dtype, a, b)
                }
            }
        )*
    };
}

impl_spatial! {
    f64 => Dtype::F64,
    f32 => Dtype::F32,
    f16 => Dtype::F16,
    bf16 => Dtype::BF16,
    i8 => Dtype::I8,
}

// endregion: SpatialSimilarity

// region: BinarySimilarity

/// Distances between bit sets packed eight bits to a byte.
pub trait BinarySimilarity: Sized {
    /// Number of differing bits.
    fn hamming(a: &[Self], b: &[Self]) -> Option<Distance>;

    /// `1 - |a & b| / |a | b|`, or `0` when neither set has a bit.
    fn jaccard(a: &[Self], b: &[Self]) -> Option<Distance>;
}

impl BinarySimilarity for u8 {
    fn hamming(a: &[Self], b: &[Self]) -> Option<Distance> {
        compute(Metric::Hamming, Dtype::B8, a, b)
    }

    fn jaccard(a: &[Self], b: &[Self]) -> Option<Distance> {
        compute(Metric::Jaccard, Dtype::B8, a, b)
    }
}

// endregion: BinarySimilarity

// region: ProbabilitySimilarity

/// Divergences between discrete probability distributions.
pub trait ProbabilitySimilarity: Sized {
    fn kullbackleibler(a: &[Self], b: &[Self]) -> Option<Distance>;

    /// Jensen-Shannon divergence, the mean of both sides' Kullback-Leibler
    /// divergence from the midpoint distribution.
    fn jensenshannon(a: &[Self], b: &[Self]) -> Option<Distance>;

    /// Alias for `kullbackleibler`.
    fn kl(a: &[Self], b: &[Self]) -> Option<Distance> {
        Self::kullbackleibler(a, b)
    }

    /// Alias for `jensenshannon`.
    fn js(a: &[Self], b: &[Self]) -> Option<Distance> {
        Self::jensenshannon(a, b)
    }
}

macro_rules! impl_probability {
    ($($t:ty => $dtype:expr),* $(,)?) => {
        $(
            impl ProbabilitySimilarity for $t {
                fn kullbackleibler(a: &[Self], b: &[Self]) -> Option<Distance> {
                    compute(Metric::KullbackLeibler, $dtype, a, b)
                }

                fn jensenshannon(a: &[Self], b: &[Self]) -> Option<Distance> {
                    compute(Metric::JensenShannon, $dtype, a, b)
                }
            }
        )*
    };
}

impl_probability! {
    f64 => Dtype::F64,
    f32 => Dtype::F32,
    f16 => Dtype::F16,
    bf16 => Dtype::BF16,
}

// endregion: ProbabilitySimilarity

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::testing::{assert_close, f32s, i8s, rng};

    #[test]
    fn dot_f32() {
        let a = vec![1.0f32, 2.0, 3.0];
        let b = vec![4.0f32, 5.0, 6.0];
        let result = <f32 as SpatialSimilarity>::dot(&a, &b).unwrap();
        assert!((result - 32.0).abs() < 0.01);
        assert_eq!(f32::inner(&a, &b), Some(result));
    }

    #[test]
    fn dot_i8() {
        let a = vec![1i8, 2, 3];
        let b = vec![4i8, 5, 6];
        assert_eq!(i8::dot(&a, &b), Some(32.0));
    }

    #[test]
    fn cos_i8() {
        let a = vec![3i8, 97, 127];
        let b = vec![3i8, 97, 127];
        let result = i8::cosine(&a, &b).unwrap();
        assert!(result.abs() < 1e-6);
    }

    #[test]
    fn cos_f32() {
        let a = vec![1.0f32, 2.0, 3.0];
        let b = vec![4.0f32, 5.0, 6.0];
        let result = <f32 as SpatialSimilarity>::cos(&a, &b).unwrap();
        assert!((result - 0.025368).abs() < 1e-4);
        assert_eq!(f32::cosine(&[0.0; 4], &[0.0; 4]), Some(0.0));
        assert_eq!(f32::cosine(&[0.0; 4], &[1.0; 4]), Some(1.0));
    }

    #[test]
    fn cosine_f64() {
        let a = vec![1.0f64, 0.0];
        let b = vec![0.0f64, 1.0];
        assert_eq!(f64::cosine(&a, &b), Some(1.0));
        assert_eq!(f64::cosine(&a, &a), Some(0.0));
        assert_eq!(f64::cosine(&a, &b), <f64 as SpatialSimilarity>::cos(&a, &b));
    }

    #[test]
    fn sqeuclidean_f64() {
        let a = vec![1.0f64, 2.0, 3.0];
        let b = vec![4.0f64, 5.0, 6.0];
        let result = f64::l2sq(&a, &b).unwrap();
        assert!((result - 27.0).abs() < 0.01);
    }

    #[test]
    fn sqeuclidean_f16() {
        let a: Vec<f16> = [1.0, 2.0, 3.0].iter().map(|&x| f16::from_f32(x)).collect();
        let b: Vec<f16> = [4.0, 5.0, 6.0].iter().map(|&x| f16::from_f32(x)).collect();
        let result = f16::sqeuclidean(&a, &b).unwrap();
        assert!((result - 27.0).abs() < 0.01);
    }

    #[test]
    fn dot_bf16() {
        let a: Vec<bf16> = [1.0, 2.0, 3.0].iter().map(|&x| bf16::from_f32(x)).collect();
        let b: Vec<bf16> = [4.0, 5.0, 6.0].iter().map(|&x| bf16::from_f32(x)).collect();
        let result = bf16::dot(&a, &b).unwrap();
        assert!((result - 32.0).abs() < 0.01);
    }

    #[test]
    fn hamming_u8() {
        let a = vec![0b11110000u8, 0b10101010];
        let b = vec![0b00001111u8, 0b01010101];
        assert_eq!(u8::hamming(&a, &b), Some(16.0));
    }

    #[test]
    fn jaccard_u8() {
        let a = vec![0b11110000u8, 0b10101010];
        assert_eq!(u8::jaccard(&a, &a), Some(0.0));
        assert_eq!(u8::jaccard(&[0u8; 3], &[0u8; 3]), Some(0.0));
        assert_eq!(u8::jaccard(&[0b1100], &[0b0011]), Some(1.0));
    }

    #[test]
    fn js_f32() {
        let a = vec![0.25f32, 0.25, 0.25, 0.25];
        let result = f32::jensenshannon(&a, &a).unwrap();
        assert!(result.abs() < 0.01);
        let b = vec![0.7f32, 0.1, 0.1, 0.1];
        assert_close(f32::js(&a, &b).unwrap(), f32::js(&b, &a).unwrap(), 1e-9);
    }

    #[test]
    fn kl_f64() {
        let a = vec![0.25f64, 0.25, 0.25, 0.25];
        let result = f64::kullbackleibler(&a, &a).unwrap();
        assert!(result.abs() < 0.01);
        let b = vec![0.5f64, 0.5, 0.0, 0.0];
        assert!(f64::kl(&b, &a).unwrap() > 0.0);
    }

    #[test]
    fn length_mismatch() {
        assert_eq!(f32::dot(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(u8::hamming(&[1], &[]), None);
        assert_eq!(f64::kl(&[], &[0.5]), None);
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(f32::dot(&[], &[]), Some(0.0));
        assert_eq!(i8::sqeuclidean(&[], &[]), Some(0.0));
        assert_eq!(u8::hamming(&[], &[]), Some(0.0));
    }

    #[test]
    fn agrees_with_serial_on_random_vectors() {
        let mut rng = rng();
        for n in [1usize, 17, 256, 1536] {
            let (a, b) = (f32s(&mut rng, n), f32s(&mut rng, n));
            let dispatched = f32::cosine(&a, &b).unwrap();
            let expected = unsafe {
                crate::kernels::serial::cos_f32(a.as_ptr().cast(), b.as_ptr().cast(), n)
            };
            assert_close(dispatched, expected, 1e-4);

            let (a, b) = (i8s(&mut rng, n), i8s(&mut rng, n));
            let dispatched = i8::sqeuclidean(&a, &b).unwrap();
            let expected = unsafe {
                crate::kernels::serial::sqeuclidean_i8(a.as_ptr().cast(), b.as_ptr().cast(), n)
            };
            assert_eq!(dispatched, expected);
        }
    }
}
