//! Portable kernels. Every (metric, dtype) pair the library supports has one
//! here, which is what keeps the dispatch ladder from ever running dry.

use core::ffi::c_void;

use crate::capabilities::Tier;
use crate::dispatch::{Distance, Dtype, KernelVariant, Metric};
use crate::scalars::{bf16, f16};

/// Keeps the logarithms in probability divergences finite.
pub(crate) const EPSILON: f64 = 1e-7;

pub(crate) trait Element: Copy {
    fn widen(self) -> f64;
}

impl Element for f64 {
    #[inline(always)]
    fn widen(self) -> f64 {
        self
    }
}

impl Element for f32 {
    #[inline(always)]
    fn widen(self) -> f64 {
        self as f64
    }
}

impl Element for f16 {
    #[inline(always)]
    fn widen(self) -> f64 {
        self.to_f32() as f64
    }
}

impl Element for bf16 {
    #[inline(always)]
    fn widen(self) -> f64 {
        self.to_f32() as f64
    }
}

impl Element for i8 {
    #[inline(always)]
    fn widen(self) -> f64 {
        self as f64
    }
}

/// # Safety
/// `ptr` must be valid for `n` reads of `T`, or `n` must be zero.
#[inline(always)]
pub(crate) unsafe fn slice<'a, T>(ptr: *const c_void, n: usize) -> &'a [T] {
    if n == 0 {
        &[]
    } else {
        core::slice::from_raw_parts(ptr.cast::<T>(), n)
    }
}

/// Angular distance from the three partial sums every cosine kernel produces.
#[inline]
pub(crate) fn cosine_distance(ab: f64, a2: f64, b2: f64) -> Distance {
    if a2 == 0.0 && b2 == 0.0 {
        0.0
    } else if a2 == 0.0 || b2 == 0.0 {
        1.0
    } else {
        (1.0 - ab / (a2 * b2).sqrt()).max(0.0)
    }
}

#[inline]
pub(crate) fn jaccard_distance(intersection: u64, union: u64) -> Distance {
    if union == 0 {
        0.0
    } else {
        1.0 - intersection as f64 / union as f64
    }
}

// region: Generic kernels

fn dot<T: Element>(a: &[T], b: &[T]) -> Distance {
    a.iter().zip(b).map(|(x, y)| x.widen() * y.widen()).sum()
}

fn cos<T: Element>(a: &[T], b: &[T]) -> Distance {
    let (ab, a2, b2) = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x.widen(), y.widen()))
        .fold((0.0, 0.0, 0.0), |acc, (x, y)| {
            (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
        });
    cosine_distance(ab, a2, b2)
}

fn sqeuclidean<T: Element>(a: &[T], b: &[T]) -> Distance {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x.widen() - y.widen();
            d * d
        })
        .sum()
}

fn kl<T: Element>(a: &[T], b: &[T]) -> Distance {
    a.iter()
        .zip(b)
        .map(|(p, q)| {
            let (p, q) = (p.widen(), q.widen());
            p * ((p + EPSILON) / (q + EPSILON)).ln()
        })
        .sum()
}

fn js<T: Element>(a: &[T], b: &[T]) -> Distance {
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(p, q)| {
            let (p, q) = (p.widen(), q.widen());
            let m = (p + q) / 2.0;
            p * ((p + EPSILON) / (m + EPSILON)).ln() + q * ((q + EPSILON) / (m + EPSILON)).ln()
        })
        .sum();
    (sum / 2.0).max(0.0)
}

pub(crate) fn hamming(a: &[u8], b: &[u8]) -> u64 {
    let mut chunks_a = a.chunks_exact(8);
    let mut chunks_b = b.chunks_exact(8);
    let mut differences: u64 = chunks_a
        .by_ref()
        .zip(chunks_b.by_ref())
        .map(|(x, y)| (word(x) ^ word(y)).count_ones() as u64)
        .sum();
    differences += chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder())
        .map(|(x, y)| (x ^ y).count_ones() as u64)
        .sum::<u64>();
    differences
}

pub(crate) fn intersection_and_union(a: &[u8], b: &[u8]) -> (u64, u64) {
    a.iter().zip(b).fold((0, 0), |(intersection, union), (x, y)| {
        (
            intersection + (x & y).count_ones() as u64,
            union + (x | y).count_ones() as u64,
        )
    })
}

#[inline(always)]
fn word(bytes: &[u8]) -> u64 {
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(bytes);
    u64::from_ne_bytes(buffer)
}

// endregion: Generic kernels

// region: Punned entry points

macro_rules! punned {
    ($($name:ident => $kernel:ident::<$t:ty>),* $(,)?) => {
        $(
            /// # Safety
            /// `a` and `b` must each point to `n` readable elements of the kernel's dtype.
            pub(crate) unsafe fn $name(a: *const c_void, b: *const c_void, n: usize) -> Distance {
                $kernel::<$t>(slice(a, n), slice(b, n))
            }
        )*
    };
}

punned! {
    dot_f64 => dot::<f64>,
    dot_f32 => dot::<f32>,
    dot_f16 => dot::<f16>,
    dot_bf16 => dot::<bf16>,
    dot_i8 => dot::<i8>,
    cos_f64 => cos::<f64>,
    cos_f32 => cos::<f32>,
    cos_f16 => cos::<f16>,
    cos_bf16 => cos::<bf16>,
    cos_i8 => cos::<i8>,
    sqeuclidean_f64 => sqeuclidean::<f64>,
    sqeuclidean_f32 => sqeuclidean::<f32>,
    sqeuclidean_f16 => sqeuclidean::<f16>,
    sqeuclidean_bf16 => sqeuclidean::<bf16>,
    sqeuclidean_i8 => sqeuclidean::<i8>,
    kl_f64 => kl::<f64>,
    kl_f32 => kl::<f32>,
    kl_f16 => kl::<f16>,
    kl_bf16 => kl::<bf16>,
    js_f64 => js::<f64>,
    js_f32 => js::<f32>,
    js_f16 => js::<f16>,
    js_bf16 => js::<bf16>,
}

/// `n` counts bytes, eight bits each.
pub(crate) unsafe fn hamming_b8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    hamming(slice(a, n), slice(b, n)) as Distance
}

pub(crate) unsafe fn jaccard_b8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (intersection, union) = intersection_and_union(slice(a, n), slice(b, n));
    jaccard_distance(intersection, union)
}

// endregion: Punned entry points

pub(crate) const VARIANTS: &[KernelVariant] = &[
    KernelVariant::new(Metric::Dot, Dtype::F64, Tier::Serial, dot_f64),
    KernelVariant::new(Metric::Dot, Dtype::F32, Tier::Serial, dot_f32),
    KernelVariant::new(Metric::Dot, Dtype::F16, Tier::Serial, dot_f16),
    KernelVariant::new(Metric::Dot, Dtype::BF16, Tier::Serial, dot_bf16),
    KernelVariant::new(Metric::Dot, Dtype::I8, Tier::Serial, dot_i8),
    KernelVariant::new(Metric::Cosine, Dtype::F64, Tier::Serial, cos_f64),
    KernelVariant::new(Metric::Cosine, Dtype::F32, Tier::Serial, cos_f32),
    KernelVariant::new(Metric::Cosine, Dtype::F16, Tier::Serial, cos_f16),
    KernelVariant::new(Metric::Cosine, Dtype::BF16, Tier::Serial, cos_bf16),
    KernelVariant::new(Metric::Cosine, Dtype::I8, Tier::Serial, cos_i8),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F64, Tier::Serial, sqeuclidean_f64),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F32, Tier::Serial, sqeuclidean_f32),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F16, Tier::Serial, sqeuclidean_f16),
    KernelVariant::new(Metric::SqEuclidean, Dtype::BF16, Tier::Serial, sqeuclidean_bf16),
    KernelVariant::new(Metric::SqEuclidean, Dtype::I8, Tier::Serial, sqeuclidean_i8),
    KernelVariant::new(Metric::Hamming, Dtype::B8, Tier::Serial, hamming_b8),
    KernelVariant::new(Metric::Jaccard, Dtype::B8, Tier::Serial, jaccard_b8),
    KernelVariant::new(Metric::KullbackLeibler, Dtype::F64, Tier::Serial, kl_f64),
    KernelVariant::new(Metric::KullbackLeibler, Dtype::F32, Tier::Serial, kl_f32),
    KernelVariant::new(Metric::KullbackLeibler, Dtype::F16, Tier::Serial, kl_f16),
    KernelVariant::new(Metric::KullbackLeibler, Dtype::BF16, Tier::Serial, kl_bf16),
    KernelVariant::new(Metric::JensenShannon, Dtype::F64, Tier::Serial, js_f64),
    KernelVariant::new(Metric::JensenShannon, Dtype::F32, Tier::Serial, js_f32),
    KernelVariant::new(Metric::JensenShannon, Dtype::F16, Tier::Serial, js_f16),
    KernelVariant::new(Metric::JensenShannon, Dtype::BF16, Tier::Serial, js_bf16),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_almost_equal(left: f64, right: f64, tolerance: f64) {
        assert!(
            (left - right).abs() <= tolerance,
            "{left} differs from {right} by more than {tolerance}"
        );
    }

    #[test]
    fn spatial_f32() {
        let a = [1.0f32, 2.0, 3.0];
        let b = [4.0f32, 5.0, 6.0];
        assert_almost_equal(dot(&a, &b), 32.0, 1e-9);
        assert_almost_equal(sqeuclidean(&a, &b), 27.0, 1e-9);
        assert_almost_equal(cos(&a, &b), 1.0 - 32.0 / (14.0f64 * 77.0).sqrt(), 1e-9);
        assert_almost_equal(cos(&a, &a), 0.0, 1e-9);
    }

    #[test]
    fn spatial_i8() {
        let a = [1i8, 2, 3];
        let b = [4i8, 5, 6];
        assert_eq!(dot(&a, &b), 32.0);
        assert_eq!(sqeuclidean(&a, &b), 27.0);
        let extremes = [-128i8; 64];
        assert_eq!(dot(&extremes, &extremes), 64.0 * 16384.0);
    }

    #[test]
    fn spatial_half() {
        let a: Vec<f16> = [1.0, 2.0, 3.0].iter().map(|&x| f16::from_f32(x)).collect();
        let b: Vec<f16> = [4.0, 5.0, 6.0].iter().map(|&x| f16::from_f32(x)).collect();
        assert_almost_equal(dot(&a, &b), 32.0, 1e-9);
        let a: Vec<bf16> = [1.0, 2.0, 3.0].iter().map(|&x| bf16::from_f32(x)).collect();
        let b: Vec<bf16> = [4.0, 5.0, 6.0].iter().map(|&x| bf16::from_f32(x)).collect();
        assert_almost_equal(sqeuclidean(&a, &b), 27.0, 1e-9);
    }

    #[test]
    fn cosine_of_zero_vectors() {
        let zero = [0.0f64; 4];
        let one = [1.0f64; 4];
        assert_eq!(cos(&zero, &zero), 0.0);
        assert_eq!(cos(&zero, &one), 1.0);
        assert_eq!(cos(&one, &zero), 1.0);
    }

    #[test]
    fn binary() {
        let a = [0b1111_0000u8, 0xFF, 0x00, 0x0F, 0xAA, 0x55, 0x01, 0x80, 0xFF, 0x01];
        let b = [0b1010_1010u8, 0x00, 0x00, 0x0F, 0x55, 0x55, 0x03, 0x80, 0x7F, 0x00];
        let expected: u64 = a
            .iter()
            .zip(&b)
            .map(|(x, y)| (x ^ y).count_ones() as u64)
            .sum();
        assert_eq!(hamming(&a, &b), expected);
        assert_eq!(intersection_and_union(&[0b1100], &[0b1010]), (1, 3));
        assert_almost_equal(jaccard_distance(1, 3), 2.0 / 3.0, 1e-12);
        assert_eq!(jaccard_distance(0, 0), 0.0);
    }

    #[test]
    fn probability() {
        let p = [0.1f64, 0.9];
        let q = [0.9f64, 0.1];
        assert_almost_equal(kl(&p, &p), 0.0, 1e-9);
        assert_almost_equal(js(&p, &p), 0.0, 1e-9);
        let expected_kl = 0.1 * (0.1f64 / 0.9).ln() + 0.9 * (0.9f64 / 0.1).ln();
        assert_almost_equal(kl(&p, &q), expected_kl, 1e-5);
        assert_almost_equal(js(&p, &q), js(&q, &p), 1e-12);
        assert!(js(&p, &q) <= 2f64.ln());
    }

    #[test]
    fn punned_handles_empty_and_null() {
        let null = core::ptr::null();
        unsafe {
            assert_eq!(dot_f32(null, null, 0), 0.0);
            assert_eq!(cos_f64(null, null, 0), 0.0);
            assert_eq!(hamming_b8(null, null, 0), 0.0);
        }
    }

    #[test]
    fn every_metric_has_a_serial_variant() {
        assert!(VARIANTS.iter().all(|variant| variant.tier == Tier::Serial));
        for metric in Metric::ALL {
            assert!(VARIANTS.iter().any(|variant| variant.metric == metric));
        }
    }
}
