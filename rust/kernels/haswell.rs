//! AVX2 kernels with FMA for floats, F16C for half precision and POPCNT for
//! bit sets. Compiled when `SIMSIMD_TARGET_HASWELL` is on.

use core::arch::x86_64::*;
use core::ffi::c_void;

use super::serial::{cosine_distance, jaccard_distance, Element};
use crate::capabilities::Tier;
use crate::dispatch::{Distance, Dtype, KernelVariant, Metric};
use crate::scalars::{bf16, f16};

/// Integer lanes are flushed into 64-bit totals after this many elements.
const I8_BLOCK: usize = 16 * 4096;

// region: Loads & reductions

#[inline]
#[target_feature(enable = "avx2,fma,f16c")]
unsafe fn load_f32(ptr: *const f32) -> __m256 {
    _mm256_loadu_ps(ptr)
}

#[inline]
#[target_feature(enable = "avx2,fma,f16c")]
unsafe fn load_f16(ptr: *const f16) -> __m256 {
    _mm256_cvtph_ps(_mm_loadu_si128(ptr.cast()))
}

#[inline]
#[target_feature(enable = "avx2,fma,f16c")]
unsafe fn load_bf16(ptr: *const bf16) -> __m256 {
    let widened = _mm256_cvtepu16_epi32(_mm_loadu_si128(ptr.cast()));
    _mm256_castsi256_ps(_mm256_slli_epi32::<16>(widened))
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn load_i8(ptr: *const i8) -> __m256i {
    _mm256_cvtepi8_epi16(_mm_loadu_si128(ptr.cast()))
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn reduce_f32x8(sum: __m256) -> f64 {
    let mut lanes = [0f32; 8];
    _mm256_storeu_ps(lanes.as_mut_ptr(), sum);
    lanes.iter().map(|&lane| lane as f64).sum()
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn reduce_f64x4(sum: __m256d) -> f64 {
    let mut lanes = [0f64; 4];
    _mm256_storeu_pd(lanes.as_mut_ptr(), sum);
    lanes.iter().sum()
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn reduce_i32x8(sum: __m256i) -> i64 {
    let mut lanes = [0i32; 8];
    _mm256_storeu_si256(lanes.as_mut_ptr().cast(), sum);
    lanes.iter().map(|&lane| lane as i64).sum()
}

// endregion: Loads & reductions

// region: Floats

macro_rules! spatial_f32x8 {
    ($t:ty, $load:ident, $dot:ident, $cos:ident, $sqeuclidean:ident) => {
        #[target_feature(enable = "avx2,fma,f16c")]
        pub(super) unsafe fn $dot(a: *const c_void, b: *const c_void, n: usize) -> Distance {
            let (a, b) = (a.cast::<$t>(), b.cast::<$t>());
            let mut ab = _mm256_setzero_ps();
            let mut i = 0;
            while i + 8 <= n {
                ab = _mm256_fmadd_ps($load(a.add(i)), $load(b.add(i)), ab);
                i += 8;
            }
            let mut result = reduce_f32x8(ab);
            for j in i..n {
                result += (*a.add(j)).widen() * (*b.add(j)).widen();
            }
            result
        }

        #[target_feature(enable = "avx2,fma,f16c")]
        pub(super) unsafe fn $cos(a: *const c_void, b: *const c_void, n: usize) -> Distance {
            let (a, b) = (a.cast::<$t>(), b.cast::<$t>());
            let mut ab = _mm256_setzero_ps();
            let mut a2 = _mm256_setzero_ps();
            let mut b2 = _mm256_setzero_ps();
            let mut i = 0;
            while i + 8 <= n {
                let x = $load(a.add(i));
                let y = $load(b.add(i));
                ab = _mm256_fmadd_ps(x, y, ab);
                a2 = _mm256_fmadd_ps(x, x, a2);
                b2 = _mm256_fmadd_ps(y, y, b2);
                i += 8;
            }
            let (mut ab, mut a2, mut b2) = (reduce_f32x8(ab), reduce_f32x8(a2), reduce_f32x8(b2));
            for j in i..n {
                let (x, y) = ((*a.add(j)).widen(), (*b.add(j)).widen());
                ab += x * y;
                a2 += x * x;
                b2 += y * y;
            }
            cosine_distance(ab, a2, b2)
        }

        #[target_feature(enable = "avx2,fma,f16c")]
        pub(super) unsafe fn $sqeuclidean(
            a: *const c_void,
            b: *const c_void,
            n: usize,
        ) -> Distance {
            let (a, b) = (a.cast::<$t>(), b.cast::<$t>());
            let mut d2 = _mm256_setzero_ps();
            let mut i = 0;
            while i + 8 <= n {
                let d = _mm256_sub_ps($load(a.add(i)), $load(b.add(i)));
                d2 = _mm256_fmadd_ps(d, d, d2);
                i += 8;
            }
            let mut result = reduce_f32x8(d2);
            for j in i..n {
                let d = (*a.add(j)).widen() - (*b.add(j)).widen();
                result += d * d;
            }
            result
        }
    };
}

spatial_f32x8!(f32, load_f32, dot_f32, cos_f32, sqeuclidean_f32);
spatial_f32x8!(f16, load_f16, dot_f16, cos_f16, sqeuclidean_f16);
spatial_f32x8!(bf16, load_bf16, dot_bf16, cos_bf16, sqeuclidean_bf16);

#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn dot_f64(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<f64>(), b.cast::<f64>());
    let mut ab = _mm256_setzero_pd();
    let mut i = 0;
    while i + 4 <= n {
        ab = _mm256_fmadd_pd(_mm256_loadu_pd(a.add(i)), _mm256_loadu_pd(b.add(i)), ab);
        i += 4;
    }
    let mut result = reduce_f64x4(ab);
    for j in i..n {
        result += *a.add(j) * *b.add(j);
    }
    result
}

#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn cos_f64(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<f64>(), b.cast::<f64>());
    let mut ab = _mm256_setzero_pd();
    let mut a2 = _mm256_setzero_pd();
    let mut b2 = _mm256_setzero_pd();
    let mut i = 0;
    while i + 4 <= n {
        let x = _mm256_loadu_pd(a.add(i));
        let y = _mm256_loadu_pd(b.add(i));
        ab = _mm256_fmadd_pd(x, y, ab);
        a2 = _mm256_fmadd_pd(x, x, a2);
        b2 = _mm256_fmadd_pd(y, y, b2);
        i += 4;
    }
    let (mut ab, mut a2, mut b2) = (reduce_f64x4(ab), reduce_f64x4(a2), reduce_f64x4(b2));
    for j in i..n {
        let (x, y) = (*a.add(j), *b.add(j));
        ab += x * y;
        a2 += x * x;
        b2 += y * y;
    }
    cosine_distance(ab, a2, b2)
}

#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn sqeuclidean_f64(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<f64>(), b.cast::<f64>());
    let mut d2 = _mm256_setzero_pd();
    let mut i = 0;
    while i + 4 <= n {
        let d = _mm256_sub_pd(_mm256_loadu_pd(a.add(i)), _mm256_loadu_pd(b.add(i)));
        d2 = _mm256_fmadd_pd(d, d, d2);
        i += 4;
    }
    let mut result = reduce_f64x4(d2);
    for j in i..n {
        let d = *a.add(j) - *b.add(j);
        result += d * d;
    }
    result
}

// endregion: Floats

// region: Integers

#[target_feature(enable = "avx2")]
pub(super) unsafe fn dot_i8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let mut ab = 0i64;
    let mut i = 0;
    while i + 16 <= n {
        let end = n.min(i + I8_BLOCK);
        let mut block = _mm256_setzero_si256();
        while i + 16 <= end {
            block = _mm256_add_epi32(
                block,
                _mm256_madd_epi16(load_i8(a.add(i)), load_i8(b.add(i))),
            );
            i += 16;
        }
        ab += reduce_i32x8(block);
    }
    for j in i..n {
        ab += *a.add(j) as i64 * *b.add(j) as i64;
    }
    ab as Distance
}

#[target_feature(enable = "avx2")]
pub(super) unsafe fn cos_i8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let (mut ab, mut a2, mut b2) = (0i64, 0i64, 0i64);
    let mut i = 0;
    while i + 16 <= n {
        let end = n.min(i + I8_BLOCK);
        let mut ab_block = _mm256_setzero_si256();
        let mut a2_block = _mm256_setzero_si256();
        let mut b2_block = _mm256_setzero_si256();
        while i + 16 <= end {
            let x = load_i8(a.add(i));
            let y = load_i8(b.add(i));
            ab_block = _mm256_add_epi32(ab_block, _mm256_madd_epi16(x, y));
            a2_block = _mm256_add_epi32(a2_block, _mm256_madd_epi16(x, x));
            b2_block = _mm256_add_epi32(b2_block, _mm256_madd_epi16(y, y));
            i += 16;
        }
        ab += reduce_i32x8(ab_block);
        a2 += reduce_i32x8(a2_block);
        b2 += reduce_i32x8(b2_block);
    }
    for j in i..n {
        let (x, y) = (*a.add(j) as i64, *b.add(j) as i64);
        ab += x * y;
        a2 += x * x;
        b2 += y * y;
    }
    cosine_distance(ab as f64, a2 as f64, b2 as f64)
}

#[target_feature(enable = "avx2")]
pub(super) unsafe fn sqeuclidean_i8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let mut d2 = 0i64;
    let mut i = 0;
    while i + 16 <= n {
        let end = n.min(i + I8_BLOCK);
        let mut block = _mm256_setzero_si256();
        while i + 16 <= end {
            let d = _mm256_sub_epi16(load_i8(a.add(i)), load_i8(b.add(i)));
            block = _mm256_add_epi32(block, _mm256_madd_epi16(d, d));
            i += 16;
        }
        d2 += reduce_i32x8(block);
    }
    for j in i..n {
        let d = *a.add(j) as i64 - *b.add(j) as i64;
        d2 += d * d;
    }
    d2 as Distance
}

// endregion: Integers

// region: Binary

#[inline]
unsafe fn word(ptr: *const u8) -> i64 {
    ptr.cast::<i64>().read_unaligned()
}

#[target_feature(enable = "popcnt")]
pub(super) unsafe fn hamming_b8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<u8>(), b.cast::<u8>());
    let mut differences = 0u64;
    let mut i = 0;
    while i + 8 <= n {
        differences += _popcnt64(word(a.add(i)) ^ word(b.add(i))) as u64;
        i += 8;
    }
    for j in i..n {
        differences += _popcnt32((*a.add(j) ^ *b.add(j)) as i32) as u64;
    }
    differences as Distance
}

#[target_feature(enable = "popcnt")]
pub(super) unsafe fn jaccard_b8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<u8>(), b.cast::<u8>());
    let (mut intersection, mut union) = (0u64, 0u64);
    let mut i = 0;
    while i + 8 <= n {
        let (x, y) = (word(a.add(i)), word(b.add(i)));
        intersection += _popcnt64(x & y) as u64;
        union += _popcnt64(x | y) as u64;
        i += 8;
    }
    for j in i..n {
        let (x, y) = (*a.add(j) as i32, *b.add(j) as i32);
        intersection += _popcnt32(x & y) as u64;
        union += _popcnt32(x | y) as u64;
    }
    jaccard_distance(intersection, union)
}

// endregion: Binary

pub(super) const VARIANTS: &[KernelVariant] = &[
    KernelVariant::new(Metric::Dot, Dtype::F64, Tier::Haswell, dot_f64),
    KernelVariant::new(Metric::Dot, Dtype::F32, Tier::Haswell, dot_f32),
    KernelVariant::new(Metric::Dot, Dtype::F16, Tier::Haswell, dot_f16),
    KernelVariant::new(Metric::Dot, Dtype::BF16, Tier::Haswell, dot_bf16),
    KernelVariant::new(Metric::Dot, Dtype::I8, Tier::Haswell, dot_i8),
    KernelVariant::new(Metric::Cosine, Dtype::F64, Tier::Haswell, cos_f64),
    KernelVariant::new(Metric::Cosine, Dtype::F32, Tier::Haswell, cos_f32),
    KernelVariant::new(Metric::Cosine, Dtype::F16, Tier::Haswell, cos_f16),
    KernelVariant::new(Metric::Cosine, Dtype::BF16, Tier::Haswell, cos_bf16),
    KernelVariant::new(Metric::Cosine, Dtype::I8, Tier::Haswell, cos_i8),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F64, Tier::Haswell, sqeuclidean_f64),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F32, Tier::Haswell, sqeuclidean_f32),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F16, Tier::Haswell, sqeuclidean_f16),
    KernelVariant::new(Metric::SqEuclidean, Dtype::BF16, Tier::Haswell, sqeuclidean_bf16),
    KernelVariant::new(Metric::SqEuclidean, Dtype::I8, Tier::Haswell, sqeuclidean_i8),
    KernelVariant::new(Metric::Hamming, Dtype::B8, Tier::Haswell, hamming_b8),
    KernelVariant::new(Metric::Jaccard, Dtype::B8, Tier::Haswell, jaccard_b8),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::probe;
    use crate::kernels::testing::assert_matches_serial;

    #[test]
    fn matches_serial() {
        if !Tier::Haswell.is_supported_by(probe()) {
            return;
        }
        assert_matches_serial(VARIANTS, 1e-4);
    }

    #[test]
    fn i8_extremes_do_not_overflow() {
        if !Tier::Haswell.is_supported_by(probe()) {
            return;
        }
        let n = I8_BLOCK * 2 + 5;
        let a = vec![-128i8; n];
        let b = vec![127i8; n];
        let (pa, pb) = (a.as_ptr().cast(), b.as_ptr().cast());
        unsafe {
            assert_eq!(dot_i8(pa, pa, n), n as f64 * 16384.0);
            assert_eq!(sqeuclidean_i8(pa, pb, n), n as f64 * 255.0 * 255.0);
            assert!(cos_i8(pa, pa, n).abs() < 1e-12);
        }
    }
}
