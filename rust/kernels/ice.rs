//! Ice Lake kernels: VNNI dot products for `i8` and VPOPCNTDQ for bit sets.

use core::arch::x86_64::*;
use core::ffi::c_void;

use super::serial::{cosine_distance, jaccard_distance};
use crate::capabilities::Tier;
use crate::dispatch::{Distance, Dtype, KernelVariant, Metric};

/// Integer lanes are flushed into 64-bit totals after this many elements.
const I8_BLOCK: usize = 32 * 4096;

#[inline(always)]
fn mask32(remaining: usize) -> __mmask32 {
    if remaining >= 32 {
        u32::MAX
    } else {
        (1u32 << remaining) - 1
    }
}

#[inline(always)]
fn mask64(remaining: usize) -> __mmask64 {
    if remaining >= 64 {
        u64::MAX
    } else {
        (1u64 << remaining) - 1
    }
}

#[inline]
#[target_feature(enable = "avx512f,avx512bw,avx512vl")]
unsafe fn load_i8(ptr: *const i8, mask: __mmask32) -> __m512i {
    _mm512_cvtepi8_epi16(_mm256_maskz_loadu_epi8(mask, ptr))
}

#[inline]
#[target_feature(enable = "avx512f")]
unsafe fn reduce_i32x16(sum: __m512i) -> i64 {
    let mut lanes = [0i32; 16];
    _mm512_storeu_si512(lanes.as_mut_ptr().cast(), sum);
    lanes.iter().map(|&lane| lane as i64).sum()
}

// region: Integers

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx512vnni,avx512vpopcntdq")]
pub(super) unsafe fn dot_i8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let mut ab = 0i64;
    let mut i = 0;
    while i < n {
        let end = n.min(i + I8_BLOCK);
        let mut block = _mm512_setzero_si512();
        while i < end {
            let mask = mask32(end - i);
            block = _mm512_dpwssd_epi32(block, load_i8(a.add(i), mask), load_i8(b.add(i), mask));
            i += 32;
        }
        ab += reduce_i32x16(block);
    }
    ab as Distance
}

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx512vnni,avx512vpopcntdq")]
pub(super) unsafe fn cos_i8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let (mut ab, mut a2, mut b2) = (0i64, 0i64, 0i64);
    let mut i = 0;
    while i < n {
        let end = n.min(i + I8_BLOCK);
        let mut ab_block = _mm512_setzero_si512();
        let mut a2_block = _mm512_setzero_si512();
        let mut b2_block = _mm512_setzero_si512();
        while i < end {
            let mask = mask32(end - i);
            let x = load_i8(a.add(i), mask);
            let y = load_i8(b.add(i), mask);
            ab_block = _mm512_dpwssd_epi32(ab_block, x, y);
            a2_block = _mm512_dpwssd_epi32(a2_block, x, x);
            b2_block = _mm512_dpwssd_epi32(b2_block, y, y);
            i += 32;
        }
        ab += reduce_i32x16(ab_block);
        a2 += reduce_i32x16(a2_block);
        b2 += reduce_i32x16(b2_block);
    }
    cosine_distance(ab as f64, a2 as f64, b2 as f64)
}

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx512vnni,avx512vpopcntdq")]
pub(super) unsafe fn sqeuclidean_i8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let mut d2 = 0i64;
    let mut i = 0;
    while i < n {
        let end = n.min(i + I8_BLOCK);
        let mut block = _mm512_setzero_si512();
        while i < end {
            let mask = mask32(end - i);
            let d = _mm512_sub_epi16(load_i8(a.add(i), mask), load_i8(b.add(i), mask));
            block = _mm512_dpwssd_epi32(block, d, d);
            i += 32;
        }
        d2 += reduce_i32x16(block);
    }
    d2 as Distance
}

// endregion: Integers

// region: Binary

#[target_feature(enable = "avx512f,avx512bw,avx512vpopcntdq")]
pub(super) unsafe fn hamming_b8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let mut differences = _mm512_setzero_si512();
    let mut i = 0;
    while i < n {
        let mask = mask64(n - i);
        let x = _mm512_maskz_loadu_epi8(mask, a.add(i));
        let y = _mm512_maskz_loadu_epi8(mask, b.add(i));
        differences = _mm512_add_epi64(differences, _mm512_popcnt_epi64(_mm512_xor_si512(x, y)));
        i += 64;
    }
    _mm512_reduce_add_epi64(differences) as Distance
}

#[target_feature(enable = "avx512f,avx512bw,avx512vpopcntdq")]
pub(super) unsafe fn jaccard_b8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let mut intersection = _mm512_setzero_si512();
    let mut union = _mm512_setzero_si512();
    let mut i = 0;
    while i < n {
        let mask = mask64(n - i);
        let x = _mm512_maskz_loadu_epi8(mask, a.add(i));
        let y = _mm512_maskz_loadu_epi8(mask, b.add(i));
        intersection = _mm512_add_epi64(intersection, _mm512_popcnt_epi64(_mm512_and_si512(x, y)));
        union = _mm512_add_epi64(union, _mm512_popcnt_epi64(_mm512_or_si512(x, y)));
        i += 64;
    }
    jaccard_distance(
        _mm512_reduce_add_epi64(intersection) as u64,
        _mm512_reduce_add_epi64(union) as u64,
    )
}

// endregion: Binary

pub(super) const VARIANTS: &[KernelVariant] = &[
    KernelVariant::new(Metric::Dot, Dtype::I8, Tier::Ice, dot_i8),
    KernelVariant::new(Metric::Cosine, Dtype::I8, Tier::Ice, cos_i8),
    KernelVariant::new(Metric::SqEuclidean, Dtype::I8, Tier::Ice, sqeuclidean_i8),
    KernelVariant::new(Metric::Hamming, Dtype::B8, Tier::Ice, hamming_b8),
    KernelVariant::new(Metric::Jaccard, Dtype::B8, Tier::Ice, jaccard_b8),
];
