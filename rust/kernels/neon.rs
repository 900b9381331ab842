//! Arm NEON kernels. Compiled when `SIMSIMD_TARGET_NEON` is on.

use core::arch::aarch64::*;
use core::ffi::c_void;

use super::serial::{cosine_distance, jaccard_distance};
use crate::capabilities::Tier;
use crate::dispatch::{Distance, Dtype, KernelVariant, Metric};

/// Integer lanes are flushed into 64-bit totals after this many elements.
const I8_BLOCK: usize = 16 * 4096;

// region: Floats

macro_rules! spatial_float {
    (
        $t:ty, $lanes:expr,
        $dup:ident, $load:ident, $fma:ident, $sub:ident, $sum:ident,
        $dot:ident, $cos:ident, $sqeuclidean:ident
    ) => {
        #[target_feature(enable = "neon")]
        pub(super) unsafe fn $dot(a: *const c_void, b: *const c_void, n: usize) -> Distance {
            let (a, b) = (a.cast::<$t>(), b.cast::<$t>());
            let mut ab = $dup(0.0);
            let mut i = 0;
            while i + $lanes <= n {
                ab = $fma(ab, $load(a.add(i)), $load(b.add(i)));
                i += $lanes;
            }
            let mut result = $sum(ab) as f64;
            for j in i..n {
                result += *a.add(j) as f64 * *b.add(j) as f64;
            }
            result
        }

        #[target_feature(enable = "neon")]
        pub(super) unsafe fn $cos(a: *const c_void, b: *const c_void, n: usize) -> Distance {
            let (a, b) = (a.cast::<$t>(), b.cast::<$t>());
            let (mut ab, mut a2, mut b2) = ($dup(0.0), $dup(0.0), $dup(0.0));
            let mut i = 0;
            while i + $lanes <= n {
                let x = $load(a.add(i));
                let y = $load(b.add(i));
                ab = $fma(ab, x, y);
                a2 = $fma(a2, x, x);
                b2 = $fma(b2, y, y);
                i += $lanes;
            }
            let (mut ab, mut a2, mut b2) = ($sum(ab) as f64, $sum(a2) as f64, $sum(b2) as f64);
            for j in i..n {
                let (x, y) = (*a.add(j) as f64, *b.add(j) as f64);
                ab += x * y;
                a2 += x * x;
                b2 += y * y;
            }
            cosine_distance(ab, a2, b2)
        }

        #[target_feature(enable = "neon")]
        pub(super) unsafe fn $sqeuclidean(
            a: *const c_void,
            b: *const c_void,
            n: usize,
        ) -> Distance {
            let (a, b) = (a.cast::<$t>(), b.cast::<$t>());
            let mut d2 = $dup(0.0);
            let mut i = 0;
            while i + $lanes <= n {
                let d = $sub($load(a.add(i)), $load(b.add(i)));
                d2 = $fma(d2, d, d);
                i += $lanes;
            }
            let mut result = $sum(d2) as f64;
            for j in i..n {
                let d = *a.add(j) as f64 - *b.add(j) as f64;
                result += d * d;
            }
            result
        }
    };
}

spatial_float!(
    f32, 4,
    vdupq_n_f32, vld1q_f32, vfmaq_f32, vsubq_f32, vaddvq_f32,
    dot_f32, cos_f32, sqeuclidean_f32
);
spatial_float!(
    f64, 2,
    vdupq_n_f64, vld1q_f64, vfmaq_f64, vsubq_f64, vaddvq_f64,
    dot_f64, cos_f64, sqeuclidean_f64
);

// endregion: Floats

// region: Integers

#[target_feature(enable = "neon")]
pub(super) unsafe fn dot_i8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let mut ab = 0i64;
    let mut i = 0;
    while i + 16 <= n {
        let end = n.min(i + I8_BLOCK);
        let mut block = vdupq_n_s32(0);
        while i + 16 <= end {
            let x = vld1q_s8(a.add(i));
            let y = vld1q_s8(b.add(i));
            block = vpadalq_s16(block, vmull_s8(vget_low_s8(x), vget_low_s8(y)));
            block = vpadalq_s16(block, vmull_high_s8(x, y));
            i += 16;
        }
        ab += vaddlvq_s32(block);
    }
    for j in i..n {
        ab += *a.add(j) as i64 * *b.add(j) as i64;
    }
    ab as Distance
}

#[target_feature(enable = "neon")]
pub(super) unsafe fn cos_i8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let (mut ab, mut a2, mut b2) = (0i64, 0i64, 0i64);
    let mut i = 0;
    while i + 16 <= n {
        let end = n.min(i + I8_BLOCK);
        let (mut ab_block, mut a2_block, mut b2_block) =
            (vdupq_n_s32(0), vdupq_n_s32(0), vdupq_n_s32(0));
        while i + 16 <= end {
            let x = vld1q_s8(a.add(i));
            let y = vld1q_s8(b.add(i));
            let (x_low, y_low) = (vget_low_s8(x), vget_low_s8(y));
            ab_block = vpadalq_s16(ab_block, vmull_s8(x_low, y_low));
            ab_block = vpadalq_s16(ab_block, vmull_high_s8(x, y));
            a2_block = vpadalq_s16(a2_block, vmull_s8(x_low, x_low));
            a2_block = vpadalq_s16(a2_block, vmull_high_s8(x, x));
            b2_block = vpadalq_s16(b2_block, vmull_s8(y_low, y_low));
            b2_block = vpadalq_s16(b2_block, vmull_high_s8(y, y));
            i += 16;
        }
        ab += vaddlvq_s32(ab_block);
        a2 += vaddlvq_s32(a2_block);
        b2 += vaddlvq_s32(b2_block);
    }
    for j in i..n {
        let (x, y) = (*a.add(j) as i64, *b.add(j) as i64);
        ab += x * y;
        a2 += x * x;
        b2 += y * y;
    }
    cosine_distance(ab as f64, a2 as f64, b2 as f64)
}

#[target_feature(enable = "neon")]
pub(super) unsafe fn sqeuclidean_i8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<i8>(), b.cast::<i8>());
    let mut d2 = 0i64;
    let mut i = 0;
    while i + 16 <= n {
        let end = n.min(i + I8_BLOCK);
        let mut block = vdupq_n_s32(0);
        while i + 16 <= end {
            let x = vld1q_s8(a.add(i));
            let y = vld1q_s8(b.add(i));
            let low = vsubl_s8(vget_low_s8(x), vget_low_s8(y));
            let high = vsubl_high_s8(x, y);
            block = vmlal_s16(block, vget_low_s16(low), vget_low_s16(low));
            block = vmlal_high_s16(block, low, low);
            block = vmlal_s16(block, vget_low_s16(high), vget_low_s16(high));
            block = vmlal_high_s16(block, high, high);
            i += 16;
        }
        d2 += vaddlvq_s32(block);
    }
    for j in i..n {
        let d = *a.add(j) as i64 - *b.add(j) as i64;
        d2 += d * d;
    }
    d2 as Distance
}

// endregion: Integers

// region: Binary

#[target_feature(enable = "neon")]
pub(super) unsafe fn hamming_b8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<u8>(), b.cast::<u8>());
    let mut differences = 0u64;
    let mut i = 0;
    while i + 16 <= n {
        let x = vld1q_u8(a.add(i));
        let y = vld1q_u8(b.add(i));
        differences += vaddlvq_u8(vcntq_u8(veorq_u8(x, y))) as u64;
        i += 16;
    }
    for j in i..n {
        differences += (*a.add(j) ^ *b.add(j)).count_ones() as u64;
    }
    differences as Distance
}

#[target_feature(enable = "neon")]
pub(super) unsafe fn jaccard_b8(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<u8>(), b.cast::<u8>());
    let (mut intersection, mut union) = (0u64, 0u64);
    let mut i = 0;
    while i + 16 <= n {
        let x = vld1q_u8(a.add(i));
        let y = vld1q_u8(b.add(i));
        intersection += vaddlvq_u8(vcntq_u8(vandq_u8(x, y))) as u64;
        union += vaddlvq_u8(vcntq_u8(vorrq_u8(x, y))) as u64;
        i += 16;
    }
    for j in i..n {
        let (x, y) = (*a.add(j), *b.add(j));
        intersection += (x & y).count_ones() as u64;
        union += (x | y).count_ones() as u64;
    }
    jaccard_distance(intersection, union)
}

// endregion: Binary

pub(super) const VARIANTS: &[KernelVariant] = &[
    KernelVariant::new(Metric::Dot, Dtype::F64, Tier::Neon, dot_f64),
    KernelVariant::new(Metric::Dot, Dtype::F32, Tier::Neon, dot_f32),
    KernelVariant::new(Metric::Dot, Dtype::I8, Tier::Neon, dot_i8),
    KernelVariant::new(Metric::Cosine, Dtype::F64, Tier::Neon, cos_f64),
    KernelVariant::new(Metric::Cosine, Dtype::F32, Tier::Neon, cos_f32),
    KernelVariant::new(Metric::Cosine, Dtype::I8, Tier::Neon, cos_i8),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F64, Tier::Neon, sqeuclidean_f64),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F32, Tier::Neon, sqeuclidean_f32),
    KernelVariant::new(Metric::SqEuclidean, Dtype::I8, Tier::Neon, sqeuclidean_i8),
    KernelVariant::new(Metric::Hamming, Dtype::B8, Tier::Neon, hamming_b8),
    KernelVariant::new(Metric::Jaccard, Dtype::B8, Tier::Neon, jaccard_b8),
];
