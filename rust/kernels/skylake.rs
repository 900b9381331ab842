//! AVX-512 floating-point kernels. Tails are handled with masked loads instead
//! of a scalar loop.

use core::arch::x86_64::*;
use core::ffi::c_void;

use super::serial::cosine_distance;
use crate::capabilities::Tier;
use crate::dispatch::{Distance, Dtype, KernelVariant, Metric};
use crate::scalars::{bf16, f16};

#[inline(always)]
fn mask16(remaining: usize) -> __mmask16 {
    if remaining >= 16 {
        u16::MAX
    } else {
        (1u16 << remaining) - 1
    }
}

#[inline(always)]
fn mask8(remaining: usize) -> __mmask8 {
    if remaining >= 8 {
        u8::MAX
    } else {
        (1u8 << remaining) - 1
    }
}

// region: Loads

#[inline]
#[target_feature(enable = "avx512f")]
unsafe fn load_f32(ptr: *const f32, mask: __mmask16) -> __m512 {
    _mm512_maskz_loadu_ps(mask, ptr)
}

#[inline]
#[target_feature(enable = "avx512f,avx512bw,avx512vl")]
unsafe fn load_f16(ptr: *const f16, mask: __mmask16) -> __m512 {
    _mm512_cvtph_ps(_mm256_maskz_loadu_epi16(mask, ptr.cast()))
}

#[inline]
#[target_feature(enable = "avx512f,avx512bw,avx512vl")]
unsafe fn load_bf16(ptr: *const bf16, mask: __mmask16) -> __m512 {
    let widened = _mm512_cvtepu16_epi32(_mm256_maskz_loadu_epi16(mask, ptr.cast()));
    _mm512_castsi512_ps(_mm512_slli_epi32::<16>(widened))
}

// endregion: Loads

// region: Single precision and below

macro_rules! spatial_f32x16 {
    ($t:ty, $load:ident, $dot:ident, $cos:ident, $sqeuclidean:ident) => {
        #[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,f16c")]
        pub(super) unsafe fn $dot(a: *const c_void, b: *const c_void, n: usize) -> Distance {
            let (a, b) = (a.cast::<$t>(), b.cast::<$t>());
            let mut ab = _mm512_setzero_ps();
            let mut i = 0;
            while i < n {
                let mask = mask16(n - i);
                ab = _mm512_fmadd_ps($load(a.add(i), mask), $load(b.add(i), mask), ab);
                i += 16;
            }
            _mm512_reduce_add_ps(ab) as Distance
        }

        #[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,f16c")]
        pub(super) unsafe fn $cos(a: *const c_void, b: *const c_void, n: usize) -> Distance {
            let (a, b) = (a.cast::<$t>(), b.cast::<$t>());
            let mut ab = _mm512_setzero_ps();
            let mut a2 = _mm512_setzero_ps();
            let mut b2 = _mm512_setzero_ps();
            let mut i = 0;
            while i < n {
                let mask = mask16(n - i);
                let x = $load(a.add(i), mask);
                let y = $load(b.add(i), mask);
                ab = _mm512_fmadd_ps(x, y, ab);
                a2 = _mm512_fmadd_ps(x, x, a2);
                b2 = _mm512_fmadd_ps(y, y, b2);
                i += 16;
            }
            cosine_distance(
                _mm512_reduce_add_ps(ab) as f64,
                _mm512_reduce_add_ps(a2) as f64,
                _mm512_reduce_add_ps(b2) as f64,
            )
        }

        #[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,f16c")]
        pub(super) unsafe fn $sqeuclidean(
            a: *const c_void,
            b: *const c_void,
            n: usize,
        ) -> Distance {
            let (a, b) = (a.cast::<$t>(), b.cast::<$t>());
            let mut d2 = _mm512_setzero_ps();
            let mut i = 0;
            while i < n {
                let mask = mask16(n - i);
                let d = _mm512_sub_ps($load(a.add(i), mask), $load(b.add(i), mask));
                d2 = _mm512_fmadd_ps(d, d, d2);
                i += 16;
            }
            _mm512_reduce_add_ps(d2) as Distance
        }
    };
}

spatial_f32x16!(f32, load_f32, dot_f32, cos_f32, sqeuclidean_f32);
spatial_f32x16!(f16, load_f16, dot_f16, cos_f16, sqeuclidean_f16);
spatial_f32x16!(bf16, load_bf16, dot_bf16, cos_bf16, sqeuclidean_bf16);

// endregion: Single precision and below

// region: Double precision

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,f16c")]
pub(super) unsafe fn dot_f64(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<f64>(), b.cast::<f64>());
    let mut ab = _mm512_setzero_pd();
    let mut i = 0;
    while i < n {
        let mask = mask8(n - i);
        let x = _mm512_maskz_loadu_pd(mask, a.add(i));
        let y = _mm512_maskz_loadu_pd(mask, b.add(i));
        ab = _mm512_fmadd_pd(x, y, ab);
        i += 8;
    }
    _mm512_reduce_add_pd(ab)
}

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,f16c")]
pub(super) unsafe fn cos_f64(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<f64>(), b.cast::<f64>());
    let mut ab = _mm512_setzero_pd();
    let mut a2 = _mm512_setzero_pd();
    let mut b2 = _mm512_setzero_pd();
    let mut i = 0;
    while i < n {
        let mask = mask8(n - i);
        let x = _mm512_maskz_loadu_pd(mask, a.add(i));
        let y = _mm512_maskz_loadu_pd(mask, b.add(i));
        ab = _mm512_fmadd_pd(x, y, ab);
        a2 = _mm512_fmadd_pd(x, x, a2);
        b2 = _mm512_fmadd_pd(y, y, b2);
        i += 8;
    }
    cosine_distance(
        _mm512_reduce_add_pd(ab),
        _mm512_reduce_add_pd(a2),
        _mm512_reduce_add_pd(b2),
    )
}

#[target_feature(enable = "avx512f,avx512cd,avx512bw,avx512dq,avx512vl,avx2,fma,f16c")]
pub(super) unsafe fn sqeuclidean_f64(a: *const c_void, b: *const c_void, n: usize) -> Distance {
    let (a, b) = (a.cast::<f64>(), b.cast::<f64>());
    let mut d2 = _mm512_setzero_pd();
    let mut i = 0;
    while i < n {
        let mask = mask8(n - i);
        let d = _mm512_sub_pd(
            _mm512_maskz_loadu_pd(mask, a.add(i)),
            _mm512_maskz_loadu_pd(mask, b.add(i)),
        );
        d2 = _mm512_fmadd_pd(d, d, d2);
        i += 8;
    }
    _mm512_reduce_add_pd(d2)
}

// endregion: Double precision

pub(super) const VARIANTS: &[KernelVariant] = &[
    KernelVariant::new(Metric::Dot, Dtype::F64, Tier::Skylake, dot_f64),
    KernelVariant::new(Metric::Dot, Dtype::F32, Tier::Skylake, dot_f32),
    KernelVariant::new(Metric::Dot, Dtype::F16, Tier::Skylake, dot_f16),
    KernelVariant::new(Metric::Dot, Dtype::BF16, Tier::Skylake, dot_bf16),
    KernelVariant::new(Metric::Cosine, Dtype::F64, Tier::Skylake, cos_f64),
    KernelVariant::new(Metric::Cosine, Dtype::F32, Tier::Skylake, cos_f32),
    KernelVariant::new(Metric::Cosine, Dtype::F16, Tier::Skylake, cos_f16),
    KernelVariant::new(Metric::Cosine, Dtype::BF16, Tier::Skylake, cos_bf16),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F64, Tier::Skylake, sqeuclidean_f64),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F32, Tier::Skylake, sqeuclidean_f32),
    KernelVariant::new(Metric::SqEuclidean, Dtype::F16, Tier::Skylake, sqeuclidean_f16),
    KernelVariant::new(Metric::SqEuclidean, Dtype::BF16, Tier::Skylake, sqeuclidean_bf16),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::probe;
    use crate::kernels::testing::assert_matches_serial;

    #[test]
    fn tail_masks() {
        assert_eq!(mask16(0), 0);
        assert_eq!(mask16(3), 0b111);
        assert_eq!(mask16(16), u16::MAX);
        assert_eq!(mask16(100), u16::MAX);
        assert_eq!(mask8(7), 0x7F);
        assert_eq!(mask8(8), u8::MAX);
    }

    #[test]
    fn matches_serial() {
        if !Tier::Skylake.is_supported_by(probe()) {
            return;
        }
        assert_matches_serial(VARIANTS, 1e-4);
    }
}
