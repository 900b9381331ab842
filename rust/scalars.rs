//! Half-precision storage types.
//!
//! - [`f16`]: IEEE 754 half-precision (16-bit) floating point
//! - [`bf16`]: Brain floating point (bfloat16) - truncated single precision
//!
//! Both are plain `u16` bit patterns. How they convert to `f32` is a build
//! decision: with `SIMSIMD_NATIVE_F16` / `SIMSIMD_NATIVE_BF16` enabled the
//! conversion goes through the `half` crate, which uses hardware instructions
//! where the target has them. Otherwise the portable bit-level routines below
//! are used.

#![allow(non_camel_case_types)]

// region: f16 Type

/// A half-precision (16-bit) floating point number.
///
/// The underlying `u16` is public for direct bit manipulation.
///
/// ```
/// use simsimd::f16;
///
/// let half = f16::from_f32(3.14);
/// assert!((half.to_f32() - 3.14).abs() < 1e-3);
///
/// let bits = half.0;
/// assert_eq!(f16(bits), half);
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct f16(pub u16);

impl f16 {
    pub const ZERO: Self = f16(0);
    pub const ONE: Self = f16(0x3C00);
    pub const NEG_ONE: Self = f16(0xBC00);

    #[inline(always)]
    pub fn from_f32(value: f32) -> Self {
        if cfg!(simsimd_native_f16 = "1") {
            f16(half::f16::from_f32(value).to_bits())
        } else {
            f16(f32_to_f16_bits(value))
        }
    }

    #[inline(always)]
    pub fn to_f32(self) -> f32 {
        if cfg!(simsimd_native_f16 = "1") {
            half::f16::from_bits(self.0).to_f32()
        } else {
            f16_bits_to_f32(self.0)
        }
    }

    #[inline(always)]
    pub fn is_nan(self) -> bool {
        self.0 & 0x7C00 == 0x7C00 && self.0 & 0x03FF != 0
    }
}

impl From<half::f16> for f16 {
    fn from(value: half::f16) -> Self {
        f16(value.to_bits())
    }
}

impl From<f16> for half::f16 {
    fn from(value: f16) -> Self {
        half::f16::from_bits(value.0)
    }
}

impl core::fmt::Display for f16 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}

/// Portable `f16 -> f32`, exact for every input including subnormals.
pub(crate) fn f16_bits_to_f32(bits: u16) -> f32 {
    let sign = ((bits & 0x8000) as u32) << 16;
    let exponent = ((bits >> 10) & 0x1F) as u32;
    let mantissa = (bits & 0x03FF) as u32;

    let magnitude = match exponent {
        0 if mantissa == 0 => 0,
        0 => {
            // Subnormal: renormalize into an f32 normal
            let shift = mantissa.leading_zeros() - 21;
            let mantissa = (mantissa << shift) & 0x03FF;
            ((127 - 15 + 1 - shift) << 23) | (mantissa << 13)
        }
        0x1F => 0x7F80_0000 | (mantissa << 13),
        _ => ((exponent + 127 - 15) << 23) | (mantissa << 13),
    };
    f32::from_bits(sign | magnitude)
}

/// Portable `f32 -> f16` with round-to-nearest-even.
pub(crate) fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xFF) as i32;
    let mantissa = bits & 0x007F_FFFF;

    if exponent == 0xFF {
        let nan = if mantissa != 0 { 0x0200 } else { 0 };
        return sign | 0x7C00 | nan;
    }

    let unbiased = exponent - 127 + 15;
    if unbiased >= 0x1F {
        return sign | 0x7C00;
    }
    if unbiased <= 0 {
        if unbiased < -10 {
            return sign;
        }
        let mantissa = mantissa | 0x0080_0000;
        let shift = (14 - unbiased) as u32;
        let half_mantissa = mantissa >> shift;
        let remainder = mantissa & ((1 << shift) - 1);
        let halfway = 1 << (shift - 1);
        let round_up = remainder > halfway || (remainder == halfway && half_mantissa & 1 != 0);
        return sign | (half_mantissa + round_up as u32) as u16;
    }

    let half_bits = ((unbiased as u32) << 10) | (mantissa >> 13);
    let remainder = mantissa & 0x1FFF;
    let round_up = remainder > 0x1000 || (remainder == 0x1000 && half_bits & 1 != 0);
    // A carry out of the mantissa lands in the exponent, which is what we want
    sign | (half_bits + round_up as u32) as u16
}

// endregion: f16 Type

// region: bf16 Type

/// A brain floating point (bfloat16) number.
///
/// Keeps the sign bit, 8 exponent bits and 7 mantissa bits of an `f32`, which
/// gives the full single-precision range with less precision than [`f16`].
///
/// ```
/// use simsimd::bf16;
///
/// let brain = bf16::from_f32(3.14);
/// assert!((brain.to_f32() - 3.14).abs() < 1e-2);
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct bf16(pub u16);

impl bf16 {
    pub const ZERO: Self = bf16(0);
    pub const ONE: Self = bf16(0x3F80);
    pub const NEG_ONE: Self = bf16(0xBF80);

    #[inline(always)]
    pub fn from_f32(value: f32) -> Self {
        if cfg!(simsimd_native_bf16 = "1") {
            bf16(half::bf16::from_f32(value).to_bits())
        } else {
            bf16(f32_to_bf16_bits(value))
        }
    }

    #[inline(always)]
    pub fn to_f32(self) -> f32 {
        if cfg!(simsimd_native_bf16 = "1") {
            half::bf16::from_bits(self.0).to_f32()
        } else {
            bf16_bits_to_f32(self.0)
        }
    }

    #[inline(always)]
    pub fn is_nan(self) -> bool {
        self.0 & 0x7F80 == 0x7F80 && self.0 & 0x007F != 0
    }
}

impl From<half::bf16> for bf16 {
    fn from(value: half::bf16) -> Self {
        bf16(value.to_bits())
    }
}

impl From<bf16> for half::bf16 {
    fn from(value: bf16) -> Self {
        half::bf16::from_bits(value.0)
    }
}

impl core::fmt::Display for bf16 {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}

#[inline(always)]
pub(crate) fn bf16_bits_to_f32(bits: u16) -> f32 {
    f32::from_bits((bits as u32) << 16)
}

/// Round-to-nearest-even truncation of the low 16 bits.
pub(crate) fn f32_to_bf16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    if value.is_nan() {
        return ((bits >> 16) as u16) | 0x0040;
    }
    let rounding = 0x7FFF + ((bits >> 16) & 1);
    (bits.wrapping_add(rounding) >> 16) as u16
}

// endregion: bf16 Type
