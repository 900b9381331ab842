//! Hardware capability detection and instruction-set tiers.
//!
//! [`probe`] reads the feature bits of the CPU the process is running on.
//! [`Tier`] groups those bits into the levels kernels are written for, and the
//! order of [`Tier::LADDER`] decides which one wins when several apply.

use std::sync::OnceLock;

use crate::config::ResolvedConfiguration;

// region: FeatureSet

/// A set of CPU features, one bit per instruction-set extension.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeatureSet(u64);

impl FeatureSet {
    // Arm
    pub const NEON: Self = Self(1 << 0);
    pub const ARM_FP16: Self = Self(1 << 1);
    pub const ARM_BF16: Self = Self(1 << 2);
    pub const ARM_DOTPROD: Self = Self(1 << 3);
    pub const SVE: Self = Self(1 << 4);

    // x86
    pub const AVX2: Self = Self(1 << 16);
    pub const FMA: Self = Self(1 << 17);
    pub const F16C: Self = Self(1 << 18);
    pub const POPCNT: Self = Self(1 << 19);
    pub const AVX512F: Self = Self(1 << 20);
    pub const AVX512CD: Self = Self(1 << 21);
    pub const AVX512BW: Self = Self(1 << 22);
    pub const AVX512DQ: Self = Self(1 << 23);
    pub const AVX512VL: Self = Self(1 << 24);
    pub const AVX512VNNI: Self = Self(1 << 25);
    pub const AVX512VPOPCNTDQ: Self = Self(1 << 26);
    pub const AVX512BF16: Self = Self(1 << 27);
    pub const AVX512FP16: Self = Self(1 << 28);

    const NAMES: [(Self, &'static str); 18] = [
        (Self::NEON, "neon"),
        (Self::ARM_FP16, "fp16"),
        (Self::ARM_BF16, "bf16"),
        (Self::ARM_DOTPROD, "dotprod"),
        (Self::SVE, "sve"),
        (Self::AVX2, "avx2"),
        (Self::FMA, "fma"),
        (Self::F16C, "f16c"),
        (Self::POPCNT, "popcnt"),
        (Self::AVX512F, "avx512f"),
        (Self::AVX512CD, "avx512cd"),
        (Self::AVX512BW, "avx512bw"),
        (Self::AVX512DQ, "avx512dq"),
        (Self::AVX512VL, "avx512vl"),
        (Self::AVX512VNNI, "avx512vnni"),
        (Self::AVX512VPOPCNTDQ, "avx512vpopcntdq"),
        (Self::AVX512BF16, "avx512bf16"),
        (Self::AVX512FP16, "avx512fp16"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `true` if every feature of `other` is also in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(feature, _)| self.contains(*feature))
            .map(|(_, name)| name)
    }

    /// Features the crate was compiled to assume, ignoring the actual CPU.
    ///
    /// Stands in for [`probe`] when dynamic dispatch is compiled out.
    pub fn compile_time() -> Self {
        let mut features = Self::empty();
        let mut add = |enabled: bool, feature: Self| {
            if enabled {
                features = features.union(feature);
            }
        };
        add(cfg!(target_feature = "neon"), Self::NEON);
        add(cfg!(target_feature = "fp16"), Self::ARM_FP16);
        add(cfg!(target_feature = "bf16"), Self::ARM_BF16);
        add(cfg!(target_feature = "dotprod"), Self::ARM_DOTPROD);
        add(cfg!(target_feature = "sve"), Self::SVE);
        add(cfg!(target_feature = "avx2"), Self::AVX2);
        add(cfg!(target_feature = "fma"), Self::FMA);
        add(cfg!(target_feature = "f16c"), Self::F16C);
        add(cfg!(target_feature = "popcnt"), Self::POPCNT);
        add(cfg!(target_feature = "avx512f"), Self::AVX512F);
        add(cfg!(target_feature = "avx512cd"), Self::AVX512CD);
        add(cfg!(target_feature = "avx512bw"), Self::AVX512BW);
        add(cfg!(target_feature = "avx512dq"), Self::AVX512DQ);
        add(cfg!(target_feature = "avx512vl"), Self::AVX512VL);
        add(cfg!(target_feature = "avx512vnni"), Self::AVX512VNNI);
        add(cfg!(target_feature = "avx512vpopcntdq"), Self::AVX512VPOPCNTDQ);
        add(cfg!(target_feature = "avx512bf16"), Self::AVX512BF16);
        add(cfg!(target_feature = "avx512fp16"), Self::AVX512FP16);
        features
    }
}

impl core::ops::BitOr for FeatureSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl core::fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl core::fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names = self.names();
        match names.next() {
            None => f.write_str("none"),
            Some(first) => {
                f.write_str(first)?;
                names.try_for_each(|name| write!(f, "+{name}"))
            }
        }
    }
}

// endregion: FeatureSet

// region: Probe

/// Queries the running CPU. Stateless and cheap enough to call from anywhere.
pub fn probe() -> FeatureSet {
    let features = probe_arch();
    tracing::trace!(%features, "probed CPU features");
    features
}

#[cfg(target_arch = "x86_64")]
fn probe_arch() -> FeatureSet {
    use core::arch::x86_64::{__cpuid_count, __get_cpuid_max};

    let mut features = FeatureSet::empty();
    let mut add = |detected: bool, feature: FeatureSet| {
        if detected {
            features = features.union(feature);
        }
    };
    add(is_x86_feature_detected!("avx2"), FeatureSet::AVX2);
    add(is_x86_feature_detected!("fma"), FeatureSet::FMA);
    add(is_x86_feature_detected!("f16c"), FeatureSet::F16C);
    add(is_x86_feature_detected!("popcnt"), FeatureSet::POPCNT);

    let avx512f = is_x86_feature_detected!("avx512f");
    add(avx512f, FeatureSet::AVX512F);
    add(is_x86_feature_detected!("avx512cd"), FeatureSet::AVX512CD);
    add(is_x86_feature_detected!("avx512bw"), FeatureSet::AVX512BW);
    add(is_x86_feature_detected!("avx512dq"), FeatureSet::AVX512DQ);
    add(is_x86_feature_detected!("avx512vl"), FeatureSet::AVX512VL);
    add(is_x86_feature_detected!("avx512vnni"), FeatureSet::AVX512VNNI);
    add(
        is_x86_feature_detected!("avx512vpopcntdq"),
        FeatureSet::AVX512VPOPCNTDQ,
    );

    // BF16 and FP16 come straight from CPUID. `avx512f` being detected already
    // means the OS saves the ZMM state.
    if avx512f {
        #[allow(unused_unsafe)]
        let (max_leaf, leaf7, leaf7_1) = unsafe {
            let max_leaf = __get_cpuid_max(0).0;
            let leaf7 = __cpuid_count(7, 0);
            let leaf7_1 = if leaf7.eax >= 1 {
                Some(__cpuid_count(7, 1))
            } else {
                None
            };
            (max_leaf, leaf7, leaf7_1)
        };
        if max_leaf >= 7 {
            add(leaf7.edx & (1 << 23) != 0, FeatureSet::AVX512FP16);
            add(
                leaf7_1.is_some_and(|leaf| leaf.eax & (1 << 5) != 0),
                FeatureSet::AVX512BF16,
            );
        }
    }
    features
}

#[cfg(target_arch = "aarch64")]
fn probe_arch() -> FeatureSet {
    use std::arch::is_aarch64_feature_detected;

    let mut features = FeatureSet::empty();
    let mut add = |detected: bool, feature: FeatureSet| {
        if detected {
            features = features.union(feature);
        }
    };
    add(is_aarch64_feature_detected!("neon"), FeatureSet::NEON);
    add(is_aarch64_feature_detected!("fp16"), FeatureSet::ARM_FP16);
    add(is_aarch64_feature_detected!("bf16"), FeatureSet::ARM_BF16);
    add(is_aarch64_feature_detected!("dotprod"), FeatureSet::ARM_DOTPROD);
    add(is_aarch64_feature_detected!("sve"), FeatureSet::SVE);
    features
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn probe_arch() -> FeatureSet {
    FeatureSet::empty()
}

// endregion: Probe

// region: Tier

/// An instruction-set level that kernels are written against.
///
/// Names follow the first CPU generation that shipped the required features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    /// Portable code, no requirements.
    Serial,
    /// Arm NEON.
    Neon,
    /// Arm NEON with BF16 dot products.
    NeonBf16,
    /// Arm SVE.
    Sve,
    /// x86 AVX2 + FMA + F16C.
    Haswell,
    /// x86 AVX-512 F/CD/BW/DQ/VL.
    Skylake,
    /// x86 AVX-512 with VNNI and VPOPCNTDQ.
    Ice,
    /// x86 AVX-512 with BF16.
    Genoa,
    /// x86 AVX-512 with FP16.
    Sapphire,
}

const HASWELL: FeatureSet = FeatureSet::AVX2
    .union(FeatureSet::FMA)
    .union(FeatureSet::F16C)
    .union(FeatureSet::POPCNT);

const SKYLAKE: FeatureSet = HASWELL
    .union(FeatureSet::AVX512F)
    .union(FeatureSet::AVX512CD)
    .union(FeatureSet::AVX512BW)
    .union(FeatureSet::AVX512DQ)
    .union(FeatureSet::AVX512VL);

impl Tier {
    /// Most specialised first. The same order applies on every platform.
    pub const LADDER: [Tier; 9] = [
        Tier::Sapphire,
        Tier::Genoa,
        Tier::Ice,
        Tier::Skylake,
        Tier::Haswell,
        Tier::Sve,
        Tier::NeonBf16,
        Tier::Neon,
        Tier::Serial,
    ];

    pub const fn required(self) -> FeatureSet {
        match self {
            Tier::Serial => FeatureSet::empty(),
            Tier::Neon => FeatureSet::NEON,
            Tier::NeonBf16 => FeatureSet::NEON.union(FeatureSet::ARM_BF16),
            Tier::Sve => FeatureSet::NEON.union(FeatureSet::SVE),
            Tier::Haswell => HASWELL,
            Tier::Skylake => SKYLAKE,
            Tier::Ice => SKYLAKE
                .union(FeatureSet::AVX512VNNI)
                .union(FeatureSet::AVX512VPOPCNTDQ),
            Tier::Genoa => SKYLAKE.union(FeatureSet::AVX512BF16),
            Tier::Sapphire => SKYLAKE.union(FeatureSet::AVX512FP16),
        }
    }

    /// The build flag that decides whether this tier's kernels get compiled.
    pub const fn flag(self) -> Option<&'static str> {
        match self {
            Tier::Serial => None,
            Tier::Neon => Some("SIMSIMD_TARGET_NEON"),
            Tier::NeonBf16 => Some("SIMSIMD_TARGET_NEON_BF16"),
            Tier::Sve => Some("SIMSIMD_TARGET_SVE"),
            Tier::Haswell => Some("SIMSIMD_TARGET_HASWELL"),
            Tier::Skylake => Some("SIMSIMD_TARGET_SKYLAKE"),
            Tier::Ice => Some("SIMSIMD_TARGET_ICE"),
            Tier::Genoa => Some("SIMSIMD_TARGET_GENOA"),
            Tier::Sapphire => Some("SIMSIMD_TARGET_SAPPHIRE"),
        }
    }

    /// Bit used in the [`available`] mask.
    pub const fn bit(self) -> u64 {
        1 << self as u32
    }

    /// Whether `configuration` compiled this tier in. The serial tier always is.
    pub fn is_compiled_in(self, configuration: &ResolvedConfiguration) -> bool {
        match self.flag() {
            None => true,
            Some(flag) => configuration.is_enabled(flag).unwrap_or(false),
        }
    }

    pub fn is_supported_by(self, features: FeatureSet) -> bool {
        features.contains(self.required())
    }
}

impl core::fmt::Display for Tier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Tier::Serial => "serial",
            Tier::Neon => "neon",
            Tier::NeonBf16 => "neon_bf16",
            Tier::Sve => "sve",
            Tier::Haswell => "haswell",
            Tier::Skylake => "skylake",
            Tier::Ice => "ice",
            Tier::Genoa => "genoa",
            Tier::Sapphire => "sapphire",
        };
        f.write_str(name)
    }
}

// endregion: Tier

// region: Build info

/// The configuration `build.rs` resolved for this artifact.
pub fn build_configuration() -> &'static ResolvedConfiguration {
    static CONFIGURATION: OnceLock<ResolvedConfiguration> = OnceLock::new();
    CONFIGURATION.get_or_init(|| {
        ResolvedConfiguration::decode(
            env!("SIMSIMD_RESOLVED_FLAGS"),
            env!("SIMSIMD_COMPILE_ARGS"),
        )
    })
}

/// Returns `true` if the library picks kernels from the probed CPU rather
/// than from the compile-time target features.
pub fn uses_dynamic_dispatch() -> bool {
    cfg!(simsimd_dynamic_dispatch = "1")
}

/// The features the dispatch table is populated from.
pub fn detected() -> FeatureSet {
    static DETECTED: OnceLock<FeatureSet> = OnceLock::new();
    *DETECTED.get_or_init(|| {
        if uses_dynamic_dispatch() {
            probe()
        } else {
            FeatureSet::compile_time()
        }
    })
}

/// Bitmask of tiers that are both compiled in and supported by this CPU.
/// Test bits with [`Tier::bit`].
///
/// ```
/// use simsimd::capabilities::{self, Tier};
///
/// let caps = capabilities::available();
/// assert!(caps & Tier::Serial.bit() != 0);
/// if caps & Tier::Skylake.bit() != 0 {
///     println!("AVX-512 (Skylake) is available");
/// }
/// ```
pub fn available() -> u64 {
    let configuration = build_configuration();
    let features = detected();
    Tier::LADDER
        .into_iter()
        .filter(|tier| tier.is_compiled_in(configuration) && tier.is_supported_by(features))
        .fold(0, |mask, tier| mask | tier.bit())
}

fn uses(tier: Tier) -> bool {
    available() & tier.bit() != 0
}

pub fn uses_neon() -> bool {
    uses(Tier::Neon)
}

pub fn uses_neon_bf16() -> bool {
    uses(Tier::NeonBf16)
}

pub fn uses_sve() -> bool {
    uses(Tier::Sve)
}

pub fn uses_haswell() -> bool {
    uses(Tier::Haswell)
}

pub fn uses_skylake() -> bool {
    uses(Tier::Skylake)
}

pub fn uses_ice() -> bool {
    uses(Tier::Ice)
}

pub fn uses_genoa() -> bool {
    uses(Tier::Genoa)
}

pub fn uses_sapphire() -> bool {
    uses(Tier::Sapphire)
}

// endregion: Build info
