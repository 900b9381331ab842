//! Runtime kernel selection.
//!
//! Every supported (metric, dtype) pair gets exactly one kernel, chosen once
//! per process from the tiers that are both compiled in and supported by the
//! CPU. Selection walks [`Tier::LADDER`] and keeps the first match, so the
//! outcome is a pure function of the probed features and the build
//! configuration.
//!
//! Population happens on first use behind a [`DispatchCell`]. After that,
//! [`dispatch`] is a plain array read.
//!
//! ```
//! use simsimd::dispatch::{self, Dtype, Metric};
//!
//! dispatch::initialize().expect("the serial tier covers every pair");
//! let kernel = dispatch::dispatch(Metric::Dot, Dtype::F32).expect("registered pair");
//!
//! let a = [1.0f32, 2.0, 3.0];
//! let b = [4.0f32, 5.0, 6.0];
//! let dot = unsafe { kernel.call(a.as_ptr().cast(), b.as_ptr().cast(), a.len()) };
//! assert!((dot - 32.0).abs() < 1e-6);
//! ```

use core::any::Any;
use core::ffi::c_void;
use core::sync::atomic::{AtomicU8, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use crate::capabilities::{self, FeatureSet, Tier};
use crate::config::ResolvedConfiguration;
use crate::error::DispatchError;
use crate::kernels;

/// Every kernel reports through a double, whatever the input dtype.
pub type Distance = f64;

/// The single punned signature shared by every kernel. Both pointers must
/// reference `n` elements of the kernel's dtype; for [`Dtype::B8`], `n` counts
/// bytes.
pub type KernelFn = unsafe fn(a: *const c_void, b: *const c_void, n: usize) -> Distance;

// region: Metric & Dtype

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Dot,
    /// Angular distance, `1 - cos(a, b)`.
    Cosine,
    SqEuclidean,
    Hamming,
    Jaccard,
    KullbackLeibler,
    JensenShannon,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Dot,
        Metric::Cosine,
        Metric::SqEuclidean,
        Metric::Hamming,
        Metric::Jaccard,
        Metric::KullbackLeibler,
        Metric::JensenShannon,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for Metric {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Metric::Dot => "dot",
            Metric::Cosine => "cos",
            Metric::SqEuclidean => "sqeuclidean",
            Metric::Hamming => "hamming",
            Metric::Jaccard => "jaccard",
            Metric::KullbackLeibler => "kl",
            Metric::JensenShannon => "js",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    F64,
    F32,
    F16,
    BF16,
    I8,
    /// Bits packed eight to a byte.
    B8,
}

impl Dtype {
    pub const ALL: [Dtype; 6] = [
        Dtype::F64,
        Dtype::F32,
        Dtype::F16,
        Dtype::BF16,
        Dtype::I8,
        Dtype::B8,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for Dtype {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Dtype::F64 => "f64",
            Dtype::F32 => "f32",
            Dtype::F16 => "f16",
            Dtype::BF16 => "bf16",
            Dtype::I8 => "i8",
            Dtype::B8 => "b8",
        };
        f.write_str(name)
    }
}

// endregion: Metric & Dtype

// region: Kernel

/// A selected kernel together with the tier it was written for.
#[derive(Clone, Copy)]
pub struct Kernel {
    func: KernelFn,
    tier: Tier,
}

impl Kernel {
    pub const fn new(func: KernelFn, tier: Tier) -> Self {
        Self { func, tier }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn func(&self) -> KernelFn {
        self.func
    }

    /// # Safety
    ///
    /// `a` and `b` must each be valid for `n` reads of the dtype this kernel
    /// was registered for.
    #[inline(always)]
    pub unsafe fn call(&self, a: *const c_void, b: *const c_void, n: usize) -> Distance {
        (self.func)(a, b, n)
    }
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel")
            .field("tier", &self.tier)
            .field("func", &(self.func as *const ()))
            .finish()
    }
}

/// One implementation a tier offers for one pair.
#[derive(Clone, Copy)]
pub struct KernelVariant {
    pub metric: Metric,
    pub dtype: Dtype,
    pub tier: Tier,
    pub func: KernelFn,
}

impl KernelVariant {
    pub const fn new(metric: Metric, dtype: Dtype, tier: Tier, func: KernelFn) -> Self {
        Self {
            metric,
            dtype,
            tier,
            func,
        }
    }
}

// endregion: Kernel

// region: DispatchTable

const METRICS: usize = Metric::ALL.len();
const DTYPES: usize = Dtype::ALL.len();

/// Frozen `(metric, dtype) -> kernel` mapping.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    entries: [[Option<Kernel>; DTYPES]; METRICS],
}

impl DispatchTable {
    /// Picks one kernel per pair from `registry`.
    ///
    /// Pairs with no registered variant at all are not part of the library and
    /// stay empty. A registered pair where no variant is both compiled in and
    /// supported by `features` fails the whole table.
    pub fn populate(
        features: FeatureSet,
        configuration: &ResolvedConfiguration,
        registry: &[&[KernelVariant]],
    ) -> Result<Self, DispatchError> {
        let mut entries = [[None; DTYPES]; METRICS];
        let mut selected = 0usize;

        for metric in Metric::ALL {
            for dtype in Dtype::ALL {
                let mut variants = registry
                    .iter()
                    .flat_map(|tier_variants| tier_variants.iter())
                    .filter(|variant| variant.metric == metric && variant.dtype == dtype);
                if variants.next().is_none() {
                    continue;
                }

                let chosen = Tier::LADDER
                    .into_iter()
                    .filter(|tier| {
                        tier.is_compiled_in(configuration) && tier.is_supported_by(features)
                    })
                    .find_map(|tier| {
                        registry
                            .iter()
                            .flat_map(|tier_variants| tier_variants.iter())
                            .find(|variant| {
                                variant.metric == metric
                                    && variant.dtype == dtype
                                    && variant.tier == tier
                            })
                    });

                match chosen {
                    Some(variant) => {
                        tracing::debug!(%metric, %dtype, tier = %variant.tier, "selected kernel");
                        entries[metric.index()][dtype.index()] =
                            Some(Kernel::new(variant.func, variant.tier));
                        selected += 1;
                    }
                    None => {
                        tracing::error!(%metric, %dtype, %features, "no usable kernel tier");
                        return Err(DispatchError::NoSatisfyingTier { metric, dtype });
                    }
                }
            }
        }

        tracing::info!(kernels = selected, %features, "dispatch table populated");
        Ok(Self { entries })
    }

    /// `None` for pairs the library does not implement.
    #[inline(always)]
    pub fn get(&self, metric: Metric, dtype: Dtype) -> Option<Kernel> {
        self.entries[metric.index()][dtype.index()]
    }

    /// Every populated entry in `(metric, dtype)` order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Dtype, Kernel)> + '_ {
        Metric::ALL.into_iter().flat_map(move |metric| {
            Dtype::ALL
                .into_iter()
                .filter_map(move |dtype| self.get(metric, dtype).map(|kernel| (metric, dtype, kernel)))
        })
    }
}

// endregion: DispatchTable

// region: DispatchCell

/// Lifecycle of a [`DispatchCell`]. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Uninitialized,
    Probing,
    Populated,
    Failed,
}

const UNINITIALIZED: u8 = 0;
const PROBING: u8 = 1;
const POPULATED: u8 = 2;
const FAILED: u8 = 3;

/// Holds a [`DispatchTable`] that is populated at most once, however many
/// threads race to use it first.
pub struct DispatchCell {
    state: AtomicU8,
    outcome: OnceLock<Result<DispatchTable, DispatchError>>,
}

impl DispatchCell {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINITIALIZED),
            outcome: OnceLock::new(),
        }
    }

    /// Runs `populate` if no thread has yet, otherwise waits for and returns the
    /// stored outcome. A failure is stored too and never retried, and so is a
    /// panic inside `populate`.
    pub fn initialize_with<F>(&self, populate: F) -> Result<&DispatchTable, DispatchError>
    where
        F: FnOnce() -> Result<DispatchTable, DispatchError>,
    {
        self.outcome
            .get_or_init(|| {
                self.state.store(PROBING, Ordering::Release);
                let outcome = panic::catch_unwind(AssertUnwindSafe(populate))
                    .unwrap_or_else(|payload| {
                        let message = panic_message(payload.as_ref());
                        tracing::error!(%message, "dispatch table population panicked");
                        Err(DispatchError::PopulationPanicked { message })
                    });
                let state = if outcome.is_ok() { POPULATED } else { FAILED };
                self.state.store(state, Ordering::Release);
                outcome
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn state(&self) -> DispatchState {
        match self.state.load(Ordering::Acquire) {
            UNINITIALIZED => DispatchState::Uninitialized,
            PROBING => DispatchState::Probing,
            POPULATED => DispatchState::Populated,
            _ => DispatchState::Failed,
        }
    }

    /// # Panics
    ///
    /// If the table has not been populated, or population failed.
    pub fn table(&self) -> &DispatchTable {
        match self.outcome.get() {
            Some(Ok(table)) => table,
            Some(Err(error)) => panic!("dispatch table is unusable: {error}"),
            None => panic!("dispatch table queried before initialization"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

impl Default for DispatchCell {
    fn default() -> Self {
        Self::new()
    }
}

// endregion: DispatchCell

// region: Global table

static TABLE: DispatchCell = DispatchCell::new();

/// Populates the process-wide table on first call. Later calls return the same
/// table, or the same error.
pub fn initialize() -> Result<&'static DispatchTable, DispatchError> {
    TABLE.initialize_with(|| {
        DispatchTable::populate(
            capabilities::detected(),
            capabilities::build_configuration(),
            kernels::REGISTRY,
        )
    })
}

/// The kernel selected for `(metric, dtype)`.
///
/// # Panics
///
/// If [`initialize`] has not succeeded yet.
#[inline]
pub fn dispatch(metric: Metric, dtype: Dtype) -> Option<Kernel> {
    TABLE.table().get(metric, dtype)
}

pub fn state() -> DispatchState {
    TABLE.state()
}

// endregion: Global table

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    use super::*;
    use crate::config::{emit, select_profile, Environment};

    unsafe fn serial_kernel(_: *const c_void, _: *const c_void, _: usize) -> Distance {
        0.0
    }

    unsafe fn haswell_kernel(_: *const c_void, _: *const c_void, _: usize) -> Distance {
        1.0
    }

    unsafe fn skylake_kernel(_: *const c_void, _: *const c_void, _: usize) -> Distance {
        2.0
    }

    unsafe fn ice_kernel(_: *const c_void, _: *const c_void, _: usize) -> Distance {
        3.0
    }

    const SYNTHETIC: &[KernelVariant] = &[
        KernelVariant::new(Metric::Dot, Dtype::F32, Tier::Serial, serial_kernel),
        KernelVariant::new(Metric::Dot, Dtype::F32, Tier::Haswell, haswell_kernel),
        KernelVariant::new(Metric::Dot, Dtype::F32, Tier::Skylake, skylake_kernel),
        KernelVariant::new(Metric::Dot, Dtype::F32, Tier::Ice, ice_kernel),
        KernelVariant::new(Metric::Hamming, Dtype::B8, Tier::Serial, serial_kernel),
        KernelVariant::new(Metric::Hamming, Dtype::B8, Tier::Ice, ice_kernel),
    ];

    fn linux() -> ResolvedConfiguration {
        emit(&select_profile("linux"), &Environment::empty())
    }

    fn selected_tier(table: &DispatchTable, metric: Metric, dtype: Dtype) -> Tier {
        table.get(metric, dtype).map(|kernel| kernel.tier()).unwrap()
    }

    #[test]
    fn picks_most_specialised_supported_tier() {
        let table =
            DispatchTable::populate(Tier::Skylake.required(), &linux(), &[SYNTHETIC]).unwrap();
        assert_eq!(selected_tier(&table, Metric::Dot, Dtype::F32), Tier::Skylake);
        assert_eq!(selected_tier(&table, Metric::Hamming, Dtype::B8), Tier::Serial);
        let result = unsafe {
            table
                .get(Metric::Dot, Dtype::F32)
                .unwrap()
                .call(core::ptr::null(), core::ptr::null(), 0)
        };
        assert_eq!(result, 2.0);
    }

    #[test]
    fn one_tier_short_falls_back_one_step() {
        let configuration = linux();
        for (supported, expected) in [
            (Tier::Haswell, Tier::Haswell),
            (Tier::Skylake, Tier::Skylake),
            (Tier::Ice, Tier::Ice),
        ] {
            let table =
                DispatchTable::populate(supported.required(), &configuration, &[SYNTHETIC])
                    .unwrap();
            assert_eq!(selected_tier(&table, Metric::Dot, Dtype::F32), expected);
        }
    }

    #[test]
    fn unregistered_pairs_stay_empty() {
        let table = DispatchTable::populate(FeatureSet::empty(), &linux(), &[SYNTHETIC]).unwrap();
        assert!(table.get(Metric::Cosine, Dtype::F32).is_none());
        assert!(table.get(Metric::Hamming, Dtype::F32).is_none());
        assert_eq!(table.iter().count(), 2);
        assert!(table.iter().all(|(_, _, kernel)| kernel.tier() == Tier::Serial));
    }

    #[test]
    fn never_selects_unsupported_tier() {
        let configuration = linux();
        for tier in Tier::LADDER {
            let features = tier.required();
            let table = DispatchTable::populate(features, &configuration, &[SYNTHETIC]).unwrap();
            for (_, _, kernel) in table.iter() {
                assert!(kernel.tier().is_supported_by(features));
            }
        }
    }

    #[test]
    fn disabled_flag_excludes_tier() {
        let environment = Environment::from_pairs([("SIMSIMD_TARGET_HASWELL", "0")]);
        let configuration = emit(&select_profile("linux"), &environment);
        assert!(configuration
            .definitions()
            .any(|(name, value)| name == "SIMSIMD_TARGET_HASWELL" && value == "0"));

        let table =
            DispatchTable::populate(Tier::Haswell.required(), &configuration, &[SYNTHETIC])
                .unwrap();
        assert_eq!(selected_tier(&table, Metric::Dot, Dtype::F32), Tier::Serial);
        assert!(table.iter().all(|(_, _, kernel)| kernel.tier() != Tier::Haswell));
    }

    #[test]
    fn baseline_profile_only_compiles_serial() {
        let configuration = emit(&select_profile("freebsd"), &Environment::empty());
        let everything = Tier::Ice.required() | Tier::Sapphire.required();
        let table = DispatchTable::populate(everything, &configuration, &[SYNTHETIC]).unwrap();
        assert!(table.iter().all(|(_, _, kernel)| kernel.tier() == Tier::Serial));
    }

    #[test]
    fn same_inputs_same_selection() {
        let configuration = linux();
        let features = Tier::Ice.required();
        let first = DispatchTable::populate(features, &configuration, &[SYNTHETIC]).unwrap();
        let second = DispatchTable::populate(features, &configuration, &[SYNTHETIC]).unwrap();
        let tiers = |table: &DispatchTable| {
            table
                .iter()
                .map(|(metric, dtype, kernel)| (metric, dtype, kernel.tier()))
                .collect::<Vec<_>>()
        };
        assert_eq!(tiers(&first), tiers(&second));
    }

    #[test]
    fn missing_serial_variant_fails() {
        let registry: &[KernelVariant] = &[KernelVariant::new(
            Metric::Dot,
            Dtype::F16,
            Tier::Skylake,
            skylake_kernel,
        )];
        let error =
            DispatchTable::populate(Tier::Haswell.required(), &linux(), &[registry]).unwrap_err();
        assert_eq!(
            error,
            DispatchError::NoSatisfyingTier {
                metric: Metric::Dot,
                dtype: Dtype::F16
            }
        );
        assert_eq!(
            error.to_string(),
            "no compiled-in kernel for `dot` over `f16` is supported by this CPU"
        );
    }

    #[test]
    fn cell_populates_once_under_contention() {
        const THREADS: usize = 16;
        let cell = DispatchCell::new();
        let populations = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);
        let configuration = linux();

        let tables: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        let table = cell
                            .initialize_with(|| {
                                populations.fetch_add(1, Ordering::SeqCst);
                                DispatchTable::populate(
                                    Tier::Skylake.required(),
                                    &configuration,
                                    &[SYNTHETIC],
                                )
                            })
                            .unwrap();
                        table as *const DispatchTable as usize
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(populations.load(Ordering::SeqCst), 1);
        assert!(tables.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(cell.state(), DispatchState::Populated);
        assert_eq!(selected_tier(cell.table(), Metric::Dot, Dtype::F32), Tier::Skylake);
    }

    #[test]
    fn cell_failure_is_sticky() {
        let cell = DispatchCell::new();
        let failure = DispatchError::NoSatisfyingTier {
            metric: Metric::Jaccard,
            dtype: Dtype::B8,
        };
        let first = cell.initialize_with(|| Err(failure.clone()));
        assert_eq!(first.unwrap_err(), failure);
        assert_eq!(cell.state(), DispatchState::Failed);

        let second = cell.initialize_with(|| {
            DispatchTable::populate(FeatureSet::empty(), &linux(), &[SYNTHETIC])
        });
        assert_eq!(second.unwrap_err(), failure);
        assert_eq!(cell.state(), DispatchState::Failed);
    }

    #[test]
    fn cell_panic_is_sticky() {
        let cell = DispatchCell::new();
        let runs = AtomicUsize::new(0);
        let first = cell.initialize_with(|| {
            runs.fetch_add(1, Ordering::SeqCst);
            panic!("registry exploded")
        });
        assert_eq!(
            first.unwrap_err(),
            DispatchError::PopulationPanicked {
                message: "registry exploded".to_owned()
            }
        );
        assert_eq!(cell.state(), DispatchState::Failed);

        let second = cell.initialize_with(|| {
            runs.fetch_add(1, Ordering::SeqCst);
            DispatchTable::populate(Tier::Skylake.required(), &linux(), &[SYNTHETIC])
        });
        assert!(matches!(second, Err(DispatchError::PopulationPanicked { .. })));
        assert_eq!(cell.state(), DispatchState::Failed);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "population panicked: registry exploded")]
    fn lookup_after_panicked_population_panics() {
        let cell = DispatchCell::new();
        let _ = cell.initialize_with(|| panic!("registry exploded"));
        cell.table();
    }

    #[test]
    fn cell_starts_uninitialized() {
        let cell = DispatchCell::default();
        assert_eq!(cell.state(), DispatchState::Uninitialized);
    }

    #[test]
    #[should_panic(expected = "before initialization")]
    fn lookup_before_population_panics() {
        DispatchCell::new().table();
    }

    #[test]
    fn global_table_covers_every_registered_pair() {
        let table = initialize().unwrap();
        assert_eq!(state(), DispatchState::Populated);

        let features = capabilities::detected();
        let configuration = capabilities::build_configuration();
        for variants in kernels::REGISTRY {
            for variant in *variants {
                let kernel = dispatch(variant.metric, variant.dtype).unwrap();
                assert!(kernel.tier().is_supported_by(features));
                assert!(kernel.tier().is_compiled_in(configuration));
                assert!(kernel.tier() >= variant.tier || !variant.tier.is_supported_by(features));
            }
        }
        assert!(dispatch(Metric::Hamming, Dtype::F32).is_none());
        assert!(table.iter().count() >= 25);
    }
}
