//! Build-time capability resolution.
//!
//! Decides which instruction-set extensions and native numeric-type paths are
//! compiled into the artifact. The same module is included by `build.rs` via
//! `#[path]`, so everything here depends on `std` alone.
//!
//! ```
//! use simsimd::config::{emit, select_profile, Environment};
//!
//! let environment = Environment::from_pairs([("SIMSIMD_TARGET_SKYLAKE", "0")]);
//! let resolved = emit(&select_profile("linux"), &environment);
//!
//! assert_eq!(resolved.is_enabled("SIMSIMD_TARGET_HASWELL"), Some(true));
//! assert_eq!(resolved.is_enabled("SIMSIMD_TARGET_SKYLAKE"), Some(false));
//! ```

mod emit;
mod matrix;
mod resolve;

use std::collections::BTreeMap;

pub use emit::{emit, ResolvedConfiguration, ResolvedFlag, COMPILE_ARGS_ENV, RESOLVED_FLAGS_ENV};
pub use matrix::{
    select_profile, FeatureToggle, FlagDefault, Platform, PlatformProfile, TargetFlag,
    FEATURE_TOGGLES, TARGET_FLAGS,
};
pub use resolve::{resolve, ENABLE};

/// A frozen view of the environment variables relevant to the build.
///
/// Resolution never touches the live process environment; it only sees what was
/// captured here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// An empty snapshot: every flag falls back to its default.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self { vars }
    }

    /// Captures every known flag from the process environment, once.
    ///
    /// Unset variables are left out and resolve to the platform default. A value
    /// that isn't valid unicode is kept as an empty string, which disables.
    pub fn from_process() -> Self {
        let mut vars = BTreeMap::new();
        let names = FEATURE_TOGGLES
            .iter()
            .map(|toggle| toggle.name)
            .chain(TARGET_FLAGS.iter().map(|flag| flag.name));
        for name in names {
            match std::env::var(name) {
                Ok(value) => {
                    vars.insert(name.to_owned(), value);
                }
                Err(std::env::VarError::NotUnicode(_)) => {
                    vars.insert(name.to_owned(), String::new());
                }
                Err(std::env::VarError::NotPresent) => {}
            }
        }
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Name of the `cfg` a flag turns into, e.g. `simsimd_target_haswell`.
pub fn cfg_name(flag: &str) -> String {
    flag.to_ascii_lowercase()
}
