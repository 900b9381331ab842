//! Turns a platform profile plus overrides into what the compiler consumes.

use super::{cfg_name, resolve, Environment, PlatformProfile};

/// One flag after overrides were applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFlag {
    pub name: &'static str,
    pub enabled: bool,
}

impl ResolvedFlag {
    /// The definition value, `"1"` or `"0"`.
    pub fn value(&self) -> &'static str {
        if self.enabled {
            "1"
        } else {
            "0"
        }
    }
}

/// The effective build configuration. Produced once per build and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfiguration {
    flags: Vec<ResolvedFlag>,
    compile_args: Vec<&'static str>,
}

/// Environment variable that carries the encoded flags into the compiled crate.
pub const RESOLVED_FLAGS_ENV: &str = "SIMSIMD_RESOLVED_FLAGS";
/// Environment variable that carries the base compiler arguments into the compiled crate.
pub const COMPILE_ARGS_ENV: &str = "SIMSIMD_COMPILE_ARGS";

/// Resolves every flag of `profile` against `environment`.
///
/// The profile lists feature toggles ahead of target flags, and they are
/// resolved in that order, one lookup per flag.
pub fn emit(profile: &PlatformProfile, environment: &Environment) -> ResolvedConfiguration {
    let flags = profile
        .defaults
        .iter()
        .map(|flag| ResolvedFlag {
            name: flag.name,
            enabled: resolve(flag.name, flag.default, environment),
        })
        .collect();
    ResolvedConfiguration {
        flags,
        compile_args: profile.compile_args.to_vec(),
    }
}

impl ResolvedConfiguration {
    pub fn flags(&self) -> &[ResolvedFlag] {
        &self.flags
    }

    /// Base compiler arguments of the profile. Reported for diagnostics only:
    /// the kernels are Rust, so nothing is compiled with them.
    pub fn compile_args(&self) -> &[&'static str] {
        &self.compile_args
    }

    /// `None` if `name` isn't a flag of this configuration.
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.flags
            .iter()
            .find(|flag| flag.name == name)
            .map(|flag| flag.enabled)
    }

    /// Preprocessor-style `(NAME, "1" | "0")` definitions, in resolution order.
    pub fn definitions(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.flags.iter().map(|flag| (flag.name, flag.value()))
    }

    /// `NAME=1,NAME=0,...`
    pub fn encode(&self) -> String {
        self.definitions()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Reverse of [`encode`](Self::encode) for strings embedded at compile time.
    ///
    /// Malformed entries are skipped. Values other than `"1"` read as disabled.
    pub fn decode(flags: &'static str, compile_args: &'static str) -> Self {
        let flags = flags
            .split(',')
            .filter_map(|entry| entry.split_once('='))
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| ResolvedFlag {
                name,
                enabled: value == super::ENABLE,
            })
            .collect();
        Self {
            flags,
            compile_args: compile_args.split_whitespace().collect(),
        }
    }

    /// Lines for `build.rs` to print.
    pub fn cargo_directives(&self) -> Vec<String> {
        let mut directives = Vec::with_capacity(self.flags.len() * 3 + 2);
        for (name, value) in self.definitions() {
            let cfg = cfg_name(name);
            directives.push(format!(
                "cargo:rustc-check-cfg=cfg({cfg}, values(\"0\", \"1\"))"
            ));
            directives.push(format!("cargo:rustc-cfg={cfg}=\"{value}\""));
            directives.push(format!("cargo:rerun-if-env-changed={name}"));
        }
        directives.push(format!("cargo:rustc-env={RESOLVED_FLAGS_ENV}={}", self.encode()));
        directives.push(format!(
            "cargo:rustc-env={COMPILE_ARGS_ENV}={}",
            self.compile_args.join(" ")
        ));
        directives
    }
}
