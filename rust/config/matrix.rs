//! The capability matrix and the per-platform profiles derived from it.

/// A flag applied to every build before any platform branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureToggle {
    pub name: &'static str,
    pub default: bool,
}

/// An instruction-set extension flag with its default on each supported platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFlag {
    pub name: &'static str,
    pub linux: bool,
    pub macos: bool,
    pub windows: bool,
}

impl TargetFlag {
    pub fn default_for(&self, platform: Platform) -> bool {
        match platform {
            Platform::Linux => self.linux,
            Platform::MacOs => self.macos,
            Platform::Windows => self.windows,
        }
    }
}

pub const FEATURE_TOGGLES: [FeatureToggle; 3] = [
    FeatureToggle {
        name: "SIMSIMD_NATIVE_F16",
        default: false,
    },
    FeatureToggle {
        name: "SIMSIMD_NATIVE_BF16",
        default: false,
    },
    FeatureToggle {
        name: "SIMSIMD_DYNAMIC_DISPATCH",
        default: true,
    },
];

/// ISA-extension flags in declaration order.
///
/// SIMD all the way on Linux. Apple and Microsoft toolchains can't compile
/// every tier, so those platforms start narrower.
pub const TARGET_FLAGS: [TargetFlag; 8] = [
    TargetFlag {
        name: "SIMSIMD_TARGET_NEON",
        linux: true,
        macos: true,
        windows: true,
    },
    // Only the windows packaging pins this one. Linux follows its SVE default.
    TargetFlag {
        name: "SIMSIMD_TARGET_NEON_BF16",
        linux: true,
        macos: false,
        windows: false,
    },
    TargetFlag {
        name: "SIMSIMD_TARGET_SVE",
        linux: true,
        macos: false,
        windows: false,
    },
    TargetFlag {
        name: "SIMSIMD_TARGET_HASWELL",
        linux: true,
        macos: true,
        windows: true,
    },
    TargetFlag {
        name: "SIMSIMD_TARGET_SKYLAKE",
        linux: true,
        macos: false,
        windows: true,
    },
    TargetFlag {
        name: "SIMSIMD_TARGET_ICE",
        linux: true,
        macos: false,
        windows: true,
    },
    TargetFlag {
        name: "SIMSIMD_TARGET_GENOA",
        linux: true,
        macos: false,
        windows: false,
    },
    TargetFlag {
        name: "SIMSIMD_TARGET_SAPPHIRE",
        linux: true,
        macos: false,
        windows: false,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Linux, Platform::MacOs, Platform::Windows];

    /// Exact match against cargo's `target_os` spelling.
    pub fn from_id(platform_id: &str) -> Option<Self> {
        match platform_id {
            "linux" => Some(Platform::Linux),
            "macos" => Some(Platform::MacOs),
            "windows" => Some(Platform::Windows),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
        }
    }

    fn compile_args(self) -> &'static [&'static str] {
        match self {
            Platform::Linux => &[
                "-std=c11",
                "-O3",
                "-ffast-math",
                "-fdiagnostics-color=always",
                "-w",
                "-fopenmp",
            ],
            Platform::MacOs => &["-std=c11", "-O3", "-ffast-math", "-w"],
            // `/d2FH4-` avoids MinGW linking errors when loading the DLL
            Platform::Windows => &["/std:c11", "/O2", "/fp:fast", "/d2FH4-"],
        }
    }
}

/// One flag's starting value before overrides are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagDefault {
    pub name: &'static str,
    pub default: bool,
}

/// Defaults and base compiler arguments for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    /// `None` for the baseline profile used on unrecognized platforms.
    pub platform: Option<Platform>,
    /// Feature toggles first, then target flags in declaration order.
    pub defaults: Vec<FlagDefault>,
    pub compile_args: &'static [&'static str],
}

impl PlatformProfile {
    pub fn id(&self) -> &'static str {
        self.platform.map_or("baseline", Platform::id)
    }

    pub fn default_for(&self, name: &str) -> Option<bool> {
        self.defaults
            .iter()
            .find(|flag| flag.name == name)
            .map(|flag| flag.default)
    }

    /// Names of the ISA flags this profile enables by default.
    pub fn enabled_targets(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.defaults
            .iter()
            .skip(FEATURE_TOGGLES.len())
            .filter(|flag| flag.default)
            .map(|flag| flag.name)
    }

    fn baseline() -> Self {
        Self {
            platform: None,
            defaults: toggle_defaults()
                .chain(TARGET_FLAGS.iter().map(|flag| FlagDefault {
                    name: flag.name,
                    default: false,
                }))
                .collect(),
            compile_args: &[],
        }
    }

    fn for_platform(platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            defaults: toggle_defaults()
                .chain(TARGET_FLAGS.iter().map(|flag| FlagDefault {
                    name: flag.name,
                    default: flag.default_for(platform),
                }))
                .collect(),
            compile_args: platform.compile_args(),
        }
    }
}

fn toggle_defaults() -> impl Iterator<Item = FlagDefault> {
    FEATURE_TOGGLES.iter().map(|toggle| FlagDefault {
        name: toggle.name,
        default: toggle.default,
    })
}

/// Picks the profile for `platform_id`, or the baseline if it isn't one we know.
pub fn select_profile(platform_id: &str) -> PlatformProfile {
    match Platform::from_id(platform_id) {
        Some(platform) => PlatformProfile::for_platform(platform),
        None => PlatformProfile::baseline(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(platform_id: &str) -> Vec<&'static str> {
        select_profile(platform_id).enabled_targets().collect()
    }

    #[test]
    fn every_profile_defines_every_flag() {
        for platform_id in ["linux", "macos", "windows", "freebsd"] {
            let profile = select_profile(platform_id);
            assert_eq!(
                profile.defaults.len(),
                FEATURE_TOGGLES.len() + TARGET_FLAGS.len()
            );
            for toggle in FEATURE_TOGGLES {
                assert!(profile.default_for(toggle.name).is_some());
            }
            for flag in TARGET_FLAGS {
                assert!(profile.default_for(flag.name).is_some());
            }
        }
    }

    #[test]
    fn flag_names_are_unique() {
        let mut names: Vec<_> = FEATURE_TOGGLES
            .iter()
            .map(|toggle| toggle.name)
            .chain(TARGET_FLAGS.iter().map(|flag| flag.name))
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn linux_enables_everything() {
        assert_eq!(enabled("linux").len(), TARGET_FLAGS.len());
    }

    #[test]
    fn macos_defaults() {
        assert_eq!(
            enabled("macos"),
            ["SIMSIMD_TARGET_NEON", "SIMSIMD_TARGET_HASWELL"]
        );
        assert_eq!(
            select_profile("macos").compile_args,
            ["-std=c11", "-O3", "-ffast-math", "-w"]
        );
    }

    #[test]
    fn windows_defaults() {
        assert_eq!(
            enabled("windows"),
            [
                "SIMSIMD_TARGET_NEON",
                "SIMSIMD_TARGET_HASWELL",
                "SIMSIMD_TARGET_SKYLAKE",
                "SIMSIMD_TARGET_ICE",
            ]
        );
        assert!(select_profile("windows").compile_args.contains(&"/fp:fast"));
    }

    #[test]
    fn profiles_nest() {
        let linux = enabled("linux");
        let windows = enabled("windows");
        let macos = enabled("macos");
        assert!(windows.iter().all(|flag| linux.contains(flag)));
        assert!(macos.iter().all(|flag| windows.contains(flag)));
        assert!(windows.len() > macos.len());
    }

    #[test]
    fn unknown_platform_gets_baseline() {
        for platform_id in ["freebsd", "Linux", "darwin", "win32", ""] {
            let profile = select_profile(platform_id);
            assert_eq!(profile.platform, None);
            assert_eq!(profile.id(), "baseline");
            assert!(profile.compile_args.is_empty());
            assert_eq!(profile.enabled_targets().count(), 0);
        }
    }

    #[test]
    fn toggles_come_first_everywhere() {
        for platform_id in ["linux", "macos", "windows", "haiku"] {
            let profile = select_profile(platform_id);
            assert_eq!(profile.defaults[0].name, "SIMSIMD_NATIVE_F16");
            assert_eq!(profile.default_for("SIMSIMD_NATIVE_F16"), Some(false));
            assert_eq!(profile.default_for("SIMSIMD_NATIVE_BF16"), Some(false));
            assert_eq!(profile.default_for("SIMSIMD_DYNAMIC_DISPATCH"), Some(true));
        }
    }
}
