use super::Environment;

/// The only override value that enables a flag.
pub const ENABLE: &str = "1";

/// Effective value of `name`: the override if one is bound, `default` otherwise.
///
/// Only the exact literal `"1"` enables. `"true"`, `"yes"` and friends disable,
/// same as `"0"`, so a build never turns on a tier by accident.
pub fn resolve(name: &str, default: bool, environment: &Environment) -> bool {
    match environment.get(name) {
        Some(value) => value == ENABLE,
        None => default,
    }
}
