//! Run configuration.
//!
//! Test binaries take no flags of their own, so the harness reads its knobs
//! from the environment:
//!
//! - `OPBENCH_PERF`: use the long shape lists (default off)
//! - `OPBENCH_VERBOSE`: dump tensors at `debug` level (default off)
//! - `OPBENCH_SEED`: seed for random inputs and gradients (default 42)

use log::warn;

pub const PERF_ENV: &str = "OPBENCH_PERF";
pub const VERBOSE_ENV: &str = "OPBENCH_VERBOSE";
pub const SEED_ENV: &str = "OPBENCH_SEED";

/// Seed used when `OPBENCH_SEED` is unset.
pub const DEFAULT_SEED: u64 = 42;

/// Knobs shared by every run of the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Time the full shape lists instead of the short ones.
    pub performance_run: bool,
    /// Dump tensors before and after each pass.
    pub verbose: bool,
    /// Seed for input and output-gradient fills.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            performance_run: false,
            verbose: false,
            seed: DEFAULT_SEED,
        }
    }
}

impl RunConfig {
    /// Reads the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Unparsable values are logged and replaced by their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            performance_run: lookup(PERF_ENV)
                .map_or(defaults.performance_run, |v| flag(PERF_ENV, &v, defaults.performance_run)),
            verbose: lookup(VERBOSE_ENV)
                .map_or(defaults.verbose, |v| flag(VERBOSE_ENV, &v, defaults.verbose)),
            seed: lookup(SEED_ENV).map_or(defaults.seed, |v| {
                v.trim().parse().unwrap_or_else(|_| {
                    warn!("ignoring {SEED_ENV}={v:?}: not an unsigned integer");
                    defaults.seed
                })
            }),
        }
    }
}

fn flag(key: &str, raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" | "" => false,
        _ => {
            warn!("ignoring {key}={raw:?}: not a boolean");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(RunConfig::from_lookup(lookup(&[])), RunConfig::default());
    }

    #[test]
    fn parses_all_knobs() {
        let cfg = RunConfig::from_lookup(lookup(&[
            (PERF_ENV, "yes"),
            (VERBOSE_ENV, "1"),
            (SEED_ENV, " 1234 "),
        ]));
        assert!(cfg.performance_run);
        assert!(cfg.verbose);
        assert_eq!(cfg.seed, 1234);
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = RunConfig::from_lookup(lookup(&[(PERF_ENV, "sometimes"), (SEED_ENV, "-3")]));
        assert!(!cfg.performance_run);
        assert_eq!(cfg.seed, DEFAULT_SEED);
    }
}
