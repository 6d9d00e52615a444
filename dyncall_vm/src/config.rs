//! Dispatch configuration resolved once per compiled unit.
//!
//! A single immutable struct captures every dispatch setting. It is built
//! from defaults or the environment before a `CallSiteArray` is created and
//! copied into each call site, so the hot path never reads the environment.

use std::env;

// =============================================================================
// Environment Variables
// =============================================================================

/// Number of re-resolutions after which a site is reported as thrashing.
pub const ENV_THRASH_THRESHOLD: &str = "DYNCALL_THRASH_THRESHOLD";
/// Emit a trace event on every guard hit (`1`/`true`/`yes`).
pub const ENV_TRACE_HITS: &str = "DYNCALL_TRACE_HITS";

/// Default thrash threshold.
pub const DEFAULT_THRASH_THRESHOLD: u64 = 64;

// =============================================================================
// Dispatch Configuration
// =============================================================================

/// Dispatch settings shared by every call site of one array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// A site that has re-resolved more than this many times logs one
    /// warning and is classified as thrashing in statistics.
    pub thrash_threshold: u64,

    /// Emit `trace!` for every guard hit.
    pub trace_hits: bool,
}

impl DispatchConfig {
    /// Resolve configuration from the environment, falling back to defaults
    /// for unset or unparsable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let thrash_threshold = lookup(ENV_THRASH_THRESHOLD)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(defaults.thrash_threshold);
        let trace_hits = lookup(ENV_TRACE_HITS)
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.trace_hits);
        Self {
            thrash_threshold,
            trace_hits,
        }
    }

    /// Override the thrash threshold.
    pub fn with_thrash_threshold(mut self, threshold: u64) -> Self {
        self.thrash_threshold = threshold;
        self
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            thrash_threshold: DEFAULT_THRASH_THRESHOLD,
            trace_hits: false,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: FxHashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::from_lookup(|_| None);
        assert_eq!(config, DispatchConfig::default());
        assert_eq!(config.thrash_threshold, DEFAULT_THRASH_THRESHOLD);
        assert!(!config.trace_hits);
    }

    #[test]
    fn test_env_overrides() {
        let config = DispatchConfig::from_lookup(lookup_from(&[
            (ENV_THRASH_THRESHOLD, " 8 "),
            (ENV_TRACE_HITS, "Yes"),
        ]));
        assert_eq!(config.thrash_threshold, 8);
        assert!(config.trace_hits);
    }

    #[test]
    fn test_unparsable_threshold_falls_back() {
        let config = DispatchConfig::from_lookup(lookup_from(&[(ENV_THRASH_THRESHOLD, "lots")]));
        assert_eq!(config.thrash_threshold, DEFAULT_THRASH_THRESHOLD);
    }

    #[test]
    fn test_builder_override() {
        let config = DispatchConfig::default().with_thrash_threshold(2);
        assert_eq!(config.thrash_threshold, 2);
    }
}
