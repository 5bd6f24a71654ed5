//! Thread pool configuration.
//!
//! A UCI-flavored string option map and the typed `PoolConfig` derived
//! from it. Out-of-range values are silently clamped; unknown keys are
//! ignored. No global option object: the pool receives a `PoolConfig`
//! explicitly.

use std::collections::BTreeMap;

use crate::types::{Depth, ONE_PLY};

/// Hard cap on worker threads (slaves_mask is a 64-bit word).
pub const MAX_THREADS: usize = 64;

/// Option names recognized by `PoolConfig::from_options`.
pub const OPTION_THREADS: &str = "Threads";
pub const OPTION_MIN_SPLIT_DEPTH: &str = "Min Split Depth";
pub const OPTION_MAX_THREADS_PER_SPLIT_POINT: &str = "Max Threads per Split Point";
pub const OPTION_IDLE_THREADS_SLEEP: &str = "Idle Threads Sleep";

/// String key/value option store, UCI style.
#[derive(Debug, Clone, Default)]
pub struct OptionMap {
    map: BTreeMap<String, String>,
}

impl OptionMap {
    pub fn new() -> OptionMap {
        OptionMap::default()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.map.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.trim().parse().ok()
    }

    fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)?.trim() {
            "true" | "1" | "on" => Some(true),
            "false" | "0" | "off" => Some(false),
            _ => None,
        }
    }
}

/// Typed thread-pool configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Total worker count, main thread included.
    pub threads: usize,
    /// Minimum depth at which a node may be split.
    pub min_split_depth: Depth,
    /// Upper bound on threads cooperating at one split point.
    pub max_threads_per_split_point: usize,
    /// When false, idle workers spin instead of blocking on the condvar.
    pub idle_threads_sleep: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            threads: 1,
            min_split_depth: auto_min_split_depth(1),
            max_threads_per_split_point: 5,
            idle_threads_sleep: true,
        }
    }
}

/// Automatic minimum split depth: shallower splits pay off only while
/// the pool is small.
fn auto_min_split_depth(threads: usize) -> Depth {
    if threads < 8 {
        4 * ONE_PLY
    } else {
        7 * ONE_PLY
    }
}

impl PoolConfig {
    /// Build a config from the option map, clamping out-of-range values.
    ///
    /// A `Min Split Depth` of 0 selects the automatic value; explicit
    /// values are floored at 4 plies.
    pub fn from_options(options: &OptionMap) -> PoolConfig {
        let threads = options
            .get_i64(OPTION_THREADS)
            .unwrap_or(1)
            .clamp(1, MAX_THREADS as i64) as usize;

        let requested_depth = options.get_i64(OPTION_MIN_SPLIT_DEPTH).unwrap_or(0).max(0) as Depth;
        let min_split_depth = if requested_depth == 0 {
            auto_min_split_depth(threads)
        } else {
            (requested_depth * ONE_PLY).max(4 * ONE_PLY)
        };

        let max_threads_per_split_point = options
            .get_i64(OPTION_MAX_THREADS_PER_SPLIT_POINT)
            .unwrap_or(5)
            .clamp(4, 8) as usize;

        let idle_threads_sleep = options.get_bool(OPTION_IDLE_THREADS_SLEEP).unwrap_or(true);

        PoolConfig { threads, min_split_depth, max_threads_per_split_point, idle_threads_sleep }
    }
}
