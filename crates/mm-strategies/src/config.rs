use std::num::NonZeroUsize;
use std::time::Duration;

use mm_core::{MatmulError, Result, Validation};

/// Tunables shared by every strategy in this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Worker count for the pooled and row-stealing strategies, and compute
    /// workers in the pipeline.
    pub threads: usize,
    /// Largest leaf extent (rows and columns) for fork-join recursion.
    pub fork_join_threshold: usize,
    /// Tile edge for the tiled strategy; its leaf threshold is twice this.
    pub tile_size: usize,
    /// Columns of B per pipeline strip.
    pub strip_width: usize,
    /// Capacity of each bounded pipeline queue.
    pub queue_capacity: usize,
    /// Upper bound on any single blocking pipeline receive. `None` waits
    /// forever.
    pub stage_timeout: Option<Duration>,
    /// Dimension check policy.
    pub validation: Validation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            threads: available_parallelism(),
            fork_join_threshold: 64,
            tile_size: 64,
            strip_width: 100,
            queue_capacity: 16,
            stage_timeout: None,
            validation: Validation::Always,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `MM_*` environment variables.
    ///
    /// Reads the following keys:
    /// - `MM_THREADS` -> threads
    /// - `MM_FORK_JOIN_THRESHOLD` -> fork_join_threshold
    /// - `MM_TILE_SIZE` -> tile_size
    /// - `MM_STRIP_WIDTH` -> strip_width
    /// - `MM_QUEUE_CAPACITY` -> queue_capacity
    /// - `MM_STAGE_TIMEOUT_MS` -> stage_timeout (milliseconds)
    /// - `MM_VALIDATION` -> validation (`always` or `debug`)
    pub fn from_env() -> Result<EngineConfig> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] but reads keys through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<EngineConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();
        let stage_timeout = match lookup("MM_STAGE_TIMEOUT_MS") {
            Some(raw) => Some(Duration::from_millis(parse(
                "MM_STAGE_TIMEOUT_MS",
                &raw,
            )? as u64)),
            None => defaults.stage_timeout,
        };
        let validation = match lookup("MM_VALIDATION").as_deref() {
            None => defaults.validation,
            Some("always") => Validation::Always,
            Some("debug") => Validation::DebugOnly,
            Some(other) => {
                return Err(MatmulError::Config {
                    key: "MM_VALIDATION".to_string(),
                    value: other.to_string(),
                })
            }
        };

        Ok(EngineConfig {
            threads: positive(&lookup, "MM_THREADS", defaults.threads)?,
            fork_join_threshold: positive(
                &lookup,
                "MM_FORK_JOIN_THRESHOLD",
                defaults.fork_join_threshold,
            )?,
            tile_size: positive(&lookup, "MM_TILE_SIZE", defaults.tile_size)?,
            strip_width: positive(&lookup, "MM_STRIP_WIDTH", defaults.strip_width)?,
            queue_capacity: positive(&lookup, "MM_QUEUE_CAPACITY", defaults.queue_capacity)?,
            stage_timeout,
            validation,
        })
    }
}

/// Hardware parallelism, or 1 if it cannot be queried.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn positive<F>(lookup: &F, key: &str, default: usize) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse(key, &raw),
        None => Ok(default),
    }
}

fn parse(key: &str, raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(MatmulError::Config {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert!(cfg.threads >= 1);
        assert_eq!(cfg.fork_join_threshold, 64);
        assert_eq!(cfg.tile_size, 64);
        assert_eq!(cfg.strip_width, 100);
        assert_eq!(cfg.stage_timeout, None);
        assert_eq!(cfg.validation, Validation::Always);
    }

    #[test]
    fn test_empty_lookup_is_default() {
        let cfg = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = EngineConfig::from_lookup(lookup_from(&[
            ("MM_THREADS", "3"),
            ("MM_TILE_SIZE", " 32 "),
            ("MM_STRIP_WIDTH", "7"),
            ("MM_STAGE_TIMEOUT_MS", "250"),
            ("MM_VALIDATION", "debug"),
        ]))
        .unwrap();
        assert_eq!(cfg.threads, 3);
        assert_eq!(cfg.tile_size, 32);
        assert_eq!(cfg.strip_width, 7);
        assert_eq!(cfg.stage_timeout, Some(Duration::from_millis(250)));
        assert_eq!(cfg.validation, Validation::DebugOnly);
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        let err = EngineConfig::from_lookup(lookup_from(&[("MM_THREADS", "0")])).unwrap_err();
        assert!(matches!(err, MatmulError::Config { ref key, .. } if key == "MM_THREADS"));

        assert!(EngineConfig::from_lookup(lookup_from(&[("MM_TILE_SIZE", "big")])).is_err());
        assert!(EngineConfig::from_lookup(lookup_from(&[("MM_VALIDATION", "never")])).is_err());
    }
}
