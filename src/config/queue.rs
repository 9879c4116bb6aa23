//! Queue and scheduler configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::serde::Priority;

/// Prefix for environment overrides read by [`QueueConfig::from_env`].
pub const ENV_PREFIX: &str = "ASSET_SCHEDULER_";

/// Selection weight per priority used by weighted random dequeue.
///
/// Weights bias selection; they are not a strict ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    /// Weight of [`Priority::Low`].
    pub low: u32,
    /// Weight of [`Priority::Normal`].
    pub normal: u32,
    /// Weight of [`Priority::High`].
    pub high: u32,
    /// Weight of [`Priority::Urgent`].
    pub urgent: u32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            low: 1,
            normal: 2,
            high: 4,
            urgent: 8,
        }
    }
}

impl PriorityWeights {
    /// Weight for a priority.
    pub const fn weight(&self, priority: Priority) -> u32 {
        match priority {
            Priority::Low => self.low,
            Priority::Normal => self.normal,
            Priority::High => self.high,
            Priority::Urgent => self.urgent,
        }
    }

    /// Return a copy with one priority's weight replaced.
    #[must_use]
    pub const fn with(mut self, priority: Priority, weight: u32) -> Self {
        match priority {
            Priority::Low => self.low = weight,
            Priority::Normal => self.normal = weight,
            Priority::High => self.high = weight,
            Priority::Urgent => self.urgent = weight,
        }
        self
    }

    fn total(&self) -> u64 {
        Priority::ALL
            .iter()
            .map(|p| u64::from(self.weight(*p)))
            .sum()
    }
}

/// Process-wide queue configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum concurrently running tasks.
    pub max_concurrent: usize,
    /// Maximum pending tasks (running tasks excluded).
    pub max_queue_size: usize,
    /// Timeout applied to tasks that do not set one.
    pub default_timeout_ms: u64,
    /// Retry budget applied to tasks that do not set one.
    pub default_max_retries: u32,
    /// Priority to selection weight table.
    pub priority_weights: PriorityWeights,
    /// Sleep between dispatch loop iterations.
    pub poll_interval_ms: u64,
    /// Number of finished results kept before the oldest is evicted.
    pub completed_cache_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            max_queue_size: 100,
            default_timeout_ms: 30_000,
            default_max_retries: 3,
            priority_weights: PriorityWeights::default(),
            poll_interval_ms: 100,
            completed_cache_size: 1000,
        }
    }
}

impl QueueConfig {
    /// Defaults, ready for `with_*` adjustments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency budget.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Set the maximum pending depth.
    #[must_use]
    pub const fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the default per-task timeout.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the default retry budget.
    #[must_use]
    pub const fn with_default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    /// Replace the weight table.
    #[must_use]
    pub const fn with_priority_weights(mut self, weights: PriorityWeights) -> Self {
        self.priority_weights = weights;
        self
    }

    /// Set the dispatch loop polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Set the completed-result cache capacity.
    #[must_use]
    pub const fn with_completed_cache_size(mut self, size: usize) -> Self {
        self.completed_cache_size = size;
        self
    }

    /// Default timeout as a [`Duration`].
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Polling interval as a [`Duration`].
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be greater than 0".into());
        }
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be greater than 0".into());
        }
        if self.default_timeout_ms == 0 {
            return Err("default_timeout_ms must be greater than 0".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".into());
        }
        if self.completed_cache_size == 0 {
            return Err("completed_cache_size must be greater than 0".into());
        }
        if self.priority_weights.total() == 0 {
            return Err("at least one priority weight must be non-zero".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by `ASSET_SCHEDULER_*`
    /// environment variables, loading a `.env` file first if present.
    ///
    /// Recognized keys: `MAX_CONCURRENT`, `MAX_QUEUE_SIZE`,
    /// `DEFAULT_TIMEOUT_MS`, `DEFAULT_MAX_RETRIES`, `POLL_INTERVAL_MS`,
    /// `COMPLETED_CACHE_SIZE`, `WEIGHT_LOW`, `WEIGHT_NORMAL`, `WEIGHT_HIGH`,
    /// `WEIGHT_URGENT`.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Build configuration from an arbitrary key lookup (keys without prefix).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        override_from(&lookup, "MAX_CONCURRENT", &mut cfg.max_concurrent)?;
        override_from(&lookup, "MAX_QUEUE_SIZE", &mut cfg.max_queue_size)?;
        override_from(&lookup, "DEFAULT_TIMEOUT_MS", &mut cfg.default_timeout_ms)?;
        override_from(&lookup, "DEFAULT_MAX_RETRIES", &mut cfg.default_max_retries)?;
        override_from(&lookup, "POLL_INTERVAL_MS", &mut cfg.poll_interval_ms)?;
        override_from(&lookup, "COMPLETED_CACHE_SIZE", &mut cfg.completed_cache_size)?;
        let weights = &mut cfg.priority_weights;
        override_from(&lookup, "WEIGHT_LOW", &mut weights.low)?;
        override_from(&lookup, "WEIGHT_NORMAL", &mut weights.normal)?;
        override_from(&lookup, "WEIGHT_HIGH", &mut weights.high)?;
        override_from(&lookup, "WEIGHT_URGENT", &mut weights.urgent)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn override_from<F, V>(lookup: &F, key: &str, slot: &mut V) -> Result<(), String>
where
    F: Fn(&str) -> Option<String>,
    V: FromStr,
    V::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{ENV_PREFIX}{key}={raw:?}: {e}"))?;
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
const fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}
