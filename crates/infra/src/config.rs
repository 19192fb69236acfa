//! Engine configuration.
//!
//! Defaults suit a single-process deployment; every knob can be overridden
//! from the environment via [`EngineConfig::from_env`].

use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::warn;

use stockledger_inventory::ReorderTrigger;

use crate::concurrency::ConcurrencyStrategy;

pub const ENV_LOCK_TIMEOUT_MS: &str = "STOCKLEDGER_LOCK_TIMEOUT_MS";
pub const ENV_MAX_CONFLICT_RETRIES: &str = "STOCKLEDGER_MAX_CONFLICT_RETRIES";
pub const ENV_RETRY_BACKOFF_MS: &str = "STOCKLEDGER_RETRY_BACKOFF_MS";
pub const ENV_MAX_RETRY_BACKOFF_MS: &str = "STOCKLEDGER_MAX_RETRY_BACKOFF_MS";
pub const ENV_RETRY_JITTER: &str = "STOCKLEDGER_RETRY_JITTER";
pub const ENV_CONCURRENCY: &str = "STOCKLEDGER_CONCURRENCY";
pub const ENV_REORDER_TRIGGER: &str = "STOCKLEDGER_REORDER_TRIGGER";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Reservation engine configuration.
///
/// Conflict retries back off exponentially from `retry_backoff`, capped at
/// `max_retry_backoff`, and each delay is spread by `retry_jitter` so writers
/// that lost the same round do not wake up together and collide again. With
/// the defaults a key that keeps losing gives up after roughly the lock
/// timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Longest a mutation waits for its key before `OperationTimedOut`.
    pub lock_timeout: Duration,
    /// Conditional-write conflicts retried before giving up.
    pub max_conflict_retries: u32,
    /// Delay before the first conflict retry; doubles on every further one.
    pub retry_backoff: Duration,
    /// Upper bound for a single retry delay (before jitter).
    pub max_retry_backoff: Duration,
    /// Fraction (0.0..=1.0) by which each delay is randomly stretched or shrunk.
    pub retry_jitter: f64,
    pub strategy: ConcurrencyStrategy,
    pub reorder_trigger: ReorderTrigger,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            max_conflict_retries: 10,
            retry_backoff: Duration::from_millis(5),
            max_retry_backoff: Duration::from_millis(250),
            retry_jitter: 0.5,
            strategy: ConcurrencyStrategy::KeyedLock,
            reorder_trigger: ReorderTrigger::Crossing,
        }
    }
}

impl EngineConfig {
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_max_retry_backoff(mut self, cap: Duration) -> Self {
        self.max_retry_backoff = cap;
        self
    }

    /// Clamped to `0.0..=1.0`.
    pub fn with_retry_jitter(mut self, jitter: f64) -> Self {
        self.retry_jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_strategy(mut self, strategy: ConcurrencyStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_reorder_trigger(mut self, trigger: ReorderTrigger) -> Self {
        self.reorder_trigger = trigger;
        self
    }

    /// Delay before conflict retry number `attempt` (1-based), jittered.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let spread = if self.retry_jitter > 0.0 {
            rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        self.retry_delay_with(attempt, spread)
    }

    /// `spread` in `-1.0..=1.0` picks where inside the jitter band the delay lands.
    fn retry_delay_with(&self, attempt: u32, spread: f64) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let doublings = (attempt - 1).min(20);
        let base = self
            .retry_backoff
            .saturating_mul(1u32 << doublings)
            .min(self.max_retry_backoff);

        let offset = self.retry_jitter * spread.clamp(-1.0, 1.0);
        if offset == 0.0 {
            return base;
        }
        base.mul_f64((1.0 + offset).max(0.0))
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read overrides through `lookup`; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&lookup, ENV_LOCK_TIMEOUT_MS)? {
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    var: ENV_LOCK_TIMEOUT_MS,
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.lock_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_var::<u32>(&lookup, ENV_MAX_CONFLICT_RETRIES)? {
            config.max_conflict_retries = retries;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_RETRY_BACKOFF_MS)? {
            config.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, ENV_MAX_RETRY_BACKOFF_MS)? {
            config.max_retry_backoff = Duration::from_millis(ms);
        }
        if let Some(jitter) = parse_var::<f64>(&lookup, ENV_RETRY_JITTER)? {
            if !(0.0..=1.0).contains(&jitter) {
                return Err(ConfigError::Invalid {
                    var: ENV_RETRY_JITTER,
                    reason: format!("{jitter} is outside 0.0..=1.0"),
                });
            }
            config.retry_jitter = jitter;
        }
        if let Some(strategy) = parse_var::<ConcurrencyStrategy>(&lookup, ENV_CONCURRENCY)? {
            config.strategy = strategy;
        }
        if let Some(trigger) = parse_var::<ReorderTrigger>(&lookup, ENV_REORDER_TRIGGER)? {
            config.reorder_trigger = trigger;
        }

        if config.strategy == ConcurrencyStrategy::Optimistic && config.max_conflict_retries == 0 {
            warn!("optimistic concurrency with zero conflict retries; contended keys will time out immediately");
        }

        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
            var,
            reason: format!("'{raw}': {e}"),
        }),
    }
}
