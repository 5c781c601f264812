//! Per-stage settings sections of the pipeline configuration
//!
//! # Main Types
//!
//! - [`SourceConfig`] - Emission pacing and item limit
//! - [`QueueConfig`] - Capacities of the two inter-stage queues
//! - [`AggregatorConfig`] - EMA smoothing factor and recent window size
//! - [`ClassifierConfig`] - Keyword lists for the built-in lexicon model
//!
//! Every section has defaults matching the reference driver, so a TOML file
//! only needs to name what it changes.

use crate::error::{Result, SentiflowError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default minimum delay between emissions in seconds
pub const DEFAULT_MIN_DELAY_SECS: f64 = 0.1;

/// Default maximum delay between emissions in seconds
pub const DEFAULT_MAX_DELAY_SECS: f64 = 2.0;

/// Default number of records the source emits
pub const DEFAULT_MAX_ITEMS: u64 = 100;

/// Default capacity of each inter-stage queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// Default EMA smoothing factor
pub const DEFAULT_ALPHA: f64 = 0.1;

/// Default size of the recent-history window
pub const DEFAULT_RECENT_WINDOW: usize = 5;

/// Source stage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Lower bound of the per-item delay, in seconds
    pub min_delay_secs: f64,

    /// Upper bound of the per-item delay, in seconds
    pub max_delay_secs: f64,

    /// Number of records to enqueue successfully before closing the stream
    pub max_items: u64,

    /// Seed for the delay generator (random when unset)
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: DEFAULT_MIN_DELAY_SECS,
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
            max_items: DEFAULT_MAX_ITEMS,
            seed: None,
        }
    }
}

/// Longest delay a config value can turn into (about a day)
const MAX_DELAY_SECS: f64 = 86_400.0;

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(secs.min(MAX_DELAY_SECS))
}

impl SourceConfig {
    /// Source with no pacing at all
    pub fn unpaced(max_items: u64) -> Self {
        Self {
            min_delay_secs: 0.0,
            max_delay_secs: 0.0,
            max_items,
            seed: None,
        }
    }

    /// Lower delay bound; negative or NaN seconds read as zero
    pub fn min_delay(&self) -> Duration {
        secs_to_duration(self.min_delay_secs)
    }

    /// Upper delay bound, never below `min_delay()`
    pub fn max_delay(&self) -> Duration {
        secs_to_duration(self.max_delay_secs).max(self.min_delay())
    }

    pub fn validate(&self) -> Result<()> {
        let finite_non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !finite_non_negative(self.min_delay_secs) || !finite_non_negative(self.max_delay_secs)
        {
            return Err(SentiflowError::Config(format!(
                "source delays must be finite and >= 0 (got {}..{})",
                self.min_delay_secs, self.max_delay_secs
            )));
        }
        if self.min_delay_secs > self.max_delay_secs {
            return Err(SentiflowError::Config(format!(
                "source min delay {} exceeds max delay {}",
                self.min_delay_secs, self.max_delay_secs
            )));
        }
        if self.max_items == 0 {
            return Err(SentiflowError::Config(
                "source max_items must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Inter-stage queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Capacity of the queue between source and classifier
    pub raw_capacity: usize,

    /// Capacity of the queue between classifier and aggregator
    pub classified_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            raw_capacity: DEFAULT_QUEUE_CAPACITY,
            classified_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl QueueConfig {
    /// Both queues with the same capacity
    pub fn uniform(capacity: usize) -> Self {
        Self {
            raw_capacity: capacity,
            classified_capacity: capacity,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.raw_capacity == 0 || self.classified_capacity == 0 {
            return Err(SentiflowError::Config(
                "queue capacities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Aggregator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// EMA smoothing factor in (0, 1]; higher follows new samples faster
    pub alpha: f64,

    /// Number of recent entries kept for display
    pub recent_window: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            recent_window: DEFAULT_RECENT_WINDOW,
        }
    }
}

impl AggregatorConfig {
    pub fn new(alpha: f64, recent_window: usize) -> Self {
        Self {
            alpha,
            recent_window,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(SentiflowError::Config(format!(
                "alpha must be in (0, 1] (got {})",
                self.alpha
            )));
        }
        if self.recent_window == 0 {
            return Err(SentiflowError::Config(
                "recent_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the built-in lexicon model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Extra words counted as positive, on top of the built-in list
    pub positive_words: Vec<String>,

    /// Extra words counted as negative, on top of the built-in list
    pub negative_words: Vec<String>,
}
