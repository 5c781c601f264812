//! Test data builders for creating test objects

use sentiflow::config::{AggregatorConfig, PipelineConfig, QueueConfig, SourceConfig};

/// Builder for pipeline configurations; starts unpaced so tests run fast
pub struct ConfigBuilder {
    config: PipelineConfig,
}

impl ConfigBuilder {
    pub fn new(max_items: u64) -> Self {
        Self {
            config: PipelineConfig {
                source: SourceConfig::unpaced(max_items),
                ..PipelineConfig::default()
            },
        }
    }

    pub fn delays(mut self, min_secs: f64, max_secs: f64) -> Self {
        self.config.source.min_delay_secs = min_secs;
        self.config.source.max_delay_secs = max_secs;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.source.seed = Some(seed);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queues = QueueConfig::uniform(capacity);
        self
    }

    pub fn aggregator(mut self, alpha: f64, recent_window: usize) -> Self {
        self.config.aggregator = AggregatorConfig::new(alpha, recent_window);
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

/// Texts whose prefix tells [`super::mock_helpers::ScriptedModel`] the label
pub fn labelled_texts(count: usize) -> Vec<String> {
    const PREFIXES: [&str; 3] = ["pos", "neu", "neg"];
    (0..count)
        .map(|i| format!("{} record {}", PREFIXES[i % 3], i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new(7)
            .queue_capacity(3)
            .aggregator(0.5, 2)
            .build();

        assert_eq!(config.source.max_items, 7);
        assert_eq!(config.queues.raw_capacity, 3);
        assert_eq!(config.queues.classified_capacity, 3);
        assert_eq!(config.aggregator.alpha, 0.5);
        assert!(config.validate().is_ok());
    }
}
