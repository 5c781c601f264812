//! Pipeline executor: wires the three stages together and runs each on its
//! own named thread.
//!
//! ```text
//! [Source] ──raw queue──► [Classifier] ──classified queue──► [Aggregator]
//!                                                                 │
//!                                                     SharedAggregate (readers)
//! ```
//!
//! Shutdown is driven entirely by the end-of-stream marker: the source closes
//! the raw queue, the classifier relays the close, and the aggregator returns.
//! [`RunningPipeline::join`] waits for the stages in that same order.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::aggregator::{AggregateSnapshot, AggregatorStage, SharedAggregate};
use crate::pipeline::classifier::{ClassifierStage, LexiconModel, SentimentModel};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::provider::RecordProvider;
use crate::pipeline::queue::bounded_queue;
use crate::pipeline::source::{Source, StopHandle, TextFilter};
use crate::types::{StageKind, StageReport};
use serde::{Deserialize, Serialize};
use std::thread::{self, JoinHandle};

pub const SOURCE_THREAD: &str = "sentiflow-source";
pub const CLASSIFIER_THREAD: &str = "sentiflow-classifier";
pub const AGGREGATOR_THREAD: &str = "sentiflow-aggregator";

/// Final counters of every stage plus the aggregate at shutdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub source: StageReport,
    pub classifier: StageReport,
    pub aggregator: StageReport,
    pub snapshot: AggregateSnapshot,
}

impl PipelineReport {
    /// Records lost to backpressure across both queues
    pub fn total_dropped(&self) -> u64 {
        self.source.dropped + self.classifier.dropped
    }
}

/// Builder for a source → classifier → aggregator pipeline.
pub struct PipelineBuilder {
    config: PipelineConfig,
    provider: Option<Box<dyn RecordProvider + Send>>,
    filter: Option<Box<dyn TextFilter + Send>>,
    model: Option<Box<dyn SentimentModel + Send>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            provider: None,
            filter: None,
            model: None,
        }
    }

    /// Records the source draws from (required)
    pub fn provider(mut self, provider: impl RecordProvider + Send + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Optional admission filter run by the source
    pub fn filter(mut self, filter: impl TextFilter + Send + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Classification model; defaults to [`LexiconModel`] built from the config
    pub fn model(mut self, model: impl SentimentModel + Send + 'static) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    /// Validate the configuration, create both queues and assemble the stages.
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;

        let provider = self
            .provider
            .ok_or(PipelineError::MissingComponent("record provider"))?;
        let model = self
            .model
            .unwrap_or_else(|| Box::new(LexiconModel::new(&self.config.classifier)));

        let (raw_tx, raw_rx) = bounded_queue("raw", self.config.queues.raw_capacity)?;
        let (classified_tx, classified_rx) =
            bounded_queue("classified", self.config.queues.classified_capacity)?;

        let mut source = Source::new(self.config.source.clone(), provider, raw_tx);
        if let Some(filter) = self.filter {
            source = source.with_filter(filter);
        }
        let stop = source.stop_handle();

        let classifier = ClassifierStage::new(model, raw_rx, classified_tx);
        let aggregate = SharedAggregate::new(&self.config.aggregator);
        let aggregator = AggregatorStage::new(classified_rx, aggregate.clone());

        Ok(Pipeline {
            source,
            classifier,
            aggregator,
            aggregate,
            stop,
        })
    }
}

/// A fully wired pipeline that has not started yet.
pub struct Pipeline {
    source: Source,
    classifier: ClassifierStage,
    aggregator: AggregatorStage,
    aggregate: SharedAggregate,
    stop: StopHandle,
}

impl Pipeline {
    /// Handle for reading the aggregate; valid before, during and after the run
    pub fn aggregate(&self) -> SharedAggregate {
        self.aggregate.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Spawn one thread per stage.
    ///
    /// Consumers are spawned before producers. If a spawn fails, the stages
    /// already running see their neighbour disappear and wind down on their own.
    pub fn start(self) -> PipelineResult<RunningPipeline> {
        let Self {
            source,
            classifier,
            aggregator,
            aggregate,
            stop,
        } = self;

        let aggregator_handle = thread::Builder::new()
            .name(AGGREGATOR_THREAD.to_string())
            .spawn(move || aggregator.run())?;
        let classifier_handle = thread::Builder::new()
            .name(CLASSIFIER_THREAD.to_string())
            .spawn(move || classifier.run())?;
        let source_handle = thread::Builder::new()
            .name(SOURCE_THREAD.to_string())
            .spawn(move || source.run())?;

        tracing::info!("Pipeline started");

        Ok(RunningPipeline {
            source: source_handle,
            classifier: classifier_handle,
            aggregator: aggregator_handle,
            aggregate,
            stop,
        })
    }

    /// Start the pipeline and block until every stage has finished.
    pub fn run(self) -> PipelineResult<PipelineReport> {
        self.start()?.join()
    }
}

/// Handles onto a started pipeline.
pub struct RunningPipeline {
    source: JoinHandle<StageReport>,
    classifier: JoinHandle<StageReport>,
    aggregator: JoinHandle<StageReport>,
    aggregate: SharedAggregate,
    stop: StopHandle,
}

impl RunningPipeline {
    pub fn aggregate(&self) -> SharedAggregate {
        self.aggregate.clone()
    }

    /// Ask the source to end the stream early. Records already queued are
    /// still classified and aggregated.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// True once all three stage threads have returned
    pub fn is_finished(&self) -> bool {
        self.source.is_finished() && self.classifier.is_finished() && self.aggregator.is_finished()
    }

    /// Wait for source, classifier and aggregator, in that order.
    ///
    /// Every stage is joined even if an earlier one panicked; the first panic
    /// is then reported.
    pub fn join(self) -> PipelineResult<PipelineReport> {
        let source = join_stage(self.source, StageKind::Source);
        let classifier = join_stage(self.classifier, StageKind::Classifier);
        let aggregator = join_stage(self.aggregator, StageKind::Aggregator);

        let report = PipelineReport {
            source: source?,
            classifier: classifier?,
            aggregator: aggregator?,
            snapshot: self.aggregate.snapshot(),
        };

        tracing::info!(
            processed = report.aggregator.processed,
            dropped = report.total_dropped(),
            "Pipeline finished"
        );
        Ok(report)
    }
}

fn join_stage(handle: JoinHandle<StageReport>, stage: StageKind) -> PipelineResult<StageReport> {
    handle.join().map_err(|_| {
        tracing::error!("{} stage panicked", stage);
        PipelineError::StagePanicked(stage)
    })
}
