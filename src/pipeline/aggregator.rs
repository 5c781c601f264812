//! Aggregator stage: folds classified records into a running summary.
//!
//! The summary (EMA score, per-label counts, total, recent-history window)
//! lives in a private [`AggregateState`] behind a single mutex. The only way to
//! reach it is through [`SharedAggregate`]: one critical section per record on
//! the write side, and lock → copy → unlock on every read, so a reader never
//! sees half of an update.

use crate::config::AggregatorConfig;
use crate::pipeline::error::PipelineError;
use crate::pipeline::queue::{QueueItem, QueueReceiver};
use crate::types::{
    ClassifiedRecord, Completion, LabelCounts, Probabilities, RecentEntry, SentimentLabel,
    StageKind, StageReport,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Map class probabilities onto a 0..=100 sentiment score.
///
/// `(P(POS) - P(NEG))` spans [-1, 1] and is rescaled linearly; NEU only
/// contributes by taking mass away from the other two.
pub fn score(probabilities: &Probabilities) -> f64 {
    let raw = probabilities.get(SentimentLabel::Pos) - probabilities.get(SentimentLabel::Neg);
    (((raw + 1.0) / 2.0) * 100.0).clamp(0.0, 100.0)
}

/// One EMA step. `previous == None` means this is the first sample.
pub fn ema_step(previous: Option<f64>, sample: f64, alpha: f64) -> f64 {
    match previous {
        None => sample,
        Some(ema) => alpha * sample + (1.0 - alpha) * ema,
    }
}

/// Running summary. Only reachable through [`SharedAggregate`].
#[derive(Debug)]
struct AggregateState {
    alpha: f64,
    ema: Option<f64>,
    counts: LabelCounts,
    total_processed: u64,
    recent: VecDeque<RecentEntry>,
    capacity: usize,
}

impl AggregateState {
    fn new(config: &AggregatorConfig) -> Self {
        let capacity = config.recent_window.max(1);
        Self {
            alpha: config.alpha,
            ema: None,
            counts: LabelCounts::default(),
            total_processed: 0,
            recent: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn apply(&mut self, entry: RecentEntry) {
        self.ema = Some(ema_step(self.ema, entry.score, self.alpha));
        self.counts.increment(entry.label);
        self.total_processed += 1;

        if self.recent.len() >= self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(entry);
    }
}

/// Consistent copy of the whole aggregate, taken under one lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    /// `None` until the first record has been processed
    pub ema_score: Option<f64>,
    pub sentiment_counts: LabelCounts,
    pub recent_comments: Vec<RecentEntry>,
    pub total_processed: u64,
    pub taken_at: DateTime<Utc>,
}

/// Cloneable handle onto the aggregate state.
///
/// The aggregator stage writes through it; any number of other threads may
/// read through clones of it at any time.
#[derive(Debug, Clone)]
pub struct SharedAggregate {
    inner: Arc<Mutex<AggregateState>>,
}

impl SharedAggregate {
    pub fn new(config: &AggregatorConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AggregateState::new(config))),
        }
    }

    // Every update is applied in full before its guard drops, so a poisoned
    // lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fold one record into the aggregate and return its score.
    pub fn record(&self, record: &ClassifiedRecord) -> f64 {
        let score = score(&record.probabilities);
        let entry = RecentEntry {
            text: record.text.clone(),
            score,
            label: record.predicted_label,
        };
        self.lock().apply(entry);
        score
    }

    /// Current EMA score, `None` before the first record
    pub fn ema(&self) -> Option<f64> {
        self.lock().ema
    }

    pub fn counts(&self) -> LabelCounts {
        self.lock().counts
    }

    /// Recent entries, oldest first
    pub fn recent(&self) -> Vec<RecentEntry> {
        self.lock().recent.iter().cloned().collect()
    }

    /// Scores of the recent entries, oldest first
    pub fn recent_scores(&self) -> Vec<f64> {
        self.lock().recent.iter().map(|e| e.score).collect()
    }

    pub fn total(&self) -> u64 {
        self.lock().total_processed
    }

    /// All fields at once, from a single critical section
    pub fn snapshot(&self) -> AggregateSnapshot {
        let state = self.lock();
        AggregateSnapshot {
            ema_score: state.ema,
            sentiment_counts: state.counts,
            recent_comments: state.recent.iter().cloned().collect(),
            total_processed: state.total_processed,
            taken_at: Utc::now(),
        }
    }
}

/// Terminal stage: drains the classified queue into a [`SharedAggregate`].
pub struct AggregatorStage {
    input: QueueReceiver<ClassifiedRecord>,
    aggregate: SharedAggregate,
}

impl AggregatorStage {
    pub fn new(input: QueueReceiver<ClassifiedRecord>, aggregate: SharedAggregate) -> Self {
        Self { input, aggregate }
    }

    pub fn aggregate(&self) -> SharedAggregate {
        self.aggregate.clone()
    }

    /// Consume until end-of-stream.
    pub fn run(mut self) -> StageReport {
        tracing::info!("Aggregator started");
        let mut report = StageReport::new(StageKind::Aggregator);

        let completion = loop {
            match self.input.get() {
                Ok(QueueItem::Item(record)) => {
                    let score = self.aggregate.record(&record);
                    report.processed += 1;
                    tracing::trace!(score, label = %record.predicted_label, "record aggregated");
                }
                Ok(QueueItem::EndOfStream) => break Completion::Drained,
                Err(PipelineError::QueueDisconnected(queue)) => {
                    tracing::error!(queue, "classified queue lost its producer without end-of-stream");
                    break Completion::UpstreamLost;
                }
                Err(e) => {
                    tracing::error!("Aggregator stopped on queue error: {}", e);
                    break Completion::UpstreamLost;
                }
            }
        };

        tracing::info!(
            processed = report.processed,
            ema = ?self.aggregate.ema(),
            "Aggregation completed"
        );
        report.finish(completion)
    }
}
