//! Core data types for sentiflow
//!
//! This module contains the records that travel through the pipeline and the
//! small value types the stages report back.
//!
//! # Main Types
//!
//! - [`SentimentLabel`] - POS / NEU / NEG
//! - [`Probabilities`] - Per-label probabilities; missing labels read as 0.0
//! - [`RawRecord`] - A text record emitted by the source
//! - [`Classification`] - What a sentiment model returns for one text
//! - [`ClassifiedRecord`] - A raw record enriched with the model output
//! - [`RecentEntry`] - One row of the aggregator's recent-history window
//! - [`LabelCounts`] - Per-label totals
//! - [`StageReport`] - Completion status and counters of one stage
//!
//! Records are created once per item and moved from stage to stage; none of
//! them are mutated after construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance used when checking that probabilities sum to one
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Sentiment label assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    /// Positive
    #[serde(rename = "POS")]
    Pos,
    /// Neutral
    #[serde(rename = "NEU")]
    Neu,
    /// Negative
    #[serde(rename = "NEG")]
    Neg,
}

impl SentimentLabel {
    /// All labels in reporting order
    pub const ALL: [SentimentLabel; 3] =
        [SentimentLabel::Pos, SentimentLabel::Neu, SentimentLabel::Neg];

    /// Short wire name ("POS", "NEU", "NEG")
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Pos => "POS",
            SentimentLabel::Neu => "NEU",
            SentimentLabel::Neg => "NEG",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "POS" | "POSITIVE" => Ok(SentimentLabel::Pos),
            "NEU" | "NEUTRAL" => Ok(SentimentLabel::Neu),
            "NEG" | "NEGATIVE" => Ok(SentimentLabel::Neg),
            other => Err(format!("unknown sentiment label '{}'", other)),
        }
    }
}

/// Probability assigned to each label.
///
/// Labels a model did not report are 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Probabilities {
    #[serde(rename = "POS", default)]
    pub pos: f64,
    #[serde(rename = "NEU", default)]
    pub neu: f64,
    #[serde(rename = "NEG", default)]
    pub neg: f64,
}

impl Probabilities {
    pub fn new(pos: f64, neu: f64, neg: f64) -> Self {
        Self { pos, neu, neg }
    }

    /// All mass on NEU
    pub fn neutral() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    /// All mass on a single label
    pub fn certain(label: SentimentLabel) -> Self {
        let mut p = Self::default();
        p.set(label, 1.0);
        p
    }

    pub fn get(&self, label: SentimentLabel) -> f64 {
        match label {
            SentimentLabel::Pos => self.pos,
            SentimentLabel::Neu => self.neu,
            SentimentLabel::Neg => self.neg,
        }
    }

    pub fn set(&mut self, label: SentimentLabel, value: f64) {
        match label {
            SentimentLabel::Pos => self.pos = value,
            SentimentLabel::Neu => self.neu = value,
            SentimentLabel::Neg => self.neg = value,
        }
    }

    pub fn sum(&self) -> f64 {
        self.pos + self.neu + self.neg
    }

    /// Every value finite and in [0, 1], summing to ~1
    pub fn is_valid(&self) -> bool {
        let in_range = SentimentLabel::ALL.iter().all(|&l| {
            let v = self.get(l);
            v.is_finite() && (0.0..=1.0).contains(&v)
        });
        in_range && (self.sum() - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE
    }

    /// Label with the highest probability (ties resolve POS, NEU, NEG)
    pub fn argmax(&self) -> SentimentLabel {
        let mut best = SentimentLabel::Pos;
        for label in [SentimentLabel::Neu, SentimentLabel::Neg] {
            if self.get(label) > self.get(best) {
                best = label;
            }
        }
        best
    }
}

impl FromIterator<(SentimentLabel, f64)> for Probabilities {
    fn from_iter<I: IntoIterator<Item = (SentimentLabel, f64)>>(iter: I) -> Self {
        let mut p = Probabilities::default();
        for (label, value) in iter {
            p.set(label, value);
        }
        p
    }
}

/// A text record as produced by a record provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// The record text
    #[serde(alias = "Comment")]
    pub text: String,

    /// Label shipped with the dataset, if any
    #[serde(rename = "label", alias = "Sentiment", default)]
    pub original_label: Option<String>,
}

impl RawRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            original_label: None,
        }
    }

    /// Attach the dataset label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.original_label = Some(label.into());
        self
    }
}

/// Output of a sentiment model for one text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: SentimentLabel,
    pub probabilities: Probabilities,
}

impl Classification {
    pub fn new(label: SentimentLabel, probabilities: Probabilities) -> Self {
        Self {
            label,
            probabilities,
        }
    }

    /// Fallback used when a model fails on an item
    pub fn neutral() -> Self {
        Self::new(SentimentLabel::Neu, Probabilities::neutral())
    }

    /// Label and probabilities derived from the distribution's argmax
    pub fn from_probabilities(probabilities: Probabilities) -> Self {
        Self::new(probabilities.argmax(), probabilities)
    }
}

/// A record after classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub text: String,
    pub original_label: Option<String>,
    pub predicted_label: SentimentLabel,
    pub probabilities: Probabilities,
}

impl ClassifiedRecord {
    /// Combine a raw record with the model output, consuming the record
    pub fn from_raw(raw: RawRecord, classification: Classification) -> Self {
        Self {
            text: raw.text,
            original_label: raw.original_label,
            predicted_label: classification.label,
            probabilities: classification.probabilities,
        }
    }
}

/// One entry of the aggregator's recent-history window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub text: String,
    pub score: f64,
    pub label: SentimentLabel,
}

/// Number of processed records per label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelCounts {
    #[serde(rename = "POS")]
    pub pos: u64,
    #[serde(rename = "NEU")]
    pub neu: u64,
    #[serde(rename = "NEG")]
    pub neg: u64,
}

impl LabelCounts {
    pub fn get(&self, label: SentimentLabel) -> u64 {
        match label {
            SentimentLabel::Pos => self.pos,
            SentimentLabel::Neu => self.neu,
            SentimentLabel::Neg => self.neg,
        }
    }

    pub fn increment(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Pos => self.pos += 1,
            SentimentLabel::Neu => self.neu += 1,
            SentimentLabel::Neg => self.neg += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.pos + self.neu + self.neg
    }
}

/// Which pipeline stage a report belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Source,
    Classifier,
    Aggregator,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Source => f.write_str("source"),
            StageKind::Classifier => f.write_str("classifier"),
            StageKind::Aggregator => f.write_str("aggregator"),
        }
    }
}

/// How a stage finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Reached its natural end (item limit, provider exhausted, or end-of-stream)
    Drained,
    /// Ended early because a stop was requested
    Stopped,
    /// Source had no records at all
    EmptySource,
    /// The producer feeding this stage vanished without an end-of-stream
    UpstreamLost,
    /// The consumer of this stage's output vanished
    DownstreamLost,
}

/// Counters reported by a stage when it finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: StageKind,
    /// Items handed downstream (or folded into the aggregate)
    pub processed: u64,
    /// Items discarded because the downstream queue was full
    pub dropped: u64,
    /// Items rejected by the source filter
    pub skipped: u64,
    /// Items whose classification failed and fell back to neutral
    pub failures: u64,
    pub completion: Completion,
}

impl StageReport {
    pub fn new(stage: StageKind) -> Self {
        Self {
            stage,
            processed: 0,
            dropped: 0,
            skipped: 0,
            failures: 0,
            completion: Completion::Drained,
        }
    }

    pub fn finish(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }
}
