//! Classifier stage: turns raw records into classified records.
//!
//! The sentiment model is an external collaborator behind [`SentimentModel`].
//! A model failure (or an output that is not a probability distribution) is
//! recovered per item with a neutral classification; one bad record never
//! stops the stream. Classified records are offered to the next queue without
//! blocking and dropped when it is full; only the end-of-stream relay blocks.

use crate::config::ClassifierConfig;
use crate::error::{Result, SentiflowError};
use crate::pipeline::error::PipelineError;
use crate::pipeline::queue::{PutError, QueueItem, QueueReceiver, QueueSender};
use crate::types::{
    Classification, ClassifiedRecord, Completion, Probabilities, RawRecord, StageKind,
    StageReport,
};
use std::collections::HashSet;

/// Sentiment model invoked by the classifier stage.
///
/// Only ever called from the classifier thread.
#[cfg_attr(test, mockall::automock)]
pub trait SentimentModel {
    fn classify(&mut self, text: &str) -> Result<Classification>;
}

/// Normalise text before it reaches the model.
///
/// URLs become `url`, `@handles` become `@user` and whitespace runs collapse
/// to a single space.
pub fn preprocess(text: &str) -> String {
    text.split_whitespace()
        .map(|token| {
            let lower = token.to_ascii_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.") {
                "url"
            } else if token.len() > 1 && token.starts_with('@') {
                "@user"
            } else {
                token
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "awesome", "beautiful", "best", "brilliant", "cool", "enjoy", "enjoyed",
    "excellent", "fantastic", "fun", "glad", "good", "great", "happy", "helpful", "incredible",
    "like", "love", "loved", "nice", "perfect", "thanks", "useful", "wonderful", "wow",
];

const NEGATIVE_WORDS: &[&str] = &[
    "annoying", "awful", "bad", "boring", "broken", "disappointed", "disappointing", "dislike",
    "hate", "hated", "horrible", "poor", "sad", "scam", "stupid", "terrible", "trash", "ugly",
    "useless", "waste", "worse", "worst", "wrong",
];

const NEGATORS: &[&str] = &["not", "no", "never", "dont", "don't", "isnt", "isn't", "wasnt", "wasn't"];

/// Keyword-counting stand-in for a real sentiment model.
///
/// Counts positive and negative words (a preceding negator flips the next
/// hit) and turns the counts into a softmax distribution over POS/NEU/NEG.
#[derive(Debug, Clone)]
pub struct LexiconModel {
    positive: HashSet<String>,
    negative: HashSet<String>,
}

impl Default for LexiconModel {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl LexiconModel {
    pub fn new(config: &ClassifierConfig) -> Self {
        let collect = |builtin: &[&str], extra: &[String]| -> HashSet<String> {
            builtin
                .iter()
                .map(|w| w.to_string())
                .chain(extra.iter().map(|w| w.to_lowercase()))
                .collect()
        };
        Self {
            positive: collect(POSITIVE_WORDS, &config.positive_words),
            negative: collect(NEGATIVE_WORDS, &config.negative_words),
        }
    }

    /// (positive hits, negative hits)
    fn count_hits(&self, text: &str) -> (u32, u32) {
        let mut pos = 0;
        let mut neg = 0;
        let mut negate = false;

        for word in text
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if NEGATORS.contains(&word.as_str()) {
                negate = true;
                continue;
            }
            let hit = if self.positive.contains(&word) {
                Some(true)
            } else if self.negative.contains(&word) {
                Some(false)
            } else {
                None
            };
            if let Some(positive) = hit {
                if positive != negate {
                    pos += 1;
                } else {
                    neg += 1;
                }
                negate = false;
            }
        }
        (pos, neg)
    }
}

impl SentimentModel for LexiconModel {
    fn classify(&mut self, text: &str) -> Result<Classification> {
        if text.trim().is_empty() {
            return Err(SentiflowError::Classification("empty text".to_string()));
        }

        let (pos, neg) = self.count_hits(text);
        let neutral_bias = if pos == 0 && neg == 0 { 1.5 } else { 0.5 };
        let logits = [pos as f64, neutral_bias, neg as f64];
        let max = logits.iter().cloned().fold(f64::MIN, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();

        let probabilities = Probabilities::new(exps[0] / sum, exps[1] / sum, exps[2] / sum);
        Ok(Classification::from_probabilities(probabilities))
    }
}

/// The middle pipeline stage.
pub struct ClassifierStage {
    model: Box<dyn SentimentModel + Send>,
    input: QueueReceiver<RawRecord>,
    output: QueueSender<ClassifiedRecord>,
}

impl ClassifierStage {
    pub fn new(
        model: Box<dyn SentimentModel + Send>,
        input: QueueReceiver<RawRecord>,
        output: QueueSender<ClassifiedRecord>,
    ) -> Self {
        Self {
            model,
            input,
            output,
        }
    }

    /// Classify until end-of-stream, then relay it downstream once.
    pub fn run(self) -> StageReport {
        let Self {
            mut model,
            mut input,
            output,
        } = self;
        let mut report = StageReport::new(StageKind::Classifier);
        tracing::info!("Classifier started");

        let completion = loop {
            let raw = match input.get() {
                Ok(QueueItem::Item(raw)) => raw,
                Ok(QueueItem::EndOfStream) => break Completion::Drained,
                Err(PipelineError::QueueDisconnected(queue)) => {
                    tracing::error!(queue, "raw queue lost its producer without end-of-stream");
                    break Completion::UpstreamLost;
                }
                Err(e) => {
                    tracing::error!("Classifier stopped on queue error: {}", e);
                    break Completion::UpstreamLost;
                }
            };

            let classification = classify_or_neutral(model.as_mut(), &raw.text, &mut report);
            let record = ClassifiedRecord::from_raw(raw, classification);

            match output.try_put(record) {
                Ok(()) => report.processed += 1,
                Err(PutError::Full(record)) => {
                    report.dropped += 1;
                    tracing::debug!(text = %record.text, "classified queue full, dropping record");
                }
                Err(PutError::Disconnected(_)) => {
                    tracing::warn!("Aggregator went away, classifier stopping");
                    break Completion::DownstreamLost;
                }
            }
        };

        let completion = match output.close() {
            Ok(()) => completion,
            Err(e) => {
                tracing::warn!("Could not relay end-of-stream: {}", e);
                Completion::DownstreamLost
            }
        };

        if report.failures > 0 {
            tracing::warn!(
                "{} records fell back to a neutral classification",
                report.failures
            );
        }
        tracing::info!(
            processed = report.processed,
            dropped = report.dropped,
            "Classification completed"
        );
        report.finish(completion)
    }
}

fn classify_or_neutral(
    model: &mut (dyn SentimentModel + Send),
    text: &str,
    report: &mut StageReport,
) -> Classification {
    match model.classify(&preprocess(text)) {
        Ok(c) if c.probabilities.is_valid() => c,
        Ok(c) => {
            report.failures += 1;
            tracing::warn!(probabilities = ?c.probabilities, "model returned an invalid distribution, using neutral");
            Classification::neutral()
        }
        Err(e) => {
            report.failures += 1;
            tracing::warn!("Classification failed, using neutral: {}", e);
            Classification::neutral()
        }
    }
}
