//! Mock construction helpers

use crossbeam_channel::Receiver;
use sentiflow::pipeline::SentimentModel;
use sentiflow::types::{Classification, Probabilities, SentimentLabel};
use sentiflow::{Result, SentiflowError};
use std::time::Duration;

/// Model that reads the label off the first word of the text.
///
/// `pos ...`, `neg ...` and `neu ...` classify with certainty; `fail ...`
/// returns an error; anything else is neutral.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before every classification
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay) }
    }
}

impl SentimentModel for ScriptedModel {
    fn classify(&mut self, text: &str) -> Result<Classification> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let label = match text.split_whitespace().next() {
            Some("pos") => SentimentLabel::Pos,
            Some("neg") => SentimentLabel::Neg,
            Some("fail") => {
                return Err(SentiflowError::Classification("scripted failure".into()));
            }
            _ => SentimentLabel::Neu,
        };
        Ok(Classification::from_probabilities(Probabilities::certain(
            label,
        )))
    }
}

/// Model that blocks until the test releases it, one classification per
/// message on the gate channel. A dropped gate releases it for good.
pub struct GatedModel {
    gate: Receiver<()>,
    open: bool,
}

impl GatedModel {
    pub fn new(gate: Receiver<()>) -> Self {
        Self { gate, open: false }
    }
}

impl SentimentModel for GatedModel {
    fn classify(&mut self, _text: &str) -> Result<Classification> {
        if !self.open && self.gate.recv().is_err() {
            self.open = true;
        }
        Ok(Classification::neutral())
    }
}
