//! # Sentiflow: Streaming Sentiment Pipeline
//!
//! A small concurrent pipeline that samples short text records, classifies
//! their sentiment and keeps a live, smoothed sentiment score.
//!
//! ## Architecture
//!
//! - **Source**: Paces records from a provider into a bounded queue, with an
//!   optional admission filter
//! - **Classifier**: Turns each record into a label plus POS/NEU/NEG probabilities
//! - **Aggregator**: Folds scores into an exponential moving average, label
//!   counts and a window of recent records, readable from any thread
//! - **Communication**: Bounded crossbeam channels with drop-on-full backpressure
//!   and an end-of-stream marker for shutdown
//! - **Scripting**: Rhai expressions usable as source filters
//!
//! ## Configuration
//!
//! Settings are read from `pipeline.toml` in the platform config directory
//! under `sentiflow` (for example `~/.config/sentiflow/pipeline.toml` on Linux).
//!
//! ## Example
//!
//! ```no_run
//! use sentiflow::{config::PipelineConfig, pipeline::{PipelineBuilder, VecProvider}};
//!
//! fn main() -> sentiflow::Result<()> {
//!     let provider = VecProvider::sequential(["great video", "this is awful"]);
//!     let running = PipelineBuilder::new(PipelineConfig::load_or_default())
//!         .provider(provider)
//!         .build()?
//!         .start()?;
//!
//!     let aggregate = running.aggregate();
//!     let report = running.join()?;
//!     println!("ema = {:?}, processed = {}", aggregate.ema(), report.snapshot.total_processed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod scripting;
pub mod types;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{Result, SentiflowError};
pub use pipeline::{PipelineBuilder, PipelineReport, SharedAggregate};
pub use scripting::ScriptFilter;
pub use types::{Classification, ClassifiedRecord, Probabilities, RawRecord, SentimentLabel};
