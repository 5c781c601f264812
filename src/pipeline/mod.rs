//! Three-stage streaming sentiment pipeline.
//!
//! Records flow from a paced source through a classifier into an aggregator,
//! connected by two bounded queues. Each stage runs on its own thread.
//!
//! # Architecture
//!
//! ```text
//! [Source] ──► raw queue ──► [Classifier] ──► classified queue ──► [Aggregator]
//!    ▲                                                                  │
//! RecordProvider                                              SharedAggregate
//! ```
//!
//! # Design
//!
//! - **Drop, don't block** - producers use a non-blocking put; a full queue
//!   drops the item and counts it.
//! - **Guaranteed end-of-stream** - the marker is sent with a blocking put by
//!   consuming the sender, so it is never dropped and never sent twice.
//! - **Single writer** - only the aggregator thread mutates the aggregate;
//!   readers get consistent copies through [`SharedAggregate`].

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod executor;
pub mod provider;
pub mod queue;
pub mod source;

pub use aggregator::{ema_step, score, AggregateSnapshot, AggregatorStage, SharedAggregate};
pub use classifier::{preprocess, ClassifierStage, LexiconModel, SentimentModel};
pub use error::{PipelineError, PipelineResult};
pub use executor::{Pipeline, PipelineBuilder, PipelineReport, RunningPipeline};
pub use provider::{read_csv_records, read_records, RecordProvider, SelectionPolicy, VecProvider};
pub use queue::{bounded_queue, PutError, QueueItem, QueueReceiver, QueueSender};
pub use source::{Source, StopHandle, TextFilter};
