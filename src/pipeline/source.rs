//! Source stage: paces records from a provider into the raw queue.
//!
//! Each loop iteration pulls one record, runs the optional filter, attempts a
//! non-blocking put and then sleeps a random delay. A full queue drops the
//! record (it is counted, not retried) and the item limit only counts records
//! that were actually enqueued. The stream always ends with a blocking close,
//! so the end-of-stream marker is never dropped.

use crate::config::SourceConfig;
use crate::error::Result;
use crate::pipeline::provider::RecordProvider;
use crate::pipeline::queue::{PutError, QueueSender};
use crate::types::{Completion, RawRecord, StageKind, StageReport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep between stop-flag checks
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Consecutive filter rejections before the source backs off
const REJECTION_BURST: u32 = 100;

/// Pause taken after every `REJECTION_BURST` rejections in a row
const REJECTION_BACKOFF: Duration = Duration::from_millis(10);

/// Decides whether a record's text may enter the pipeline.
///
/// An `Err` counts as a rejection; the source never propagates it.
pub trait TextFilter {
    fn accept(&mut self, text: &str) -> Result<bool>;
}

impl<F> TextFilter for F
where
    F: FnMut(&str) -> bool,
{
    fn accept(&mut self, text: &str) -> Result<bool> {
        Ok(self(text))
    }
}

/// Requests an early, graceful end of the source's stream.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the source to stop emitting and close its queue.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The first pipeline stage.
pub struct Source {
    config: SourceConfig,
    provider: Box<dyn RecordProvider + Send>,
    filter: Option<Box<dyn TextFilter + Send>>,
    output: QueueSender<RawRecord>,
    stop: StopHandle,
    rng: StdRng,
}

impl Source {
    pub fn new(
        config: SourceConfig,
        provider: Box<dyn RecordProvider + Send>,
        output: QueueSender<RawRecord>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            provider,
            filter: None,
            output,
            stop: StopHandle::new(),
            rng,
        }
    }

    /// Only records accepted by `filter` are enqueued
    pub fn with_filter(mut self, filter: Box<dyn TextFilter + Send>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Emit up to `max_items` records, then close the raw queue.
    pub fn run(mut self) -> StageReport {
        let mut report = StageReport::new(StageKind::Source);

        if self.provider.size() == 0 {
            tracing::warn!("Record provider is empty, closing stream");
            let completion = self.close_output(Completion::EmptySource);
            return report.finish(completion);
        }

        tracing::info!(
            max_items = self.config.max_items,
            available = self.provider.size(),
            "Source started"
        );

        let mut rejected_in_row = 0u32;
        let completion = loop {
            if report.processed >= self.config.max_items {
                break Completion::Drained;
            }
            if self.stop.is_stop_requested() {
                tracing::info!("Source stop requested after {} items", report.processed);
                break Completion::Stopped;
            }

            let Some(record) = self.provider.next_record() else {
                tracing::info!("Record provider exhausted");
                break Completion::Drained;
            };

            if !self.passes_filter(&record.text) {
                report.skipped += 1;
                rejected_in_row = rejected_in_row.wrapping_add(1);
                if rejected_in_row % REJECTION_BURST == 0 {
                    tracing::trace!(rejected_in_row, "filter rejecting everything, backing off");
                    self.pause(REJECTION_BACKOFF);
                }
                continue;
            }
            rejected_in_row = 0;

            match self.output.try_put(record) {
                Ok(()) => report.processed += 1,
                Err(PutError::Full(record)) => {
                    report.dropped += 1;
                    tracing::debug!(text = %record.text, "raw queue full, dropping record");
                }
                Err(PutError::Disconnected(_)) => {
                    tracing::warn!("Classifier went away, source stopping");
                    break Completion::DownstreamLost;
                }
            }

            let delay = self.next_delay();
            self.pause(delay);
        };

        let completion = self.close_output(completion);

        if report.dropped > 0 {
            tracing::warn!(
                "Source completed, {} records dropped at the raw queue",
                report.dropped
            );
        } else {
            tracing::info!("Source completed, {} records emitted", report.processed);
        }
        report.finish(completion)
    }

    fn passes_filter(&mut self, text: &str) -> bool {
        let Some(filter) = self.filter.as_mut() else {
            return true;
        };
        match filter.accept(text) {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::debug!("Filter failed, skipping record: {}", e);
                false
            }
        }
    }

    fn next_delay(&mut self) -> Duration {
        let (min, max) = (self.config.min_delay(), self.config.max_delay());
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    /// Sleep for `delay`, waking early if a stop is requested.
    fn pause(&self, delay: Duration) {
        let start = Instant::now();
        let deadline = start.checked_add(delay).unwrap_or(start + STOP_POLL_INTERVAL);
        loop {
            if self.stop.is_stop_requested() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(STOP_POLL_INTERVAL));
        }
    }

    fn close_output(self, completion: Completion) -> Completion {
        match self.output.close() {
            Ok(()) => completion,
            Err(e) => {
                tracing::warn!("Could not deliver end-of-stream: {}", e);
                Completion::DownstreamLost
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SentiflowError;
    use crate::pipeline::provider::{MockRecordProvider, SelectionPolicy, VecProvider};
    use std::sync::atomic::AtomicUsize;
    use crate::pipeline::queue::{bounded_queue, QueueItem, QueueReceiver};

    fn drain(rx: &mut QueueReceiver<RawRecord>) -> Vec<String> {
        let mut texts = Vec::new();
        while let QueueItem::Item(record) = rx.get().unwrap() {
            texts.push(record.text);
        }
        texts
    }

    #[test]
    fn test_emits_limit_then_closes() {
        let (tx, mut rx) = bounded_queue("raw", 16).unwrap();
        let provider = VecProvider::sequential(["a", "b", "c", "d"]);
        let source = Source::new(SourceConfig::unpaced(3), Box::new(provider), tx);

        let report = source.run();
        assert_eq!(report.processed, 3);
        assert_eq!(report.completion, Completion::Drained);
        assert_eq!(drain(&mut rx), vec!["a", "b", "c"]);
        assert!(rx.is_finished());
    }

    #[test]
    fn test_empty_provider_closes_immediately() {
        let (tx, mut rx) = bounded_queue("raw", 1).unwrap();
        let mut provider = MockRecordProvider::new();
        provider.expect_size().return_const(0usize);
        provider.expect_next_record().never();

        let report = Source::new(SourceConfig::unpaced(5), Box::new(provider), tx).run();
        assert_eq!(report.completion, Completion::EmptySource);
        assert_eq!(report.processed, 0);
        assert!(rx.get().unwrap().is_end_of_stream());
    }

    #[test]
    fn test_exhausted_provider_ends_stream() {
        let (tx, mut rx) = bounded_queue("raw", 8).unwrap();
        let provider = VecProvider::sequential(["only"]);
        let report = Source::new(SourceConfig::unpaced(10), Box::new(provider), tx).run();
        assert_eq!(report.processed, 1);
        assert_eq!(report.completion, Completion::Drained);
        assert_eq!(drain(&mut rx), vec!["only"]);
    }

    #[test]
    fn test_filter_rejections_do_not_count() {
        let (tx, mut rx) = bounded_queue("raw", 8).unwrap();
        let provider = VecProvider::sequential(["keep 1", "drop", "keep 2", "drop", "keep 3"]);
        let filter = |text: &str| text.starts_with("keep");
        let report = Source::new(SourceConfig::unpaced(3), Box::new(provider), tx)
            .with_filter(Box::new(filter))
            .run();

        assert_eq!(report.processed, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(drain(&mut rx), vec!["keep 1", "keep 2", "keep 3"]);
    }

    struct FailingFilter;

    impl TextFilter for FailingFilter {
        fn accept(&mut self, text: &str) -> Result<bool> {
            if text.contains('!') {
                Err(SentiflowError::Script("boom".to_string()))
            } else {
                Ok(true)
            }
        }
    }

    #[test]
    fn test_filter_errors_are_rejections() {
        let (tx, mut rx) = bounded_queue("raw", 8).unwrap();
        let provider = VecProvider::sequential(["fine", "bad!", "also fine"]);
        let report = Source::new(SourceConfig::unpaced(5), Box::new(provider), tx)
            .with_filter(Box::new(FailingFilter))
            .run();

        assert_eq!(report.skipped, 1);
        assert_eq!(drain(&mut rx), vec!["fine", "also fine"]);
    }

    #[test]
    fn test_full_queue_drops_but_keeps_end_of_stream() {
        let (tx, mut rx) = bounded_queue("raw", 2).unwrap();
        let mut provider = MockRecordProvider::new();
        provider.expect_size().return_const(1usize);
        let mut n = 0;
        provider.expect_next_record().returning(move || {
            n += 1;
            if n <= 5 {
                Some(RawRecord::new(format!("r{}", n)))
            } else {
                None
            }
        });

        let source = Source::new(SourceConfig::unpaced(10), Box::new(provider), tx);
        let handle = thread::spawn(move || source.run());

        // Let the source fill the queue and block on close before draining.
        thread::sleep(Duration::from_millis(50));
        let texts = drain(&mut rx);
        let report = handle.join().unwrap();

        assert_eq!(texts, vec!["r1", "r2"]);
        assert_eq!(report.processed, 2);
        assert_eq!(report.dropped, 3);
        assert!(rx.is_finished());
    }

    #[test]
    fn test_request_stop_ends_stream_early() {
        let (tx, mut rx) = bounded_queue("raw", 64).unwrap();
        let provider = VecProvider::new(vec![RawRecord::new("loop")], Default::default());
        let config = SourceConfig {
            min_delay_secs: 0.01,
            max_delay_secs: 0.02,
            max_items: 10_000,
            seed: Some(1),
        };
        let source = Source::new(config, Box::new(provider), tx);
        let stop = source.stop_handle();
        let handle = thread::spawn(move || source.run());

        thread::sleep(Duration::from_millis(60));
        stop.request_stop();
        let report = handle.join().unwrap();

        assert_eq!(report.completion, Completion::Stopped);
        assert!(report.processed < 10_000);
        let texts = drain(&mut rx);
        assert_eq!(texts.len() as u64, report.processed);
    }

    #[test]
    fn test_downstream_gone() {
        let (tx, rx) = bounded_queue("raw", 4).unwrap();
        drop(rx);
        let provider = VecProvider::sequential(["a"]);
        let report = Source::new(SourceConfig::unpaced(1), Box::new(provider), tx).run();
        assert_eq!(report.completion, Completion::DownstreamLost);
        assert_eq!(report.processed, 0);
    }

    #[test]
    fn test_delay_within_bounds() {
        let (tx, _rx) = bounded_queue("raw", 1).unwrap();
        let config = SourceConfig {
            min_delay_secs: 0.1,
            max_delay_secs: 0.3,
            max_items: 1,
            seed: Some(9),
        };
        let mut source = Source::new(config, Box::new(VecProvider::sequential(["a"])), tx);
        for _ in 0..100 {
            let d = source.next_delay();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_negative_delays_do_not_panic() {
        let (tx, mut rx) = bounded_queue("raw", 8).unwrap();
        let config = SourceConfig {
            min_delay_secs: -1.0,
            max_delay_secs: -0.5,
            max_items: 3,
            seed: Some(4),
        };
        let provider = VecProvider::sequential(["a", "b", "c"]);
        let mut source = Source::new(config, Box::new(provider), tx);
        assert_eq!(source.next_delay(), Duration::ZERO);

        let report = source.run();
        assert_eq!(report.processed, 3);
        assert_eq!(drain(&mut rx), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reject_all_filter_backs_off() {
        let (tx, mut rx) = bounded_queue("raw", 8).unwrap();
        let provider = VecProvider::new(vec![RawRecord::new("never")], SelectionPolicy::Random);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let filter = move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        };

        let source = Source::new(SourceConfig::unpaced(1), Box::new(provider), tx)
            .with_filter(Box::new(filter));
        let stop = source.stop_handle();
        let handle = thread::spawn(move || source.run());

        thread::sleep(Duration::from_millis(200));
        stop.request_stop();
        let report = handle.join().unwrap();

        // 200ms at 100 rejections per 10ms backoff stays far below a spinning loop
        let calls = calls.load(Ordering::SeqCst) as u64;
        assert!(calls > 0);
        assert!(calls < 20_000, "filter ran {} times", calls);
        assert_eq!(report.skipped, calls);
        assert_eq!(report.processed, 0);
        assert_eq!(report.completion, Completion::Stopped);
        assert!(rx.get().unwrap().is_end_of_stream());
    }
}
