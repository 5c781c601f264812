//! End-to-end tests of the source → classifier → aggregator pipeline

mod common;

use common::builders::{labelled_texts, ConfigBuilder};
use common::mock_helpers::{GatedModel, ScriptedModel};
use common::{assert_float_eq, test_timeout, wait_until};
use sentiflow::config::PipelineConfig;
use sentiflow::pipeline::{PipelineBuilder, PipelineReport, SelectionPolicy, VecProvider};
use sentiflow::scripting::{builtins, ScriptFilter};
use sentiflow::types::{Completion, RawRecord, SentimentLabel};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;

/// Stage counters must account for every record the source enqueued
fn assert_conservation(report: &PipelineReport) {
    assert_eq!(
        report.source.processed,
        report.classifier.processed + report.classifier.dropped,
        "every enqueued raw record is either forwarded or dropped by the classifier"
    );
    assert_eq!(report.aggregator.processed, report.classifier.processed);
    assert_eq!(report.snapshot.total_processed, report.aggregator.processed);
    assert_eq!(
        report.snapshot.sentiment_counts.total(),
        report.snapshot.total_processed
    );
}

#[test]
fn test_three_records_end_to_end() {
    let config = ConfigBuilder::new(3).aggregator(0.5, 5).build();
    let report = PipelineBuilder::new(config)
        .provider(VecProvider::sequential(["pos one", "neg two", "neu three"]))
        .model(ScriptedModel::new())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_conservation(&report);
    assert_eq!(report.source.completion, Completion::Drained);
    assert_eq!(report.classifier.completion, Completion::Drained);
    assert_eq!(report.aggregator.completion, Completion::Drained);

    let snapshot = &report.snapshot;
    assert_eq!(snapshot.total_processed, 3);
    assert_eq!(snapshot.sentiment_counts.pos, 1);
    assert_eq!(snapshot.sentiment_counts.neg, 1);
    assert_eq!(snapshot.sentiment_counts.neu, 1);

    // 100, then 0.5*0 + 0.5*100 = 50, then 0.5*50 + 0.5*50 = 50
    assert_float_eq(snapshot.ema_score.unwrap(), 50.0, 1e-9);

    let scores: Vec<f64> = snapshot.recent_comments.iter().map(|e| e.score).collect();
    assert_eq!(scores, vec![100.0, 0.0, 50.0]);
    let texts: Vec<&str> = snapshot
        .recent_comments
        .iter()
        .map(|e| e.text.as_str())
        .collect();
    assert_eq!(texts, vec!["pos one", "neg two", "neu three"]);
}

#[test]
fn test_empty_provider_shuts_down_cleanly() {
    let report = PipelineBuilder::new(ConfigBuilder::new(10).build())
        .provider(VecProvider::new(Vec::new(), SelectionPolicy::Random))
        .model(ScriptedModel::new())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.source.completion, Completion::EmptySource);
    assert_eq!(report.classifier.completion, Completion::Drained);
    assert_eq!(report.aggregator.completion, Completion::Drained);
    assert_eq!(report.snapshot.total_processed, 0);
    assert_eq!(report.snapshot.ema_score, None);
    assert!(report.snapshot.recent_comments.is_empty());
}

#[test]
fn test_recent_window_keeps_latest() {
    let texts = labelled_texts(12);
    let config = ConfigBuilder::new(12).aggregator(0.1, 4).build();
    let report = PipelineBuilder::new(config)
        .provider(VecProvider::sequential(texts.clone()))
        .model(ScriptedModel::new())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_conservation(&report);
    assert_eq!(report.snapshot.total_processed, 12);
    let recent: Vec<String> = report
        .snapshot
        .recent_comments
        .iter()
        .map(|e| e.text.clone())
        .collect();
    assert_eq!(recent, texts[8..].to_vec());
}

#[test]
fn test_classification_failure_falls_back_to_neutral() {
    let report = PipelineBuilder::new(ConfigBuilder::new(2).aggregator(1.0, 5).build())
        .provider(VecProvider::sequential(["pos fine", "fail this one"]))
        .model(ScriptedModel::new())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_conservation(&report);
    assert_eq!(report.classifier.failures, 1);
    assert_eq!(report.snapshot.sentiment_counts.neu, 1);
    let last = report.snapshot.recent_comments.last().unwrap();
    assert_eq!(last.label, SentimentLabel::Neu);
    assert_eq!(last.score, 50.0);
    // alpha = 1 tracks the latest score exactly
    assert_eq!(report.snapshot.ema_score, Some(50.0));
}

#[test]
fn test_script_filter_in_source() {
    let texts = [
        "pos this is great",
        "neg",
        "neg this is awful",
        "pos ça va très bien",
        "neu just a video",
    ];
    let filter = ScriptFilter::compile(builtins::ENGLISH_HEURISTIC).unwrap();
    let report = PipelineBuilder::new(ConfigBuilder::new(10).build())
        .provider(VecProvider::sequential(texts))
        .filter(filter)
        .model(ScriptedModel::new())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_conservation(&report);
    assert_eq!(report.source.skipped, 2);
    assert_eq!(report.source.processed, 3);
    let counts = report.snapshot.sentiment_counts;
    assert_eq!((counts.pos, counts.neu, counts.neg), (1, 1, 1));
}

#[test]
#[serial]
fn test_request_stop_drains_queued_records() {
    let config = ConfigBuilder::new(100_000).delays(0.005, 0.01).seed(3).build();
    let provider = VecProvider::new(
        vec![RawRecord::new("pos tick"), RawRecord::new("neg tock")],
        SelectionPolicy::Random,
    )
    .with_seed(3);
    let running = PipelineBuilder::new(config)
        .provider(provider)
        .model(ScriptedModel::new())
        .build()
        .unwrap()
        .start()
        .unwrap();

    let aggregate = running.aggregate();
    assert!(wait_until(test_timeout(), || aggregate.total() >= 3));
    running.request_stop();
    assert!(wait_until(test_timeout(), || running.is_finished()));

    let report = running.join().unwrap();
    assert_eq!(report.source.completion, Completion::Stopped);
    assert_eq!(report.classifier.completion, Completion::Drained);
    assert_eq!(report.aggregator.completion, Completion::Drained);
    assert!(report.source.processed < 100_000);
    assert_conservation(&report);
}

#[test]
#[serial]
fn test_backpressure_drops_and_recovers() {
    let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
    let config = ConfigBuilder::new(20).queue_capacity(1).seed(11).build();
    let provider = VecProvider::new(
        vec![RawRecord::new("pos a"), RawRecord::new("neg b")],
        SelectionPolicy::Random,
    )
    .with_seed(11);
    let running = PipelineBuilder::new(config)
        .provider(provider)
        .model(GatedModel::new(gate_rx))
        .build()
        .unwrap()
        .start()
        .unwrap();

    // Classifier is stuck on its first record; the source keeps dropping.
    std::thread::sleep(Duration::from_millis(50));
    assert!(!running.is_finished());
    assert_eq!(running.aggregate().total(), 0);

    drop(gate_tx);
    let report = running.join().unwrap();

    assert_eq!(report.source.processed, 20);
    assert!(report.source.dropped > 0);
    assert_eq!(report.aggregator.completion, Completion::Drained);
    assert_conservation(&report);
}

#[test]
#[serial]
fn test_end_of_stream_survives_full_queue() {
    let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
    let config = ConfigBuilder::new(5).queue_capacity(1).build();
    let running = PipelineBuilder::new(config)
        .provider(VecProvider::sequential(["a", "b", "c", "d", "e"]))
        .model(GatedModel::new(gate_rx))
        .build()
        .unwrap()
        .start()
        .unwrap();

    std::thread::sleep(Duration::from_millis(50));
    assert!(!running.is_finished());

    // One classification at a time, then release the rest.
    gate_tx.send(()).unwrap();
    drop(gate_tx);
    let report = running.join().unwrap();

    assert_eq!(report.source.processed + report.source.dropped, 5);
    assert!(report.source.dropped > 0);
    assert_eq!(report.source.completion, Completion::Drained);
    assert_eq!(report.classifier.completion, Completion::Drained);
    assert_eq!(report.aggregator.completion, Completion::Drained);
    assert_conservation(&report);
}

#[test]
fn test_pipeline_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[source]
min_delay_secs = 0.0
max_delay_secs = 0.0
max_items = 4

[aggregator]
alpha = 0.25
recent_window = 2
"#
    )
    .unwrap();

    let config = PipelineConfig::load(file.path()).unwrap();
    let report = PipelineBuilder::new(config)
        .provider(VecProvider::sequential(labelled_texts(4)))
        .model(ScriptedModel::new())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_conservation(&report);
    assert_eq!(report.snapshot.total_processed, 4);
    assert_eq!(report.snapshot.recent_comments.len(), 2);
}

#[test]
fn test_records_file_provider() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "pos plain text line").unwrap();
    writeln!(file, r#"{{"text": "neg from json", "label": "negative"}}"#).unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"Comment": "neu dataset row", "Sentiment": "neutral"}}"#).unwrap();

    let provider = VecProvider::from_path(file.path(), SelectionPolicy::Sequential).unwrap();
    let report = PipelineBuilder::new(ConfigBuilder::new(10).build())
        .provider(provider)
        .model(ScriptedModel::new())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.source.processed, 3);
    let counts = report.snapshot.sentiment_counts;
    assert_eq!((counts.pos, counts.neu, counts.neg), (1, 1, 1));
}

#[test]
fn test_csv_dataset_provider() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "Comment,Sentiment").unwrap();
    writeln!(file, "\"pos well, that was great\",positive").unwrap();
    writeln!(file, "neg dull,negative").unwrap();
    writeln!(file, ",neutral").unwrap();

    let provider = VecProvider::from_path(file.path(), SelectionPolicy::Sequential).unwrap();
    let report = PipelineBuilder::new(ConfigBuilder::new(10).build())
        .provider(provider)
        .model(ScriptedModel::new())
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_conservation(&report);
    assert_eq!(report.source.processed, 2);
    let texts: Vec<&str> = report
        .snapshot
        .recent_comments
        .iter()
        .map(|e| e.text.as_str())
        .collect();
    assert_eq!(texts, vec!["pos well, that was great", "neg dull"]);
}
