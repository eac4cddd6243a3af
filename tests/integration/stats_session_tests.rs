//! Container metrics sampler sessions over scripted NDJSON feeds.

use bytes::Bytes;
use futures_util::stream;
use tokio_util::sync::CancellationToken;

use deckhand::session::stats::run_stats_session;
use deckhand::session::SessionEnd;
use deckhand::Result;

use super::test_helpers::RecordingObserver;

const FIRST_SNAPSHOT: &str = r#"{"cpu_stats":{"cpu_usage":{"total_usage":100}},"precpu_stats":{"cpu_usage":{"total_usage":0}},"memory_stats":{}}"#;

const SECOND_SNAPSHOT: &str = r#"{"cpu_stats":{"cpu_usage":{"total_usage":150},"system_cpu_usage":1100,"online_cpus":4},"precpu_stats":{"cpu_usage":{"total_usage":100},"system_cpu_usage":1000},"memory_stats":{"usage":1024,"limit":4096}}"#;

fn feed_of(lines: &[&str]) -> impl futures_util::Stream<Item = Result<Bytes>> + Unpin + Send {
    let chunks: Vec<Result<Bytes>> = lines
        .iter()
        .map(|line| Ok(Bytes::from(format!("{line}\n"))))
        .collect();
    stream::iter(chunks)
}

#[tokio::test]
async fn baseline_snapshot_is_skipped_then_samples_are_emitted() {
    let mut observer = RecordingObserver::default();

    let end = run_stats_session(
        feed_of(&[FIRST_SNAPSHOT, SECOND_SNAPSHOT]),
        &mut observer,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(end, SessionEnd::SourceClosed);
    assert_eq!(
        observer.texts.len(),
        1,
        "the baseline snapshot must not produce a sample"
    );

    let sample: serde_json::Value =
        serde_json::from_str(&observer.texts[0]).expect("sample must be JSON");
    let cpu = sample["cpu_percent"].as_f64().expect("cpu_percent");
    assert!((cpu - 200.0).abs() < f64::EPSILON, "expected 200.0, got {cpu}");
    assert_eq!(sample["memory_usage"], 1024);
    assert_eq!(sample["memory_limit"], 4096);
    assert!(observer.closed);
}

#[tokio::test]
async fn snapshot_split_across_reads_is_buffered_until_complete() {
    // One snapshot delivered in three partial chunks; the line codec must
    // reassemble it before parsing.
    let raw = format!("{SECOND_SNAPSHOT}\n");
    let (a, rest) = raw.split_at(20);
    let (b, c) = rest.split_at(40);
    let chunks: Vec<Result<Bytes>> = vec![
        Ok(Bytes::from(a.to_owned())),
        Ok(Bytes::from(b.to_owned())),
        Ok(Bytes::from(c.to_owned())),
    ];

    let mut observer = RecordingObserver::default();
    let end = run_stats_session(
        stream::iter(chunks),
        &mut observer,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(end, SessionEnd::SourceClosed);
    assert_eq!(observer.texts.len(), 1);
}

#[tokio::test]
async fn malformed_snapshot_stops_the_session() {
    let mut observer = RecordingObserver::default();

    let end = run_stats_session(
        feed_of(&["this is not json"]),
        &mut observer,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(end, SessionEnd::SourceClosed);
    assert_eq!(observer.texts.len(), 1);
    assert!(
        observer.texts[0].contains("stats decode error"),
        "diagnostic must mention the decode failure, got: {}",
        observer.texts[0]
    );
    assert!(observer.closed);
}

#[tokio::test]
async fn cancellation_stops_an_idle_session() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut observer = RecordingObserver::default();
    let end = run_stats_session(
        stream::pending::<Result<Bytes>>(),
        &mut observer,
        cancel,
    )
    .await;

    assert_eq!(end, SessionEnd::Cancelled);
    assert!(observer.texts.is_empty());
    assert!(observer.closed);
}
