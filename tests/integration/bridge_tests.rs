//! Live session bridge: termination triggers and subprocess teardown.

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::stream;
use tokio_util::sync::CancellationToken;

use deckhand::launcher::{launch, LaunchSpec};
use deckhand::session::bridge::bridge;
use deckhand::session::SessionEnd;
use deckhand::{AppError, Result};

use super::test_helpers::{FailingObserver, RecordingObserver};

#[tokio::test]
async fn producer_exhaustion_closes_the_connection_normally() {
    let chunks: Vec<Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"one")),
        Ok(Bytes::from_static(b"two")),
        Ok(Bytes::from_static(b"three")),
    ];
    let mut observer = RecordingObserver::default();

    let end = bridge(
        stream::iter(chunks),
        &mut observer,
        CancellationToken::new(),
        None,
    )
    .await;

    assert_eq!(end, SessionEnd::SourceClosed);
    assert_eq!(observer.texts, vec!["one", "two", "three"]);
    assert!(observer.closed, "connection must be closed normally at EOF");
}

#[tokio::test]
async fn observer_failure_terminates_the_owned_subprocess() {
    let proc = launch(&LaunchSpec::new("sleep").args(["30"])).expect("sleep must spawn");
    let handle = proc.handle.clone();

    // An endless producer: the bridge must stop because of the observer,
    // not because the source dries up.
    let endless = stream::repeat_with(|| Ok(Bytes::from_static(b"line\n")));
    let mut observer = FailingObserver::after(2);

    let started = Instant::now();
    let end = bridge(
        endless,
        &mut observer,
        CancellationToken::new(),
        Some(handle.clone()),
    )
    .await;

    assert_eq!(end, SessionEnd::ObserverGone);
    assert_eq!(observer.texts.len(), 2, "writes before the failure are delivered");
    assert!(
        handle.has_exited().await,
        "owned subprocess must not be orphaned after observer disconnect"
    );
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "teardown must be bounded, took {:?}",
        started.elapsed()
    );
    assert!(
        !observer.closed,
        "a dead connection is not closed again"
    );
}

#[tokio::test]
async fn cancellation_terminates_the_owned_subprocess_and_closes() {
    let proc = launch(&LaunchSpec::new("sleep").args(["30"])).expect("sleep must spawn");
    let handle = proc.handle.clone();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let pending = stream::pending::<Result<Bytes>>();
    let mut observer = RecordingObserver::default();

    let end = bridge(pending, &mut observer, cancel, Some(handle.clone())).await;

    assert_eq!(end, SessionEnd::Cancelled);
    assert!(observer.texts.is_empty());
    assert!(observer.closed);
    assert!(handle.has_exited().await);
}

#[tokio::test]
async fn producer_error_sends_a_best_effort_diagnostic_then_ends() {
    let chunks: Vec<Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"partial output")),
        Err(AppError::Decode("bad frame".into())),
    ];
    let mut observer = RecordingObserver::default();

    let end = bridge(
        stream::iter(chunks),
        &mut observer,
        CancellationToken::new(),
        None,
    )
    .await;

    assert_eq!(end, SessionEnd::SourceClosed);
    assert_eq!(observer.texts.len(), 2);
    assert_eq!(observer.texts[0], "partial output");
    assert!(
        observer.texts[1].contains("decode: bad frame"),
        "diagnostic frame must carry the producer error, got: {}",
        observer.texts[1]
    );
    assert!(observer.closed);
}

#[tokio::test]
async fn chunks_are_delivered_in_production_order() {
    let chunks: Vec<Result<Bytes>> = (0..32)
        .map(|i| Ok(Bytes::from(format!("chunk-{i}"))))
        .collect();
    let mut observer = RecordingObserver::default();

    bridge(
        stream::iter(chunks),
        &mut observer,
        CancellationToken::new(),
        None,
    )
    .await;

    let expected: Vec<String> = (0..32).map(|i| format!("chunk-{i}")).collect();
    assert_eq!(observer.texts, expected);
}
