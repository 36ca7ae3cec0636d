// Consumer tests: parsing, threshold, tolerance of bad records, poll loop

use netactivity::error::ActivityError;
use netactivity::models::ActivitySignal;
use netactivity::poller::{self, PollerConfig, classify, parse_record, read_signal};
use netactivity::publisher::{DEFAULT_RECORD_MODE, Publisher};
use tempfile::TempDir;
use tokio::sync::{oneshot, watch};
use tokio::time::{Duration, timeout};

#[test]
fn test_parse_record_accepts_integer_with_newline() {
    assert_eq!(parse_record("420\n").unwrap(), 420);
    assert_eq!(parse_record("  0 ").unwrap(), 0);
}

#[test]
fn test_parse_record_rejects_malformed() {
    for raw in ["", "\n", "-5", "+5", "4 2", "abc", "42abc", "1.5", "99999999999999999999999"] {
        let err = parse_record(raw).unwrap_err();
        assert!(
            matches!(err, ActivityError::ParseFailure { .. }),
            "{raw:?} should not parse"
        );
    }
}

#[test]
fn test_classify_threshold_is_strict() {
    assert_eq!(classify(420, 300), ActivitySignal::Active);
    assert_eq!(classify(15, 300), ActivitySignal::Inactive);
    assert_eq!(classify(300, 300), ActivitySignal::Inactive);
    assert_eq!(classify(301, 300), ActivitySignal::Active);
}

#[test]
fn test_read_signal_treats_missing_and_malformed_as_no_signal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("net_activity");
    assert_eq!(read_signal(&path, 300), ActivitySignal::NoSignal);
    std::fs::write(&path, "garbage").unwrap();
    assert_eq!(read_signal(&path, 300), ActivitySignal::NoSignal);
    std::fs::write(&path, "").unwrap();
    assert_eq!(read_signal(&path, 300), ActivitySignal::NoSignal);
}

#[test]
fn test_read_signal_repeated_reads_are_stable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("net_activity");
    Publisher::new(&path, DEFAULT_RECORD_MODE)
        .publish_blocking(420)
        .unwrap();
    for _ in 0..5 {
        assert_eq!(read_signal(&path, 300), ActivitySignal::Active);
    }
}

async fn wait_for(rx: &mut watch::Receiver<ActivitySignal>, want: ActivitySignal) {
    timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want))
        .await
        .expect("signal in time")
        .expect("poller alive");
}

#[tokio::test]
async fn test_poll_loop_follows_published_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("net_activity");
    let publisher = Publisher::new(&path, DEFAULT_RECORD_MODE);

    let (signal_tx, mut signal_rx) = watch::channel(ActivitySignal::NoSignal);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = poller::spawn(
        PollerConfig {
            path: path.clone(),
            poll_interval_ms: 10,
            threshold: 300,
        },
        signal_tx,
        shutdown_rx,
    );

    publisher.publish_blocking(420).unwrap();
    wait_for(&mut signal_rx, ActivitySignal::Active).await;

    publisher.publish_blocking(15).unwrap();
    wait_for(&mut signal_rx, ActivitySignal::Inactive).await;

    // A corrupted record is ignored, not fatal.
    std::fs::write(&path, "not a number").unwrap();
    wait_for(&mut signal_rx, ActivitySignal::NoSignal).await;

    publisher.publish_blocking(1000).unwrap();
    wait_for(&mut signal_rx, ActivitySignal::Active).await;

    shutdown_tx.send(()).unwrap();
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("poller stops")
        .unwrap();
}

#[tokio::test]
async fn test_poll_loop_stops_when_receivers_drop() {
    let dir = TempDir::new().unwrap();
    let (signal_tx, signal_rx) = watch::channel(ActivitySignal::NoSignal);
    let (_shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = poller::spawn(
        PollerConfig {
            path: dir.path().join("net_activity"),
            poll_interval_ms: 10,
            threshold: 300,
        },
        signal_tx,
        shutdown_rx,
    );
    drop(signal_rx);
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("poller stops")
        .unwrap();
}
