// Activity poller: the consumer side of the published record.
// Polls the record at its own cadence, unsynchronized with the publisher.

use crate::error::{ActivityError, Result};
use crate::models::{ActivitySignal, ActivityValue};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio::time::{Duration, interval};

pub const DEFAULT_THRESHOLD: u64 = 300;

/// Parses the record content: one base-10 non-negative integer, whitespace allowed around it.
pub fn parse_record(raw: &str) -> Result<ActivityValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ActivityError::ParseFailure {
            raw: raw.to_string(),
        });
    }
    trimmed.parse().map_err(|_| ActivityError::ParseFailure {
        raw: raw.to_string(),
    })
}

/// Strictly above the threshold counts as active.
pub fn classify(value: ActivityValue, threshold: u64) -> ActivitySignal {
    if value > threshold {
        ActivitySignal::Active
    } else {
        ActivitySignal::Inactive
    }
}

/// Reads and parses the record at `path`.
pub fn read_record(path: &Path) -> Result<ActivityValue> {
    let raw = std::fs::read_to_string(path).map_err(|source| ActivityError::ReadFailure {
        path: path.to_path_buf(),
        source,
    })?;
    parse_record(&raw)
}

/// One poll: unreadable or malformed records are `NoSignal`, never an error.
pub fn read_signal(path: &Path, threshold: u64) -> ActivitySignal {
    match read_record(path) {
        Ok(value) => classify(value, threshold),
        Err(e) => {
            tracing::trace!(error = %e, operation = e.operation(), "no signal");
            ActivitySignal::NoSignal
        }
    }
}

pub struct PollerConfig {
    pub path: PathBuf,
    pub poll_interval_ms: u64,
    pub threshold: u64,
}

/// Spawns the poll loop. The latest signal is sent on `signal_tx` whenever it changes;
/// the loop ends on shutdown or when every receiver is gone.
pub fn spawn(
    config: PollerConfig,
    signal_tx: watch::Sender<ActivitySignal>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let PollerConfig {
        path,
        poll_interval_ms,
        threshold,
    } = config;

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_millis(poll_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let signal = read_signal(&path, threshold);
                    let changed = signal_tx.send_if_modified(|current| {
                        if *current == signal {
                            false
                        } else {
                            *current = signal;
                            true
                        }
                    });
                    if changed {
                        tracing::debug!(signal = ?signal, threshold, "activity signal changed");
                    }
                    if signal_tx.is_closed() {
                        tracing::debug!("No signal receivers left; poller stopping");
                        break;
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Poller shutting down");
                    break;
                }
            }
        }
    })
}
