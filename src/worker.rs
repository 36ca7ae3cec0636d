// Sampling loop: sample -> compute -> publish, once per tick, strictly sequential.
// The only state carried between ticks is the SamplerState value.

use crate::config::RetryConfig;
use crate::delta::SamplerState;
use crate::error::ActivityError;
use crate::models::{ActivityValue, CounterSample};
use crate::publisher::Publisher;
use crate::sampler::NetDevSampler;
use std::io;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, interval, interval_at, timeout};
use tracing::Instrument;

/// Rate limit for "interface not found" (a missing hot-plug adapter would log every tick).
const NOT_FOUND_WARN_INTERVAL: Duration = Duration::from_secs(60);

pub struct WorkerDeps {
    pub sampler: NetDevSampler,
    pub publisher: Publisher,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

pub struct WorkerConfig {
    pub interface: String,
    pub sample_interval_ms: u64,
    pub read_timeout_ms: u64,
    /// How often to log loop counters (real seconds).
    pub stats_log_interval_secs: u64,
    pub retry: RetryPolicy,
}

/// Bounded retry for failing samples: exponential extra delay, capped.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff_after_failures: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub max_permission_failures: u32,
    /// Consecutive timed-out samples before the read is considered hung for good.
    pub max_stuck_reads: u32,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        Self {
            backoff_after_failures: c.backoff_after_failures,
            backoff_base_ms: c.backoff_base_ms,
            backoff_max_ms: c.backoff_max_ms,
            max_permission_failures: c.max_permission_failures,
            max_stuck_reads: c.max_stuck_reads,
        }
    }
}

impl RetryPolicy {
    /// Extra wait before the next attempt after `consecutive_failures` failed samples.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Option<Duration> {
        if consecutive_failures == 0 || consecutive_failures < self.backoff_after_failures {
            return None;
        }
        let exp = consecutive_failures - self.backoff_after_failures;
        let ms = self
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(exp))
            .min(self.backoff_max_ms);
        (ms > 0).then_some(Duration::from_millis(ms))
    }
}

/// Result of one loop iteration.
#[derive(Debug)]
pub enum TickOutcome {
    Published(ActivityValue),
    /// Sample failed; the previous sample is retained.
    SampleFailed(ActivityError),
    /// Value computed but not published; the previous record stays in place.
    PublishFailed {
        value: ActivityValue,
        error: ActivityError,
    },
}

/// Consecutive-failure counters that drive backoff and the fatal exit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FailureTracker {
    pub consecutive_sample_failures: u32,
    pub consecutive_permission_failures: u32,
    pub consecutive_read_timeouts: u32,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Published(_) => *self = Self::default(),
            TickOutcome::SampleFailed(e) => self.record_sample_failure(e),
            TickOutcome::PublishFailed { error, .. } => {
                self.consecutive_sample_failures = 0;
                self.consecutive_read_timeouts = 0;
                self.bump_permission(error);
            }
        }
    }

    /// Also used for the seed sample, which has no tick outcome of its own.
    pub fn record_sample_failure(&mut self, error: &ActivityError) {
        self.consecutive_sample_failures = self.consecutive_sample_failures.saturating_add(1);
        if matches!(error, ActivityError::ReadTimeout { .. }) {
            self.consecutive_read_timeouts = self.consecutive_read_timeouts.saturating_add(1);
        } else {
            self.consecutive_read_timeouts = 0;
        }
        self.bump_permission(error);
    }

    fn bump_permission(&mut self, error: &ActivityError) {
        if error.is_permission_denied() {
            self.consecutive_permission_failures =
                self.consecutive_permission_failures.saturating_add(1);
        } else {
            self.consecutive_permission_failures = 0;
        }
    }

    /// Err once failures have persisted past what retrying can fix.
    pub fn check_fatal(&self, policy: &RetryPolicy) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.consecutive_permission_failures < policy.max_permission_failures,
            "permission denied for {} consecutive attempts",
            self.consecutive_permission_failures
        );
        anyhow::ensure!(
            self.consecutive_read_timeouts < policy.max_stuck_reads,
            "counter read stuck for {} consecutive attempts",
            self.consecutive_read_timeouts
        );
        Ok(())
    }
}

/// Runs counter reads on the blocking pool, at most one at a time.
///
/// A read that outlives the timeout stays parked here; until it finishes,
/// further samples fail fast with `ReadTimeout` instead of starting another
/// blocking read.
#[derive(Debug, Default)]
pub struct SampleSlot {
    in_flight: Option<JoinHandle<Result<CounterSample, ActivityError>>>,
}

impl SampleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a timed-out read is still blocked.
    pub fn is_busy(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn sample(
        &mut self,
        sampler: &NetDevSampler,
        interface: &str,
        read_timeout: Duration,
    ) -> Result<CounterSample, ActivityError> {
        if self.is_busy() {
            return Err(ActivityError::ReadTimeout {
                timeout: read_timeout,
            });
        }
        // A late result from a timed-out read is stale; drop it.
        self.in_flight = None;

        let blocking = sampler.clone();
        let name = interface.to_string();
        let mut handle = tokio::task::spawn_blocking(move || blocking.sample_blocking(&name));
        match timeout(read_timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ActivityError::ReadFailure {
                path: sampler.source().to_path_buf(),
                source: io::Error::other(format!("sampler task join: {}", e)),
            }),
            Err(_) => {
                self.in_flight = Some(handle);
                Err(ActivityError::ReadTimeout {
                    timeout: read_timeout,
                })
            }
        }
    }
}

/// Takes the unconditioned first sample. On failure the caller starts from an
/// empty state, so the first successful tick publishes 0.
pub async fn seed(
    slot: &mut SampleSlot,
    sampler: &NetDevSampler,
    interface: &str,
    read_timeout: Duration,
) -> Result<SamplerState, ActivityError> {
    slot.sample(sampler, interface, read_timeout)
        .await
        .map(SamplerState::seeded)
}

/// One iteration: sample, compute, publish.
pub async fn run_tick(
    slot: &mut SampleSlot,
    sampler: &NetDevSampler,
    publisher: &Publisher,
    interface: &str,
    read_timeout: Duration,
    state: SamplerState,
) -> (SamplerState, TickOutcome) {
    let sample = match slot.sample(sampler, interface, read_timeout).await {
        Ok(s) => s,
        Err(e) => return (state, TickOutcome::SampleFailed(e)),
    };
    let (state, value) = state.advance(sample);
    match publisher.publish(value).await {
        Ok(()) => (state, TickOutcome::Published(value)),
        Err(error) => (state, TickOutcome::PublishFailed { value, error }),
    }
}

/// Spawns the sampling loop. Returns an error only when permission failures
/// or a hung read persist past the retry policy; shutdown returns Ok between ticks.
pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> JoinHandle<anyhow::Result<()>> {
    let WorkerDeps {
        sampler,
        publisher,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        interface,
        sample_interval_ms,
        read_timeout_ms,
        stats_log_interval_secs,
        retry,
    } = config;

    let period = Duration::from_millis(sample_interval_ms);
    let read_timeout = Duration::from_millis(read_timeout_ms);
    let stats_log_interval = Duration::from_secs(stats_log_interval_secs);

    let worker_span = tracing::span!(
        tracing::Level::DEBUG,
        "worker",
        interface = %interface,
        sample_interval_ms
    );

    let task = async move {
        let mut slot = SampleSlot::new();
        let mut failures = FailureTracker::new();

        let mut state = match seed(&mut slot, &sampler, &interface, read_timeout).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, operation = "seed", "initial sample failed");
                failures.record_sample_failure(&e);
                SamplerState::new()
            }
        };

        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut published_total: u64 = 0;
        let mut sample_failures_total: u64 = 0;
        let mut publish_failures_total: u64 = 0;
        let mut last_value: Option<ActivityValue> = None;
        let mut last_not_found_warn: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let (next, outcome) = run_tick(
                        &mut slot,
                        &sampler,
                        &publisher,
                        &interface,
                        read_timeout,
                        state,
                    )
                    .await;
                    state = next;

                    let failed_before = failures.consecutive_sample_failures;
                    failures.record(&outcome);

                    match outcome {
                        TickOutcome::Published(value) => {
                            published_total += 1;
                            last_value = Some(value);
                            if failed_before > 0 {
                                tracing::info!(failures = failed_before, "sampling recovered");
                            }
                            last_not_found_warn = None;
                            tracing::trace!(value, "record published");
                        }
                        TickOutcome::SampleFailed(e) => {
                            sample_failures_total += 1;
                            if matches!(e, ActivityError::InterfaceNotFound { .. }) {
                                let should_warn = last_not_found_warn
                                    .is_none_or(|t| t.elapsed() >= NOT_FOUND_WARN_INTERVAL);
                                if should_warn {
                                    tracing::warn!(
                                        error = %e,
                                        operation = e.operation(),
                                        "interface not present; will keep retrying"
                                    );
                                    last_not_found_warn = Some(Instant::now());
                                } else {
                                    tracing::debug!(
                                        error = %e,
                                        operation = e.operation(),
                                        "interface still not present"
                                    );
                                }
                            } else {
                                tracing::warn!(
                                    error = %e,
                                    operation = e.operation(),
                                    consecutive = failures.consecutive_sample_failures,
                                    "sample failed; skipping tick"
                                );
                            }
                        }
                        TickOutcome::PublishFailed { value, error } => {
                            publish_failures_total += 1;
                            tracing::warn!(
                                error = %error,
                                operation = error.operation(),
                                value,
                                "publish failed; previous record kept"
                            );
                        }
                    }

                    if let Err(e) = failures.check_fatal(&retry) {
                        tracing::error!(
                            error = %e,
                            record = %publisher.target().display(),
                            source = %sampler.source().display(),
                            "giving up"
                        );
                        return Err(e.context(format!(
                            "source {}, record {}",
                            sampler.source().display(),
                            publisher.target().display()
                        )));
                    }

                    if let Some(delay) = retry.backoff_delay(failures.consecutive_sample_failures) {
                        tracing::debug!(delay_ms = delay.as_millis() as u64, "backing off");
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = &mut shutdown_rx => {
                                tracing::debug!("Worker shutting down");
                                break;
                            }
                        }
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        published_total,
                        sample_failures_total,
                        publish_failures_total,
                        last_value = ?last_value,
                        "loop stats"
                    );
                }
            }
        }
        Ok(())
    }
    .instrument(worker_span);

    tokio::spawn(task)
}
