use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Used when neither `--config` nor `CONFIG_FILE` is given and the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/netactivity.toml";

/// Longest interface name the kernel accepts (IFNAMSIZ minus the NUL).
const MAX_INTERFACE_LEN: usize = 15;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitoring: MonitoringConfig,
    pub publishing: PublishingConfig,
    pub retry: RetryConfig,
    pub consumer: ConsumerConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub interface: String,
    /// Statistics source in /proc/net/dev format.
    pub proc_net_dev: PathBuf,
    pub sample_interval_ms: u64,
    /// Upper bound for one counter read; a slower read counts as a failure.
    pub read_timeout_ms: u64,
    /// How often to log loop counters at INFO level.
    pub stats_log_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".into(),
            proc_net_dev: crate::sampler::DEFAULT_PROC_NET_DEV.into(),
            sample_interval_ms: 100,
            read_timeout_ms: 50,
            stats_log_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishingConfig {
    /// Published record; should live on a memory-backed filesystem.
    pub path: PathBuf,
    /// Permission bits applied to every published record.
    pub mode: u32,
    /// Optional symlink exposing the record to a lower-privilege reader.
    pub link_path: Option<PathBuf>,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            path: crate::publisher::DEFAULT_RECORD_PATH.into(),
            mode: crate::publisher::DEFAULT_RECORD_MODE,
            link_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive sample failures before the loop starts backing off.
    pub backoff_after_failures: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Consecutive permission-denied failures that end the process.
    pub max_permission_failures: u32,
    /// Consecutive timed-out reads that end the process (the read is hung).
    pub max_stuck_reads: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_after_failures: 10,
            backoff_base_ms: 200,
            backoff_max_ms: 5000,
            max_permission_failures: 50,
            max_stuck_reads: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub poll_interval_ms: u64,
    pub threshold: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            threshold: crate::poller::DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".into(),
            port: 8090,
        }
    }
}

impl AppConfig {
    /// Resolves the config file: explicit path, then `CONFIG_FILE`, then
    /// [`DEFAULT_CONFIG_PATH`] if present, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => match std::env::var_os("CONFIG_FILE") {
                Some(p) => Some(PathBuf::from(p)),
                None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
            },
        };
        match path {
            Some(path) => {
                let s = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("config {}: {}", path.display(), e))?;
                Self::load_from_str(&s)
            }
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces the monitored interface (command-line override) and re-validates.
    pub fn with_interface(mut self, interface: Option<String>) -> anyhow::Result<Self> {
        if let Some(interface) = interface {
            self.monitoring.interface = interface;
            self.validate()?;
        }
        Ok(self)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let interface = &self.monitoring.interface;
        anyhow::ensure!(
            !interface.is_empty(),
            "monitoring.interface must be non-empty"
        );
        anyhow::ensure!(
            interface.len() <= MAX_INTERFACE_LEN,
            "monitoring.interface must be at most {} bytes, got {:?}",
            MAX_INTERFACE_LEN,
            interface
        );
        anyhow::ensure!(
            !interface
                .chars()
                .any(|c| c.is_whitespace() || c == ':' || c == '/'),
            "monitoring.interface contains invalid characters: {:?}",
            interface
        );
        anyhow::ensure!(
            !self.monitoring.proc_net_dev.as_os_str().is_empty(),
            "monitoring.proc_net_dev must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.sample_interval_ms > 0,
            "monitoring.sample_interval_ms must be > 0, got {}",
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.read_timeout_ms > 0,
            "monitoring.read_timeout_ms must be > 0, got {}",
            self.monitoring.read_timeout_ms
        );
        anyhow::ensure!(
            self.monitoring.read_timeout_ms <= self.monitoring.sample_interval_ms,
            "monitoring.read_timeout_ms ({}) must not exceed monitoring.sample_interval_ms ({})",
            self.monitoring.read_timeout_ms,
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.publishing.path.file_name().is_some(),
            "publishing.path must name a file, got {:?}",
            self.publishing.path
        );
        anyhow::ensure!(
            self.publishing.mode <= 0o777,
            "publishing.mode must be at most 0o777, got {:#o}",
            self.publishing.mode
        );
        anyhow::ensure!(
            self.publishing.mode & 0o400 != 0,
            "publishing.mode must be owner-readable, got {:#o}",
            self.publishing.mode
        );
        if let Some(link) = &self.publishing.link_path {
            anyhow::ensure!(
                link.file_name().is_some() && *link != self.publishing.path,
                "publishing.link_path must name a file other than publishing.path, got {:?}",
                link
            );
            // The link stores publishing.path verbatim and resolves it against the link's directory.
            anyhow::ensure!(
                self.publishing.path.is_absolute(),
                "publishing.path must be absolute when publishing.link_path is set, got {:?}",
                self.publishing.path
            );
        }
        anyhow::ensure!(
            self.retry.backoff_base_ms <= self.retry.backoff_max_ms,
            "retry.backoff_base_ms ({}) must not exceed retry.backoff_max_ms ({})",
            self.retry.backoff_base_ms,
            self.retry.backoff_max_ms
        );
        anyhow::ensure!(
            self.retry.max_permission_failures > 0,
            "retry.max_permission_failures must be > 0, got {}",
            self.retry.max_permission_failures
        );
        anyhow::ensure!(
            self.retry.max_stuck_reads > 0,
            "retry.max_stuck_reads must be > 0, got {}",
            self.retry.max_stuck_reads
        );
        anyhow::ensure!(
            self.consumer.poll_interval_ms > 0,
            "consumer.poll_interval_ms must be > 0, got {}",
            self.consumer.poll_interval_ms
        );
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        Ok(())
    }
}
