// Sampler: cumulative interface byte counters from /proc/net/dev

mod proc_net_dev;

pub use proc_net_dev::{MalformedRow, NetDevCounters, find_interface, parse_net_dev};

use crate::error::{ActivityError, Result};
use crate::models::CounterSample;
use std::io;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const DEFAULT_PROC_NET_DEV: &str = "/proc/net/dev";

/// Reads counters for one interface from a `/proc/net/dev`-formatted file.
/// Read-only; every call re-reads the source.
#[derive(Debug, Clone)]
pub struct NetDevSampler {
    source: PathBuf,
}

impl Default for NetDevSampler {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_NET_DEV)
    }
}

impl NetDevSampler {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Blocking read of the counters for `interface`.
    pub fn sample_blocking(&self, interface: &str) -> Result<CounterSample> {
        let content =
            std::fs::read_to_string(&self.source).map_err(|source| ActivityError::ReadFailure {
                path: self.source.clone(),
                source,
            })?;
        match find_interface(&content, interface) {
            Some(Ok(c)) => Ok(CounterSample::new(c.interface, c.rx_bytes, c.tx_bytes)),
            Some(Err(m)) => Err(ActivityError::ReadFailure {
                path: self.source.clone(),
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("row for {}: {}", m.interface, m.reason),
                ),
            }),
            None => Err(ActivityError::InterfaceNotFound {
                interface: interface.to_string(),
            }),
        }
    }

    #[instrument(skip(self), fields(operation = "sample"))]
    pub async fn sample(&self, interface: &str) -> Result<CounterSample> {
        let sampler = self.clone();
        let interface = interface.to_string();
        tokio::task::spawn_blocking(move || sampler.sample_blocking(&interface))
            .await
            .map_err(|e| ActivityError::ReadFailure {
                path: self.source.clone(),
                source: io::Error::other(format!("sampler task join: {}", e)),
            })?
    }
}
