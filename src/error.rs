// Error taxonomy for the sampling loop and its consumers

use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    /// Interface absent from the statistics source (may be hot-plugged later).
    #[error("interface {interface} not found in network statistics")]
    InterfaceNotFound { interface: String },

    #[error("failed to read {}: {source}", .path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A sample did not complete within the configured read timeout.
    #[error("counter read did not complete within {timeout:?}")]
    ReadTimeout { timeout: Duration },

    /// Temporary write or atomic replace failed; the previous record is still in place.
    #[error("failed to publish {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("published record is not a non-negative integer: {raw:?}")]
    ParseFailure { raw: String },
}

impl ActivityError {
    /// True when retrying will not help without operator intervention.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            ActivityError::ReadFailure { source, .. } | ActivityError::WriteFailure { source, .. } => {
                source.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }

    /// Short operation label used in structured log fields.
    pub fn operation(&self) -> &'static str {
        match self {
            ActivityError::InterfaceNotFound { .. }
            | ActivityError::ReadFailure { .. }
            | ActivityError::ReadTimeout { .. } => "sample",
            ActivityError::WriteFailure { .. } => "publish",
            ActivityError::ParseFailure { .. } => "parse_record",
        }
    }
}

pub type Result<T> = std::result::Result<T, ActivityError>;
