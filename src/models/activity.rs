// Activity value and the consumer-side signal derived from it

use serde::{Deserialize, Serialize};

/// Per-tick composite traffic delta (rx + tx bytes), published once per tick.
pub type ActivityValue = u64;

/// Binary activity signal derived by a consumer from the published record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivitySignal {
    Active,
    Inactive,
    /// Record unreadable or malformed; treated as no activity.
    NoSignal,
}

impl ActivitySignal {
    pub fn is_active(self) -> bool {
        matches!(self, ActivitySignal::Active)
    }
}

/// JSON view of the published record served over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    pub value: Option<ActivityValue>,
    pub threshold: u64,
    pub active: bool,
}
