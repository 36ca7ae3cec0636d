// Counter samples read from the network statistics source

use std::time::Instant;

/// Point-in-time cumulative byte counters for one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSample {
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub timestamp: Instant,
}

impl CounterSample {
    pub fn new(interface: impl Into<String>, rx_bytes: u64, tx_bytes: u64) -> Self {
        Self {
            interface: interface.into(),
            rx_bytes,
            tx_bytes,
            timestamp: Instant::now(),
        }
    }
}
