// Delta calculator and the loop state threaded between ticks

use crate::models::{ActivityValue, CounterSample};

/// Composite byte delta between two samples of the same interface.
///
/// A counter that went backwards (interface restart, wraparound) contributes 0
/// for that direction. No previous sample, or a sample from a different
/// interface, yields 0.
pub fn activity_delta(previous: Option<&CounterSample>, current: &CounterSample) -> ActivityValue {
    match previous {
        Some(prev) if prev.interface == current.interface => {
            let rx = current.rx_bytes.saturating_sub(prev.rx_bytes);
            let tx = current.tx_bytes.saturating_sub(prev.tx_bytes);
            rx.saturating_add(tx)
        }
        _ => 0,
    }
}

/// The only state the sampling loop carries from one tick to the next.
#[derive(Debug, Clone, Default)]
pub struct SamplerState {
    previous: Option<CounterSample>,
}

impl SamplerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded with an initial sample; the next tick computes against it.
    pub fn seeded(sample: CounterSample) -> Self {
        Self {
            previous: Some(sample),
        }
    }

    pub fn previous(&self) -> Option<&CounterSample> {
        self.previous.as_ref()
    }

    /// Consumes the state and a fresh sample, returning the next state and this tick's value.
    pub fn advance(self, current: CounterSample) -> (SamplerState, ActivityValue) {
        let value = activity_delta(self.previous.as_ref(), &current);
        (
            SamplerState {
                previous: Some(current),
            },
            value,
        )
    }
}
