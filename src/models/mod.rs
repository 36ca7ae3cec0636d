// Domain models

mod activity;
mod counter;

pub use activity::{ActivityReport, ActivitySignal, ActivityValue};
pub use counter::CounterSample;
