pub mod clock;
pub mod queue;
pub mod stats;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use queue::{Fired, TimerId, TimerQueue};
pub use stats::{LatencyRecorder, LatencyStats};
