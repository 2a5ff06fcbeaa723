//! Capture pacing, frame-gap/stall watchdog, and restart backoff (spec §4.3).

mod pacer;
mod restart;
mod source;
mod watchdog;

pub use pacer::CapturePacer;
pub use restart::{RestartDecision, RestartPolicy};
pub use source::{CaptureSink, CaptureSource, CaptureSourceError, CapturedFrame};
pub use watchdog::{frame_gap_threshold, stall_threshold, Watchdog, WatchdogSignal, TICK_INTERVAL};
