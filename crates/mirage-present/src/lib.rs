//! Per-stream ordered presentation queue with emergency trim on sustained
//! backlog (spec §4.7).

mod queue;

pub use queue::{EnqueueOutcome, PresentationEntry, PresentationQueue};
