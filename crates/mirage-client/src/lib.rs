//! Client-side half of the stream pipeline: frame reassembly, presentation
//! queueing, the resize state machine, and the recovery taxonomy that ties
//! freeze detection, backpressure, and overload accounting into the
//! control-plane signals a host connection needs to act on.

mod config;
mod controller;
mod debounce;
mod freeze;
mod handle;
mod overload;
mod resize;

pub use config::{ClientConfig, RecoveryConfig, ResizeConfig};
pub use controller::{
    ControllerSignal, FeedPacketOutcome, StreamController, BACKPRESSURE_COOLDOWN,
    DEFAULT_BACKPRESSURE_SOFT_LIMIT, DEFAULT_FREEZE_TIMEOUT, FREEZE_RECOVERY_COOLDOWN, KEYFRAME_DEBOUNCE,
};
pub use debounce::Debounce;
pub use freeze::{FreezeMonitor, FreezeSignal};
pub use handle::{resize_target, StreamControllerHandle};
pub use overload::{OverloadAccountant, DEFAULT_SIGNAL_COOLDOWN, DEFAULT_WINDOW};
pub use resize::{clamp_and_align, resolve_target, ResizeController, ResizeEvent, ResizeState};
