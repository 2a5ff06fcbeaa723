//! Host-side half of the stream pipeline: the capture pacer, watchdog,
//! restart policy, encoder session, and packet sender composed into one
//! [`StreamContext`] per active stream (spec §4.9).

mod config;
mod context;
mod handle;
mod scale;

pub use config::{CaptureConfig, ColorSpaceConfig, EncodeConfig, HostConfig, PixelFormatConfig, SenderConfig};
pub use context::{watchdog_thresholds, HostError, HostSignal, StreamContext};
pub use handle::StreamContextHandle;
pub use scale::{resolve_stream_scale, MAX_ENCODED_HEIGHT, MAX_ENCODED_WIDTH};
