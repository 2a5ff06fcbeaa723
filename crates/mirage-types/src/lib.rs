//! Shared identifiers and counters for the mirage stream pipeline.
//!
//! These types cross every crate boundary in the workspace (wire codec,
//! reassembler, sender, controllers) so they live in their own crate rather
//! than pulled in transitively through the wire codec.

mod error;
mod ids;
mod metrics;

pub use error::ErrorKind;
pub use ids::{ContentRect, DimensionToken, Epoch, Generation, StreamId};
pub use metrics::StreamMetricsSnapshot;
