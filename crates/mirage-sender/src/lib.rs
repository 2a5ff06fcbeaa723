//! Per-stream packet fragmentation, rate limiting, and generation tracking
//! for outbound datagrams (spec §4.5).

mod bucket;
mod sender;

pub use bucket::TokenBucket;
pub use sender::{Datagram, DropReason, PacketSender, PumpEvent, WorkItem};
