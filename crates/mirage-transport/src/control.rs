use mirage_types::{ContentRect, DimensionToken, StreamId};

/// Control-plane message shapes this core consumes/produces (spec §4.10,
/// §6). The real message router (capability negotiation, transport framing,
/// retries) is an external collaborator — these are only the payload
/// shapes core code reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Host → client: a stream has started. Seeds the client reassembler's
    /// expected dimension token if present.
    StreamStarted {
        stream_id: StreamId,
        width: u32,
        height: u32,
        frame_rate: u32,
        codec: String,
        min_size: Option<(u32, u32)>,
        dimension_token: Option<DimensionToken>,
    },
    /// Client → host: request the next frame be a keyframe.
    KeyframeRequest { stream_id: StreamId },
    /// Either direction: the stream has stopped, with an optional error
    /// reason (`None` for a clean stop).
    StreamStopped {
        stream_id: StreamId,
        reason: Option<String>,
    },
    /// Host → client: periodic health/throughput counters (spec §6).
    StreamMetrics {
        stream_id: StreamId,
        encoded_fps: f32,
        idle_encoded_fps: f32,
        dropped_frames: u64,
        active_quality: f32,
        target_frame_rate: u32,
    },
    /// Either direction: the visible content rectangle within the stream
    /// changed (e.g. window resize within a desktop capture).
    ContentBoundsUpdate {
        stream_id: StreamId,
        rect: ContentRect,
    },
    /// Client → host: request a resolution change.
    ResolutionChange {
        stream_id: StreamId,
        width: u32,
        height: u32,
    },
    /// Client → host: request a stream-scale change (spec §4.9).
    StreamScaleChange { stream_id: StreamId, scale: f32 },
    /// Client → host: request a target frame rate change.
    RefreshRateChange { stream_id: StreamId, frame_rate: u32 },
}
