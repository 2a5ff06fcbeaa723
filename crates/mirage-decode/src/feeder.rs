use std::sync::Arc;

use mirage_types::ContentRect;
use tokio::sync::mpsc;

use crate::session::{DecodeError, DecodeSignal, DecoderSession};

/// One reassembled frame handed to the decoder, in host emission order.
///
/// Owned outright by the feeder: the reassembler copies its output into a
/// fresh buffer before yielding it here (spec §4.8 "Frame pipeline"), so
/// there is no lifetime tying this back to reassembler-internal storage.
#[derive(Debug, Clone)]
pub struct DecodeWorkItem {
    pub frame_number: u32,
    pub data: Vec<u8>,
    pub presentation_time_ns: u64,
    pub is_keyframe: bool,
    pub content_rect: ContentRect,
}

/// A decoded pixel buffer, shared between the presentation queue (holder)
/// and the renderer (borrower) per spec §3 Ownership.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub frame_number: u32,
    pub width: u32,
    pub height: u32,
    pub presentation_time_ns: u64,
    pub content_rect: ContentRect,
    pub pixels: Arc<[u8]>,
}

/// Abstract hardware decoder contract (spec §9 "Unsafe bridges" pattern).
/// The real VAAPI/VideoToolbox/software decoder lives outside this core;
/// only its create/submit/stop shape is modeled here.
pub trait HardwareDecoder: Send {
    /// Submit one frame for decode, blocking until the hardware accepts or
    /// rejects it. Never called concurrently by this crate — the feeder is
    /// single-threaded and strictly sequential (spec §4.8: out-of-order
    /// consumption would corrupt P-frame references).
    fn submit(&mut self, item: &DecodeWorkItem) -> Result<DecodedImage, crate::FaultKind>;

    fn stop(&mut self);
}

/// Outcome of feeding one [`DecodeWorkItem`] through the decoder.
#[derive(Debug)]
pub enum FeedOutcome {
    Decoded(DecodedImage),
    /// Admission was refused because the submission semaphore is full; the
    /// item is dropped rather than queued further (spec §4.6 bounded
    /// semaphore — the caller should not block the decode loop).
    Rejected(DecodeError),
    /// The hardware decoder returned a fault for this submission.
    Faulted(crate::FaultKind),
}

/// Single-threaded FIFO decode loop (spec §4.6, §4.8): consumes
/// [`DecodeWorkItem`]s in enqueue order and feeds them to `decoder`
/// sequentially, publishing signals derived from the session's error
/// accounting.
pub struct DecoderFeeder<D: HardwareDecoder> {
    decoder: D,
    session: DecoderSession,
}

impl<D: HardwareDecoder> DecoderFeeder<D> {
    #[must_use]
    pub fn new(decoder: D, session: DecoderSession) -> Self {
        Self { decoder, session }
    }

    #[must_use]
    pub fn session(&self) -> &DecoderSession {
        &self.session
    }

    #[must_use]
    pub fn session_mut(&mut self) -> &mut DecoderSession {
        &mut self.session
    }

    /// Feed exactly one item, in the order it was received. Returns both
    /// the feed outcome and any session-level signal raised while
    /// processing it.
    pub fn feed(&mut self, item: &DecodeWorkItem, now: std::time::Instant) -> (FeedOutcome, Option<DecodeSignal>) {
        if let Err(e) = self.session.admit() {
            return (FeedOutcome::Rejected(e), None);
        }

        let result = self.decoder.submit(item);
        self.session.release();

        match result {
            Ok(image) => {
                self.session.record_decode_success(now);
                (FeedOutcome::Decoded(image), None)
            }
            Err(fault) => {
                let signal = self.session.record_error(now);
                tracing::debug!(frame_number = item.frame_number, ?fault, "decode error");
                (FeedOutcome::Faulted(fault), signal)
            }
        }
    }

    pub fn stop(&mut self) {
        self.decoder.stop();
    }
}

/// Spawn the decode loop as its own task, pulling from an unbounded ordered
/// channel and forwarding decoded images and signals to the caller (spec
/// §4.8 "one consumer task reads an ordered stream ... and invokes the
/// decoder sequentially").
pub fn spawn_feeder<D: HardwareDecoder + 'static>(
    mut feeder: DecoderFeeder<D>,
    mut work_rx: mpsc::UnboundedReceiver<DecodeWorkItem>,
    image_tx: mpsc::UnboundedSender<DecodedImage>,
    signal_tx: mpsc::UnboundedSender<DecodeSignal>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = work_rx.recv().await {
            let (outcome, signal) = feeder.feed(&item, std::time::Instant::now());
            match outcome {
                FeedOutcome::Decoded(image) => {
                    if image_tx.send(image).is_err() {
                        break;
                    }
                }
                FeedOutcome::Rejected(_) | FeedOutcome::Faulted(_) => {}
            }
            if let Some(signal) = signal {
                if signal_tx.send(signal).is_err() {
                    break;
                }
            }
        }
        feeder.stop();
    })
}
