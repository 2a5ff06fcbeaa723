use tokio::sync::mpsc;

use crate::control::ControlMessage;

/// A cheap, `Clone`-able handle onto the reliable control channel. Wraps an
/// `mpsc` sender so concurrent senders are serialized by the channel itself
/// (spec §5: "single-writer from the controller's point of view; concurrent
/// sends are serialized by a per-connection queue") — no explicit lock
/// needed, the channel provides the ordering guarantee.
#[derive(Clone)]
pub struct ControlChannelHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

/// Error returned when the owning receiver has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("control channel receiver has been dropped")]
pub struct ControlChannelClosed;

impl ControlChannelHandle {
    pub fn send(&self, message: ControlMessage) -> Result<(), ControlChannelClosed> {
        self.tx.send(message).map_err(|_| ControlChannelClosed)
    }
}

/// Construct a control channel: a handle for producers and a receiver for
/// the (external) message router to drain in arrival order.
#[must_use]
pub fn control_channel() -> (ControlChannelHandle, mpsc::UnboundedReceiver<ControlMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlChannelHandle { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirage_types::StreamId;

    #[tokio::test]
    async fn messages_from_concurrent_senders_are_not_interleaved_within_a_send() {
        let (handle, mut rx) = control_channel();
        let a = handle.clone();
        let b = handle.clone();

        a.send(ControlMessage::KeyframeRequest { stream_id: StreamId::from(1) }).unwrap();
        b.send(ControlMessage::KeyframeRequest { stream_id: StreamId::from(2) }).unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, ControlMessage::KeyframeRequest { stream_id } if stream_id == StreamId::from(1)));
        assert!(matches!(second, ControlMessage::KeyframeRequest { stream_id } if stream_id == StreamId::from(2)));
    }

    #[test]
    fn send_after_receiver_dropped_reports_closed() {
        let (handle, rx) = control_channel();
        drop(rx);
        let err = handle
            .send(ControlMessage::KeyframeRequest { stream_id: StreamId::from(1) })
            .unwrap_err();
        assert_eq!(err, ControlChannelClosed);
    }
}
