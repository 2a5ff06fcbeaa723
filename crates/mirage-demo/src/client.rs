use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mirage_client::{resize_target, ControllerSignal, StreamControllerHandle};
use mirage_decode::{spawn_feeder, DecoderFeeder, DecoderSession};
use mirage_transport::{ControlChannelHandle, ControlMessage, DataChannel, RegistrationDatagram, RegistrationToken};
use mirage_types::StreamId;
use mirage_wire::{FrameHeader, HEADER_LEN};
use tokio::sync::mpsc;

use crate::stub::PassthroughDecoder;

pub struct ClientHandles {
    pub controller: StreamControllerHandle,
    pub presented_frames: Arc<AtomicU64>,
}

/// Stand up the client side of one stream: registration against the host,
/// the reassembly/presentation controller, and its decoder feeder task
/// (spec §4.6, §4.7, §4.8).
pub async fn spawn_client(
    stream_id: StreamId,
    width: u32,
    height: u32,
    target_frame_rate: u32,
    host_addr: SocketAddr,
    registration_token: RegistrationToken,
    to_host: ControlChannelHandle,
    mut from_host: mpsc::UnboundedReceiver<ControlMessage>,
) -> anyhow::Result<ClientHandles> {
    let now = Instant::now();
    let data_channel = Arc::new(DataChannel::bind("127.0.0.1:0".parse().unwrap()).await?);

    let registration = RegistrationDatagram { stream_id, token: registration_token };
    data_channel.send_to(&registration.encode(), host_addr).await?;
    tracing::info!(%host_addr, "client sent registration");

    let controller = StreamControllerHandle::new(now);
    let presented_frames = Arc::new(AtomicU64::new(0));

    let (work_tx, work_rx) = mpsc::unbounded_channel();
    let (image_tx, mut image_rx) = mpsc::unbounded_channel();
    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();

    let feeder = DecoderFeeder::new(PassthroughDecoder::new(width, height), DecoderSession::new(target_frame_rate));
    spawn_feeder(feeder, work_rx, image_tx, signal_tx);

    // Inbound datagrams: header parse, checksum validate, reassemble.
    {
        let controller = controller.clone();
        let data_channel = Arc::clone(&data_channel);
        let work_tx = work_tx.clone();
        let to_host = to_host.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let Ok((n, _from)) = data_channel.recv_from(&mut buf).await else {
                    break;
                };
                let Ok(header) = FrameHeader::decode(&buf[..n]) else {
                    continue;
                };
                let payload = &buf[HEADER_LEN..n];
                if !mirage_wire::validate(payload, header.checksum) {
                    continue;
                }

                let outcome = controller.feed_packet(&header, payload, Instant::now());
                if let Some(item) = outcome.decode_item {
                    let _ = work_tx.send(item);
                }
                dispatch_signals(&controller, &to_host, stream_id, outcome.signals, Instant::now());
            }
        });
    }

    // Decoded images: presentation enqueue plus recovery signals.
    {
        let controller = controller.clone();
        let to_host = to_host.clone();
        tokio::spawn(async move {
            while let Some(image) = image_rx.recv().await {
                let signals = controller.on_decoded(image, Instant::now());
                dispatch_signals(&controller, &to_host, stream_id, signals, Instant::now());
            }
        });
    }

    // Decoder session signals (error threshold, input blocked).
    {
        let controller = controller.clone();
        let to_host = to_host.clone();
        tokio::spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                let signals = controller.on_decode_signal(signal, Instant::now());
                dispatch_signals(&controller, &to_host, stream_id, signals, Instant::now());
            }
        });
    }

    // Periodic tick: reassembler GC, resize debounce, freeze monitor.
    {
        let controller = controller.clone();
        let to_host = to_host.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(50));
            loop {
                interval.tick().await;
                let signals = controller.tick(Instant::now());
                dispatch_signals(&controller, &to_host, stream_id, signals, Instant::now());
            }
        });
    }

    // Presentation dequeue loop, standing in for the renderer.
    {
        let controller = controller.clone();
        let presented_frames = Arc::clone(&presented_frames);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(8));
            loop {
                interval.tick().await;
                while let Some(entry) = controller.dequeue() {
                    presented_frames.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(sequence = entry.sequence, frame_number = entry.image.frame_number, "presented");
                }
            }
        });
    }

    // Host -> client control messages (keyframe acks, metrics, stream-started).
    tokio::spawn(async move {
        while let Some(message) = from_host.recv().await {
            if let ControlMessage::StreamMetrics { dropped_frames, encoded_fps, .. } = message {
                tracing::info!(encoded_fps, dropped_frames, "host stream metrics");
            }
        }
    });

    Ok(ClientHandles { controller, presented_frames })
}

fn dispatch_signals(
    controller: &StreamControllerHandle,
    to_host: &ControlChannelHandle,
    stream_id: StreamId,
    signals: Vec<ControllerSignal>,
    now: Instant,
) {
    for signal in &signals {
        match signal {
            ControllerSignal::KeyframeRequest => {
                let _ = to_host.send(ControlMessage::KeyframeRequest { stream_id });
            }
            ControllerSignal::FullReset => controller.apply_full_reset(now),
            ControllerSignal::AdaptiveFallback => {
                tracing::warn!("client: adaptive fallback requested (bitrate step-down is host policy)");
            }
            ControllerSignal::Resize(_) => {}
        }
    }
    if let Some(event) = resize_target(&signals) {
        let _ = to_host.send(ControlMessage::ResolutionChange {
            stream_id,
            width: event.width,
            height: event.height,
        });
    }
}
