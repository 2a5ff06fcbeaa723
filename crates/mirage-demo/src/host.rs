use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mirage_capture::TICK_INTERVAL;
use mirage_host::{HostConfig, StreamContextHandle};
use mirage_sender::PumpEvent;
use mirage_transport::{
    ControlChannelHandle, ControlMessage, DataChannel, RegistrationDatagram, RegistrationGate, RegistrationToken,
};
use mirage_types::StreamId;
use tokio::sync::{mpsc, watch};

use crate::stub::{PassthroughEncoder, SyntheticCapture};

pub struct HostHandles {
    pub context: StreamContextHandle,
    pub local_addr: SocketAddr,
    pub registration_token: RegistrationToken,
}

/// Stand up the host side of one stream: a synthetic capture source feeding
/// a [`StreamContextHandle`], its watchdog/pump/control-plane tasks, and a
/// UDP data channel the client registers against before any video flows
/// (spec §4.9, §6).
pub async fn spawn_host(
    stream_id: StreamId,
    config: HostConfig,
    width: u32,
    height: u32,
    control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    to_client: ControlChannelHandle,
) -> anyhow::Result<HostHandles> {
    let now = Instant::now();
    let registration_token = RegistrationToken::random();
    let data_channel = Arc::new(DataChannel::bind("127.0.0.1:0".parse().unwrap()).await?);
    let local_addr = data_channel.local_addr()?;
    let target_frame_rate = config.capture.target_frame_rate;

    let context = StreamContextHandle::create(
        stream_id,
        &config,
        Box::new(SyntheticCapture::new(width, height, target_frame_rate)),
        Box::new(PassthroughEncoder),
        (width, height),
        b"mirage-demo shared secret",
        now,
    );

    let mut captured_rx = context.start()?;
    let (peer_tx, peer_rx) = watch::channel(None::<SocketAddr>);

    // Registration: the data channel's only inbound traffic in this
    // harness is the client's one registration datagram.
    {
        let context = context.clone();
        let data_channel = Arc::clone(&data_channel);
        tokio::spawn(async move {
            let mut gate = RegistrationGate::new(registration_token);
            let mut buf = [0u8; 64];
            loop {
                let Ok((n, from)) = data_channel.recv_from(&mut buf).await else {
                    break;
                };
                let Some(datagram) = RegistrationDatagram::decode(&buf[..n]) else {
                    continue;
                };
                if gate.observe(&datagram) {
                    tracing::info!(%from, "host observed registration");
                    context.allow_encoding_after_registration();
                    let _ = peer_tx.send(Some(from));
                    break;
                }
            }
        });
    }

    // Capture feed: every delivered frame is admitted and encoded.
    {
        let context = context.clone();
        tokio::spawn(async move {
            while let Some(frame) = captured_rx.recv().await {
                if let Err(e) = context.on_captured_frame(frame, Instant::now()) {
                    tracing::warn!(error = %e, "host encode failed");
                }
            }
        });
    }

    // Watchdog, ticked on the spec's fixed 50ms cadence (spec §4.3).
    {
        let context = context.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                if let Some(signal) = context.tick_watchdog(Instant::now()) {
                    tracing::debug!(?signal, "host watchdog signal");
                }
            }
        });
    }

    // Sender pump: drains the rate-limited queue to the registered peer
    // once its address is known.
    {
        let context = context.clone();
        let data_channel = Arc::clone(&data_channel);
        let mut peer_rx = peer_rx;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(2));
            loop {
                interval.tick().await;
                let Some(peer) = *peer_rx.borrow_and_update() else {
                    continue;
                };
                for event in context.pump_sender(Instant::now()) {
                    if let PumpEvent::Sent { datagrams, .. } = event {
                        for datagram in datagrams {
                            let bytes = datagram.to_bytes();
                            if let Err(e) = data_channel.send_to(&bytes, peer).await {
                                tracing::warn!(error = %e, "host send failed");
                            }
                        }
                    }
                }
            }
        });
    }

    // Control-plane: client -> host requests.
    {
        let context = context.clone();
        let mut control_rx = control_rx;
        tokio::spawn(async move {
            while let Some(message) = control_rx.recv().await {
                match message {
                    ControlMessage::KeyframeRequest { .. } => context.request_keyframe(),
                    ControlMessage::ResolutionChange { width, height, .. } => {
                        context.update_resolution(width, height);
                    }
                    ControlMessage::StreamScaleChange { scale, .. } => context.update_stream_scale(scale),
                    ControlMessage::RefreshRateChange { frame_rate, .. } => context.update_frame_rate(frame_rate),
                    _ => {}
                }
            }
        });
    }

    // Periodic health counters, host -> client (spec §6 `StreamMetrics`).
    {
        let context = context.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let metrics = context.metrics();
                let message = ControlMessage::StreamMetrics {
                    stream_id,
                    encoded_fps: target_frame_rate as f32,
                    idle_encoded_fps: 1.0,
                    dropped_frames: metrics.queue_drops,
                    active_quality: 1.0,
                    target_frame_rate,
                };
                if to_client.send(message).is_err() {
                    break;
                }
            }
        });
    }

    Ok(HostHandles { context, local_addr, registration_token })
}
