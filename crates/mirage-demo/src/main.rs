use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mirage_host::HostConfig;
use mirage_transport::control_channel;
use mirage_types::StreamId;
use tokio::sync::mpsc;

mod client;
mod host;
mod stub;

/// Loopback smoke test for the mirage stream pipeline: a host stream
/// context emitting a synthetic capture feed, talking UDP to a client
/// stream controller, both in one process.
#[derive(Parser, Debug)]
#[command(name = "mirage-demo", version, about)]
struct Cli {
    /// Output width in pixels.
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Target capture/encode frame rate.
    #[arg(long, default_value_t = 60)]
    frame_rate: u32,

    /// Target bitrate in kbps.
    #[arg(long, default_value_t = 10_000)]
    bitrate_kbps: u32,

    /// How long to run the demo before reporting and exiting.
    #[arg(long, default_value_t = 5)]
    duration_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let stream_id = StreamId::from(1);

    let mut host_config = HostConfig::default();
    host_config.capture.target_frame_rate = cli.frame_rate;
    host_config.encode.bitrate_kbps = cli.bitrate_kbps;

    let (client_to_host_tx, client_to_host_rx) = mpsc::unbounded_channel();
    let (host_to_client_tx, host_to_client_rx) = mpsc::unbounded_channel();
    let (to_host_handle, mut to_host_internal_rx) = control_channel();
    let (to_client_handle, mut to_client_internal_rx) = control_channel();

    // Bridge the reliable control channel's mpsc receivers into the plain
    // unbounded channels the host/client tasks consume, so both sides talk
    // through the same `ControlChannelHandle` the real transport exposes.
    tokio::spawn(async move {
        while let Some(message) = to_host_internal_rx.recv().await {
            if client_to_host_tx.send(message).is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        while let Some(message) = to_client_internal_rx.recv().await {
            if host_to_client_tx.send(message).is_err() {
                break;
            }
        }
    });

    tracing::info!(width = cli.width, height = cli.height, frame_rate = cli.frame_rate, "starting host stream context");
    let host_handles = host::spawn_host(
        stream_id,
        host_config,
        cli.width,
        cli.height,
        client_to_host_rx,
        to_client_handle,
    )
    .await
    .context("starting host")?;

    tracing::info!(host_addr = %host_handles.local_addr, "starting client stream controller");
    let client_handles = client::spawn_client(
        stream_id,
        cli.width,
        cli.height,
        cli.frame_rate,
        host_handles.local_addr,
        host_handles.registration_token,
        to_host_handle,
        host_to_client_rx,
    )
    .await
    .context("starting client")?;

    tokio::time::sleep(Duration::from_secs(cli.duration_secs)).await;

    let presented = client_handles.presented_frames.load(Ordering::Relaxed);
    let metrics = host_handles.context.metrics();
    tracing::info!(
        presented,
        queue_drops = metrics.queue_drops,
        capture_stalls = metrics.capture_stalls,
        "demo finished"
    );

    host_handles.context.stop();

    Ok(())
}
