use std::path::PathBuf;

use mirage_encode::{ColorSpace, PixelFormat};
use serde::Deserialize;

/// Host-side configuration, loaded from TOML (mirrors the teacher's
/// `ServerConfig`: one top-level struct with nested per-concern structs,
/// every field `#[serde(default)]`).
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub state_dir: Option<PathBuf>,
    pub capture: CaptureConfig,
    pub encode: EncodeConfig,
    pub sender: SenderConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Target frames per second (spec §6: one of 24/30/60/120).
    pub target_frame_rate: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub bitrate_kbps: u32,
    pub key_frame_interval: u32,
    pub pixel_format: PixelFormatConfig,
    pub color_space: ColorSpaceConfig,
    /// Requested stream scale in `[0.1, 1.0]` (spec §4.9).
    pub stream_scale: f32,
    /// Skip the 5120x2880 output cap (spec §4.9 "uncapped override").
    pub uncapped_scale: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormatConfig {
    Bgra,
    Rgba,
    Nv12,
    I420,
}

impl From<PixelFormatConfig> for PixelFormat {
    fn from(v: PixelFormatConfig) -> Self {
        match v {
            PixelFormatConfig::Bgra => PixelFormat::Bgra,
            PixelFormatConfig::Rgba => PixelFormat::Rgba,
            PixelFormatConfig::Nv12 => PixelFormat::Nv12,
            PixelFormatConfig::I420 => PixelFormat::I420,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpaceConfig {
    Bt601,
    Bt709,
}

impl From<ColorSpaceConfig> for ColorSpace {
    fn from(v: ColorSpaceConfig) -> Self {
        match v {
            ColorSpaceConfig::Bt601 => ColorSpace::Bt601,
            ColorSpaceConfig::Bt709 => ColorSpace::Bt709,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub max_packet_size: usize,
    /// Burst capacity in bytes the token bucket allows beyond its steady
    /// refill rate (spec §4.5: "bursts up to one frame are allowed").
    pub burst_capacity_bytes: f64,
    /// Encrypt media payloads per-session (spec §4.11). Disabled by
    /// default so the demo binary's loopback smoke test can inspect raw
    /// bytes; production deployments should enable it.
    pub media_encryption_enabled: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            capture: CaptureConfig::default(),
            encode: EncodeConfig::default(),
            sender: SenderConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { target_frame_rate: 60 }
    }
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            bitrate_kbps: 10_000,
            key_frame_interval: 120,
            pixel_format: PixelFormatConfig::Nv12,
            color_space: ColorSpaceConfig::Bt709,
            stream_scale: 1.0,
            uncapped_scale: false,
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_packet_size: mirage_wire::DEFAULT_MAX_PACKET_SIZE,
            burst_capacity_bytes: 1_500_000.0,
            media_encryption_enabled: false,
        }
    }
}

impl HostConfig {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading host config {}: {e}", path.display()))?;
        toml::from_str(&text).map_err(|e| anyhow::anyhow!("parsing host config {}: {e}", path.display()))
    }

    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mirage").join("host.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_pixel_format_conversion() {
        let cfg = HostConfig::default();
        assert_eq!(PixelFormat::from(cfg.encode.pixel_format), PixelFormat::Nv12);
        assert_eq!(ColorSpace::from(cfg.encode.color_space), ColorSpace::Bt709);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: HostConfig = toml::from_str("[encode]\nbitrate_kbps = 20000\n").unwrap();
        assert_eq!(cfg.encode.bitrate_kbps, 20_000);
        assert_eq!(cfg.encode.stream_scale, EncodeConfig::default().stream_scale);
        assert_eq!(cfg.sender.max_packet_size, SenderConfig::default().max_packet_size);
    }
}
