use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Client-side configuration, loaded from TOML (mirrors the teacher's
/// `ServerConfig` layout: one top-level struct with nested per-concern
/// structs, every field `#[serde(default)]`).
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Directory frame snapshots or logs may be written to. Not used by
    /// the stream controller itself; reserved for the demo binary.
    pub state_dir: Option<PathBuf>,

    pub recovery: RecoveryConfig,

    pub resize: ResizeConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Duration with no presentation progress before the freeze monitor
    /// fires its first keyframe-request recovery.
    pub freeze_timeout_ms: u64,

    /// Presentation queue depth above which backpressure requests a
    /// keyframe, ahead of the queue's own harder emergency-trim arm depth.
    pub backpressure_soft_limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ResizeConfig {
    /// Debounce before a settled drawable size becomes a resize request.
    pub debounce_ms: u64,

    /// Timeout after which an unconfirmed resize falls back to idle.
    pub fallback_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { state_dir: None, recovery: RecoveryConfig::default(), resize: ResizeConfig::default() }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            freeze_timeout_ms: crate::controller::DEFAULT_FREEZE_TIMEOUT.as_millis() as u64,
            backpressure_soft_limit: crate::controller::DEFAULT_BACKPRESSURE_SOFT_LIMIT,
        }
    }
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            debounce_ms: crate::resize::RESIZE_DEBOUNCE.as_millis() as u64,
            fallback_timeout_ms: crate::resize::RESIZE_FALLBACK_TIMEOUT.as_millis() as u64,
        }
    }
}

impl RecoveryConfig {
    #[must_use]
    pub fn freeze_timeout(&self) -> Duration {
        Duration::from_millis(self.freeze_timeout_ms)
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any field absent from the file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading client config {}: {e}", path.display()))?;
        toml::from_str(&text).map_err(|e| anyhow::anyhow!("parsing client config {}: {e}", path.display()))
    }

    /// Default config file location under the user's XDG config directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mirage").join("client.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_component_constants() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.recovery.freeze_timeout(), crate::controller::DEFAULT_FREEZE_TIMEOUT);
        assert_eq!(cfg.recovery.backpressure_soft_limit, crate::controller::DEFAULT_BACKPRESSURE_SOFT_LIMIT);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: ClientConfig = toml::from_str("[recovery]\nfreeze_timeout_ms = 2000\n").unwrap();
        assert_eq!(cfg.recovery.freeze_timeout_ms, 2000);
        assert_eq!(cfg.resize.debounce_ms, ResizeConfig::default().debounce_ms);
    }
}
