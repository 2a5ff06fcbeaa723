/// Pixel format the encoder consumes. Changing this always requires full
/// teardown (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra,
    Rgba,
    Nv12,
    I420,
}

/// Colorimetry the encoder tags output with. Changing this always requires
/// full teardown (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Bt601,
    Bt709,
}

/// Desired encoder configuration (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub bitrate_kbps: u32,
    pub pixel_format: PixelFormat,
    pub color_space: ColorSpace,
    pub key_frame_interval: u32,
}

/// How a configuration change should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClassification {
    /// No field differs.
    NoOp,
    /// Only rate-like fields (bitrate, frame rate) differ; reconfigure
    /// in-place without interrupting the session.
    CheapInPlaceUpdate,
    /// Dimensions, pixel format, or color space differ; tear down and
    /// recreate the hardware session.
    FullTeardown,
}

impl ChangeClassification {
    /// Classify the transition from `old` to `new` (spec §4.4).
    #[must_use]
    pub fn classify(old: &EncoderConfig, new: &EncoderConfig) -> Self {
        if old == new {
            return Self::NoOp;
        }
        if old.width != new.width
            || old.height != new.height
            || old.pixel_format != new.pixel_format
            || old.color_space != new.color_space
        {
            return Self::FullTeardown;
        }
        Self::CheapInPlaceUpdate
    }
}

/// Bound on outstanding (submitted but not yet returned) frames, scaled to
/// target rate (spec §4.4: "typically 1-3 depending on target rate").
#[must_use]
pub fn in_flight_limit_for(target_fps: u32) -> u32 {
    match target_fps {
        120.. => 3,
        60..=119 => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EncoderConfig {
        EncoderConfig {
            width: 1920,
            height: 1080,
            frame_rate: 60,
            bitrate_kbps: 6000,
            pixel_format: PixelFormat::Nv12,
            color_space: ColorSpace::Bt709,
            key_frame_interval: 120,
        }
    }

    #[test]
    fn identical_config_is_no_op() {
        let cfg = base();
        assert_eq!(ChangeClassification::classify(&cfg, &cfg), ChangeClassification::NoOp);
    }

    #[test]
    fn bitrate_only_change_is_cheap() {
        let old = base();
        let mut new = base();
        new.bitrate_kbps = 3000;
        assert_eq!(
            ChangeClassification::classify(&old, &new),
            ChangeClassification::CheapInPlaceUpdate
        );
    }

    #[test]
    fn pixel_format_change_forces_teardown() {
        let old = base();
        let mut new = base();
        new.pixel_format = PixelFormat::I420;
        assert_eq!(ChangeClassification::classify(&old, &new), ChangeClassification::FullTeardown);
    }

    #[test]
    fn dimension_change_forces_teardown() {
        let old = base();
        let mut new = base();
        new.width = 1280;
        new.height = 720;
        assert_eq!(ChangeClassification::classify(&old, &new), ChangeClassification::FullTeardown);
    }

    #[test]
    fn in_flight_limit_scales_with_rate() {
        assert_eq!(in_flight_limit_for(144), 3);
        assert_eq!(in_flight_limit_for(60), 2);
        assert_eq!(in_flight_limit_for(30), 1);
    }
}
