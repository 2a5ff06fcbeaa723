use mirage_types::ContentRect;

use crate::config::{in_flight_limit_for, ChangeClassification, EncoderConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("encoder has {in_flight} frames outstanding, at its in-flight limit of {limit}")]
    InFlightLimitReached { in_flight: u32, limit: u32 },
}

/// A single encoded output (spec §4.4: "encoded bytes, isKeyframe,
/// presentation timestamp, content rectangle").
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub is_keyframe: bool,
    pub pts_ns: u64,
    pub content_rect: ContentRect,
}

/// Admission decision for a prospective `encode()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeAdmission {
    /// Whether this frame must carry an IDR, per keyframe cadence or a
    /// pending forced keyframe.
    pub must_be_keyframe: bool,
}

/// Manages a hardware encoder's lifecycle: admission control, keyframe
/// cadence, and in-place vs. full-teardown reconfiguration (spec §4.4).
///
/// The actual hardware pipeline (VAAPI/NVENC/software encoder) is an
/// external collaborator; this type owns only the bookkeeping around it.
pub struct EncoderSession {
    config: EncoderConfig,
    in_flight_limit: u32,
    in_flight: u32,
    frames_since_keyframe: u32,
    force_keyframe_pending: bool,
    force_keyframe_requires_reset: bool,
}

impl EncoderSession {
    /// Establish a session and preheat it (spec §4.4 `create`).
    #[must_use]
    pub fn create(config: EncoderConfig) -> Self {
        tracing::info!(
            width = config.width,
            height = config.height,
            frame_rate = config.frame_rate,
            "encoder session created"
        );
        Self {
            in_flight_limit: in_flight_limit_for(config.frame_rate),
            config,
            in_flight: 0,
            frames_since_keyframe: 0,
            // Start-of-session always needs a keyframe.
            force_keyframe_pending: true,
            force_keyframe_requires_reset: false,
        }
    }

    #[must_use]
    pub fn config(&self) -> EncoderConfig {
        self.config
    }

    #[must_use]
    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    /// Apply a desired config, returning how it was applied. A
    /// [`ChangeClassification::FullTeardown`] recreates the session in
    /// place (in-flight count and keyframe cadence reset).
    pub fn update_config(&mut self, new_config: EncoderConfig) -> ChangeClassification {
        let classification = ChangeClassification::classify(&self.config, &new_config);
        match classification {
            ChangeClassification::NoOp => {}
            ChangeClassification::CheapInPlaceUpdate => {
                tracing::debug!("encoder session: cheap in-place reconfiguration");
                self.config = new_config;
            }
            ChangeClassification::FullTeardown => {
                tracing::info!("encoder session: full teardown and reconfiguration");
                *self = Self::create(new_config);
            }
        }
        classification
    }

    pub fn update_dimensions(&mut self, width: u32, height: u32) -> ChangeClassification {
        let mut new_config = self.config;
        new_config.width = width;
        new_config.height = height;
        self.update_config(new_config)
    }

    pub fn update_frame_rate(&mut self, frame_rate: u32) -> ChangeClassification {
        let mut new_config = self.config;
        new_config.frame_rate = frame_rate;
        self.update_config(new_config)
    }

    pub fn update_bitrate_only(&mut self, bitrate_kbps: u32) -> ChangeClassification {
        let mut new_config = self.config;
        new_config.bitrate_kbps = bitrate_kbps;
        self.update_config(new_config)
    }

    /// Request the next frame be an IDR. `requires_reset` bumps epoch at the
    /// sender once honored (spec §4.4).
    pub fn force_keyframe(&mut self, requires_reset: bool) {
        self.force_keyframe_pending = true;
        self.force_keyframe_requires_reset |= requires_reset;
    }

    /// Whether the pending forced keyframe (if any) requires an epoch bump.
    #[must_use]
    pub fn force_keyframe_requires_reset(&self) -> bool {
        self.force_keyframe_requires_reset
    }

    /// Admit a frame for encoding (spec §4.4 `encode`). Errors if the
    /// in-flight bound is already reached.
    pub fn admit(&mut self) -> Result<EncodeAdmission, EncodeError> {
        if self.in_flight >= self.in_flight_limit {
            return Err(EncodeError::InFlightLimitReached {
                in_flight: self.in_flight,
                limit: self.in_flight_limit,
            });
        }

        let cadence_due = self.frames_since_keyframe >= self.config.key_frame_interval;
        let must_be_keyframe = self.force_keyframe_pending || cadence_due;

        self.in_flight += 1;
        if must_be_keyframe {
            self.frames_since_keyframe = 0;
            self.force_keyframe_pending = false;
            self.force_keyframe_requires_reset = false;
        } else {
            self.frames_since_keyframe += 1;
        }

        Ok(EncodeAdmission { must_be_keyframe })
    }

    /// Release one in-flight slot once the hardware encoder returns output
    /// for a previously admitted frame.
    pub fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColorSpace, PixelFormat};

    fn config() -> EncoderConfig {
        EncoderConfig {
            width: 1920,
            height: 1080,
            frame_rate: 60,
            bitrate_kbps: 6000,
            pixel_format: PixelFormat::Nv12,
            color_space: ColorSpace::Bt709,
            key_frame_interval: 3,
        }
    }

    #[test]
    fn first_frame_after_create_is_a_keyframe() {
        let mut session = EncoderSession::create(config());
        let admission = session.admit().unwrap();
        assert!(admission.must_be_keyframe);
    }

    #[test]
    fn keyframe_cadence_fires_on_interval() {
        let mut session = EncoderSession::create(config());
        assert!(session.admit().unwrap().must_be_keyframe); // frame 0: start-of-session
        session.release();
        assert!(!session.admit().unwrap().must_be_keyframe); // frame 1
        session.release();
        assert!(!session.admit().unwrap().must_be_keyframe); // frame 2
        session.release();
        assert!(session.admit().unwrap().must_be_keyframe); // frame 3: cadence due
    }

    #[test]
    fn in_flight_limit_rejects_past_bound() {
        let mut session = EncoderSession::create(config());
        assert!(session.admit().is_ok());
        assert!(session.admit().is_ok());
        assert_eq!(
            session.admit(),
            Err(EncodeError::InFlightLimitReached { in_flight: 2, limit: 2 })
        );
        session.release();
        assert!(session.admit().is_ok());
    }

    #[test]
    fn force_keyframe_is_honored_on_next_admit() {
        let mut session = EncoderSession::create(config());
        session.admit().unwrap();
        session.release();
        session.force_keyframe(true);
        assert!(session.force_keyframe_requires_reset());
        let admission = session.admit().unwrap();
        assert!(admission.must_be_keyframe);
        assert!(!session.force_keyframe_requires_reset());
    }

    #[test]
    fn bitrate_only_update_keeps_in_flight_state() {
        let mut session = EncoderSession::create(config());
        session.admit().unwrap();
        let classification = session.update_bitrate_only(2000);
        assert_eq!(classification, ChangeClassification::CheapInPlaceUpdate);
        assert_eq!(session.in_flight(), 1);
    }

    #[test]
    fn dimension_update_tears_down_and_resets_state() {
        let mut session = EncoderSession::create(config());
        session.admit().unwrap();
        let classification = session.update_dimensions(1280, 720);
        assert_eq!(classification, ChangeClassification::FullTeardown);
        assert_eq!(session.in_flight(), 0);
        assert!(session.admit().unwrap().must_be_keyframe);
    }
}
