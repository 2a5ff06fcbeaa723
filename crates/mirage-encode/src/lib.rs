//! Hardware encoder session lifecycle, change classification, and keyframe
//! scheduling (spec §4.4). The hardware pipeline itself is an external
//! collaborator; this crate owns the session bookkeeping around it.

mod config;
mod hardware;
mod session;

pub use config::{in_flight_limit_for, ChangeClassification, ColorSpace, EncoderConfig, PixelFormat};
pub use hardware::{HardwareEncodeError, HardwareEncoder};
pub use session::{EncodeAdmission, EncodeError, EncodedFrame, EncoderSession};
