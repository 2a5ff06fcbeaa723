//! Transport plumbing: control-plane message shapes, the reliable control
//! channel's serialization guarantee, UDP registration gating, and the
//! unreliable data channel (spec §2 Transport, §4.10, §6).

mod control;
mod control_channel;
mod datagram;
mod registration;

pub use control::ControlMessage;
pub use control_channel::{control_channel, ControlChannelClosed, ControlChannelHandle};
pub use datagram::DataChannel;
pub use registration::{RegistrationDatagram, RegistrationGate, RegistrationToken, REGISTRATION_TOKEN_LEN};
