//! Wire codecs for both serial peers.
//!
//! Decoders take fixed-size arrays and trust their content; length and
//! checksum checks belong to [`framer::FrameReader`] on the transport side.

pub mod command;
pub mod controller;
pub mod display;
pub mod framer;

/// First byte of frames travelling towards the display (controller
/// telemetry, bridge status).
pub const TO_DISPLAY_START: u8 = 0x43;
/// First byte of frames travelling towards the controller (display control,
/// bridge commands).
pub const TO_CONTROLLER_START: u8 = 0x59;

pub(crate) fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn get_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}
