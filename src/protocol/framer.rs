//! Byte-stream framing for fixed-length frames.
//!
//! Frames are: [Start] [Payload...] [Check], where Check is either the
//! legacy additive byte or a little-endian CRC-16. Bytes before a start
//! byte are discarded; a frame that fails its check is dropped and the
//! reader resynchronises on the next start byte inside it.

use heapless::Vec;

use crate::crc::{checksum8, crc16};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCheck {
    Sum8,
    Crc16,
}

impl FrameCheck {
    fn verify(self, frame: &[u8]) -> bool {
        let n = frame.len();
        match self {
            FrameCheck::Sum8 => checksum8(&frame[..n - 1]) == frame[n - 1],
            FrameCheck::Crc16 => {
                crc16(&frame[..n - 2]) == u16::from_le_bytes([frame[n - 2], frame[n - 1]])
            }
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub accepted: u32,
    pub rejected: u32,
}

pub struct FrameReader<const N: usize> {
    start: u8,
    check: FrameCheck,
    buffer: Vec<u8, N>,
    stats: FrameStats,
}

impl<const N: usize> FrameReader<N> {
    pub fn new(start: u8, check: FrameCheck) -> Self {
        Self {
            start,
            check,
            buffer: Vec::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn push_byte(&mut self, b: u8) -> Option<[u8; N]> {
        if self.buffer.is_empty() && b != self.start {
            return None;
        }
        let _ = self.buffer.push(b);
        if self.buffer.len() < N {
            return None;
        }

        let mut frame = [0u8; N];
        frame.copy_from_slice(&self.buffer);
        self.buffer.clear();

        if self.check.verify(&frame) {
            self.stats.accepted = self.stats.accepted.wrapping_add(1);
            return Some(frame);
        }

        self.stats.rejected = self.stats.rejected.wrapping_add(1);
        warn!("frame 0x{:02x} failed {:?} check", self.start, self.check);
        if let Some(pos) = frame[1..].iter().position(|&x| x == self.start) {
            // Shorter than N, so this can never complete a frame by itself.
            let _ = self.buffer.extend_from_slice(&frame[1 + pos..]);
        }
        None
    }

    /// Feeds a burst of bytes, handing every complete frame in it to
    /// `on_frame` in arrival order.
    pub fn push_bytes(&mut self, data: &[u8], mut on_frame: impl FnMut([u8; N])) {
        for &b in data {
            if let Some(frame) = self.push_byte(b) {
                on_frame(frame);
            }
        }
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use super::*;
    use crate::protocol::display::DISPLAY_CONTROL_LEN;
    use crate::protocol::TO_CONTROLLER_START;

    fn control_frame(bits: u8) -> [u8; DISPLAY_CONTROL_LEN] {
        let mut f = [TO_CONTROLLER_START, bits, 0x00, 27, 0x00, 25, 0x00];
        f[6] = checksum8(&f[..6]);
        f
    }

    fn collect<const N: usize>(reader: &mut FrameReader<N>, data: &[u8]) -> Vec<[u8; N]> {
        let mut frames = Vec::new();
        reader.push_bytes(data, |f| frames.push(f));
        frames
    }

    #[test]
    fn skips_noise_before_start() {
        let mut reader = FrameReader::<DISPLAY_CONTROL_LEN>::new(0x59, FrameCheck::Sum8);
        let frame = control_frame(0x04);
        assert!(collect(&mut reader, &[0x00, 0x13, 0xFF]).is_empty());
        assert_eq!(collect(&mut reader, &frame), [frame]);
        assert_eq!(reader.stats().accepted, 1);
    }

    #[test]
    fn drops_bad_checksum_and_resyncs() {
        let mut reader = FrameReader::<DISPLAY_CONTROL_LEN>::new(0x59, FrameCheck::Sum8);
        let good = control_frame(0x02);
        // Truncated frame immediately followed by a good one.
        let mut stream = [0u8; 3 + DISPLAY_CONTROL_LEN];
        stream[..3].copy_from_slice(&[0x59, 0x10, 0x00]);
        stream[3..].copy_from_slice(&good);

        assert_eq!(collect(&mut reader, &stream), [good]);
        assert_eq!(reader.stats().rejected, 1);
    }

    #[test]
    fn burst_delivers_every_frame_in_order() {
        let mut reader = FrameReader::<DISPLAY_CONTROL_LEN>::new(0x59, FrameCheck::Sum8);
        let first = control_frame(0x40);
        let second = control_frame(0x08);
        let mut stream = [0u8; 2 * DISPLAY_CONTROL_LEN];
        stream[..DISPLAY_CONTROL_LEN].copy_from_slice(&first);
        stream[DISPLAY_CONTROL_LEN..].copy_from_slice(&second);

        assert_eq!(collect(&mut reader, &stream), [first, second]);
        assert_eq!(reader.stats().accepted, 2);
    }

    #[test]
    fn crc16_frames() {
        let mut reader = FrameReader::<5>::new(0x43, FrameCheck::Crc16);
        let mut frame = [0x43, 0x01, 0x02, 0, 0];
        let crc = crc16(&frame[..3]).to_le_bytes();
        frame[3..].copy_from_slice(&crc);
        assert_eq!(collect(&mut reader, &frame), [frame]);

        frame[1] ^= 0x80;
        reader.reset();
        assert!(collect(&mut reader, &frame).is_empty());
        assert_eq!(reader.stats(), FrameStats { accepted: 1, rejected: 1 });
    }
}
