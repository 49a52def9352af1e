//! Frame checksums. Both are fixed by the peers' firmware and must match
//! captured traffic byte for byte.

/// Additive checksum used by the legacy display protocol: wrapping sum of
/// every byte that precedes the checksum slot.
pub fn checksum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

pub const CRC16_INIT: u16 = 0xFFFF;

/// Running CRC-16 (reflected polynomial 0xA001, seed 0xFFFF, no final xor)
/// used by the open controller protocol.
#[derive(Debug, Clone, Copy)]
pub struct Crc16 {
    crc: u16,
}

impl Crc16 {
    pub const fn new() -> Self {
        Self { crc: CRC16_INIT }
    }

    pub fn update(&mut self, byte: u8) {
        self.crc ^= byte as u16;
        for _ in 0..8 {
            if self.crc & 0x0001 != 0 {
                self.crc = (self.crc >> 1) ^ 0xA001;
            } else {
                self.crc >>= 1;
            }
        }
    }

    pub fn finish(&self) -> u16 {
        self.crc
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    for &b in data {
        crc.update(b);
    }
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn crc16_empty_is_seed() {
        assert_eq!(crc16(&[]), CRC16_INIT);
    }

    #[test]
    fn checksum8_wraps() {
        assert_eq!(checksum8(&[0x43, 0x0C, 0x04]), 0x53);
        assert_eq!(checksum8(&[0xFF, 0x02]), 0x01);
    }
}
