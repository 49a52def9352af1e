//! Assist level and riding mode from the legacy display's control byte.
//!
//! The stock display has no notion of assist algorithms, so the wheel
//! diameter setting doubles as a mode selector.

use crate::state::RidingMode;

pub const ASSIST_LEVEL_MASK: u8 = 0x5E;
pub const ASSIST_LEVEL0_BITS: u8 = 0x10;
pub const ASSIST_LEVEL1_BITS: u8 = 0x40;
pub const ASSIST_LEVEL2_BITS: u8 = 0x02;
pub const ASSIST_LEVEL3_BITS: u8 = 0x04;
pub const ASSIST_LEVEL4_BITS: u8 = 0x08;
pub const WALK_ASSIST_BIT: u8 = 0x20;
pub const LIGHTS_BIT: u8 = 0x01;

pub const WHEEL_CODE_POWER: u8 = 26;
pub const WHEEL_CODE_TORQUE: u8 = 27;
pub const WHEEL_CODE_EMTB: u8 = 29;

/// Exact match on the masked assist bits. Anything else yields `None` and
/// the caller keeps the previous level.
pub fn assist_level(control: u8) -> Option<u8> {
    match control & ASSIST_LEVEL_MASK {
        ASSIST_LEVEL0_BITS => Some(0),
        ASSIST_LEVEL1_BITS => Some(1),
        ASSIST_LEVEL2_BITS => Some(2),
        ASSIST_LEVEL3_BITS => Some(3),
        ASSIST_LEVEL4_BITS => Some(4),
        _ => None,
    }
}

/// First match wins: calibration, then walk assist, then the wheel code.
pub fn riding_mode(calibration: bool, walk_assist: bool, wheel_code: u8) -> RidingMode {
    if calibration {
        RidingMode::CadenceCalibration
    } else if walk_assist {
        RidingMode::WalkAssist
    } else {
        match wheel_code {
            WHEEL_CODE_TORQUE => RidingMode::TorqueAssist,
            WHEEL_CODE_EMTB => RidingMode::EmtbAssist,
            _ => RidingMode::PowerAssist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assist_bits_decode_exactly() {
        assert_eq!(assist_level(0x10), Some(0));
        assert_eq!(assist_level(0x40), Some(1));
        assert_eq!(assist_level(0x02 | LIGHTS_BIT), Some(2));
        assert_eq!(assist_level(0x04 | 0x80), Some(3));
        assert_eq!(assist_level(0x08), Some(4));
    }

    #[test]
    fn ambiguous_assist_bits_hold() {
        assert_eq!(assist_level(0x00), None);
        assert_eq!(assist_level(0x02 | 0x04), None);
        assert_eq!(assist_level(0x40 | 0x10), None);
    }

    #[test]
    fn wheel_code_selects_mode() {
        assert_eq!(riding_mode(false, false, 27), RidingMode::TorqueAssist);
        assert_eq!(riding_mode(false, false, 29), RidingMode::EmtbAssist);
        assert_eq!(riding_mode(false, false, 26), RidingMode::PowerAssist);
        assert_eq!(riding_mode(false, false, 28), RidingMode::PowerAssist);
    }

    #[test]
    fn override_priority() {
        assert_eq!(riding_mode(false, true, 27), RidingMode::WalkAssist);
        assert_eq!(riding_mode(true, true, 27), RidingMode::CadenceCalibration);
        assert_eq!(riding_mode(true, false, 29), RidingMode::CadenceCalibration);
    }
}
