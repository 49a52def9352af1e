//! Legacy display protocol: the 7-byte control frame it sends, the 9-byte
//! status frame it expects back, plus the CRC-16 extended status variant.

use super::controller::{self, ControllerTelemetry, CONTROLLER_FRAME_LEN};
use super::{put_u16, TO_DISPLAY_START};
use crate::crc::checksum8;
use crate::riding::{assist_level, LIGHTS_BIT, WALK_ASSIST_BIT};
use crate::state::DisplayFault;

pub const DISPLAY_CONTROL_LEN: usize = 7;
pub const LEGACY_STATUS_LEN: usize = 9;

// ── Control frame (display -> bridge) ─────────────────────────────────────────
const CTRL_OFF_BITS: usize = 1;
const CTRL_OFF_WHEEL_DIAMETER: usize = 3;
const CTRL_OFF_MAX_SPEED: usize = 5;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayControl {
    /// `None` when the assist bits match no known level.
    pub assist_level: Option<u8>,
    pub walk_assist: bool,
    pub lights: bool,
    /// Wheel diameter setting in inches; doubles as riding-mode selector.
    pub wheel_diameter: u8,
    pub max_speed: u8,
}

pub fn decode_control(frame: &[u8; DISPLAY_CONTROL_LEN]) -> DisplayControl {
    let bits = frame[CTRL_OFF_BITS];
    DisplayControl {
        assist_level: assist_level(bits),
        walk_assist: bits & WALK_ASSIST_BIT != 0,
        lights: bits & LIGHTS_BIT != 0,
        wheel_diameter: frame[CTRL_OFF_WHEEL_DIAMETER],
        max_speed: frame[CTRL_OFF_MAX_SPEED],
    }
}

// ── Status frame (bridge -> display) ──────────────────────────────────────────
const STAT_OFF_BATTERY: usize = 1;
const STAT_OFF_WORKING: usize = 2;
const STAT_OFF_RESERVED: usize = 3;
const STAT_OFF_FAULT: usize = 5;
const STAT_OFF_WHEEL_PERIOD: usize = 6;
const STAT_OFF_CHECKSUM: usize = 8;

const RESERVED: [u8; 2] = [0x46, 0x46];

/// Undervoltage is signalled here instead of as an error code.
pub const WORKING_UNDERVOLTAGE: u8 = 0x01;
/// Keeps the display from auto-powering off while riding.
pub const WORKING_KEEP_AWAKE: u8 = 0x04;

/// Wheel period reported while stopped.
pub const WHEEL_PERIOD_STOPPED: u16 = 0x0707;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyStatus {
    pub battery_level: u8,
    pub working_status: u8,
    pub fault: DisplayFault,
    pub wheel_period: u16,
}

/// Display clock ticks (1/500 s) for one wheel revolution at the given speed.
///
/// `wheel_diameter` is in inches; 798 approximates 25.4 * pi * 10.
pub fn wheel_period(wheel_diameter: u8, wheel_speed_x10: u16) -> u16 {
    if wheel_speed_x10 == 0 {
        return WHEEL_PERIOD_STOPPED;
    }
    let ticks = (36 * wheel_diameter as u32 * 798 * 5) / (wheel_speed_x10 as u32 * 100);
    // Saturate so a crawling wheel never reads as fast.
    ticks.min(u16::MAX as u32) as u16
}

pub fn encode_status(s: &LegacyStatus) -> [u8; LEGACY_STATUS_LEN] {
    let mut frame = [0u8; LEGACY_STATUS_LEN];
    frame[0] = TO_DISPLAY_START;
    frame[STAT_OFF_BATTERY] = s.battery_level;
    frame[STAT_OFF_WORKING] = s.working_status;
    frame[STAT_OFF_RESERVED..STAT_OFF_RESERVED + 2].copy_from_slice(&RESERVED);
    frame[STAT_OFF_FAULT] = s.fault.as_u8();
    put_u16(&mut frame, STAT_OFF_WHEEL_PERIOD, s.wheel_period);
    frame[STAT_OFF_CHECKSUM] = checksum8(&frame[..STAT_OFF_CHECKSUM]);
    frame
}

/// Extended status for displays that speak the open protocol: the full
/// telemetry layout with a CRC-16 trailer.
pub fn encode_extended_status(t: &ControllerTelemetry) -> [u8; CONTROLLER_FRAME_LEN] {
    controller::encode(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_control_frame() {
        // assist 3, lights on, 27" wheel, 25 km/h
        let frame = [0x59, 0x05, 0x00, 27, 0x00, 25, 0x00];
        let c = decode_control(&frame);
        assert_eq!(c.assist_level, Some(3));
        assert!(c.lights);
        assert!(!c.walk_assist);
        assert_eq!(c.wheel_diameter, 27);
        assert_eq!(c.max_speed, 25);
    }

    #[test]
    fn walk_bit_is_independent_of_level() {
        let frame = [0x59, 0x20 | 0x40, 0x00, 26, 0x00, 25, 0x00];
        let c = decode_control(&frame);
        assert!(c.walk_assist);
        assert_eq!(c.assist_level, Some(1));
        assert!(!c.lights);
    }

    #[test]
    fn wheel_period_matches_display_clock() {
        // 26" at 20.0 km/h
        assert_eq!(wheel_period(26, 200), 186);
        assert_eq!(wheel_period(28, 0), WHEEL_PERIOD_STOPPED);
    }

    #[test]
    fn wheel_period_saturates_at_crawling_speed() {
        assert_eq!(wheel_period(255, 1), u16::MAX);
        assert_eq!(wheel_period(26, 1), 37_346);
    }

    #[test]
    fn status_frame_layout() {
        let frame = encode_status(&LegacyStatus {
            battery_level: 12,
            working_status: WORKING_KEEP_AWAKE,
            fault: DisplayFault::Overtemperature,
            wheel_period: 186,
        });
        assert_eq!(
            frame,
            [0x43, 0x0C, 0x04, 0x46, 0x46, 0x06, 0xBA, 0x00, 0x9F]
        );
    }

    #[test]
    fn stopped_status_frame() {
        let frame = encode_status(&LegacyStatus {
            battery_level: 0,
            working_status: WORKING_UNDERVOLTAGE,
            fault: DisplayFault::None,
            wheel_period: WHEEL_PERIOD_STOPPED,
        });
        assert_eq!(
            frame,
            [0x43, 0x00, 0x01, 0x46, 0x46, 0x00, 0x07, 0x07, 0xDE]
        );
    }
}
