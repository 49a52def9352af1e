//! 13-byte command frame sent to the motor controller.
//!
//! The frame has room for only three configuration bytes, so the
//! configuration is split into seven pages sent in rotation.

use super::{get_u16, put_u16, TO_CONTROLLER_START};
use crate::config::{CadenceSensorMode, Config, OptionalAdcFunction};
use crate::crc::crc16;
use crate::filter::map;
use crate::state::RidingMode;

pub const COMMAND_LEN: usize = 13;
pub const MESSAGE_ID_COUNT: u8 = 7;

const OFF_MESSAGE_ID: usize = 1;
const OFF_RIDING_MODE: usize = 2;
const OFF_MODE_PARAMETER: usize = 3;
const OFF_LIGHTS: usize = 4;
const OFF_PAGE: usize = 5;
pub const PAGE_LEN: usize = 3;
const OFF_CRC: usize = 11;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerCommand {
    pub message_id: u8,
    pub riding_mode: u8,
    pub mode_parameter: u8,
    pub lights: bool,
    pub page: [u8; PAGE_LEN],
}

impl ControllerCommand {
    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        let mut frame = [0u8; COMMAND_LEN];
        frame[0] = TO_CONTROLLER_START;
        frame[OFF_MESSAGE_ID] = self.message_id;
        frame[OFF_RIDING_MODE] = self.riding_mode;
        frame[OFF_MODE_PARAMETER] = self.mode_parameter;
        frame[OFF_LIGHTS] = self.lights as u8;
        frame[OFF_PAGE..OFF_PAGE + PAGE_LEN].copy_from_slice(&self.page);
        let crc = crc16(&frame[..OFF_CRC]);
        put_u16(&mut frame, OFF_CRC, crc);
        frame
    }

    pub fn decode(frame: &[u8; COMMAND_LEN]) -> Self {
        let mut page = [0u8; PAGE_LEN];
        page.copy_from_slice(&frame[OFF_PAGE..OFF_PAGE + PAGE_LEN]);
        Self {
            message_id: frame[OFF_MESSAGE_ID],
            riding_mode: frame[OFF_RIDING_MODE],
            mode_parameter: frame[OFF_MODE_PARAMETER],
            lights: frame[OFF_LIGHTS] != 0,
            page,
        }
    }

    pub fn crc(frame: &[u8; COMMAND_LEN]) -> u16 {
        get_u16(frame, OFF_CRC)
    }
}

/// Rotating page selector. Yields 0, 1, ..., 6, 0, ... one step per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageIndex {
    next: u8,
}

impl MessageIndex {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next(&mut self) -> u8 {
        let id = self.next;
        self.next = if id + 1 >= MESSAGE_ID_COUNT { 0 } else { id + 1 };
        id
    }
}

/// Assist parameter for the active riding mode.
pub fn mode_parameter(mode: RidingMode, assist_level: u8, cfg: &Config) -> u8 {
    let table = match mode {
        RidingMode::PowerAssist => &cfg.power_assist_level,
        RidingMode::TorqueAssist => &cfg.torque_assist_level,
        RidingMode::WalkAssist => &cfg.walk_assist_level,
        RidingMode::EmtbAssist => return cfg.emtb_assist_sensitivity,
        RidingMode::Off | RidingMode::CadenceCalibration => return 0,
    };
    if assist_level == 0 {
        return 0;
    }
    table.get(assist_level as usize - 1).copied().unwrap_or(0)
}

/// Live values some pages depend on besides the configuration.
#[derive(Debug, Clone, Copy)]
pub struct PageInputs {
    pub motor_temperature_x10: u16,
    pub cadence_calibration: bool,
    pub display_max_speed: u8,
}

pub fn config_page(message_id: u8, cfg: &Config, inputs: &PageInputs) -> [u8; PAGE_LEN] {
    match message_id {
        0 => {
            let [lo, hi] = cfg.battery_low_voltage_cut_off_x10.to_le_bytes();
            let max_speed = if cfg.street_mode() {
                cfg.street_mode_speed_limit
            } else {
                inputs.display_max_speed
            };
            [lo, hi, max_speed]
        }
        1 => {
            let [lo, hi] = cfg.wheel_perimeter.to_le_bytes();
            let throttle_blocked = cfg.street_mode()
                && cfg.street_mode_throttle_enabled == 0
                && cfg.optional_adc_function() == OptionalAdcFunction::ThrottleControl;
            let adc_function = if throttle_blocked {
                OptionalAdcFunction::NotInUse.as_u8()
            } else {
                cfg.optional_adc_function
            };
            [lo, hi, adc_function]
        }
        2 => [
            cfg.motor_type,
            cfg.motor_temperature_min_value_to_limit,
            cfg.motor_temperature_max_value_to_limit,
        ],
        4 => [
            cfg.lights_configuration,
            cfg.assist_without_pedal_rotation_threshold,
            cfg.motor_acceleration,
        ],
        5 => {
            let max_current = if cfg.external_thermal_control() {
                let (min_x10, max_x10) = cfg.temperature_limits_x10();
                map(
                    inputs.motor_temperature_x10 as i32,
                    min_x10 as i32,
                    max_x10 as i32,
                    cfg.battery_max_current as i32,
                    0,
                ) as u8
            } else {
                cfg.battery_max_current
            };
            let power_limit = if cfg.street_mode() && cfg.street_mode_power_limit_enabled != 0 {
                cfg.street_mode_power_limit_div25
            } else {
                cfg.target_max_battery_power_div25
            };
            [cfg.pedal_torque_per_10_bit_adc_step_x100, max_current, power_limit]
        }
        6 => {
            let mode = if inputs.cadence_calibration {
                CadenceSensorMode::Calibration.as_u8()
            } else {
                cfg.cadence_sensor_mode
            };
            let [lo, hi] = cfg.cadence_sensor_pulse_high_percentage_x10.to_le_bytes();
            [mode, lo, hi]
        }
        // Page 3 is reserved.
        _ => [0; PAGE_LEN],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PageInputs {
        PageInputs {
            motor_temperature_x10: 300,
            cadence_calibration: false,
            display_max_speed: 32,
        }
    }

    #[test]
    fn message_index_cycles_without_skips() {
        let mut idx = MessageIndex::new();
        for round in 0..5 {
            for expected in 0..MESSAGE_ID_COUNT {
                assert_eq!(idx.next(), expected, "round {}", round);
            }
        }
    }

    #[test]
    fn frame_layout_and_crc() {
        let cmd = ControllerCommand {
            message_id: 2,
            riding_mode: RidingMode::TorqueAssist.as_u8(),
            mode_parameter: 65,
            lights: true,
            page: [1, 65, 80],
        };
        let frame = cmd.encode();
        assert_eq!(&frame[..11], &[0x59, 2, 2, 65, 1, 1, 65, 80, 0, 0, 0]);
        assert_eq!(ControllerCommand::crc(&frame), crc16(&frame[..11]));
        assert_eq!(ControllerCommand::decode(&frame), cmd);
    }

    #[test]
    fn mode_parameter_uses_level_tables() {
        let cfg = Config::DEFAULT;
        assert_eq!(mode_parameter(RidingMode::PowerAssist, 1, &cfg), 5);
        assert_eq!(mode_parameter(RidingMode::TorqueAssist, 3, &cfg), 65);
        assert_eq!(mode_parameter(RidingMode::WalkAssist, 4, &cfg), 48);
        assert_eq!(mode_parameter(RidingMode::PowerAssist, 0, &cfg), 0);
        assert_eq!(mode_parameter(RidingMode::EmtbAssist, 0, &cfg), 10);
        assert_eq!(mode_parameter(RidingMode::CadenceCalibration, 2, &cfg), 0);
        assert_eq!(mode_parameter(RidingMode::Off, 2, &cfg), 0);
    }

    #[test]
    fn speed_and_power_pages_follow_street_mode() {
        let mut cfg = Config::DEFAULT;
        assert_eq!(config_page(0, &cfg, &inputs()), [0x22, 0x01, 32]);
        assert_eq!(config_page(5, &cfg, &inputs()), [67, 15, 10]);

        cfg.street_mode_enabled = 1;
        cfg.street_mode_speed_limit = 25;
        cfg.street_mode_power_limit_enabled = 1;
        cfg.street_mode_power_limit_div25 = 8;
        assert_eq!(config_page(0, &cfg, &inputs()), [0x22, 0x01, 25]);
        assert_eq!(config_page(5, &cfg, &inputs())[2], 8);
    }

    #[test]
    fn throttle_is_gated_in_street_mode() {
        let mut cfg = Config::DEFAULT;
        cfg.optional_adc_function = OptionalAdcFunction::ThrottleControl.as_u8();
        assert_eq!(config_page(1, &cfg, &inputs()), [0xFC, 0x08, 2]);

        cfg.street_mode_enabled = 1;
        assert_eq!(config_page(1, &cfg, &inputs())[2], 0);

        cfg.street_mode_throttle_enabled = 1;
        assert_eq!(config_page(1, &cfg, &inputs())[2], 2);
    }

    #[test]
    fn current_is_derated_with_external_sensor() {
        let mut cfg = Config::DEFAULT;
        cfg.thermal_control = 1;
        let mut hot = inputs();

        hot.motor_temperature_x10 = 650;
        assert_eq!(config_page(5, &cfg, &hot)[1], 15);
        hot.motor_temperature_x10 = 725;
        assert_eq!(config_page(5, &cfg, &hot)[1], 8);
        hot.motor_temperature_x10 = 900;
        assert_eq!(config_page(5, &cfg, &hot)[1], 0);
    }

    #[test]
    fn remaining_pages() {
        let cfg = Config::DEFAULT;
        assert_eq!(config_page(2, &cfg, &inputs()), [1, 65, 80]);
        assert_eq!(config_page(3, &cfg, &inputs()), [0, 0, 0]);
        assert_eq!(config_page(4, &cfg, &inputs()), [0, 0, 0]);
        assert_eq!(config_page(6, &cfg, &inputs()), [0, 0xF4, 0x01]);

        let mut calibrating = inputs();
        calibrating.cadence_calibration = true;
        assert_eq!(config_page(6, &cfg, &calibrating)[0], 2);
    }
}
