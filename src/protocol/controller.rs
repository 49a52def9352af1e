//! 29-byte telemetry frame sent by the motor controller.
//!
//! The same layout is reused for the extended status frame sent to
//! displays that speak the open protocol.

use super::{get_u16, put_u16, TO_DISPLAY_START};
use crate::crc::crc16;

pub const CONTROLLER_FRAME_LEN: usize = 29;

// ── Offsets ───────────────────────────────────────────────────────────────────
const OFF_VOLTAGE: usize = 1;
const OFF_CURRENT: usize = 3;
const OFF_WHEEL_SPEED: usize = 4;
const OFF_FLAGS: usize = 6;
const OFF_ADC_THROTTLE: usize = 7;
const OFF_THROTTLE: usize = 8;
const OFF_ADC_TORQUE: usize = 9;
const OFF_CADENCE: usize = 11;
const OFF_DUTY_CYCLE: usize = 12;
const OFF_MOTOR_ERPS: usize = 13;
const OFF_FOC_ANGLE: usize = 15;
const OFF_SYSTEM_STATE: usize = 16;
const OFF_TEMPERATURE: usize = 17;
const OFF_WHEEL_TICKS: usize = 18;
const OFF_PEDAL_TORQUE: usize = 21;
const OFF_PEDAL_POWER: usize = 23;
const OFF_CADENCE_PULSE: usize = 25;
const OFF_CRC: usize = 27;

const FLAG_BRAKE: u8 = 0x01;
const WHEEL_TICKS_MASK: u32 = 0x00FF_FFFF;

/// Raw field values exactly as they travel on the wire.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerTelemetry {
    pub battery_voltage_x1000: u16,
    pub battery_current_x10: u8,
    pub wheel_speed_x10: u16,
    pub braking: bool,
    pub adc_throttle: u8,
    pub throttle: u8,
    pub adc_pedal_torque_sensor: u16,
    pub pedal_cadence_rpm: u8,
    pub duty_cycle: u8,
    pub motor_speed_erps: u16,
    pub foc_angle: u8,
    pub system_state: u8,
    /// Whole degrees Celsius.
    pub motor_temperature: u8,
    /// 24-bit counter.
    pub wheel_speed_sensor_ticks: u32,
    pub pedal_torque_x100: u16,
    pub pedal_power_x10: u16,
    pub cadence_pulse_high_percentage_x10: u16,
}

pub fn decode(frame: &[u8; CONTROLLER_FRAME_LEN]) -> ControllerTelemetry {
    ControllerTelemetry {
        battery_voltage_x1000: get_u16(frame, OFF_VOLTAGE),
        battery_current_x10: frame[OFF_CURRENT],
        wheel_speed_x10: get_u16(frame, OFF_WHEEL_SPEED),
        braking: frame[OFF_FLAGS] & FLAG_BRAKE != 0,
        adc_throttle: frame[OFF_ADC_THROTTLE],
        throttle: frame[OFF_THROTTLE],
        adc_pedal_torque_sensor: get_u16(frame, OFF_ADC_TORQUE),
        pedal_cadence_rpm: frame[OFF_CADENCE],
        duty_cycle: frame[OFF_DUTY_CYCLE],
        motor_speed_erps: get_u16(frame, OFF_MOTOR_ERPS),
        foc_angle: frame[OFF_FOC_ANGLE],
        system_state: frame[OFF_SYSTEM_STATE],
        motor_temperature: frame[OFF_TEMPERATURE],
        wheel_speed_sensor_ticks: u32::from_le_bytes([
            frame[OFF_WHEEL_TICKS],
            frame[OFF_WHEEL_TICKS + 1],
            frame[OFF_WHEEL_TICKS + 2],
            0,
        ]),
        pedal_torque_x100: get_u16(frame, OFF_PEDAL_TORQUE),
        pedal_power_x10: get_u16(frame, OFF_PEDAL_POWER),
        cadence_pulse_high_percentage_x10: get_u16(frame, OFF_CADENCE_PULSE),
    }
}

pub fn encode(t: &ControllerTelemetry) -> [u8; CONTROLLER_FRAME_LEN] {
    let mut frame = [0u8; CONTROLLER_FRAME_LEN];
    frame[0] = TO_DISPLAY_START;
    put_u16(&mut frame, OFF_VOLTAGE, t.battery_voltage_x1000);
    frame[OFF_CURRENT] = t.battery_current_x10;
    put_u16(&mut frame, OFF_WHEEL_SPEED, t.wheel_speed_x10);
    frame[OFF_FLAGS] = if t.braking { FLAG_BRAKE } else { 0 };
    frame[OFF_ADC_THROTTLE] = t.adc_throttle;
    frame[OFF_THROTTLE] = t.throttle;
    put_u16(&mut frame, OFF_ADC_TORQUE, t.adc_pedal_torque_sensor);
    frame[OFF_CADENCE] = t.pedal_cadence_rpm;
    frame[OFF_DUTY_CYCLE] = t.duty_cycle;
    put_u16(&mut frame, OFF_MOTOR_ERPS, t.motor_speed_erps);
    frame[OFF_FOC_ANGLE] = t.foc_angle;
    frame[OFF_SYSTEM_STATE] = t.system_state;
    frame[OFF_TEMPERATURE] = t.motor_temperature;
    let ticks = (t.wheel_speed_sensor_ticks & WHEEL_TICKS_MASK).to_le_bytes();
    frame[OFF_WHEEL_TICKS..OFF_WHEEL_TICKS + 3].copy_from_slice(&ticks[..3]);
    put_u16(&mut frame, OFF_PEDAL_TORQUE, t.pedal_torque_x100);
    put_u16(&mut frame, OFF_PEDAL_POWER, t.pedal_power_x10);
    put_u16(&mut frame, OFF_CADENCE_PULSE, t.cadence_pulse_high_percentage_x10);

    let crc = crc16(&frame[..OFF_CRC]);
    put_u16(&mut frame, OFF_CRC, crc);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 38.4 V, 5.2 A, 23.5 km/h, brake on, torque ADC 300, 72 rpm,
    /// temperature 41 C, motor blocked.
    const CAPTURE: [u8; CONTROLLER_FRAME_LEN] = [
        0x43, 0x00, 0x96, 0x34, 0xEB, 0x00, 0x01, 0x2A, 0x80, 0x2C, 0x01, 0x48, 0xC8, 0x10,
        0x01, 0x1E, 0x01, 0x29, 0x56, 0x34, 0x12, 0xE8, 0x03, 0xD0, 0x07, 0xF4, 0x01, 0x00,
        0x00,
    ];

    fn capture() -> [u8; CONTROLLER_FRAME_LEN] {
        let mut frame = CAPTURE;
        let crc = crc16(&frame[..OFF_CRC]);
        frame[OFF_CRC..].copy_from_slice(&crc.to_le_bytes());
        frame
    }

    #[test]
    fn decodes_little_endian_fields() {
        let t = decode(&capture());
        assert_eq!(t.battery_voltage_x1000, 38_400);
        assert_eq!(t.battery_current_x10, 52);
        assert_eq!(t.wheel_speed_x10, 235);
        assert!(t.braking);
        assert_eq!(t.adc_throttle, 0x2A);
        assert_eq!(t.throttle, 0x80);
        assert_eq!(t.adc_pedal_torque_sensor, 300);
        assert_eq!(t.pedal_cadence_rpm, 72);
        assert_eq!(t.duty_cycle, 200);
        assert_eq!(t.motor_speed_erps, 0x0110);
        assert_eq!(t.foc_angle, 30);
        assert_eq!(t.system_state, 1);
        assert_eq!(t.motor_temperature, 41);
        assert_eq!(t.wheel_speed_sensor_ticks, 0x12_3456);
        assert_eq!(t.pedal_torque_x100, 1000);
        assert_eq!(t.pedal_power_x10, 2000);
        assert_eq!(t.cadence_pulse_high_percentage_x10, 500);
    }

    #[test]
    fn encode_reproduces_capture() {
        let frame = capture();
        assert_eq!(encode(&decode(&frame)), frame);
    }

    #[test]
    fn brake_uses_only_bit0() {
        let mut frame = capture();
        frame[OFF_FLAGS] = 0xFE;
        assert!(!decode(&frame).braking);
    }
}
