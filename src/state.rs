//! Shared telemetry model written by the frame decoders and read by the
//! encoders and the periodic tick.
//!
//! Everything here is plain `Copy` data; ownership and mutual exclusion live
//! in [`crate::bridge`].

// ── Riding mode ───────────────────────────────────────────────────────────────

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RidingMode {
    #[default]
    Off = 0,
    PowerAssist = 1,
    TorqueAssist = 2,
    EmtbAssist = 4,
    WalkAssist = 5,
    CadenceCalibration = 7,
}

impl RidingMode {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

// ── Fault codes ───────────────────────────────────────────────────────────────

/// System state reported by (or derived for) the motor controller.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerFault {
    #[default]
    None,
    MotorBlocked,
    TorqueSensor,
    CadenceSensorCalibration,
    TemperatureLimit,
    TemperatureMax,
    Other(u8),
}

impl From<u8> for ControllerFault {
    fn from(value: u8) -> Self {
        match value {
            0 => ControllerFault::None,
            1 => ControllerFault::MotorBlocked,
            2 => ControllerFault::TorqueSensor,
            3 => ControllerFault::CadenceSensorCalibration,
            8 => ControllerFault::TemperatureLimit,
            9 => ControllerFault::TemperatureMax,
            other => ControllerFault::Other(other),
        }
    }
}

impl From<ControllerFault> for u8 {
    fn from(value: ControllerFault) -> Self {
        match value {
            ControllerFault::None => 0,
            ControllerFault::MotorBlocked => 1,
            ControllerFault::TorqueSensor => 2,
            ControllerFault::CadenceSensorCalibration => 3,
            ControllerFault::TemperatureLimit => 8,
            ControllerFault::TemperatureMax => 9,
            ControllerFault::Other(raw) => raw,
        }
    }
}

/// Error code shown by the legacy display.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DisplayFault {
    #[default]
    None = 0,
    Overvoltage = 1,
    TorqueSensor = 2,
    CadenceSensorCalibration = 3,
    MotorBlocked = 4,
    Overtemperature = 6,
}

impl DisplayFault {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

// ── Telemetry ─────────────────────────────────────────────────────────────────

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub riding_mode: RidingMode,
    pub assist_level: u8,
    pub wheel_speed_x10: u16,
    pub pedal_cadence_rpm: u8,
    pub motor_temperature_x10: u16,
    pub pedal_power_x10: u16,
    pub battery_voltage_x1000: u16,
    pub battery_current_x10: u8,
    pub battery_wh: u16,
    pub controller_fault: ControllerFault,
    pub braking: bool,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            riding_mode: RidingMode::Off,
            assist_level: 0,
            wheel_speed_x10: 0,
            pedal_cadence_rpm: 0,
            motor_temperature_x10: 220,
            pedal_power_x10: 0,
            battery_voltage_x1000: 36_000,
            battery_current_x10: 0,
            battery_wh: 0,
            controller_fault: ControllerFault::None,
            braking: false,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugData {
    pub adc_throttle: u8,
    pub throttle: u8,
    pub adc_pedal_torque_sensor: u16,
    pub duty_cycle: u8,
    pub motor_speed_erps: u16,
    pub foc_angle: u8,
    pub pedal_torque_x100: u16,
    pub cadence_pulse_high_percentage_x10: u16,
    pub wheel_speed_sensor_tick_counter: u32,
}

impl Default for DebugData {
    fn default() -> Self {
        Self {
            adc_throttle: 0,
            throttle: 0,
            adc_pedal_torque_sensor: 0,
            duty_cycle: 0,
            motor_speed_erps: 0,
            foc_angle: 0,
            pedal_torque_x100: 0,
            cadence_pulse_high_percentage_x10: 500,
            wheel_speed_sensor_tick_counter: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_fault_preserves_unknown_codes() {
        for raw in 0u8..=255 {
            assert_eq!(u8::from(ControllerFault::from(raw)), raw);
        }
        assert_eq!(ControllerFault::from(5), ControllerFault::Other(5));
    }
}
