//! Rider-tunable configuration: defaults, range validation and the fixed
//! layout blob it is persisted as.

use crate::crc::crc16;

// ── Enumerated fields ─────────────────────────────────────────────────────────

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CadenceSensorMode {
    Standard = 0,
    Advanced = 1,
    Calibration = 2,
}

impl CadenceSensorMode {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// What the controller's optional ADC input is wired to.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionalAdcFunction {
    NotInUse = 0,
    TemperatureControl = 1,
    ThrottleControl = 2,
}

impl OptionalAdcFunction {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

pub const MOTOR_TYPE_MAX: u8 = 3;
pub const BATTERY_CELLS_MAX: u8 = 15;
pub const ASSIST_LEVELS: usize = 4;

// ── Config ────────────────────────────────────────────────────────────────────

/// Raw configuration as exchanged with the host and stored in flash.
///
/// Enumerated and boolean fields are kept as raw bytes so that a candidate
/// can carry out-of-range values up to [`Config::validate`]. Cell thresholds
/// are encoded as `cell_mV / 10 - 200` (225 means 4.25 V).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub motor_type: u8,
    pub motor_temperature_min_value_to_limit: u8,
    pub motor_temperature_max_value_to_limit: u8,
    pub motor_acceleration: u8,
    pub cadence_sensor_mode: u8,
    pub cadence_sensor_pulse_high_percentage_x10: u16,
    pub pedal_torque_per_10_bit_adc_step_x100: u8,
    pub optional_adc_function: u8,
    pub assist_without_pedal_rotation_threshold: u8,
    pub lights_configuration: u8,
    pub wheel_perimeter: u16,
    pub oem_wheel_divisor: u8,
    pub battery_voltage_reset_wh_counter_x10: u16,
    pub battery_max_current: u8,
    pub target_max_battery_power_div25: u8,
    pub battery_cells_number: u8,
    pub battery_pack_resistance_x1000: u16,
    pub battery_low_voltage_cut_off_x10: u16,
    pub li_io_cell_overvolt_x100: u8,
    pub li_io_cell_full_bars_x100: u8,
    pub li_io_cell_one_bar_x100: u8,
    pub li_io_cell_empty_x100: u8,
    pub street_mode_enabled: u8,
    pub street_mode_power_limit_enabled: u8,
    pub street_mode_throttle_enabled: u8,
    pub street_mode_power_limit_div25: u8,
    pub street_mode_speed_limit: u8,
    pub emtb_assist_sensitivity: u8,
    pub power_assist_level: [u8; ASSIST_LEVELS],
    pub torque_assist_level: [u8; ASSIST_LEVELS],
    pub walk_assist_level: [u8; ASSIST_LEVELS],
    /// Motor temperature comes from a sensor on the bridge rather than the controller.
    pub thermal_control: u8,
}

impl Config {
    pub const DEFAULT: Config = Config {
        motor_type: 1,
        motor_temperature_min_value_to_limit: 65,
        motor_temperature_max_value_to_limit: 80,
        motor_acceleration: 0,
        cadence_sensor_mode: CadenceSensorMode::Standard as u8,
        cadence_sensor_pulse_high_percentage_x10: 500,
        pedal_torque_per_10_bit_adc_step_x100: 67,
        optional_adc_function: OptionalAdcFunction::NotInUse as u8,
        assist_without_pedal_rotation_threshold: 0,
        lights_configuration: 0,
        wheel_perimeter: 2300,
        oem_wheel_divisor: 125,
        battery_voltage_reset_wh_counter_x10: 416,
        battery_max_current: 15,
        target_max_battery_power_div25: 10,
        battery_cells_number: 10,
        battery_pack_resistance_x1000: 180,
        battery_low_voltage_cut_off_x10: 290,
        li_io_cell_overvolt_x100: 225,
        li_io_cell_full_bars_x100: 200,
        li_io_cell_one_bar_x100: 130,
        li_io_cell_empty_x100: 100,
        street_mode_enabled: 0,
        street_mode_power_limit_enabled: 0,
        street_mode_throttle_enabled: 0,
        street_mode_power_limit_div25: 10,
        street_mode_speed_limit: 25,
        emtb_assist_sensitivity: 10,
        power_assist_level: [5, 10, 20, 30],
        torque_assist_level: [15, 40, 65, 90],
        walk_assist_level: [20, 30, 40, 48],
        thermal_control: 0,
    };

    /// Checks every range-restricted field. The first violation found is
    /// reported; nothing is modified.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.motor_type > MOTOR_TYPE_MAX {
            return Err(ConfigError::MotorType(self.motor_type));
        }
        if self.cadence_sensor_mode > CadenceSensorMode::Calibration.as_u8() {
            return Err(ConfigError::CadenceSensorMode(self.cadence_sensor_mode));
        }
        if self.optional_adc_function > OptionalAdcFunction::ThrottleControl.as_u8() {
            return Err(ConfigError::OptionalAdcFunction(self.optional_adc_function));
        }
        if self.battery_cells_number == 0 || self.battery_cells_number > BATTERY_CELLS_MAX {
            return Err(ConfigError::BatteryCells(self.battery_cells_number));
        }
        if self.street_mode_enabled > 1 {
            return Err(ConfigError::StreetModeEnabled(self.street_mode_enabled));
        }
        if self.street_mode_power_limit_enabled > 1 {
            return Err(ConfigError::StreetModePowerLimitEnabled(
                self.street_mode_power_limit_enabled,
            ));
        }
        if self.street_mode_throttle_enabled > 1 {
            return Err(ConfigError::StreetModeThrottleEnabled(
                self.street_mode_throttle_enabled,
            ));
        }
        if self.thermal_control > 1 {
            return Err(ConfigError::ThermalControl(self.thermal_control));
        }
        Ok(())
    }

    pub fn cadence_sensor_mode(&self) -> CadenceSensorMode {
        match self.cadence_sensor_mode {
            1 => CadenceSensorMode::Advanced,
            2 => CadenceSensorMode::Calibration,
            _ => CadenceSensorMode::Standard,
        }
    }

    pub fn optional_adc_function(&self) -> OptionalAdcFunction {
        match self.optional_adc_function {
            1 => OptionalAdcFunction::TemperatureControl,
            2 => OptionalAdcFunction::ThrottleControl,
            _ => OptionalAdcFunction::NotInUse,
        }
    }

    /// Temperature comes from the bridge's own sensor.
    pub fn external_thermal_control(&self) -> bool {
        self.thermal_control != 0
    }

    /// Temperature limits are enforced, from either sensor source.
    pub fn thermal_limits_active(&self) -> bool {
        self.external_thermal_control()
            || self.optional_adc_function() == OptionalAdcFunction::TemperatureControl
    }

    pub fn street_mode(&self) -> bool {
        self.street_mode_enabled != 0
    }

    pub fn temperature_limits_x10(&self) -> (u16, u16) {
        (
            self.motor_temperature_min_value_to_limit as u16 * 10,
            self.motor_temperature_max_value_to_limit as u16 * 10,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── Update outcome ────────────────────────────────────────────────────────────

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigUpdate {
    /// Candidate matched the active configuration; nothing written.
    Unchanged,
    /// Candidate replaced the active configuration and was persisted.
    Applied,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    MotorType(u8),
    CadenceSensorMode(u8),
    OptionalAdcFunction(u8),
    BatteryCells(u8),
    StreetModeEnabled(u8),
    StreetModePowerLimitEnabled(u8),
    StreetModeThrottleEnabled(u8),
    ThermalControl(u8),
}

// ── Persistence blob ──────────────────────────────────────────────────────────

pub const CONFIG_FMT_VERSION: u8 = 1;
pub const CONFIG_PAYLOAD_LEN: usize = 46;
pub const CONFIG_CRC_LEN: usize = 2;
/// Version byte + payload + CRC-16.
pub const CONFIG_BLOB_LEN: usize = 1 + CONFIG_PAYLOAD_LEN + CONFIG_CRC_LEN;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobError {
    InvalidLength,
    UnsupportedVersion(u8),
    CrcMismatch { stored: u16, computed: u16 },
}

struct BlobWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> BlobWriter<'a> {
    fn u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    fn u16(&mut self, v: u16) {
        self.buf[self.pos..self.pos + 2].copy_from_slice(&v.to_le_bytes());
        self.pos += 2;
    }

    fn table(&mut self, v: &[u8; ASSIST_LEVELS]) {
        self.buf[self.pos..self.pos + ASSIST_LEVELS].copy_from_slice(v);
        self.pos += ASSIST_LEVELS;
    }
}

struct BlobReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BlobReader<'a> {
    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn u16(&mut self) -> u16 {
        let v = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        v
    }

    fn table(&mut self) -> [u8; ASSIST_LEVELS] {
        let mut out = [0u8; ASSIST_LEVELS];
        out.copy_from_slice(&self.buf[self.pos..self.pos + ASSIST_LEVELS]);
        self.pos += ASSIST_LEVELS;
        out
    }
}

impl Config {
    pub fn to_bytes(&self) -> [u8; CONFIG_BLOB_LEN] {
        let mut out = [0u8; CONFIG_BLOB_LEN];
        out[0] = CONFIG_FMT_VERSION;
        {
            let mut w = BlobWriter {
                buf: &mut out[1..1 + CONFIG_PAYLOAD_LEN],
                pos: 0,
            };
            w.u8(self.motor_type);
            w.u8(self.motor_temperature_min_value_to_limit);
            w.u8(self.motor_temperature_max_value_to_limit);
            w.u8(self.motor_acceleration);
            w.u8(self.cadence_sensor_mode);
            w.u16(self.cadence_sensor_pulse_high_percentage_x10);
            w.u8(self.pedal_torque_per_10_bit_adc_step_x100);
            w.u8(self.optional_adc_function);
            w.u8(self.assist_without_pedal_rotation_threshold);
            w.u8(self.lights_configuration);
            w.u16(self.wheel_perimeter);
            w.u8(self.oem_wheel_divisor);
            w.u16(self.battery_voltage_reset_wh_counter_x10);
            w.u8(self.battery_max_current);
            w.u8(self.target_max_battery_power_div25);
            w.u8(self.battery_cells_number);
            w.u16(self.battery_pack_resistance_x1000);
            w.u16(self.battery_low_voltage_cut_off_x10);
            w.u8(self.li_io_cell_overvolt_x100);
            w.u8(self.li_io_cell_full_bars_x100);
            w.u8(self.li_io_cell_one_bar_x100);
            w.u8(self.li_io_cell_empty_x100);
            w.u8(self.street_mode_enabled);
            w.u8(self.street_mode_power_limit_enabled);
            w.u8(self.street_mode_throttle_enabled);
            w.u8(self.street_mode_power_limit_div25);
            w.u8(self.street_mode_speed_limit);
            w.u8(self.emtb_assist_sensitivity);
            w.table(&self.power_assist_level);
            w.table(&self.torque_assist_level);
            w.table(&self.walk_assist_level);
            w.u8(self.thermal_control);
            debug_assert_eq!(w.pos, CONFIG_PAYLOAD_LEN);
        }
        let crc = crc16(&out[..1 + CONFIG_PAYLOAD_LEN]);
        out[1 + CONFIG_PAYLOAD_LEN..].copy_from_slice(&crc.to_le_bytes());
        out
    }

    /// Parses a blob produced by [`Config::to_bytes`]. Range checks are left
    /// to [`Config::validate`].
    pub fn from_bytes(raw: &[u8]) -> Result<Self, BlobError> {
        if raw.len() != CONFIG_BLOB_LEN {
            return Err(BlobError::InvalidLength);
        }
        if raw[0] != CONFIG_FMT_VERSION {
            return Err(BlobError::UnsupportedVersion(raw[0]));
        }
        let body_len = 1 + CONFIG_PAYLOAD_LEN;
        let stored = u16::from_le_bytes([raw[body_len], raw[body_len + 1]]);
        let computed = crc16(&raw[..body_len]);
        if stored != computed {
            return Err(BlobError::CrcMismatch { stored, computed });
        }

        let mut r = BlobReader {
            buf: &raw[1..body_len],
            pos: 0,
        };
        Ok(Config {
            motor_type: r.u8(),
            motor_temperature_min_value_to_limit: r.u8(),
            motor_temperature_max_value_to_limit: r.u8(),
            motor_acceleration: r.u8(),
            cadence_sensor_mode: r.u8(),
            cadence_sensor_pulse_high_percentage_x10: r.u16(),
            pedal_torque_per_10_bit_adc_step_x100: r.u8(),
            optional_adc_function: r.u8(),
            assist_without_pedal_rotation_threshold: r.u8(),
            lights_configuration: r.u8(),
            wheel_perimeter: r.u16(),
            oem_wheel_divisor: r.u8(),
            battery_voltage_reset_wh_counter_x10: r.u16(),
            battery_max_current: r.u8(),
            target_max_battery_power_div25: r.u8(),
            battery_cells_number: r.u8(),
            battery_pack_resistance_x1000: r.u16(),
            battery_low_voltage_cut_off_x10: r.u16(),
            li_io_cell_overvolt_x100: r.u8(),
            li_io_cell_full_bars_x100: r.u8(),
            li_io_cell_one_bar_x100: r.u8(),
            li_io_cell_empty_x100: r.u8(),
            street_mode_enabled: r.u8(),
            street_mode_power_limit_enabled: r.u8(),
            street_mode_throttle_enabled: r.u8(),
            street_mode_power_limit_div25: r.u8(),
            street_mode_speed_limit: r.u8(),
            emtb_assist_sensitivity: r.u8(),
            power_assist_level: r.table(),
            torque_assist_level: r.table(),
            walk_assist_level: r.table(),
            thermal_control: r.u8(),
        })
    }

    /// Loads a stored blob, falling back to defaults if it is missing,
    /// corrupt or out of range.
    pub fn from_stored(raw: &[u8]) -> Self {
        match Config::from_bytes(raw) {
            Ok(cfg) => match cfg.validate() {
                Ok(()) => cfg,
                Err(e) => {
                    warn!("stored config out of range: {:?}, using defaults", e);
                    Config::DEFAULT
                }
            },
            Err(e) => {
                warn!("stored config unreadable: {:?}, using defaults", e);
                Config::DEFAULT
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Config::DEFAULT.validate(), Ok(()));
    }

    #[test]
    fn out_of_range_fields_are_named() {
        let mut cfg = Config::DEFAULT;
        cfg.battery_cells_number = 16;
        assert_eq!(cfg.validate(), Err(ConfigError::BatteryCells(16)));

        let mut cfg = Config::DEFAULT;
        cfg.battery_cells_number = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::BatteryCells(0)));

        let mut cfg = Config::DEFAULT;
        cfg.motor_type = 4;
        assert_eq!(cfg.validate(), Err(ConfigError::MotorType(4)));

        let mut cfg = Config::DEFAULT;
        cfg.cadence_sensor_mode = 3;
        assert_eq!(cfg.validate(), Err(ConfigError::CadenceSensorMode(3)));

        let mut cfg = Config::DEFAULT;
        cfg.optional_adc_function = 3;
        assert_eq!(cfg.validate(), Err(ConfigError::OptionalAdcFunction(3)));

        let mut cfg = Config::DEFAULT;
        cfg.street_mode_power_limit_enabled = 2;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::StreetModePowerLimitEnabled(2))
        );
    }

    #[test]
    fn boundary_values_are_accepted() {
        let mut cfg = Config::DEFAULT;
        cfg.motor_type = MOTOR_TYPE_MAX;
        cfg.cadence_sensor_mode = CadenceSensorMode::Calibration.as_u8();
        cfg.optional_adc_function = OptionalAdcFunction::ThrottleControl.as_u8();
        cfg.battery_cells_number = BATTERY_CELLS_MAX;
        cfg.street_mode_enabled = 1;
        cfg.street_mode_power_limit_enabled = 1;
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn blob_layout_is_stable() {
        let raw = Config::DEFAULT.to_bytes();
        assert_eq!(raw.len(), CONFIG_BLOB_LEN);
        assert_eq!(raw[0], CONFIG_FMT_VERSION);
        // motor_type, temp min, temp max
        assert_eq!(&raw[1..4], &[1, 65, 80]);
        // cadence pulse high percentage x10 = 500, little endian
        assert_eq!(&raw[6..8], &[0xF4, 0x01]);
        // walk assist table, then thermal control flag
        assert_eq!(&raw[42..46], &[20, 30, 40, 48]);
        assert_eq!(raw[46], 0);
        assert_eq!(Config::from_bytes(&raw), Ok(Config::DEFAULT));
    }

    #[test]
    fn blob_rejects_corruption() {
        let mut raw = Config::DEFAULT.to_bytes();
        raw[10] ^= 0x01;
        assert!(matches!(
            Config::from_bytes(&raw),
            Err(BlobError::CrcMismatch { .. })
        ));

        let mut raw = Config::DEFAULT.to_bytes();
        raw[0] = CONFIG_FMT_VERSION + 1;
        assert_eq!(
            Config::from_bytes(&raw),
            Err(BlobError::UnsupportedVersion(CONFIG_FMT_VERSION + 1))
        );

        assert_eq!(
            Config::from_bytes(&raw[..CONFIG_BLOB_LEN - 1]),
            Err(BlobError::InvalidLength)
        );
    }

    #[test]
    fn stored_blob_falls_back_to_defaults() {
        let mut cfg = Config::DEFAULT;
        cfg.motor_type = 2;
        assert_eq!(Config::from_stored(&cfg.to_bytes()), cfg);

        cfg.battery_cells_number = 20;
        assert_eq!(Config::from_stored(&cfg.to_bytes()), Config::DEFAULT);

        assert_eq!(Config::from_stored(&[0xFF; CONFIG_BLOB_LEN]), Config::DEFAULT);
    }
}
