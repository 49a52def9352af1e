//! The bridge state owner.
//!
//! [`Bridge`] holds every piece of mutable state and exposes one method per
//! entry point (inbound frame, outbound frame request, tick, configuration
//! update). [`SharedBridge`] wraps it in a single blocking mutex so that each
//! entry point runs to completion before the next one starts, and an encoder
//! can never observe a half-applied configuration.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::battery::{self, BatteryFault, CellThresholds};
use crate::config::{Config, ConfigError, ConfigUpdate};
use crate::energy::EnergyAccumulator;
use crate::filter::LowPassFilter;
use crate::protocol::command::{self, ControllerCommand, MessageIndex, PageInputs, COMMAND_LEN};
use crate::protocol::controller::{self, ControllerTelemetry, CONTROLLER_FRAME_LEN};
use crate::protocol::display::{
    self, LegacyStatus, DISPLAY_CONTROL_LEN, LEGACY_STATUS_LEN, WORKING_KEEP_AWAKE,
    WORKING_UNDERVOLTAGE,
};
use crate::riding;
use crate::state::{ControllerFault, DebugData, DisplayFault, Status};
use crate::thermal::{self, TemperatureFault};

/// Weight (percent) kept from the previous external temperature reading.
pub const TEMPERATURE_FILTER_ALPHA: u8 = 80;

/// Storage collaborator. Calls are made with the bridge locked, so
/// implementations must not block.
pub trait Persistence {
    fn save_config(&mut self, config: &Config);
    fn save_wh_offset(&mut self, wh_x10: u32);
}

/// Latest settings read from the legacy display.
#[derive(Debug, Clone, Copy, Default)]
struct DisplayLink {
    wheel_diameter: u8,
    lights: bool,
    max_speed: u8,
}

pub struct Bridge<P: Persistence> {
    status: Status,
    debug: DebugData,
    config: Config,
    cadence_calibration: bool,
    display: DisplayLink,
    energy: EnergyAccumulator,
    temperature_fault: TemperatureFault,
    temperature_filter: LowPassFilter,
    message_index: MessageIndex,
    store: P,
}

impl<P: Persistence> Bridge<P> {
    /// `config` and `wh_offset_x10` are whatever the storage collaborator
    /// loaded at boot.
    pub fn new(config: Config, wh_offset_x10: u32, store: P) -> Self {
        let status = Status::default();
        let energy = EnergyAccumulator::new(wh_offset_x10);
        Self {
            status: Status {
                battery_wh: energy.battery_wh(),
                ..status
            },
            debug: DebugData::default(),
            config,
            cadence_calibration: false,
            display: DisplayLink::default(),
            energy,
            temperature_fault: TemperatureFault::new(),
            temperature_filter: LowPassFilter::seeded(
                TEMPERATURE_FILTER_ALPHA,
                status.motor_temperature_x10 as u32,
            ),
            message_index: MessageIndex::new(),
            store,
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn debug(&self) -> &DebugData {
        &self.debug
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cadence_calibration(&self) -> bool {
        self.cadence_calibration
    }

    pub fn energy(&self) -> &EnergyAccumulator {
        &self.energy
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    pub fn process_controller_frame(&mut self, frame: &[u8; CONTROLLER_FRAME_LEN]) {
        let t = controller::decode(frame);

        self.status.battery_voltage_x1000 = t.battery_voltage_x1000;
        self.status.battery_current_x10 = t.battery_current_x10;
        self.energy
            .update_power(t.battery_voltage_x1000, t.battery_current_x10);

        self.status.wheel_speed_x10 = t.wheel_speed_x10;
        self.status.braking = t.braking;
        self.status.pedal_cadence_rpm = t.pedal_cadence_rpm;
        self.status.pedal_power_x10 = t.pedal_power_x10;
        self.status.controller_fault = ControllerFault::from(t.system_state);

        self.debug.adc_throttle = t.adc_throttle;
        self.debug.throttle = t.throttle;
        self.debug.adc_pedal_torque_sensor = t.adc_pedal_torque_sensor;
        self.debug.duty_cycle = t.duty_cycle;
        self.debug.motor_speed_erps = t.motor_speed_erps;
        self.debug.foc_angle = t.foc_angle;
        self.debug.pedal_torque_x100 = t.pedal_torque_x100;
        self.debug.cadence_pulse_high_percentage_x10 = t.cadence_pulse_high_percentage_x10;
        self.debug.wheel_speed_sensor_tick_counter = t.wheel_speed_sensor_ticks;

        // With an external sensor the controller's reading is not meaningful.
        if !self.config.external_thermal_control() {
            self.status.motor_temperature_x10 = t.motor_temperature as u16 * 10;
        }

        if self.config.thermal_limits_active() {
            let (min_x10, max_x10) = self.config.temperature_limits_x10();
            self.status.controller_fault = thermal::controller_override(
                self.status.controller_fault,
                self.status.motor_temperature_x10,
                min_x10,
                max_x10,
            );
        }
    }

    pub fn process_display_frame(&mut self, frame: &[u8; DISPLAY_CONTROL_LEN]) {
        let c = display::decode_control(frame);

        if let Some(level) = c.assist_level {
            self.status.assist_level = level;
        }
        self.display.wheel_diameter = c.wheel_diameter;
        self.status.riding_mode =
            riding::riding_mode(self.cadence_calibration, c.walk_assist, c.wheel_diameter);
        self.display.lights = c.lights;
        self.display.max_speed = c.max_speed;
    }

    /// Reading from the bridge's own motor temperature sensor. Ignored unless
    /// the configuration selects the external sensor.
    pub fn set_motor_temperature_x10(&mut self, temperature_x10: u16) {
        let smoothed = self.temperature_filter.filter(temperature_x10 as u32);
        if self.config.external_thermal_control() {
            self.status.motor_temperature_x10 = smoothed.min(u16::MAX as u32) as u16;
        }
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    pub fn legacy_status_frame(&mut self) -> [u8; LEGACY_STATUS_LEN] {
        let cell = battery::cell_voltage_x100(
            self.status.battery_voltage_x1000,
            self.config.battery_cells_number,
        );
        let battery = battery::battery_level(cell, &CellThresholds::from(&self.config));

        let mut working_status = 0;
        let mut fault = DisplayFault::None;
        match battery.fault {
            Some(BatteryFault::Overvoltage) => fault = DisplayFault::Overvoltage,
            Some(BatteryFault::Undervoltage) => working_status |= WORKING_UNDERVOLTAGE,
            None => {}
        }
        if self.status.battery_current_x10 != 0 || self.status.wheel_speed_x10 != 0 {
            working_status |= WORKING_KEEP_AWAKE;
        }

        match self.status.controller_fault {
            ControllerFault::MotorBlocked => fault = DisplayFault::MotorBlocked,
            ControllerFault::TorqueSensor => fault = DisplayFault::TorqueSensor,
            ControllerFault::CadenceSensorCalibration => {
                fault = DisplayFault::CadenceSensorCalibration
            }
            _ => {}
        }

        if self.config.thermal_limits_active() {
            let (min_x10, max_x10) = self.config.temperature_limits_x10();
            if self.temperature_fault.evaluate(
                self.status.motor_temperature_x10,
                min_x10,
                max_x10,
            ) {
                fault = DisplayFault::Overtemperature;
            }
        }

        display::encode_status(&LegacyStatus {
            battery_level: battery.level,
            working_status,
            fault,
            wheel_period: display::wheel_period(
                self.display.wheel_diameter,
                self.status.wheel_speed_x10,
            ),
        })
    }

    pub fn extended_status_frame(&self) -> [u8; CONTROLLER_FRAME_LEN] {
        display::encode_extended_status(&ControllerTelemetry {
            battery_voltage_x1000: self.status.battery_voltage_x1000,
            battery_current_x10: self.status.battery_current_x10,
            wheel_speed_x10: self.status.wheel_speed_x10,
            braking: self.status.braking,
            adc_throttle: self.debug.adc_throttle,
            throttle: self.debug.throttle,
            adc_pedal_torque_sensor: self.debug.adc_pedal_torque_sensor,
            pedal_cadence_rpm: self.status.pedal_cadence_rpm,
            duty_cycle: self.debug.duty_cycle,
            motor_speed_erps: self.debug.motor_speed_erps,
            foc_angle: self.debug.foc_angle,
            system_state: self.status.controller_fault.into(),
            motor_temperature: (self.status.motor_temperature_x10 / 10).min(u8::MAX as u16) as u8,
            wheel_speed_sensor_ticks: self.debug.wheel_speed_sensor_tick_counter,
            pedal_torque_x100: self.debug.pedal_torque_x100,
            pedal_power_x10: self.status.pedal_power_x10,
            cadence_pulse_high_percentage_x10: self.debug.cadence_pulse_high_percentage_x10,
        })
    }

    pub fn controller_command_frame(&mut self) -> [u8; COMMAND_LEN] {
        let message_id = self.message_index.next();
        let mode = self.status.riding_mode;
        let inputs = PageInputs {
            motor_temperature_x10: self.status.motor_temperature_x10,
            cadence_calibration: self.cadence_calibration,
            display_max_speed: self.display.max_speed,
        };

        ControllerCommand {
            message_id,
            riding_mode: mode.as_u8(),
            mode_parameter: command::mode_parameter(mode, self.status.assist_level, &self.config),
            lights: self.display.lights,
            page: command::config_page(message_id, &self.config, &inputs),
        }
        .encode()
    }

    // ── Periodic ──────────────────────────────────────────────────────────────

    /// Fixed 100 ms tick.
    pub fn tick(&mut self) {
        if let Some(wh_x10) = self.energy.tick(
            self.status.battery_voltage_x1000,
            self.config.battery_voltage_reset_wh_counter_x10,
        ) {
            self.store.save_wh_offset(wh_x10);
        }
        self.status.battery_wh = self.energy.battery_wh();
    }

    // ── Configuration ─────────────────────────────────────────────────────────

    /// Replaces the configuration wholesale if `candidate` differs and is
    /// fully in range. The calibration flag is owned by the caller and is
    /// taken as given.
    pub fn update_config(
        &mut self,
        candidate: Config,
        cadence_calibration: bool,
    ) -> Result<ConfigUpdate, ConfigError> {
        self.cadence_calibration = cadence_calibration;

        if candidate == self.config {
            info!("config unchanged");
            return Ok(ConfigUpdate::Unchanged);
        }

        if let Err(e) = candidate.validate() {
            warn!("config rejected: {:?}", e);
            return Err(e);
        }

        self.config = candidate;
        self.store.save_config(&self.config);
        info!("config applied");
        Ok(ConfigUpdate::Applied)
    }
}

/// The bridge behind its one lock.
pub struct SharedBridge<M: RawMutex, P: Persistence> {
    inner: Mutex<M, RefCell<Bridge<P>>>,
}

impl<M: RawMutex, P: Persistence> SharedBridge<M, P> {
    pub fn new(bridge: Bridge<P>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(bridge)),
        }
    }

    /// Runs `f` with exclusive access to the bridge.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Bridge<P>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}
