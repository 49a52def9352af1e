//! Motor over-temperature handling.
//!
//! Two independent pieces: the controller-side override applied while
//! decoding telemetry, and the blink state machine that decides whether the
//! legacy display shows the over-temperature code on a given status frame.

use crate::filter::map;
use crate::state::ControllerFault;

/// Blink half-period (in status frames) just above the lower limit.
pub const BLINK_PERIOD_SLOW: u8 = 16;
/// Blink half-period (in status frames) just below the upper limit.
pub const BLINK_PERIOD_FAST: u8 = 4;

/// Replaces an otherwise clean controller state with a temperature fault
/// when the motor is inside or above the limiting band. Faults reported by
/// the controller itself are never masked.
pub fn controller_override(
    reported: ControllerFault,
    temperature_x10: u16,
    min_x10: u16,
    max_x10: u16,
) -> ControllerFault {
    if reported != ControllerFault::None {
        return reported;
    }
    if temperature_x10 >= max_x10 {
        ControllerFault::TemperatureMax
    } else if temperature_x10 > min_x10 {
        ControllerFault::TemperatureLimit
    } else {
        ControllerFault::None
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureFaultState {
    #[default]
    Normal,
    RisingBlink,
    Latched,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemperatureFault {
    state: TemperatureFaultState,
    blink_on: bool,
    blink_counter: u8,
}

impl TemperatureFault {
    pub const fn new() -> Self {
        Self {
            state: TemperatureFaultState::Normal,
            blink_on: false,
            blink_counter: 0,
        }
    }

    pub fn state(&self) -> TemperatureFaultState {
        self.state
    }

    /// Advances the machine by one status frame and returns whether the
    /// over-temperature code should be shown in it.
    pub fn evaluate(&mut self, temperature_x10: u16, min_x10: u16, max_x10: u16) -> bool {
        if temperature_x10 >= max_x10 {
            self.enter(TemperatureFaultState::Latched);
            return true;
        }

        if temperature_x10 <= min_x10 {
            self.state = TemperatureFaultState::Normal;
            self.blink_on = false;
            self.blink_counter = 0;
            return false;
        }

        match self.state {
            // Stays solid until the motor is back below the lower limit.
            TemperatureFaultState::Latched => true,
            TemperatureFaultState::Normal => {
                self.enter(TemperatureFaultState::RisingBlink);
                true
            }
            TemperatureFaultState::RisingBlink => {
                let period = blink_period(temperature_x10, min_x10, max_x10);
                self.blink_counter = self.blink_counter.saturating_add(1);
                if self.blink_counter > period {
                    self.blink_counter = 0;
                    self.blink_on = !self.blink_on;
                }
                self.blink_on
            }
        }
    }

    fn enter(&mut self, state: TemperatureFaultState) {
        self.state = state;
        self.blink_on = true;
        self.blink_counter = 0;
    }
}

/// Half-period in frames, shrinking linearly as the motor heats up.
pub fn blink_period(temperature_x10: u16, min_x10: u16, max_x10: u16) -> u8 {
    map(
        temperature_x10 as i32,
        min_x10 as i32,
        max_x10 as i32,
        BLINK_PERIOD_SLOW as i32,
        BLINK_PERIOD_FAST as i32,
    ) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: u16 = 650;
    const MAX: u16 = 800;

    #[test]
    fn blinks_at_fixed_period_inside_band() {
        let mut fault = TemperatureFault::new();
        assert_eq!(blink_period(725, MIN, MAX), 10);

        let mut shown = [false; 44];
        for slot in shown.iter_mut() {
            *slot = fault.evaluate(725, MIN, MAX);
        }
        // half-period 10 -> each phase lasts 11 frames
        for (i, &s) in shown.iter().enumerate() {
            let expected_on = (i / 11) % 2 == 0;
            assert_eq!(s, expected_on, "frame {}", i);
        }
        assert_eq!(fault.state(), TemperatureFaultState::RisingBlink);
    }

    #[test]
    fn blink_speeds_up_with_temperature() {
        assert_eq!(blink_period(651, MIN, MAX), 16);
        assert_eq!(blink_period(799, MIN, MAX), 5);
        assert_eq!(blink_period(MAX, MIN, MAX), 4);
        assert!(blink_period(700, MIN, MAX) > blink_period(780, MIN, MAX));
    }

    #[test]
    fn latched_stays_solid_until_below_min() {
        let mut fault = TemperatureFault::new();
        assert!(fault.evaluate(800, MIN, MAX));
        assert_eq!(fault.state(), TemperatureFaultState::Latched);

        // Cooling back into the band does not resume blinking.
        for _ in 0..100 {
            assert!(fault.evaluate(700, MIN, MAX));
        }
        assert_eq!(fault.state(), TemperatureFaultState::Latched);

        assert!(!fault.evaluate(650, MIN, MAX));
        assert_eq!(fault.state(), TemperatureFaultState::Normal);

        // Re-entering the band starts a fresh blink cycle with the code shown.
        assert!(fault.evaluate(700, MIN, MAX));
        assert_eq!(fault.state(), TemperatureFaultState::RisingBlink);
    }

    #[test]
    fn blinking_escalates_to_latched() {
        let mut fault = TemperatureFault::new();
        for _ in 0..30 {
            fault.evaluate(700, MIN, MAX);
        }
        assert!(fault.evaluate(850, MIN, MAX));
        assert_eq!(fault.state(), TemperatureFaultState::Latched);
    }

    #[test]
    fn override_respects_reported_faults() {
        assert_eq!(
            controller_override(ControllerFault::None, 700, MIN, MAX),
            ControllerFault::TemperatureLimit
        );
        assert_eq!(
            controller_override(ControllerFault::None, 800, MIN, MAX),
            ControllerFault::TemperatureMax
        );
        assert_eq!(
            controller_override(ControllerFault::None, 650, MIN, MAX),
            ControllerFault::None
        );
        assert_eq!(
            controller_override(ControllerFault::MotorBlocked, 900, MIN, MAX),
            ControllerFault::MotorBlocked
        );
    }
}
