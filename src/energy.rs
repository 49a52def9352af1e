//! Watt-hour integrator, run from the fixed 100 ms tick.

use crate::filter::filter;

/// Ticks per hour at the 100 ms tick rate. Summing power x10 once per tick
/// and dividing by this yields Wh x10.
pub const WH_NORMALIZER: u32 = 36_000;
/// Weight (percent) kept from the previous power estimate on each frame.
pub const POWER_FILTER_ALPHA: u8 = 72;
pub const INITIAL_FILTERED_POWER_X10: u16 = 100;

#[derive(Debug, Clone, Copy)]
pub struct EnergyAccumulator {
    filtered_power_x10: u16,
    /// Power samples not yet worth a whole Wh x10; always below `WH_NORMALIZER`.
    running_sum_x10: u32,
    /// Wh x10 integrated since boot.
    accrued_wh_x10: u32,
    offset_wh_x10: u32,
    wh_x10: u32,
    last_persisted_wh: u32,
    reset_done: bool,
}

impl EnergyAccumulator {
    /// `offset_wh_x10` is the value last persisted before power-off.
    pub fn new(offset_wh_x10: u32) -> Self {
        Self {
            filtered_power_x10: INITIAL_FILTERED_POWER_X10,
            running_sum_x10: 0,
            accrued_wh_x10: 0,
            offset_wh_x10,
            wh_x10: offset_wh_x10,
            last_persisted_wh: offset_wh_x10 / 10,
            reset_done: false,
        }
    }

    /// Folds one telemetry sample into the smoothed battery power.
    pub fn update_power(&mut self, battery_voltage_x1000: u16, battery_current_x10: u8) {
        let power_x10 = battery_voltage_x1000 as u32 * battery_current_x10 as u32 / 1000;
        self.filtered_power_x10 =
            filter(power_x10, self.filtered_power_x10 as u32, POWER_FILTER_ALPHA).min(u16::MAX as u32)
                as u16;
    }

    /// Advances one tick. Returns the value to persist when the total just
    /// crossed a whole-Wh boundary.
    pub fn tick(&mut self, battery_voltage_x1000: u16, reset_threshold_x10: u16) -> Option<u32> {
        if !self.reset_done && battery_voltage_x1000 as u32 > reset_threshold_x10 as u32 * 100 {
            self.reset_done = true;
            self.offset_wh_x10 = 0;
        }

        self.running_sum_x10 += self.filtered_power_x10 as u32;
        self.accrued_wh_x10 = self
            .accrued_wh_x10
            .saturating_add(self.running_sum_x10 / WH_NORMALIZER);
        self.running_sum_x10 %= WH_NORMALIZER;
        self.wh_x10 = self.offset_wh_x10.saturating_add(self.accrued_wh_x10);

        let whole_wh = self.wh_x10 / 10;
        if whole_wh != self.last_persisted_wh {
            self.last_persisted_wh = whole_wh;
            Some(self.wh_x10)
        } else {
            None
        }
    }

    pub fn wh_x10(&self) -> u32 {
        self.wh_x10
    }

    pub fn battery_wh(&self) -> u16 {
        (self.wh_x10 / 10).min(u16::MAX as u32) as u16
    }

    pub fn filtered_power_x10(&self) -> u16 {
        self.filtered_power_x10
    }

    pub fn offset_wh_x10(&self) -> u32 {
        self.offset_wh_x10
    }

    #[cfg(test)]
    pub(crate) fn set_filtered_power_x10(&mut self, p: u16) {
        self.filtered_power_x10 = p;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_RESET: u16 = u16::MAX;

    #[test]
    fn one_window_adds_exactly_the_sustained_power() {
        let mut acc = EnergyAccumulator::new(0);
        acc.set_filtered_power_x10(2500); // 250 W
        let mut writes = 0;
        for _ in 0..WH_NORMALIZER {
            if acc.tick(36_000, NO_RESET).is_some() {
                writes += 1;
            }
        }
        // 250 W for one hour
        assert_eq!(acc.wh_x10(), 2500);
        assert_eq!(acc.battery_wh(), 250);
        assert_eq!(writes, 250);
    }

    #[test]
    fn persistence_fires_once_per_whole_wh() {
        let mut acc = EnergyAccumulator::new(0);
        acc.set_filtered_power_x10(100);
        let mut persisted = [0u32; 4];
        let mut n = 0;
        // 100 x10 per tick -> 1 Wh x10 every 360 ticks, 1 Wh every 3600
        for _ in 0..4 * 3600 {
            if let Some(v) = acc.tick(36_000, NO_RESET) {
                persisted[n] = v;
                n += 1;
            }
        }
        assert_eq!(n, 4);
        assert_eq!(persisted, [10, 20, 30, 40]);
    }

    #[test]
    fn offset_carries_over_and_does_not_persist_immediately() {
        let mut acc = EnergyAccumulator::new(123);
        acc.set_filtered_power_x10(0);
        assert_eq!(acc.tick(36_000, NO_RESET), None);
        assert_eq!(acc.wh_x10(), 123);
        assert_eq!(acc.battery_wh(), 12);
    }

    #[test]
    fn fresh_charge_resets_offset_once() {
        let mut acc = EnergyAccumulator::new(500);
        acc.set_filtered_power_x10(0);

        // 41.6 V threshold, pack at 42.0 V
        assert_eq!(acc.tick(42_000, 416), Some(0));
        assert_eq!(acc.wh_x10(), 0);
        assert_eq!(acc.offset_wh_x10(), 0);

        // Consumption after the reset is not wiped by a later excursion.
        acc.set_filtered_power_x10(36_000);
        acc.tick(30_000, 416);
        assert_eq!(acc.wh_x10(), 1);
        acc.tick(42_000, 416);
        assert_eq!(acc.wh_x10(), 2);
    }

    #[test]
    fn threshold_is_strict() {
        let mut acc = EnergyAccumulator::new(500);
        acc.set_filtered_power_x10(0);
        assert_eq!(acc.tick(41_600, 416), None);
        assert_eq!(acc.wh_x10(), 500);
    }

    #[test]
    fn long_session_keeps_counting() {
        let mut acc = EnergyAccumulator::new(0);
        acc.set_filtered_power_x10(u16::MAX);
        // Past the point where a raw u32 sum of power samples would wrap.
        let ticks: u32 = 70_000;
        let mut last = 0;
        for _ in 0..ticks {
            acc.tick(36_000, NO_RESET);
            assert!(acc.wh_x10() >= last);
            last = acc.wh_x10();
        }
        let expected = (ticks as u64 * u16::MAX as u64 / WH_NORMALIZER as u64) as u32;
        assert_eq!(acc.wh_x10(), expected);
    }

    #[test]
    fn power_estimate_is_smoothed() {
        let mut acc = EnergyAccumulator::new(0);
        // 40 V * 10 A = 400 W -> 4000 x10
        acc.update_power(40_000, 100);
        let first = acc.filtered_power_x10();
        assert!(first > INITIAL_FILTERED_POWER_X10 && first < 4000);
        for _ in 0..200 {
            acc.update_power(40_000, 100);
        }
        assert_eq!(acc.filtered_power_x10(), 4000);
    }
}
