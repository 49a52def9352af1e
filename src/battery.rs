//! Battery bar-graph level for the legacy display.

use crate::config::Config;
use crate::filter::map;

pub const LEVEL_EMPTY: u8 = 0;
pub const LEVEL_ONE_BAR: u8 = 1;
pub const LEVEL_FULL: u8 = 12;

/// Offset of the per-cell threshold encoding (`cell_mV / 10 - 200`).
const CELL_THRESHOLD_OFFSET_X100: u16 = 200;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryFault {
    Overvoltage,
    Undervoltage,
}

/// Per-cell thresholds, all in the offset encoding used by [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellThresholds {
    pub overvolt: u16,
    pub full_bars: u16,
    pub one_bar: u16,
    pub empty: u16,
}

impl From<&Config> for CellThresholds {
    fn from(cfg: &Config) -> Self {
        Self {
            overvolt: cfg.li_io_cell_overvolt_x100 as u16,
            full_bars: cfg.li_io_cell_full_bars_x100 as u16,
            one_bar: cfg.li_io_cell_one_bar_x100 as u16,
            empty: cfg.li_io_cell_empty_x100 as u16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryLevel {
    pub level: u8,
    pub fault: Option<BatteryFault>,
}

/// Pack voltage to per-cell voltage in threshold encoding. Saturates at zero
/// so an unpowered pack reads as empty instead of wrapping to full.
pub fn cell_voltage_x100(battery_voltage_x1000: u16, cells: u8) -> u16 {
    let cells = cells.max(1) as u16;
    (battery_voltage_x1000 / 10 / cells).saturating_sub(CELL_THRESHOLD_OFFSET_X100)
}

pub fn battery_level(cell_voltage_x100: u16, t: &CellThresholds) -> BatteryLevel {
    if cell_voltage_x100 > t.overvolt {
        BatteryLevel {
            level: LEVEL_FULL,
            fault: Some(BatteryFault::Overvoltage),
        }
    } else if cell_voltage_x100 > t.full_bars {
        BatteryLevel {
            level: LEVEL_FULL,
            fault: None,
        }
    } else if cell_voltage_x100 < t.empty {
        BatteryLevel {
            level: LEVEL_EMPTY,
            fault: Some(BatteryFault::Undervoltage),
        }
    } else if cell_voltage_x100 < t.one_bar {
        BatteryLevel {
            level: LEVEL_ONE_BAR,
            fault: None,
        }
    } else {
        let level = map(
            cell_voltage_x100 as i32,
            t.one_bar as i32,
            t.full_bars as i32,
            2,
            LEVEL_FULL as i32,
        );
        BatteryLevel {
            level: level.clamp(2, LEVEL_FULL as i32) as u8,
            fault: None,
        }
    }
}
