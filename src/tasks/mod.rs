use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use ebike_bridge::bridge::SharedBridge;

use self::storage_task::PersistQueue;

pub mod console_task;
pub mod controller_task;
pub mod display_task;
pub mod energy_task;
pub mod storage_task;
pub mod thermal_task;

pub type BridgeHandle = SharedBridge<CriticalSectionRawMutex, PersistQueue>;
