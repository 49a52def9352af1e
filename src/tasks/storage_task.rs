use embassy_executor::task;
use embassy_stm32::dma::NoDma;
use embassy_stm32::peripherals::SPI3;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};

use ebike_bridge::bridge::Persistence;
use ebike_bridge::config::{Config, CONFIG_BLOB_LEN};
use ebike_bridge::crc::crc16;

use crate::drivers::flash::{FlashError, W25qxx, SECTOR_SIZE};

pub type Flash = W25qxx<'static, SPI3, NoDma, NoDma>;

pub const QUEUE_DEPTH: usize = 4;

// ── Flash layout: one sector per record ───────────────────────────────────────
const CONFIG_ADDR: u32 = 0;
const WH_ADDR: u32 = SECTOR_SIZE;
const WH_RECORD_LEN: usize = 6;

#[derive(Clone, Copy)]
pub enum PersistRequest {
    Config([u8; CONFIG_BLOB_LEN]),
    WhOffset(u32),
}

/// Non-blocking [`Persistence`] that hands every write to [`storage_task`].
pub struct PersistQueue {
    tx: Sender<'static, CriticalSectionRawMutex, PersistRequest, QUEUE_DEPTH>,
}

impl PersistQueue {
    pub fn new(tx: Sender<'static, CriticalSectionRawMutex, PersistRequest, QUEUE_DEPTH>) -> Self {
        Self { tx }
    }
}

impl Persistence for PersistQueue {
    fn save_config(&mut self, config: &Config) {
        if self.tx.try_send(PersistRequest::Config(config.to_bytes())).is_err() {
            defmt::warn!("persist queue full, config write dropped");
        }
    }

    fn save_wh_offset(&mut self, wh_x10: u32) {
        if self.tx.try_send(PersistRequest::WhOffset(wh_x10)).is_err() {
            defmt::warn!("persist queue full, wh offset {} dropped", wh_x10);
        }
    }
}

/// Reads the persisted configuration and Wh offset. Anything unreadable
/// falls back to defaults.
pub async fn load(flash: &mut Flash) -> (Config, u32) {
    let mut blob = [0u8; CONFIG_BLOB_LEN];
    let config = match flash.read(CONFIG_ADDR, &mut blob).await {
        Ok(()) => Config::from_stored(&blob),
        Err(e) => {
            defmt::warn!("config read failed: {}", e);
            Config::DEFAULT
        }
    };

    let mut record = [0u8; WH_RECORD_LEN];
    let wh_x10 = match flash.read(WH_ADDR, &mut record).await {
        Ok(()) => decode_wh(&record).unwrap_or(0),
        Err(e) => {
            defmt::warn!("wh offset read failed: {}", e);
            0
        }
    };

    defmt::info!("loaded config (motor type {}), wh offset {}", config.motor_type, wh_x10);
    (config, wh_x10)
}

fn encode_wh(wh_x10: u32) -> [u8; WH_RECORD_LEN] {
    let mut record = [0u8; WH_RECORD_LEN];
    record[..4].copy_from_slice(&wh_x10.to_le_bytes());
    let crc = crc16(&record[..4]);
    record[4..].copy_from_slice(&crc.to_le_bytes());
    record
}

fn decode_wh(record: &[u8; WH_RECORD_LEN]) -> Option<u32> {
    let crc = u16::from_le_bytes([record[4], record[5]]);
    if crc16(&record[..4]) != crc {
        return None;
    }
    Some(u32::from_le_bytes([record[0], record[1], record[2], record[3]]))
}

async fn write_record(flash: &mut Flash, addr: u32, data: &[u8]) -> Result<(), FlashError> {
    flash.erase_sector(addr).await?;
    flash.program_page(addr, data).await
}

/// Storage task: drains persistence requests into the SPI flash.
#[task]
pub async fn storage_task(
    mut flash: Flash,
    rx: Receiver<'static, CriticalSectionRawMutex, PersistRequest, QUEUE_DEPTH>,
) {
    loop {
        let r = match rx.receive().await {
            PersistRequest::Config(blob) => write_record(&mut flash, CONFIG_ADDR, &blob).await,
            PersistRequest::WhOffset(wh_x10) => {
                write_record(&mut flash, WH_ADDR, &encode_wh(wh_x10)).await
            }
        };
        if let Err(e) = r {
            defmt::warn!("flash write failed: {}", e);
        }
    }
}
