use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::spi::{Error, Instance, Spi};
use embassy_time::{Duration, Timer};

const CMD_JEDEC_ID: u8 = 0x9F;
const CMD_READ_DATA: u8 = 0x03;
const CMD_WRITE_ENABLE: u8 = 0x06;
const CMD_PAGE_PROGRAM: u8 = 0x02;
const CMD_SECTOR_ERASE: u8 = 0x20;
const CMD_READ_STATUS1: u8 = 0x05;

const STATUS_BUSY: u8 = 0x01;

pub const SECTOR_SIZE: u32 = 4096;
pub const PAGE_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum FlashError {
    Spi,
    /// Write would cross a page boundary.
    PageOverflow,
}

impl From<Error> for FlashError {
    fn from(_: Error) -> Self {
        FlashError::Spi
    }
}

pub struct W25qxx<'d, T: Instance, Tx, Rx> {
    spi: Spi<'d, T, Tx, Rx>,
    cs: Output<'d, AnyPin>,
}

impl<'d, T: Instance, Tx, Rx> W25qxx<'d, T, Tx, Rx> {
    pub fn new(spi: Spi<'d, T, Tx, Rx>, cs: Output<'d, AnyPin>) -> Self {
        Self { spi, cs }
    }

    pub async fn read_id(&mut self) -> Result<[u8; 3], FlashError> {
        let mut id = [0u8; 3];
        self.cs.set_low();
        let r = self
            .spi
            .blocking_transfer_in_place(&mut [CMD_JEDEC_ID])
            .and_then(|_| self.spi.blocking_read(&mut id));
        self.cs.set_high();
        r?;
        Ok(id)
    }

    pub async fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let mut cmd = command(CMD_READ_DATA, addr);
        self.cs.set_low();
        let r = self
            .spi
            .blocking_transfer_in_place(&mut cmd)
            .and_then(|_| self.spi.blocking_read(buf));
        self.cs.set_high();
        Ok(r?)
    }

    /// Erases the 4 KiB sector containing `addr`.
    pub async fn erase_sector(&mut self, addr: u32) -> Result<(), FlashError> {
        self.write_enable()?;
        let mut cmd = command(CMD_SECTOR_ERASE, addr);
        self.cs.set_low();
        let r = self.spi.blocking_transfer_in_place(&mut cmd);
        self.cs.set_high();
        r?;
        // Typical sector erase is 45 ms
        self.wait_ready(Duration::from_millis(5)).await
    }

    pub async fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        if (addr as usize % PAGE_SIZE) + data.len() > PAGE_SIZE {
            return Err(FlashError::PageOverflow);
        }
        self.write_enable()?;
        let mut cmd = command(CMD_PAGE_PROGRAM, addr);
        self.cs.set_low();
        let r = self
            .spi
            .blocking_transfer_in_place(&mut cmd)
            .and_then(|_| self.spi.blocking_write(data));
        self.cs.set_high();
        r?;
        self.wait_ready(Duration::from_micros(500)).await
    }

    fn write_enable(&mut self) -> Result<(), FlashError> {
        self.cs.set_low();
        let r = self.spi.blocking_transfer_in_place(&mut [CMD_WRITE_ENABLE]);
        self.cs.set_high();
        Ok(r?)
    }

    fn read_status(&mut self) -> Result<u8, FlashError> {
        let mut buf = [CMD_READ_STATUS1, 0];
        self.cs.set_low();
        let r = self.spi.blocking_transfer_in_place(&mut buf);
        self.cs.set_high();
        r?;
        Ok(buf[1])
    }

    async fn wait_ready(&mut self, poll: Duration) -> Result<(), FlashError> {
        while self.read_status()? & STATUS_BUSY != 0 {
            Timer::after(poll).await;
        }
        Ok(())
    }
}

fn command(op: u8, addr: u32) -> [u8; 4] {
    let a = addr.to_be_bytes();
    [op, a[1], a[2], a[3]]
}
