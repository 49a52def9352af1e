#![no_std]
#![no_main]

mod board;
mod drivers;
mod tasks;
mod usb;

use embassy_executor::Spawner;
use embassy_stm32::adc::Adc;
use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{Level, Output, Pin, Speed};
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::usart::{Config as UsartConfig, Uart};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Delay, Duration, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use ebike_bridge::bridge::{Bridge, SharedBridge};

use crate::board::Board;
use crate::drivers::flash::W25qxx;
use crate::tasks::BridgeHandle;
use crate::tasks::storage_task::{self, PersistQueue, PersistRequest, QUEUE_DEPTH};

/// Both serial peers run at this rate.
const LINK_BAUDRATE: u32 = 9600;

// ── Shared state ──────────────────────────────────────────────────────────────
static PERSIST_CHAN: Channel<CriticalSectionRawMutex, PersistRequest, QUEUE_DEPTH> =
    Channel::new();
static BRIDGE: StaticCell<BridgeHandle> = StaticCell::new();

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    UART4    => embassy_stm32::usart::InterruptHandler<peripherals::UART4>;
    USART3   => embassy_stm32::usart::InterruptHandler<peripherals::USART3>;
});

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();
    let p = board.p;

    // 2. USB console
    let (usb_dev, usb_serial) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();

    // 3. SPI3 @ 10 MHz: W25Q flash (SCK=PC10, MOSI=PC12, MISO=PC11, CS=PA15)
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = TimeHertz(10_000_000);
    let spi = Spi::new(
        p.SPI3,
        p.PC10, p.PC12, p.PC11,
        NoDma, NoDma,
        spi_config,
    );
    let cs_flash = Output::new(p.PA15.degrade(), Level::High, Speed::VeryHigh);
    let mut flash = W25qxx::new(spi, cs_flash);

    Timer::after(Duration::from_millis(10)).await;
    match flash.read_id().await {
        Ok(id) => defmt::info!("flash id {:02x}", id),
        Err(e) => defmt::warn!("flash id read failed: {}", e),
    }

    // 4. Restore persisted state and build the bridge
    let (config, wh_offset_x10) = storage_task::load(&mut flash).await;
    let store = PersistQueue::new(PERSIST_CHAN.sender());
    let bridge: &'static BridgeHandle =
        BRIDGE.init(SharedBridge::new(Bridge::new(config, wh_offset_x10, store)));

    // 5. Controller USART3 @ 9600 (TX=PB10, RX=PB11)
    let mut link_config = UsartConfig::default();
    link_config.baudrate = LINK_BAUDRATE;
    let controller_uart = Uart::new(
        p.USART3, p.PB11, p.PB10,
        Irqs,
        p.DMA1_CH3, p.DMA1_CH1,
        link_config,
    ).unwrap();

    // 6. Legacy display UART4 @ 9600 (TX=PA0, RX=PA1)
    let mut link_config = UsartConfig::default();
    link_config.baudrate = LINK_BAUDRATE;
    let display_uart = Uart::new(
        p.UART4, p.PA1, p.PA0,
        Irqs,
        p.DMA1_CH4, p.DMA1_CH2,
        link_config,
    ).unwrap();

    // 7. External motor temperature sensor (PC0)
    let adc = Adc::new(p.ADC1, &mut Delay);

    // 8. Heartbeat LED (PC13)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // 9. Spawn all tasks
    spawner.spawn(storage_task::storage_task(flash, PERSIST_CHAN.receiver())).unwrap();
    spawner.spawn(tasks::controller_task::controller_task(controller_uart, bridge)).unwrap();
    spawner.spawn(tasks::display_task::display_task(display_uart, bridge)).unwrap();
    spawner.spawn(tasks::energy_task::energy_task(bridge)).unwrap();
    spawner.spawn(tasks::thermal_task::thermal_task(adc, p.PC0, bridge)).unwrap();
    spawner.spawn(tasks::console_task::console_task(usb_serial, bridge)).unwrap();

    // 10. Main task: LED heartbeat @ 1 Hz
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
