use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_stm32::peripherals::{DMA1_CH1, DMA1_CH3, USART3};
use embassy_stm32::usart::Uart;
use embassy_time::{Duration, Timer};

use ebike_bridge::protocol::controller::CONTROLLER_FRAME_LEN;
use ebike_bridge::protocol::framer::{FrameCheck, FrameReader};
use ebike_bridge::protocol::TO_DISPLAY_START;

use super::BridgeHandle;

/// Controller link goes quiet for this long before we poke it with a command.
const RX_TIMEOUT_MS: u64 = 110;

/// Controller task: USART3 @ 9600.
/// Each burst with valid telemetry is answered with one command frame; a silent
/// link still gets a command every timeout so the controller starts talking.
#[task]
pub async fn controller_task(
    mut uart: Uart<'static, USART3, DMA1_CH3, DMA1_CH1>,
    bridge: &'static BridgeHandle,
) {
    let mut reader = FrameReader::<CONTROLLER_FRAME_LEN>::new(TO_DISPLAY_START, FrameCheck::Crc16);
    let mut buf = [0u8; 64];

    loop {
        match select(
            uart.read_until_idle(&mut buf),
            Timer::after(Duration::from_millis(RX_TIMEOUT_MS)),
        )
        .await
        {
            Either::First(Ok(n)) => {
                let mut received = false;
                reader.push_bytes(&buf[..n], |frame| {
                    bridge.lock(|b| b.process_controller_frame(&frame));
                    received = true;
                });
                if !received {
                    continue;
                }
            }
            Either::First(Err(e)) => {
                defmt::warn!("controller uart: {}", e);
                reader.reset();
                continue;
            }
            Either::Second(_) => {}
        }

        let cmd = bridge.lock(|b| b.controller_command_frame());
        if let Err(e) = uart.write(&cmd).await {
            defmt::warn!("controller uart: {}", e);
        }
    }
}
