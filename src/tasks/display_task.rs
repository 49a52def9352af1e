use embassy_executor::task;
use embassy_stm32::peripherals::{DMA1_CH2, DMA1_CH4, UART4};
use embassy_stm32::usart::Uart;

use ebike_bridge::protocol::display::DISPLAY_CONTROL_LEN;
use ebike_bridge::protocol::framer::{FrameCheck, FrameReader};
use ebike_bridge::protocol::TO_CONTROLLER_START;

use super::BridgeHandle;

/// Legacy display task: UART4 @ 9600.
/// The display polls; each burst holding a valid control frame gets one
/// status frame back.
#[task]
pub async fn display_task(
    mut uart: Uart<'static, UART4, DMA1_CH4, DMA1_CH2>,
    bridge: &'static BridgeHandle,
) {
    let mut reader =
        FrameReader::<DISPLAY_CONTROL_LEN>::new(TO_CONTROLLER_START, FrameCheck::Sum8);
    let mut buf = [0u8; 32];

    loop {
        let n = match uart.read_until_idle(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                defmt::warn!("display uart: {}", e);
                reader.reset();
                continue;
            }
        };

        let mut received = false;
        reader.push_bytes(&buf[..n], |frame| {
            bridge.lock(|b| b.process_display_frame(&frame));
            received = true;
        });

        // One reply per poll, reflecting every control frame in the burst.
        if received {
            let status = bridge.lock(|b| b.legacy_status_frame());
            if let Err(e) = uart.write(&status).await {
                defmt::warn!("display uart: {}", e);
            }
        }
    }
}
