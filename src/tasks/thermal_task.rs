use embassy_executor::task;
use embassy_stm32::adc::Adc;
use embassy_stm32::peripherals::{ADC1, PC0};
use embassy_time::{Duration, Ticker};

use super::BridgeHandle;

const SAMPLE_HZ: u64 = 10;
const VREF_MV: u32 = 3300;
const ADC_FULL_SCALE: u32 = 4095;

/// External motor temperature sensor: LM35 on PC0 (10 mV/°C, so mV == °C x10).
/// The bridge only uses the reading when the rider selects the external sensor.
#[task]
pub async fn thermal_task(
    mut adc: Adc<'static, ADC1>,
    mut pin: PC0,
    bridge: &'static BridgeHandle,
) {
    let mut ticker = Ticker::every(Duration::from_hz(SAMPLE_HZ));
    loop {
        ticker.next().await;
        let raw = adc.read(&mut pin) as u32;
        let temperature_x10 = (raw * VREF_MV / ADC_FULL_SCALE) as u16;
        bridge.lock(|b| b.set_motor_temperature_x10(temperature_x10));
    }
}
