use embassy_executor::task;
use embassy_time::{Duration, Ticker};

use super::BridgeHandle;

/// Wh integration period. The integrator's normaliser assumes exactly this.
const TICK_MS: u64 = 100;

#[task]
pub async fn energy_task(bridge: &'static BridgeHandle) {
    let mut ticker = Ticker::every(Duration::from_millis(TICK_MS));
    loop {
        ticker.next().await;
        bridge.lock(|b| b.tick());
    }
}
