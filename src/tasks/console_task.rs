use core::fmt::Write;

use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};

use ebike_bridge::config::{Config, ConfigUpdate, CONFIG_BLOB_LEN};

use super::BridgeHandle;
use crate::usb::UsbSerial;

const STATUS_HZ: u64 = 2;

/// Request: `[calibration flag][config blob]`.
const REQUEST_LEN: usize = 1 + CONFIG_BLOB_LEN;

// ── Reply codes ───────────────────────────────────────────────────────────────
const REPLY_APPLIED: u8 = 0;
const REPLY_UNCHANGED: u8 = 1;
const REPLY_REJECTED: u8 = 2;
const REPLY_MALFORMED: u8 = 3;

/// USB console: the configuration entry point, plus status lines at 2 Hz
/// while a terminal holds DTR.
#[task]
pub async fn console_task(
    mut usb_serial: UsbSerial<'static>,
    bridge: &'static BridgeHandle,
) {
    let mut ticker = Ticker::every(Duration::from_hz(STATUS_HZ));
    let mut buf = [0u8; 64];

    loop {
        usb_serial.wait_connection().await;
        defmt::info!("console connected");

        loop {
            match select(usb_serial.read_packet(&mut buf), ticker.next()).await {
                Either::First(Ok(n)) => {
                    let reply = handle_request(&buf[..n], bridge);
                    if usb_serial.write_packet(&[reply]).await.is_err() {
                        break;
                    }
                }
                Either::First(Err(_)) => break,
                Either::Second(()) => {
                    if !usb_serial.dtr() {
                        continue;
                    }
                    let line = status_line(bridge);
                    if usb_serial.write_packet(line.as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
        }

        defmt::info!("console disconnected");
    }
}

fn handle_request(req: &[u8], bridge: &BridgeHandle) -> u8 {
    if req.len() != REQUEST_LEN || req[0] > 1 {
        defmt::warn!("console: malformed request ({} bytes)", req.len());
        return REPLY_MALFORMED;
    }
    let candidate = match Config::from_bytes(&req[1..]) {
        Ok(c) => c,
        Err(e) => {
            defmt::warn!("console: bad config blob: {}", e);
            return REPLY_MALFORMED;
        }
    };

    match bridge.lock(|b| b.update_config(candidate, req[0] != 0)) {
        Ok(ConfigUpdate::Applied) => REPLY_APPLIED,
        Ok(ConfigUpdate::Unchanged) => REPLY_UNCHANGED,
        Err(_) => REPLY_REJECTED,
    }
}

fn status_line(bridge: &BridgeHandle) -> heapless::String<64> {
    let s = bridge.lock(|b| *b.status());
    let mut m = heapless::String::<64>::new();
    let _ = write!(
        m,
        "m={} a={} v={} i={} t={} wh={} f={}\r\n",
        s.riding_mode.as_u8(),
        s.assist_level,
        s.battery_voltage_x1000,
        s.battery_current_x10,
        s.motor_temperature_x10,
        s.battery_wh,
        u8::from(s.controller_fault),
    );
    m
}
