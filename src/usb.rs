use embassy_stm32::usb_otg::{self, Driver};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_usb::class::cdc_acm::{CdcAcmClass, State};
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

bind_interrupts!(pub struct Irqs {
    OTG_FS => usb_otg::InterruptHandler<peripherals::USB_OTG_FS>;
});

pub type UsbDriver = Driver<'static, peripherals::USB_OTG_FS>;
pub type UsbSerial<'a> = CdcAcmClass<'a, UsbDriver>;

/// Full-speed max packet; a console request must fit in one packet.
pub const MAX_PACKET_SIZE: u16 = 64;

struct UsbResources {
    config_desc: [u8; 256],
    bos_desc: [u8; 256],
    control_buf: [u8; 64],
    ep_out_buffer: [u8; 256],
}

static USB_RES: StaticCell<UsbResources> = StaticCell::new();
static USB_STATE: StaticCell<State<'static>> = StaticCell::new();

#[embassy_executor::task]
pub async fn usb_task(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

/// Brings up the CDC-ACM console. Call once.
pub fn init(
    usb_periph: peripherals::USB_OTG_FS,
    pa12: peripherals::PA12,
    pa11: peripherals::PA11,
) -> (UsbDevice<'static, UsbDriver>, UsbSerial<'static>) {
    let res = USB_RES.init(UsbResources {
        config_desc: [0; 256],
        bos_desc: [0; 256],
        control_buf: [0; 64],
        ep_out_buffer: [0; 256],
    });

    let mut usb_config = usb_otg::Config::default();
    usb_config.vbus_detection = false;
    let driver = Driver::new_fs(
        usb_periph,
        Irqs,
        pa12,
        pa11,
        &mut res.ep_out_buffer,
        usb_config,
    );

    let mut config = Config::new(0xc0de, 0xcafe);
    config.manufacturer = Some("ebike-bridge");
    config.product = Some("Mid-drive display bridge");
    config.serial_number = Some("00000001");

    let mut builder = Builder::new(
        driver,
        config,
        &mut res.config_desc,
        &mut res.bos_desc,
        &mut [], // msos_descs
        &mut res.control_buf,
    );

    let state = USB_STATE.init(State::new());
    let class = CdcAcmClass::new(&mut builder, state, MAX_PACKET_SIZE);
    let usb = builder.build();

    (usb, class)
}
