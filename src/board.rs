use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::Config;

/// Crystal fitted on the bridge board.
const HSE_HZ: u32 = 8_000_000;

/// Pin map:
/// - USART3 PB10/PB11: motor controller
/// - UART4 PA0/PA1: legacy display
/// - SPI3 PC10/PC11/PC12, CS PA15: W25Q flash
/// - PC0: external motor temperature sensor
/// - PA11/PA12: USB console
/// - PC13: heartbeat LED
pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    /// SYSCLK 168 MHz from the PLL, with the 48 MHz USB clock on PLLQ.
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: TimeHertz(HSE_HZ),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2),
            divq: Some(PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        // UART baud generators sit on APB1 (42 MHz) and APB2 (84 MHz)
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;

        Self {
            p: embassy_stm32::init(config),
        }
    }
}
