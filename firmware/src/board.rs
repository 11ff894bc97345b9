//! STM32H743 board bring-up: key pins, LEDs and COM1
//!
//! Keys (all active low with pull-ups):
//!
//! | Key | Pin |
//! |---|---|
//! | K1 | PI8 |
//! | K2 | PC13 |
//! | K3 | PH4 |
//! | Joystick up | PG2 |
//! | Joystick down | PB0 |
//! | Joystick left | PG3 |
//! | Joystick right | PG7 |
//! | Joystick OK | PI11 |
//!
//! The board's own LEDs sit behind a 74HC574 latch on the FMC bus; this
//! firmware drives four plain GPIO LEDs (PB14, PE1, PB7, PE3) instead.
//!
//! COM1 is USART1 on PA9 (TX) / PA10 (RX) with DMA1 stream 0 (TX) and
//! stream 1 (RX).

use bsp_core::{ActiveLevel, GpioKeys, HalError, BOARD_COMBOS, HARD_KEY_NUM, UART_BAUD};
use embassy_stm32::gpio::{AnyPin, Input, Level, Output, Pull, Speed};
use embassy_stm32::peripherals::{DMA1_CH0, DMA1_CH1, USART1};
use embassy_stm32::usart::{self, Uart, UartRx, UartTx};
use embassy_stm32::{bind_interrupts, Peripherals};

use crate::leds::Leds;

bind_interrupts!(pub struct Irqs {
    USART1 => usart::InterruptHandler<USART1>;
});

pub const LED_NUM: usize = 4;

pub type BoardKeys = GpioKeys<Input<'static, AnyPin>, HARD_KEY_NUM>;
pub type BoardLeds = Leds<Output<'static, AnyPin>, LED_NUM>;
pub type Com1Tx = UartTx<'static, USART1, DMA1_CH0>;
pub type Com1Rx = UartRx<'static, USART1, DMA1_CH1>;

/// Board peripherals used by the demo tasks
pub struct Board {
    pub keys: BoardKeys,
    pub leds: BoardLeds,
    pub com1_tx: Com1Tx,
    pub com1_rx: Com1Rx,
}

impl Board {
    pub fn init(p: Peripherals) -> Result<Self, HalError> {
        let keys = GpioKeys::new(
            [
                (Input::new(p.PI8, Pull::Up).degrade(), ActiveLevel::Low),
                (Input::new(p.PC13, Pull::Up).degrade(), ActiveLevel::Low),
                (Input::new(p.PH4, Pull::Up).degrade(), ActiveLevel::Low),
                (Input::new(p.PG2, Pull::Up).degrade(), ActiveLevel::Low),
                (Input::new(p.PB0, Pull::Up).degrade(), ActiveLevel::Low),
                (Input::new(p.PG3, Pull::Up).degrade(), ActiveLevel::Low),
                (Input::new(p.PG7, Pull::Up).degrade(), ActiveLevel::Low),
                (Input::new(p.PI11, Pull::Up).degrade(), ActiveLevel::Low),
            ],
            &BOARD_COMBOS,
        );

        let leds = Leds::new(
            [
                Output::new(p.PB14, Level::Low, Speed::Low).degrade(),
                Output::new(p.PE1, Level::Low, Speed::Low).degrade(),
                Output::new(p.PB7, Level::Low, Speed::Low).degrade(),
                Output::new(p.PE3, Level::Low, Speed::Low).degrade(),
            ],
            ActiveLevel::High,
        );

        let mut config = usart::Config::default();
        config.baudrate = UART_BAUD;
        let uart = Uart::new(p.USART1, p.PA10, p.PA9, Irqs, p.DMA1_CH0, p.DMA1_CH1, config)
            .map_err(|_| HalError::InvalidConfig)?;
        let (com1_tx, com1_rx) = uart.split();

        #[cfg(feature = "defmt")]
        defmt::info!("board: {} keys, {} LEDs, COM1 at {} baud", HARD_KEY_NUM, LED_NUM, UART_BAUD);

        Ok(Self {
            keys,
            leds,
            com1_tx,
            com1_rx,
        })
    }
}
