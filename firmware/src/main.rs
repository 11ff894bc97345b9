#![no_std]
#![no_main]

#[cfg(feature = "defmt")]
use defmt_rtt as _;

// Panic handler
#[cfg(feature = "defmt")]
use panic_probe as _;
#[cfg(not(feature = "defmt"))]
use panic_halt as _;

use embassy_executor::Spawner;
use static_cell::StaticCell;

use h7bsp_firmware::board::Board;
use h7bsp_firmware::tasks::{install_port, supervisor_task, uart_rx_task, uart_tx_task, DmaTx};
use h7bsp_firmware::*;

mod time_driver;

// FIFO storage, linked into AXI SRAM (memory.x) so DMA can reach it
static COM1_TX_BUF: StaticCell<[u8; UART_BUF_SIZE]> = StaticCell::new();
static COM1_RX_BUF: StaticCell<[u8; UART_BUF_SIZE]> = StaticCell::new();
static KEY_FIFO: StaticCell<[u8; KEY_FIFO_SIZE]> = StaticCell::new();

fn millis() -> u64 {
    time_driver::MILLIS.now_ms()
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    #[cfg(feature = "defmt")]
    defmt::info!("h7bsp {} starting", VERSION);

    let Some(core) = cortex_m::Peripherals::take() else {
        #[cfg(feature = "defmt")]
        defmt::error!("core peripherals already taken");
        return;
    };
    let p = embassy_stm32::init(Default::default());
    time_driver::start(core.SYST, time_driver::SYSCLK_HZ);

    let Board {
        keys,
        leds,
        com1_tx,
        com1_rx,
    } = match Board::init(p) {
        Ok(board) => board,
        Err(_error) => {
            #[cfg(feature = "defmt")]
            defmt::error!("board init failed: {:?}", _error);
            return;
        }
    };

    let com1 = match SerialPort::new(
        DmaTx,
        COM1_TX_BUF.init([0; UART_BUF_SIZE]),
        COM1_RX_BUF.init([0; UART_BUF_SIZE]),
    ) {
        Ok(port) => port,
        Err(_error) => {
            #[cfg(feature = "defmt")]
            defmt::error!("COM1 FIFOs: {:?}", _error);
            return;
        }
    };
    if let Err(_error) = install_port(ComPort::Com1, com1) {
        #[cfg(feature = "defmt")]
        defmt::error!("COM1 registration: {:?}", _error);
        return;
    }

    let keypad = match Keypad::new(keys, KEY_FIFO.init([0; KEY_FIFO_SIZE]), default_config()) {
        Ok(keypad) => keypad,
        Err(_error) => {
            #[cfg(feature = "defmt")]
            defmt::error!("key FIFO: {:?}", _error);
            return;
        }
    };

    spawner.must_spawn(uart_tx_task(com1_tx));
    spawner.must_spawn(uart_rx_task(com1_rx));
    spawner.must_spawn(supervisor_task(keypad, leds, millis));

    #[cfg(feature = "defmt")]
    defmt::info!("h7bsp ready");
}
