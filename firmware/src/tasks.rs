//! Demo tasks: cooperative supervisor loop and the COM1 DMA bridge
//!
//! All board state except the UART halves lives in the supervisor task. The
//! serial registry is shared with the UART tasks through a critical-section
//! mutex; the TX task receives chunks through [`TX_CHUNK`].

use core::cell::RefCell;

use bsp_core::{
    demo_led_for, rearm_scan_timer, start_scan_timer, ComPort, HalError, Keypad, SerialHw, SerialPort, SerialPorts,
    TimerId, TimerWheel, DMA_TX_CHUNK,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};
use heapless::Vec;

use crate::board::{BoardKeys, BoardLeds, Com1Rx, Com1Tx};

/// Millisecond clock handed to the supervisor
pub type Clock = fn() -> u64;

/// Ports in the registry
pub const PORT_NUM: usize = 1;
/// Timer slots of the supervisor wheel
pub const WHEEL_SLOTS: usize = 4;
pub const HEARTBEAT_MS: u64 = 1_000;
/// Bytes echoed per supervisor pass
const ECHO_CHUNK: usize = DMA_TX_CHUNK * 4;

pub type Chunk = Vec<u8, DMA_TX_CHUNK>;
pub type Ports = SerialPorts<'static, DmaTx, PORT_NUM>;
type Wheel = TimerWheel<Clock, Job, WHEEL_SLOTS>;

/// Next TX chunk for [`uart_tx_task`]
pub static TX_CHUNK: Signal<CriticalSectionRawMutex, Chunk> = Signal::new();

static PORTS: Mutex<CriticalSectionRawMutex, RefCell<Ports>> = Mutex::new(RefCell::new(SerialPorts::new()));

/// Serial backend handing each staged chunk to the TX task
pub struct DmaTx;

impl SerialHw for DmaTx {
    fn start_tx(&mut self, chunk: &[u8]) -> Result<(), HalError> {
        let chunk = Vec::from_slice(chunk).map_err(|_| HalError::SerialError)?;
        TX_CHUNK.signal(chunk);
        Ok(())
    }
}

/// Run `f` with the serial registry locked
pub fn with_ports<R>(f: impl FnOnce(&mut Ports) -> R) -> R {
    PORTS.lock(|ports| f(&mut ports.borrow_mut()))
}

pub fn install_port(com: ComPort, port: SerialPort<'static, DmaTx>) -> Result<(), HalError> {
    with_ports(|ports| ports.add(com, port))
}

/// Supervisor timer jobs
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Job {
    KeyScan,
    Heartbeat,
}

#[embassy_executor::task]
pub async fn uart_tx_task(mut tx: Com1Tx) {
    #[cfg(feature = "defmt")]
    defmt::info!("COM1 TX task started");

    loop {
        let chunk = TX_CHUNK.wait().await;
        if let Err(_error) = tx.write(&chunk).await {
            #[cfg(feature = "defmt")]
            defmt::warn!("COM1 TX failed: {:?}", _error);
        }
        if let Err(_error) = with_ports(|ports| ports.on_tx_complete(ComPort::Com1)) {
            #[cfg(feature = "defmt")]
            defmt::warn!("COM1 TX refill failed: {:?}", _error);
        }
    }
}

#[embassy_executor::task]
pub async fn uart_rx_task(mut rx: Com1Rx) {
    #[cfg(feature = "defmt")]
    defmt::info!("COM1 RX task started");

    let mut buf = [0u8; DMA_TX_CHUNK * 4];
    loop {
        match rx.read_until_idle(&mut buf).await {
            Ok(len) => {
                let stored = with_ports(|ports| ports.port(ComPort::Com1).map(|port| port.on_rx_data(&buf[..len])));
                if let Err(_error) = stored {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("COM1 RX dropped {} bytes: {:?}", len, _error);
                }
            }
            Err(_error) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("COM1 RX error: {:?}", _error);
            }
        }
    }
}

/// 1 ms cooperative loop: timer wheel, key FIFO to LEDs, COM1 echo
#[embassy_executor::task]
pub async fn supervisor_task(mut keypad: Keypad<'static, BoardKeys>, mut leds: BoardLeds, clock: Clock) {
    #[cfg(feature = "defmt")]
    defmt::info!("supervisor started at {}ms", clock());

    let mut wheel: Wheel = TimerWheel::new(clock);
    if let Err(_error) = start_scan_timer(&mut wheel, Job::KeyScan) {
        #[cfg(feature = "defmt")]
        defmt::error!("key scan timer: {:?}", _error);
        return;
    }
    if let Err(_error) = wheel
        .register(Job::Heartbeat)
        .and_then(|id| wheel.start_periodic(id, HEARTBEAT_MS))
    {
        #[cfg(feature = "defmt")]
        defmt::warn!("heartbeat timer: {:?}", _error);
    }

    let mut ticker = Ticker::every(Duration::from_millis(1));
    loop {
        ticker.next().await;

        wheel.update(&mut |wheel: &mut Wheel, id: TimerId, job: Job| match job {
            Job::KeyScan => {
                keypad.scan();
                if let Err(_error) = rearm_scan_timer(wheel, id) {
                    #[cfg(feature = "defmt")]
                    defmt::error!("key scan re-arm: {:?}", _error);
                }
            }
            Job::Heartbeat => {
                #[cfg(feature = "defmt")]
                defmt::debug!("alive at {}ms, {} keys pending", wheel.now_ms(), keypad.pending());
            }
        });

        while let Some(code) = keypad.get_key() {
            #[cfg(feature = "defmt")]
            defmt::debug!("key {} {:?}", code.key_id(), code.event());
            if let Some(led) = demo_led_for(code) {
                leds.toggle(led).ok();
            }
        }

        if let Err(_error) = echo(ComPort::Com1) {
            #[cfg(feature = "defmt")]
            defmt::warn!("echo failed: {:?}", _error);
        }
    }
}

/// Send back whatever arrived, bounded by free TX space
fn echo(com: ComPort) -> Result<usize, HalError> {
    with_ports(|ports| {
        let port = ports.port(com)?;
        let mut buf = [0u8; ECHO_CHUNK];
        let room = (port.tx_space() as usize).min(ECHO_CHUNK);
        let len = port.get_buf(&mut buf[..room]);
        port.send(&buf[..len])
    })
}
