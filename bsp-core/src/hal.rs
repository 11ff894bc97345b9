//! Hardware Abstraction Layer: tick sources, key inputs and serial peripherals

use embedded_hal::digital::{InputPin, OutputPin};
use portable_atomic::{AtomicU64, Ordering};

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// GPIO operation failed
    GpioError,
    /// Serial peripheral rejected the request
    SerialError,
    /// Port is not enabled on this board
    UnknownPort,
    /// Hardware not initialized
    NotInitialized,
    /// Invalid configuration
    InvalidConfig,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::SerialError => write!(f, "Serial operation failed"),
            HalError::UnknownPort => write!(f, "Serial port is not enabled"),
            HalError::NotInitialized => write!(f, "Hardware not initialized"),
            HalError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Monotonic millisecond clock
pub trait TickSource {
    /// Milliseconds since boot
    fn now_ms(&self) -> u64;
}

impl<F> TickSource for F
where
    F: Fn() -> u64,
{
    fn now_ms(&self) -> u64 {
        self()
    }
}

/// Atomic millisecond counter
///
/// Incremented from a periodic interrupt (SysTick) and read from thread
/// context. Also serves as a manually stepped clock in host tests.
pub struct MillisCounter {
    millis: AtomicU64,
}

impl MillisCounter {
    /// Create a counter starting at zero
    pub const fn new() -> Self {
        Self {
            millis: AtomicU64::new(0),
        }
    }

    /// Advance by one millisecond (called from the tick interrupt)
    pub fn tick(&self) {
        self.millis.fetch_add(1, Ordering::Relaxed);
    }

    /// Advance by an arbitrary number of milliseconds
    pub fn advance(&self, ms: u64) {
        self.millis.fetch_add(ms, Ordering::Relaxed);
    }

    /// Jump to an absolute time
    pub fn set(&self, ms: u64) {
        self.millis.store(ms, Ordering::Relaxed);
    }
}

impl Default for MillisCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for MillisCounter {
    fn now_ms(&self) -> u64 {
        self.millis.load(Ordering::Relaxed)
    }
}

/// Tick source backed by the embassy time driver
#[cfg(feature = "embassy-time")]
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbassyTicks;

#[cfg(feature = "embassy-time")]
impl TickSource for EmbassyTicks {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}

/// "Is this key physically active" predicate, sampled once per scan
pub trait KeyInput {
    /// Returns true if the key (or combination) with this id is pressed
    fn is_active(&mut self, key_id: u8) -> bool;
}

impl<F> KeyInput for F
where
    F: FnMut(u8) -> bool,
{
    fn is_active(&mut self, key_id: u8) -> bool {
        self(key_id)
    }
}

/// Electrical level that means "pressed"
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveLevel {
    /// Pressed pulls the pin low
    Low,
    /// Pressed drives the pin high
    High,
}

/// Virtual key made of two physical keys held together
///
/// While `modifier` is held, `key` reads as released on its own so the
/// single-key and combo interpretations never fire together.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Combo {
    /// Key that must be held for the combo
    pub modifier: u8,
    /// Key that is masked while the modifier is held
    pub key: u8,
}

/// Key predicate over `embedded-hal` input pins
///
/// Ids `0..N` are the pins, ids `N..N + combos.len()` are the combos.
pub struct GpioKeys<P, const N: usize> {
    pins: [(P, ActiveLevel); N],
    combos: &'static [Combo],
}

impl<P, const N: usize> GpioKeys<P, N>
where
    P: InputPin,
{
    pub fn new(pins: [(P, ActiveLevel); N], combos: &'static [Combo]) -> Self {
        Self { pins, combos }
    }

    /// Number of key ids this predicate answers for
    pub fn key_count(&self) -> usize {
        N + self.combos.len()
    }

    /// Raw pin state with the active level applied, no combo masking
    pub fn pin_active(&mut self, index: usize) -> Result<bool, HalError> {
        let (pin, level) = self.pins.get_mut(index).ok_or(HalError::InvalidConfig)?;
        let low = pin.is_low().map_err(|_| HalError::GpioError)?;
        Ok(match level {
            ActiveLevel::Low => low,
            ActiveLevel::High => !low,
        })
    }

    /// Release pins
    pub fn release(self) -> [(P, ActiveLevel); N] {
        self.pins
    }

    fn sample(&mut self, key_id: u8) -> Result<bool, HalError> {
        let id = key_id as usize;
        if id < N {
            if !self.pin_active(id)? {
                return Ok(false);
            }
            let combos = self.combos;
            for combo in combos {
                if combo.key == key_id && self.pin_active(combo.modifier as usize)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }

        match self.combos.get(id - N) {
            Some(combo) => {
                let combo = *combo;
                Ok(self.pin_active(combo.modifier as usize)? && self.pin_active(combo.key as usize)?)
            }
            None => Ok(false),
        }
    }
}

impl<P, const N: usize> KeyInput for GpioKeys<P, N>
where
    P: InputPin,
{
    fn is_active(&mut self, key_id: u8) -> bool {
        match self.sample(key_id) {
            Ok(active) => active,
            Err(_error) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("key {} read failed: {:?}", key_id, _error);
                false
            }
        }
    }
}

/// Serial peripheral driven by a [`SerialPort`](crate::serial::SerialPort)
pub trait SerialHw {
    /// Start transmitting `chunk`; completion is reported through
    /// [`SerialPort::on_tx_complete`](crate::serial::SerialPort::on_tx_complete)
    fn start_tx(&mut self, chunk: &[u8]) -> Result<(), HalError>;

    /// Called before bytes are queued (switch an RS-485 transceiver to transmit)
    fn before_send(&mut self) {}

    /// Called once the TX FIFO drained (switch an RS-485 transceiver back to receive)
    fn after_send(&mut self) {}

    /// Reprogram the baud rate
    fn set_baud(&mut self, _baud: u32) -> Result<(), HalError> {
        Err(HalError::InvalidConfig)
    }
}

/// RS-485 half-duplex wrapper driving a transmit-enable pin
pub struct Rs485<P, H> {
    tx_enable: P,
    inner: H,
}

impl<P, H> Rs485<P, H>
where
    P: OutputPin,
    H: SerialHw,
{
    /// Wrap a serial peripheral; the transceiver starts in receive mode
    pub fn new(mut tx_enable: P, inner: H) -> Self {
        tx_enable.set_low().ok();
        Self { tx_enable, inner }
    }

    /// Access the wrapped peripheral
    pub fn inner(&mut self) -> &mut H {
        &mut self.inner
    }

    /// Release the pin and the wrapped peripheral
    pub fn release(self) -> (P, H) {
        (self.tx_enable, self.inner)
    }
}

impl<P, H> SerialHw for Rs485<P, H>
where
    P: OutputPin,
    H: SerialHw,
{
    fn start_tx(&mut self, chunk: &[u8]) -> Result<(), HalError> {
        self.inner.start_tx(chunk)
    }

    fn before_send(&mut self) {
        if self.tx_enable.set_high().is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("RS-485 TX enable failed");
        }
        self.inner.before_send();
    }

    fn after_send(&mut self) {
        self.inner.after_send();
        if self.tx_enable.set_low().is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("RS-485 RX enable failed");
        }
    }

    fn set_baud(&mut self, baud: u32) -> Result<(), HalError> {
        self.inner.set_baud(baud)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use core::cell::RefCell;
    use heapless::Vec;

    /// Key predicate backed by a table of pressed flags
    #[derive(Default)]
    pub struct MockKeys {
        pressed: RefCell<[bool; 16]>,
    }

    impl MockKeys {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_pressed(&self, key_id: u8, pressed: bool) {
            if let Some(slot) = self.pressed.borrow_mut().get_mut(key_id as usize) {
                *slot = pressed;
            }
        }

        pub fn release_all(&self) {
            *self.pressed.borrow_mut() = [false; 16];
        }
    }

    impl KeyInput for MockKeys {
        fn is_active(&mut self, key_id: u8) -> bool {
            self.pressed.borrow().get(key_id as usize).copied().unwrap_or(false)
        }
    }

    /// Serial peripheral recording every DMA transfer it was asked to start
    #[derive(Default)]
    pub struct MockSerialHw {
        pub transmitted: Vec<u8, 256>,
        pub transfers: usize,
        pub last_chunk_len: usize,
        pub before_send_calls: usize,
        pub after_send_calls: usize,
        pub baud: Option<u32>,
        pub fail_tx: bool,
    }

    impl MockSerialHw {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl SerialHw for MockSerialHw {
        fn start_tx(&mut self, chunk: &[u8]) -> Result<(), HalError> {
            if self.fail_tx {
                return Err(HalError::SerialError);
            }
            self.transmitted.extend_from_slice(chunk).map_err(|_| HalError::SerialError)?;
            self.transfers += 1;
            self.last_chunk_len = chunk.len();
            Ok(())
        }

        fn before_send(&mut self) {
            self.before_send_calls += 1;
        }

        fn after_send(&mut self) {
            self.after_send_calls += 1;
        }

        fn set_baud(&mut self, baud: u32) -> Result<(), HalError> {
            self.baud = Some(baud);
            Ok(())
        }
    }
}
