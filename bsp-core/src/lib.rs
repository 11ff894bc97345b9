#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # BSP Core
//!
//! Board support building blocks for interrupt/DMA driven firmware:
//! a lock-free mirrored ring buffer, a multi-event button debouncer,
//! cooperative software timers, and the key and serial services built on them.

pub mod types;
pub mod hal;
pub mod ring_buffer;
pub mod button;
pub mod timer;
pub mod keypad;
pub mod serial;

#[cfg(feature = "test-utils")]
pub mod test_utils;


pub use types::*;
pub use hal::*;
pub use ring_buffer::*;
pub use button::*;
pub use timer::*;
pub use keypad::*;
pub use serial::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Debouncer configuration for the board's 5 ms key scan
pub fn default_config() -> ButtonConfig {
    ButtonConfig {
        tick_ms: TICKS_INTERVAL_MS,
        debounce_ticks: DEBOUNCE_TICKS,
        short_ticks: SHORT_TICKS,
        long_ticks: LONG_TICKS,
        hold_interval_ticks: LONG_HOLD_INTERVAL_TICKS,
    }
}
