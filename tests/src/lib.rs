//! Host-based tests for the board support core
//!
//! [`board_sim`] runs the firmware's cooperative loop over mock keys and a
//! mock UART so whole-board behaviour can be tested without hardware.


#[cfg(test)]
mod ring_buffer_tests;
#[cfg(test)]
mod timer_tests;
#[cfg(test)]
mod serial_tests;
#[cfg(test)]
mod embassy_tests;
