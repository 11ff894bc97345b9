#![no_std]

//! STM32H743 board glue and demo tasks over `bsp-core`

pub use bsp_core::*;

pub mod board;
pub mod leds;
pub mod tasks;
