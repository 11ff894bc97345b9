//! SysTick time base: 1 kHz millisecond counter and embassy time driver

use bsp_core::MillisCounter;
use core::cell::Cell;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;
use cortex_m_rt::exception;
use critical_section::Mutex;
use embassy_time_driver::{AlarmHandle, Driver};
use portable_atomic::{AtomicBool, Ordering};

/// Core clock after `embassy_stm32::init` with the default config (HSI)
pub const SYSCLK_HZ: u32 = 64_000_000;

/// Milliseconds since [`start`], the tick source of the timer wheel
pub static MILLIS: MillisCounter = MillisCounter::new();

struct Alarm {
    timestamp: Cell<u64>,
    callback: Cell<Option<(fn(*mut ()), *mut ())>>,
}

// SAFETY: only touched inside a critical section on a single core
unsafe impl Send for Alarm {}

/// Embassy driver with one alarm, checked on every SysTick
pub struct SysTickDriver {
    alarm: Mutex<Alarm>,
    allocated: AtomicBool,
}

impl SysTickDriver {
    const fn new() -> Self {
        Self {
            alarm: Mutex::new(Alarm {
                timestamp: Cell::new(u64::MAX),
                callback: Cell::new(None),
            }),
            allocated: AtomicBool::new(false),
        }
    }

    /// Advance time by one millisecond (called from the SysTick exception)
    fn on_tick(&self) {
        MILLIS.tick();
        let now = MILLIS.now_ms();
        let due = critical_section::with(|cs| {
            let alarm = self.alarm.borrow(cs);
            if alarm.timestamp.get() <= now {
                alarm.timestamp.set(u64::MAX);
                alarm.callback.get()
            } else {
                None
            }
        });
        if let Some((callback, ctx)) = due {
            callback(ctx);
        }
    }
}

impl Driver for SysTickDriver {
    fn now(&self) -> u64 {
        MILLIS.now_ms()
    }

    unsafe fn allocate_alarm(&self) -> Option<AlarmHandle> {
        if self.allocated.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(AlarmHandle::new(0))
    }

    fn set_alarm_callback(&self, _alarm: AlarmHandle, callback: fn(*mut ()), ctx: *mut ()) {
        critical_section::with(|cs| {
            self.alarm.borrow(cs).callback.set(Some((callback, ctx)));
        });
    }

    fn set_alarm(&self, _alarm: AlarmHandle, timestamp: u64) -> bool {
        critical_section::with(|cs| {
            let alarm = self.alarm.borrow(cs);
            if timestamp <= MILLIS.now_ms() {
                // already due: the executor polls right away instead
                alarm.timestamp.set(u64::MAX);
                false
            } else {
                alarm.timestamp.set(timestamp);
                true
            }
        })
    }
}

embassy_time_driver::time_driver_impl!(static DRIVER: SysTickDriver = SysTickDriver::new());

/// Start SysTick at 1 kHz from the core clock
pub fn start(mut syst: SYST, core_hz: u32) {
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(core_hz / 1_000 - 1);
    syst.clear_current();
    syst.enable_interrupt();
    syst.enable_counter();

    #[cfg(feature = "defmt")]
    defmt::info!("SysTick running at 1 kHz from {} Hz", core_hz);
}

#[exception]
fn SysTick() {
    DRIVER.on_tick();
}
