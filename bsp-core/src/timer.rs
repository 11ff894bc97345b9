//! Cooperative software timers
//!
//! A [`TimerWheel`] owns a fixed number of timer slots and a [`TickSource`].
//! [`TimerWheel::update`] is polled from one context (a 1 ms loop or a tick
//! interrupt); every timer whose deadline has passed is handed to the
//! [`TimerHandler`] inline, earliest deadline first. Handlers run to
//! completion one after another, so a slow handler delays the rest of the
//! scan.
//!
//! One-shot timers are the base primitive; a handler may re-arm its own timer
//! with [`TimerWheel::start`], which is how repeating work is usually
//! expressed. [`TimerWheel::start_periodic`] does the same re-arm
//! automatically at fire time.

use crate::hal::TickSource;
use heapless::Vec;

/// Handle of a registered timer
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId(u8);

impl TimerId {
    /// Slot index inside its wheel
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Errors from timer registration and control
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerError {
    /// Handle does not belong to this wheel
    UnknownTimer,
    /// Every slot is registered
    NoFreeSlot,
}

#[cfg(feature = "std")]
impl core::fmt::Display for TimerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TimerError::UnknownTimer => write!(f, "Unknown timer handle"),
            TimerError::NoFreeSlot => write!(f, "No free timer slot"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TimerError {}

/// Receives expired timers from [`TimerWheel::update`]
///
/// The wheel is passed back in so the handler can re-arm or stop timers.
pub trait TimerHandler<S, E, const N: usize> {
    fn on_timer(&mut self, wheel: &mut TimerWheel<S, E, N>, id: TimerId, event: E);
}

impl<S, E, const N: usize, F> TimerHandler<S, E, N> for F
where
    F: FnMut(&mut TimerWheel<S, E, N>, TimerId, E),
{
    fn on_timer(&mut self, wheel: &mut TimerWheel<S, E, N>, id: TimerId, event: E) {
        self(wheel, id, event)
    }
}

#[derive(Clone, Debug)]
struct Slot<E> {
    event: E,
    period_ms: u64,
    deadline: u64,
    active: bool,
    periodic: bool,
    /// Bumped on every start/stop so stale snapshot entries can be skipped
    arm_seq: u32,
}

struct Due<E> {
    index: u8,
    arm_seq: u32,
    deadline: u64,
    event: E,
}

/// Fixed-capacity set of cooperative timers
pub struct TimerWheel<S, E, const N: usize> {
    tick: S,
    slots: Vec<Slot<E>, N>,
}

impl<S, E, const N: usize> TimerWheel<S, E, N>
where
    S: TickSource,
    E: Copy,
{
    /// Create an empty wheel reading time from `tick`
    pub fn new(tick: S) -> Self {
        Self {
            tick,
            slots: Vec::new(),
        }
    }

    /// Replace the tick source; armed deadlines keep their absolute values
    pub fn install(&mut self, tick: S) {
        self.tick = tick;
    }

    pub fn tick_source(&self) -> &S {
        &self.tick
    }

    /// Current time of the installed source
    pub fn now_ms(&self) -> u64 {
        self.tick.now_ms()
    }

    /// Allocate a stopped timer that reports `event` when it fires
    pub fn register(&mut self, event: E) -> Result<TimerId, TimerError> {
        let index = self.slots.len();
        if index > u8::MAX as usize {
            return Err(TimerError::NoFreeSlot);
        }
        self.slots
            .push(Slot {
                event,
                period_ms: 0,
                deadline: 0,
                active: false,
                periodic: false,
                arm_seq: 0,
            })
            .map_err(|_| TimerError::NoFreeSlot)?;
        Ok(TimerId(index as u8))
    }

    /// Arm a one-shot timer `period_ms` from now, re-arming if already active
    pub fn start(&mut self, id: TimerId, period_ms: u64) -> Result<(), TimerError> {
        self.arm(id, period_ms, false)
    }

    /// Arm a timer that re-arms itself to `now + period_ms` every time it fires
    pub fn start_periodic(&mut self, id: TimerId, period_ms: u64) -> Result<(), TimerError> {
        self.arm(id, period_ms, true)
    }

    /// Disarm a timer; stopping an inactive timer is not an error
    pub fn stop(&mut self, id: TimerId) -> Result<(), TimerError> {
        let slot = self.slots.get_mut(id.index()).ok_or(TimerError::UnknownTimer)?;
        slot.active = false;
        slot.arm_seq = slot.arm_seq.wrapping_add(1);
        Ok(())
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.slots.get(id.index()).map(|slot| slot.active).unwrap_or(false)
    }

    /// Milliseconds until an active timer fires
    pub fn remaining_ms(&self, id: TimerId) -> Option<u64> {
        let slot = self.slots.get(id.index()).filter(|slot| slot.active)?;
        Some(slot.deadline.saturating_sub(self.now_ms()))
    }

    /// Milliseconds until the earliest active timer fires, for idle sleeping
    pub fn next_expiry_in(&self) -> Option<u64> {
        let now = self.now_ms();
        self.slots
            .iter()
            .filter(|slot| slot.active)
            .map(|slot| slot.deadline.saturating_sub(now))
            .min()
    }

    /// Fire every expired timer; returns how many fired
    ///
    /// Expired timers are collected first and fired earliest deadline first.
    /// A collected timer that an earlier handler stopped or re-armed during
    /// the same call is skipped. Each timer fires at most once per call.
    pub fn update<H>(&mut self, handler: &mut H) -> usize
    where
        H: TimerHandler<S, E, N> + ?Sized,
    {
        let now = self.now_ms();
        let mut due: Vec<Due<E>, N> = Vec::new();
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.active && slot.deadline <= now {
                let entry = Due {
                    index: index as u8,
                    arm_seq: slot.arm_seq,
                    deadline: slot.deadline,
                    event: slot.event,
                };
                if due.push(entry).is_err() {
                    break;
                }
            }
        }
        due.sort_unstable_by_key(|entry| (entry.deadline, entry.index));

        let mut fired = 0;
        for entry in due.iter() {
            let Some(slot) = self.slots.get_mut(entry.index as usize) else {
                continue;
            };
            if !slot.active || slot.arm_seq != entry.arm_seq {
                continue;
            }
            if slot.periodic {
                slot.deadline = now.saturating_add(slot.period_ms);
            } else {
                slot.active = false;
            }

            #[cfg(feature = "defmt")]
            defmt::trace!("timer {} fired at {}ms", entry.index, now);

            handler.on_timer(self, TimerId(entry.index), entry.event);
            fired += 1;
        }
        fired
    }

    fn arm(&mut self, id: TimerId, period_ms: u64, periodic: bool) -> Result<(), TimerError> {
        let now = self.now_ms();
        let slot = self.slots.get_mut(id.index()).ok_or(TimerError::UnknownTimer)?;
        slot.period_ms = period_ms;
        slot.deadline = now.saturating_add(period_ms);
        slot.periodic = periodic;
        slot.active = true;
        slot.arm_seq = slot.arm_seq.wrapping_add(1);
        Ok(())
    }
}
