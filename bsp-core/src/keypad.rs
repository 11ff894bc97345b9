//! Board key service: eight hard keys, two combos and a key FIFO
//!
//! Every key id gets a [`Button`] debouncer. Debounced events are encoded as
//! [`KeyCode`]s and pushed into a small FIFO with overwrite-oldest semantics,
//! so a slow main loop loses the stalest key codes instead of stalling the
//! scan. The FIFO is drained with [`Keypad::get_key`].

use crate::button::{Button, ButtonError, ButtonSet};
use crate::hal::{Combo, KeyInput, TickSource};
use crate::ring_buffer::{CapacityError, RingBuffer};
use crate::timer::{TimerError, TimerId, TimerWheel};
use crate::types::{ButtonConfig, ButtonEvent, KeyCode, KEY_NONE, TICKS_INTERVAL_MS};

/// Number of physical keys
pub const HARD_KEY_NUM: usize = 8;
/// Physical keys plus combos
pub const KEY_COUNT: usize = 10;

/// Delay before the first key scan after boot
pub const SCAN_FIRST_DELAY_MS: u64 = 10;

/// Key ids, in pin order followed by the combos
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum KeyId {
    K1 = 0,
    K2 = 1,
    K3 = 2,
    JoyUp = 3,
    JoyDown = 4,
    JoyLeft = 5,
    JoyRight = 6,
    JoyOk = 7,
    /// K1 and K2 held together
    K1K2 = 8,
    /// K2 and K3 held together
    K2K3 = 9,
}

impl KeyId {
    pub const ALL: [KeyId; KEY_COUNT] = [
        KeyId::K1,
        KeyId::K2,
        KeyId::K3,
        KeyId::JoyUp,
        KeyId::JoyDown,
        KeyId::JoyLeft,
        KeyId::JoyRight,
        KeyId::JoyOk,
        KeyId::K1K2,
        KeyId::K2K3,
    ];

    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Key code this key reports for `event`
    pub const fn code(self, event: ButtonEvent) -> Option<KeyCode> {
        KeyCode::new(self.id(), event)
    }
}

/// K1 and K3 read as released while K2 is held
pub const BOARD_COMBOS: [Combo; 2] = [
    Combo {
        modifier: KeyId::K2 as u8,
        key: KeyId::K1 as u8,
    },
    Combo {
        modifier: KeyId::K2 as u8,
        key: KeyId::K3 as u8,
    },
];

/// Events pushed into the key FIFO; `LongPressHold` would flood it
pub const FIFO_EVENTS: [ButtonEvent; 6] = [
    ButtonEvent::PressDown,
    ButtonEvent::PressUp,
    ButtonEvent::PressRepeat,
    ButtonEvent::SingleClick,
    ButtonEvent::DoubleClick,
    ButtonEvent::LongPressStart,
];

/// Debounced keys feeding a key FIFO
pub struct Keypad<'a, I> {
    buttons: ButtonSet<KEY_COUNT>,
    fifo: RingBuffer<'a>,
    input: I,
}

impl<'a, I> Keypad<'a, I>
where
    I: KeyInput,
{
    /// Start every key id with the FIFO event set, over `fifo_storage`
    pub fn new(input: I, fifo_storage: &'a mut [u8], config: ButtonConfig) -> Result<Self, CapacityError> {
        let fifo = RingBuffer::new(fifo_storage)?;
        let mut buttons = ButtonSet::new(config);
        for key in KeyId::ALL {
            if let Err(_error) = buttons.start(Button::with_events(key.id(), &FIFO_EVENTS)) {
                #[cfg(feature = "defmt")]
                defmt::warn!("key {} not started: {:?}", key.id(), _error);
            }
        }
        Ok(Self { buttons, fifo, input })
    }

    /// One debounce scan over every key; returns the number of key codes queued
    pub fn scan(&mut self) -> usize {
        let Self { buttons, fifo, input } = self;
        buttons.tick(input, fifo)
    }

    /// Queue a key code as if it had been pressed, dropping the oldest on overflow
    pub fn put_key(&mut self, code: KeyCode) {
        #[cfg(feature = "defmt")]
        if self.fifo.is_full() {
            defmt::debug!("key FIFO full, dropping oldest");
        }
        self.fifo.putchar_force(code.raw());
    }

    /// Pop the oldest key code
    pub fn get_key(&mut self) -> Option<KeyCode> {
        self.fifo.getchar().and_then(KeyCode::from_raw)
    }

    /// Pop the oldest key code as a raw byte, [`KEY_NONE`] when empty
    pub fn get_key_raw(&mut self) -> u8 {
        self.fifo.getchar().unwrap_or(KEY_NONE)
    }

    /// Number of queued key codes
    pub fn pending(&self) -> u16 {
        self.fifo.data_len()
    }

    /// Instantaneous (undebounced) state of a key, with combo masking applied
    pub fn key_state(&mut self, key: KeyId) -> bool {
        self.input.is_active(key.id())
    }

    /// Debounced state of a key
    pub fn is_pressed(&self, key: KeyId) -> bool {
        self.buttons.get(key.id()).map(|b| b.is_pressed()).unwrap_or(false)
    }

    /// Drop every queued key code
    pub fn clear(&mut self) {
        self.fifo.reset();
    }

    pub fn button(&self, key: KeyId) -> Option<&Button> {
        self.buttons.get(key.id())
    }

    /// Per-key access, e.g. to attach `LongPressHold` for auto-repeat keys
    pub fn button_mut(&mut self, key: KeyId) -> Option<&mut Button> {
        self.buttons.get_mut(key.id())
    }

    /// Stop scanning a key
    pub fn disable(&mut self, key: KeyId) -> Option<Button> {
        self.buttons.stop(key.id())
    }

    /// Resume scanning a key stopped with [`disable`](Self::disable)
    pub fn enable(&mut self, key: KeyId) -> Result<(), ButtonError> {
        self.buttons.start(Button::with_events(key.id(), &FIFO_EVENTS))
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }
}

/// Register the key-scan timer and arm its first run
pub fn start_scan_timer<S, E, const N: usize>(wheel: &mut TimerWheel<S, E, N>, event: E) -> Result<TimerId, TimerError>
where
    S: TickSource,
    E: Copy,
{
    let id = wheel.register(event)?;
    wheel.start(id, SCAN_FIRST_DELAY_MS)?;
    Ok(id)
}

/// Re-arm the key-scan timer from its handler for the next scan
pub fn rearm_scan_timer<S, E, const N: usize>(wheel: &mut TimerWheel<S, E, N>, id: TimerId) -> Result<(), TimerError>
where
    S: TickSource,
    E: Copy,
{
    wheel.start(id, TICKS_INTERVAL_MS as u64)
}

/// LED toggled by the board key demo for a key code, if any
pub fn demo_led_for(code: KeyCode) -> Option<u8> {
    let key = KeyId::from_id(code.key_id())?;
    match (key, code.event()) {
        (KeyId::K1, ButtonEvent::PressDown | ButtonEvent::PressUp) => Some(1),
        (KeyId::K1, ButtonEvent::SingleClick) => Some(2),
        (KeyId::K2, ButtonEvent::PressDown | ButtonEvent::PressUp) => Some(3),
        (KeyId::K2, ButtonEvent::SingleClick) => Some(4),
        _ => None,
    }
}
