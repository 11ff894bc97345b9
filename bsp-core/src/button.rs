//! Multi-event button debouncer
//!
//! Each [`Button`] is sampled once per scan tick. The raw sample goes through
//! a level filter first (the filtered level flips only after
//! `debounce_ticks` consecutive disagreeing samples, for press and release
//! alike), then the click state machine turns filtered edges and elapsed
//! ticks into [`ButtonEvent`]s:
//!
//! ```text
//! Idle --press--> Pressed --release--> WaitingSecondClick --window--> Idle (Single/DoubleClick)
//!                   |  ^                   |      ^
//!              long |  | held > window  press|      |release < window
//!                   v  |                   v      |
//!            LongPressHold             Repeating --+
//! ```

use crate::hal::KeyInput;
use crate::ring_buffer::RingBuffer;
use crate::types::{ButtonConfig, ButtonEvent, ButtonState, KeyCode};
use heapless::Vec;

/// Receiver for debounced button events
pub trait ButtonListener {
    fn on_event(&mut self, button_id: u8, event: ButtonEvent);
}

impl<F> ButtonListener for F
where
    F: FnMut(u8, ButtonEvent),
{
    fn on_event(&mut self, button_id: u8, event: ButtonEvent) {
        self(button_id, event)
    }
}

/// Events land in the FIFO as [`KeyCode`]s; a full FIFO loses its oldest entry
impl ButtonListener for RingBuffer<'_> {
    fn on_event(&mut self, button_id: u8, event: ButtonEvent) {
        if let Some(code) = KeyCode::new(button_id, event) {
            self.putchar_force(code.raw());
        }
    }
}

/// Errors from [`ButtonSet`] registration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonError {
    /// A button with this id is already being scanned
    AlreadyStarted(u8),
    /// No free slot in the set
    Full,
}

#[cfg(feature = "std")]
impl core::fmt::Display for ButtonError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ButtonError::AlreadyStarted(id) => write!(f, "Button {} is already started", id),
            ButtonError::Full => write!(f, "Button set is full"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ButtonError {}

/// Debounce and click detection for one input
#[derive(Clone, Debug)]
pub struct Button {
    id: u8,
    state: ButtonState,
    level: bool,
    debounce_count: u8,
    ticks: u16,
    repeat: u8,
    hold_ticks: u16,
    attached: u8,
    last_event: Option<ButtonEvent>,
}

impl Button {
    /// New released button with every event attached
    pub fn new(id: u8) -> Self {
        Self {
            id,
            state: ButtonState::Idle,
            level: false,
            debounce_count: 0,
            ticks: 0,
            repeat: 0,
            hold_ticks: 0,
            attached: 0x7F,
            last_event: None,
        }
    }

    /// New button delivering only the listed events
    pub fn with_events(id: u8, events: &[ButtonEvent]) -> Self {
        let mut button = Self::new(id);
        button.attached = 0;
        for event in events {
            button.attach(*event);
        }
        button
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Deliver `event` to the listener
    pub fn attach(&mut self, event: ButtonEvent) {
        self.attached |= event.mask();
    }

    /// Stop delivering `event`; it is still tracked as [`last_event`](Self::last_event)
    pub fn detach(&mut self, event: ButtonEvent) {
        self.attached &= !event.mask();
    }

    pub fn is_attached(&self, event: ButtonEvent) -> bool {
        self.attached & event.mask() != 0
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Presses counted in the current click sequence
    pub fn click_count(&self) -> u8 {
        self.repeat
    }

    /// Most recent event, attached or not
    pub fn last_event(&self) -> Option<ButtonEvent> {
        self.last_event
    }

    /// Debounced level
    pub fn is_pressed(&self) -> bool {
        self.level
    }

    /// Feed one raw sample; returns the number of events delivered
    pub fn tick<L>(&mut self, active: bool, config: &ButtonConfig, listener: &mut L) -> usize
    where
        L: ButtonListener + ?Sized,
    {
        if self.state != ButtonState::Idle {
            self.ticks = self.ticks.saturating_add(1);
        }

        if active != self.level {
            self.debounce_count += 1;
            if self.debounce_count >= config.debounce_ticks {
                self.level = active;
                self.debounce_count = 0;
            }
        } else {
            self.debounce_count = 0;
        }

        match self.state {
            ButtonState::Idle => self.handle_idle_state(listener),
            ButtonState::Pressed => self.handle_pressed_state(config, listener),
            ButtonState::WaitingSecondClick => self.handle_waiting_state(config, listener),
            ButtonState::Repeating => self.handle_repeating_state(config, listener),
            ButtonState::LongPressHold => self.handle_long_hold_state(config, listener),
        }
    }

    fn handle_idle_state<L: ButtonListener + ?Sized>(&mut self, listener: &mut L) -> usize {
        if !self.level {
            return 0;
        }
        self.ticks = 0;
        self.repeat = 1;
        self.state = ButtonState::Pressed;
        self.emit(ButtonEvent::PressDown, listener)
    }

    fn handle_pressed_state<L: ButtonListener + ?Sized>(
        &mut self,
        config: &ButtonConfig,
        listener: &mut L,
    ) -> usize {
        if !self.level {
            self.ticks = 0;
            self.state = ButtonState::WaitingSecondClick;
            self.emit(ButtonEvent::PressUp, listener)
        } else if self.ticks > config.long_ticks {
            self.hold_ticks = 0;
            self.state = ButtonState::LongPressHold;
            self.emit(ButtonEvent::LongPressStart, listener)
        } else {
            0
        }
    }

    fn handle_waiting_state<L: ButtonListener + ?Sized>(
        &mut self,
        config: &ButtonConfig,
        listener: &mut L,
    ) -> usize {
        if self.level {
            self.repeat = self.repeat.saturating_add(1);
            self.ticks = 0;
            self.state = ButtonState::Repeating;
            self.emit(ButtonEvent::PressDown, listener) + self.emit(ButtonEvent::PressRepeat, listener)
        } else if self.ticks > config.short_ticks {
            self.state = ButtonState::Idle;
            match self.repeat {
                1 => self.emit(ButtonEvent::SingleClick, listener),
                2 => self.emit(ButtonEvent::DoubleClick, listener),
                _ => 0,
            }
        } else {
            0
        }
    }

    fn handle_repeating_state<L: ButtonListener + ?Sized>(
        &mut self,
        config: &ButtonConfig,
        listener: &mut L,
    ) -> usize {
        if !self.level {
            if self.ticks < config.short_ticks {
                self.ticks = 0;
                self.state = ButtonState::WaitingSecondClick;
            } else {
                self.state = ButtonState::Idle;
            }
            self.emit(ButtonEvent::PressUp, listener)
        } else {
            if self.ticks > config.short_ticks {
                // held too long to be part of a click sequence
                self.state = ButtonState::Pressed;
            }
            0
        }
    }

    fn handle_long_hold_state<L: ButtonListener + ?Sized>(
        &mut self,
        config: &ButtonConfig,
        listener: &mut L,
    ) -> usize {
        if !self.level {
            self.state = ButtonState::Idle;
            return self.emit(ButtonEvent::PressUp, listener);
        }
        self.hold_ticks += 1;
        if self.hold_ticks >= config.hold_interval_ticks {
            self.hold_ticks = 0;
            self.emit(ButtonEvent::LongPressHold, listener)
        } else {
            0
        }
    }

    fn emit<L: ButtonListener + ?Sized>(&mut self, event: ButtonEvent, listener: &mut L) -> usize {
        self.last_event = Some(event);
        if !self.is_attached(event) {
            return 0;
        }
        #[cfg(feature = "defmt")]
        defmt::trace!("button {}: {:?}", self.id, event);
        listener.on_event(self.id, event);
        1
    }
}

/// Fixed-size set of buttons scanned together
pub struct ButtonSet<const N: usize> {
    buttons: Vec<Button, N>,
    config: ButtonConfig,
}

impl<const N: usize> ButtonSet<N> {
    pub fn new(config: ButtonConfig) -> Self {
        Self {
            buttons: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &ButtonConfig {
        &self.config
    }

    /// Add a button to the scan list
    pub fn start(&mut self, button: Button) -> Result<(), ButtonError> {
        if self.get(button.id).is_some() {
            return Err(ButtonError::AlreadyStarted(button.id));
        }
        self.buttons.push(button).map_err(|_| ButtonError::Full)
    }

    /// Remove a button from the scan list, returning it if it was there
    pub fn stop(&mut self, id: u8) -> Option<Button> {
        let index = self.buttons.iter().position(|b| b.id == id)?;
        Some(self.buttons.remove(index))
    }

    pub fn get(&self, id: u8) -> Option<&Button> {
        self.buttons.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: u8) -> Option<&mut Button> {
        self.buttons.iter_mut().find(|b| b.id == id)
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Button> {
        self.buttons.iter()
    }

    /// Sample every started button once, in start order
    pub fn tick<I, L>(&mut self, input: &mut I, listener: &mut L) -> usize
    where
        I: KeyInput + ?Sized,
        L: ButtonListener + ?Sized,
    {
        let config = self.config;
        let mut delivered = 0;
        for button in self.buttons.iter_mut() {
            let active = input.is_active(button.id);
            delivered += button.tick(active, &config, listener);
        }
        delivered
    }
}
