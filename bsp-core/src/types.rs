//! Core data types and compile-time board constants

/// Interval between two debounce scans in milliseconds
pub const TICKS_INTERVAL_MS: u32 = 5;
/// Consecutive disagreeing samples needed before the filtered level flips
pub const DEBOUNCE_TICKS: u8 = 3;
/// Click window: a release followed by no press for this long ends a click sequence
pub const SHORT_TICKS: u16 = (300 / TICKS_INTERVAL_MS) as u16;
/// Hold time after which a press becomes a long press
pub const LONG_TICKS: u16 = (1000 / TICKS_INTERVAL_MS) as u16;
/// Scans between two `LongPressHold` events while a long press is held
pub const LONG_HOLD_INTERVAL_TICKS: u16 = 1;

/// Key FIFO capacity (ten key ids rounded up to a power of two)
pub const KEY_FIFO_SIZE: usize = 16;
/// Raw key value meaning "no key"
pub const KEY_NONE: u8 = 255;

/// Bytes moved out of a TX FIFO per DMA transfer
pub const DMA_TX_CHUNK: usize = 16;
/// Default TX/RX FIFO size for a serial port
pub const UART_BUF_SIZE: usize = 1024;
/// Default baud rate for a serial port
pub const UART_BAUD: u32 = 115_200;

/// Events reported by the button debouncer
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ButtonEvent {
    /// Filtered level went active
    PressDown = 0,
    /// Filtered level went inactive
    PressUp = 1,
    /// Another press arrived inside the click window
    PressRepeat = 2,
    /// Click window elapsed after exactly one click
    SingleClick = 3,
    /// Click window elapsed after exactly two clicks
    DoubleClick = 4,
    /// Held past the long-press threshold (reported once)
    LongPressStart = 5,
    /// Still held after a long press started (reported periodically)
    LongPressHold = 6,
}

impl ButtonEvent {
    /// Number of distinct events, used as the key code stride
    pub const COUNT: u8 = 7;

    /// Every event in code order
    pub const ALL: [ButtonEvent; 7] = [
        ButtonEvent::PressDown,
        ButtonEvent::PressUp,
        ButtonEvent::PressRepeat,
        ButtonEvent::SingleClick,
        ButtonEvent::DoubleClick,
        ButtonEvent::LongPressStart,
        ButtonEvent::LongPressHold,
    ];

    /// Numeric event code
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`ButtonEvent::code`]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ButtonEvent::PressDown),
            1 => Some(ButtonEvent::PressUp),
            2 => Some(ButtonEvent::PressRepeat),
            3 => Some(ButtonEvent::SingleClick),
            4 => Some(ButtonEvent::DoubleClick),
            5 => Some(ButtonEvent::LongPressStart),
            6 => Some(ButtonEvent::LongPressHold),
            _ => None,
        }
    }

    /// Bit used in a button's attach mask
    pub const fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

/// Debouncer states
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonState {
    /// Released, no click sequence in progress
    Idle,
    /// First press of a sequence is held
    Pressed,
    /// Released, waiting to see whether another click follows
    WaitingSecondClick,
    /// A follow-up press of a click sequence is held
    Repeating,
    /// Held past the long-press threshold
    LongPressHold,
}

impl ButtonState {
    /// Returns true if the filtered level is active in this state
    pub const fn is_held(&self) -> bool {
        match self {
            ButtonState::Pressed | ButtonState::Repeating | ButtonState::LongPressHold => true,
            ButtonState::Idle | ButtonState::WaitingSecondClick => false,
        }
    }
}

/// Encoded key FIFO entry: `key_id * ButtonEvent::COUNT + event`
#[derive(Copy, Clone, PartialEq, Eq, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyCode(u8);

impl KeyCode {
    /// Highest key id whose codes stay below [`KEY_NONE`]
    pub const MAX_KEY_ID: u8 = (KEY_NONE - ButtonEvent::COUNT) / ButtonEvent::COUNT;

    /// Encode an event for a key id, `None` if the code would collide with [`KEY_NONE`]
    pub const fn new(key_id: u8, event: ButtonEvent) -> Option<Self> {
        if key_id > Self::MAX_KEY_ID {
            return None;
        }
        Some(Self(key_id * ButtonEvent::COUNT + event.code()))
    }

    /// Wrap a raw FIFO byte, rejecting [`KEY_NONE`]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        if raw == KEY_NONE {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Raw FIFO byte
    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// Key id this code belongs to
    pub const fn key_id(&self) -> u8 {
        self.0 / ButtonEvent::COUNT
    }

    /// Event this code carries
    pub const fn event(&self) -> ButtonEvent {
        match ButtonEvent::from_code(self.0 % ButtonEvent::COUNT) {
            Some(event) => event,
            // remainder is always < COUNT
            None => ButtonEvent::PressDown,
        }
    }
}

/// Debouncer thresholds, all counted in scan ticks
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonConfig {
    /// Scan interval the tick counts refer to
    pub tick_ms: u32,
    /// Consecutive samples needed to accept a level change
    pub debounce_ticks: u8,
    /// Click window length
    pub short_ticks: u16,
    /// Long-press threshold
    pub long_ticks: u16,
    /// Interval between `LongPressHold` events
    pub hold_interval_ticks: u16,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            tick_ms: TICKS_INTERVAL_MS,
            debounce_ticks: DEBOUNCE_TICKS,
            short_ticks: SHORT_TICKS,
            long_ticks: LONG_TICKS,
            hold_interval_ticks: LONG_HOLD_INTERVAL_TICKS,
        }
    }
}

impl ButtonConfig {
    /// Create a configuration from millisecond thresholds with validation
    pub fn from_millis(
        tick_ms: u32,
        debounce_ms: u32,
        click_window_ms: u32,
        long_press_ms: u32,
        hold_interval_ms: u32,
    ) -> Result<Self, &'static str> {
        if tick_ms == 0 {
            return Err("Scan interval must be at least 1ms");
        }
        let to_ticks = |ms: u32| ms.div_ceil(tick_ms);

        let debounce_ticks = to_ticks(debounce_ms);
        if debounce_ticks == 0 || debounce_ticks > u8::MAX as u32 {
            return Err("Debounce must span between 1 and 255 scans");
        }
        let short_ticks = to_ticks(click_window_ms);
        let long_ticks = to_ticks(long_press_ms);
        if long_ticks > u16::MAX as u32 {
            return Err("Long press threshold is too long for the scan interval");
        }
        if short_ticks <= debounce_ticks {
            return Err("Click window must be longer than the debounce time");
        }
        if long_ticks <= short_ticks {
            return Err("Long press threshold must be longer than the click window");
        }
        let hold_interval_ticks = to_ticks(hold_interval_ms).max(1);
        if hold_interval_ticks > u16::MAX as u32 {
            return Err("Hold interval is too long for the scan interval");
        }

        Ok(Self {
            tick_ms,
            debounce_ticks: debounce_ticks as u8,
            short_ticks: short_ticks as u16,
            long_ticks: long_ticks as u16,
            hold_interval_ticks: hold_interval_ticks as u16,
        })
    }

    /// Click window in milliseconds
    pub fn click_window_ms(&self) -> u32 {
        self.short_ticks as u32 * self.tick_ms
    }

    /// Long-press threshold in milliseconds
    pub fn long_press_ms(&self) -> u32 {
        self.long_ticks as u32 * self.tick_ms
    }
}
