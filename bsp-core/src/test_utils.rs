//! Test utilities: shared virtual clock, press patterns and event capture

pub mod virtual_clock {
    //! Clonable millisecond clock for deterministic timer tests

    use crate::hal::{MillisCounter, TickSource};
    use std::sync::Arc;

    /// Shared clock; clones observe the same time
    #[derive(Clone, Default)]
    pub struct VirtualClock {
        millis: Arc<MillisCounter>,
    }

    impl VirtualClock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn advance(&self, ms: u64) {
            self.millis.advance(ms);
        }

        pub fn set(&self, ms: u64) {
            self.millis.set(ms);
        }
    }

    impl TickSource for VirtualClock {
        fn now_ms(&self) -> u64 {
            self.millis.now_ms()
        }
    }
}

pub mod press_pattern {
    //! Raw sample sequences for driving debouncers

    use crate::button::{Button, ButtonListener};
    use crate::types::{ButtonConfig, ButtonEvent};

    /// Run-length encoded raw samples, one per scan
    #[derive(Debug, Clone, Default)]
    pub struct PressPattern {
        pub steps: Vec<(bool, usize)>,
        pub description: String,
    }

    impl PressPattern {
        pub fn new(description: &str) -> Self {
            Self {
                steps: Vec::new(),
                description: description.to_string(),
            }
        }

        /// Hold the key for `scans` samples
        pub fn press(mut self, scans: usize) -> Self {
            self.steps.push((true, scans));
            self
        }

        /// Leave the key released for `scans` samples
        pub fn release(mut self, scans: usize) -> Self {
            self.steps.push((false, scans));
            self
        }

        /// A press and release comfortably inside the click window
        pub fn click(self, config: &ButtonConfig) -> Self {
            let debounce = config.debounce_ticks as usize;
            self.press(debounce + 5).release(debounce + 5)
        }

        /// `count` clicks followed by enough idle time to close the window
        pub fn clicks(self, count: usize, config: &ButtonConfig) -> Self {
            let mut pattern = self;
            for _ in 0..count {
                pattern = pattern.click(config);
            }
            pattern.settle(config)
        }

        /// Held past the long-press threshold plus `extra_scans`, then released
        pub fn long_press(self, config: &ButtonConfig, extra_scans: usize) -> Self {
            let debounce = config.debounce_ticks as usize;
            self.press(debounce + config.long_ticks as usize + 1 + extra_scans)
                .release(debounce)
                .settle(config)
        }

        /// Released long enough for any click sequence to finish
        pub fn settle(self, config: &ButtonConfig) -> Self {
            self.release(config.short_ticks as usize + 1)
        }

        /// Total number of scans
        pub fn len(&self) -> usize {
            self.steps.iter().map(|(_, scans)| scans).sum()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Expanded per-scan samples
        pub fn samples(&self) -> impl Iterator<Item = bool> + '_ {
            self.steps
                .iter()
                .flat_map(|(active, scans)| core::iter::repeat(*active).take(*scans))
        }

        /// Feed the whole pattern into `button`
        pub fn run<L>(&self, button: &mut Button, config: &ButtonConfig, listener: &mut L) -> usize
        where
            L: ButtonListener + ?Sized,
        {
            self.samples()
                .map(|active| button.tick(active, config, listener))
                .sum()
        }
    }

    /// Listener that records every delivered event
    #[derive(Debug, Default, Clone)]
    pub struct EventRecorder {
        pub events: Vec<(u8, ButtonEvent)>,
    }

    impl EventRecorder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Events delivered for one button, in order
        pub fn events_for(&self, button_id: u8) -> Vec<ButtonEvent> {
            self.events
                .iter()
                .filter(|(id, _)| *id == button_id)
                .map(|(_, event)| *event)
                .collect()
        }

        pub fn count(&self, event: ButtonEvent) -> usize {
            self.events.iter().filter(|(_, e)| *e == event).count()
        }

        pub fn clear(&mut self) {
            self.events.clear();
        }
    }

    impl ButtonListener for EventRecorder {
        fn on_event(&mut self, button_id: u8, event: ButtonEvent) {
            self.events.push((button_id, event));
        }
    }
}

pub mod scenarios {
    //! Common key scenarios with their expected events

    use super::press_pattern::PressPattern;
    use crate::types::{ButtonConfig, ButtonEvent};

    /// Pattern paired with the events it must produce
    pub struct Scenario {
        pub pattern: PressPattern,
        pub expected: Vec<ButtonEvent>,
    }

    pub fn single_click(config: &ButtonConfig) -> Scenario {
        Scenario {
            pattern: PressPattern::new("single click").clicks(1, config),
            expected: vec![ButtonEvent::PressDown, ButtonEvent::PressUp, ButtonEvent::SingleClick],
        }
    }

    pub fn double_click(config: &ButtonConfig) -> Scenario {
        Scenario {
            pattern: PressPattern::new("double click").clicks(2, config),
            expected: vec![
                ButtonEvent::PressDown,
                ButtonEvent::PressUp,
                ButtonEvent::PressDown,
                ButtonEvent::PressRepeat,
                ButtonEvent::PressUp,
                ButtonEvent::DoubleClick,
            ],
        }
    }

    /// Long press held for exactly two hold events with the default interval
    pub fn long_press(config: &ButtonConfig) -> Scenario {
        let holds = config.debounce_ticks as usize - 1;
        Scenario {
            pattern: PressPattern::new("long press").long_press(config, 0),
            expected: [ButtonEvent::PressDown, ButtonEvent::LongPressStart]
                .into_iter()
                .chain(core::iter::repeat(ButtonEvent::LongPressHold).take(holds))
                .chain([ButtonEvent::PressUp])
                .collect(),
        }
    }

    /// Contact bounce shorter than the debounce window
    pub fn bounce(config: &ButtonConfig) -> Scenario {
        let short = config.debounce_ticks as usize - 1;
        Scenario {
            pattern: PressPattern::new("bounce")
                .press(short)
                .release(1)
                .press(short)
                .release(config.short_ticks as usize),
            expected: Vec::new(),
        }
    }
}
