use tracing::{debug, info};

use crate::input::{Button, InputEvent, InputSource};

pub const PAD_BUTTON_MAP: [Button; 16] = [
    Button::A,
    Button::B,
    Button::X,
    Button::Y,
    Button::L,
    Button::R,
    Button::Lt,
    Button::Rt,
    Button::Select,
    Button::Start,
    Button::Ls,
    Button::Rs,
    Button::Up,
    Button::Down,
    Button::Left,
    Button::Right,
];

pub fn pad_button(index: usize) -> Option<Button> {
    PAD_BUTTON_MAP.get(index).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Disconnected,
    Polling { pad_index: u32 },
}

/// Only the first connected controller is read. The previous-tick snapshot
/// is dropped on disconnect, so a reconnect always starts from all-released.
#[derive(Debug, Default)]
pub struct GamepadPoller {
    active_pad: Option<u32>,
    previous: Vec<bool>,
}

impl GamepadPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PollerState {
        match self.active_pad {
            Some(pad_index) => PollerState::Polling { pad_index },
            None => PollerState::Disconnected,
        }
    }

    pub fn active_pad(&self) -> Option<u32> {
        self.active_pad
    }

    pub fn connect(&mut self, pad_index: u32, button_count: usize) -> bool {
        match self.active_pad {
            Some(active) if active != pad_index => {
                debug!(pad_index, active, "gamepad_ignored_secondary");
                false
            }
            _ => {
                self.active_pad = Some(pad_index);
                self.previous = vec![false; button_count];
                info!(pad_index, button_count, "gamepad_polling_started");
                true
            }
        }
    }

    pub fn disconnect(&mut self, pad_index: u32) -> bool {
        if self.active_pad != Some(pad_index) {
            return false;
        }
        self.active_pad = None;
        self.previous.clear();
        info!(pad_index, "gamepad_polling_stopped");
        true
    }

    pub fn tick(&mut self, pressed: &[bool]) -> Vec<InputEvent> {
        let mut events = Vec::new();
        if self.active_pad.is_none() {
            return events;
        }
        if self.previous.len() < pressed.len() {
            self.previous.resize(pressed.len(), false);
        }

        for (index, &now) in pressed.iter().enumerate() {
            let last = self.previous[index];
            if let Some(button) = pad_button(index) {
                if now && !last {
                    events.push(InputEvent::press(InputSource::Gamepad, button));
                } else if !now && last {
                    events.push(InputEvent::release(InputSource::Gamepad, button));
                }
            }
            self.previous[index] = now;
        }
        events
    }
}
