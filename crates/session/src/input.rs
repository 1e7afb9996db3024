use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    A,
    B,
    X,
    Y,
    L,
    R,
    Lt,
    Rt,
    Select,
    Start,
    Ls,
    Rs,
    Up,
    Down,
    Left,
    Right,
}

const BUTTON_COUNT: usize = 16;

impl Button {
    pub const ALL: [Button; BUTTON_COUNT] = [
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

    pub const fn engine_name(self) -> &'static str {
        match self {
            Button::A => "a",
            Button::B => "b",
            Button::X => "x",
            Button::Y => "y",
            Button::L => "l",
            Button::R => "r",
            Button::Lt => "lt",
            Button::Rt => "rt",
            Button::Select => "select",
            Button::Start => "start",
            Button::Ls => "ls",
            Button::Rs => "rs",
            Button::Up => "up",
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
        }
    }

    pub fn from_engine_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|button| button.engine_name().eq_ignore_ascii_case(name))
    }

    const fn index(self) -> usize {
        match self {
            Button::A => 0,
            Button::B => 1,
            Button::X => 2,
            Button::Y => 3,
            Button::L => 4,
            Button::R => 5,
            Button::Lt => 6,
            Button::Rt => 7,
            Button::Select => 8,
            Button::Start => 9,
            Button::Ls => 10,
            Button::Rs => 11,
            Button::Up => 12,
            Button::Down => 13,
            Button::Left => 14,
            Button::Right => 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Keyboard,
    Gamepad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    Press,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub source: InputSource,
    pub button: Button,
    pub action: ButtonAction,
}

impl InputEvent {
    pub const fn press(source: InputSource, button: Button) -> Self {
        Self {
            source,
            button,
            action: ButtonAction::Press,
        }
    }

    pub const fn release(source: InputSource, button: Button) -> Self {
        Self {
            source,
            button,
            action: ButtonAction::Release,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ButtonStates {
    down: [bool; BUTTON_COUNT],
}

impl ButtonStates {
    pub(crate) fn set(&mut self, button: Button, is_down: bool) {
        self.down[button.index()] = is_down;
    }

    pub(crate) fn is_down(&self, button: Button) -> bool {
        self.down[button.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    by_code: HashMap<String, Button>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let defaults = [
            ("KeyZ", Button::A),
            ("KeyX", Button::B),
            ("KeyA", Button::L),
            ("KeyS", Button::R),
            ("Enter", Button::Start),
            ("Backspace", Button::Select),
            ("ArrowUp", Button::Up),
            ("ArrowDown", Button::Down),
            ("ArrowLeft", Button::Left),
            ("ArrowRight", Button::Right),
        ];
        Self {
            by_code: defaults
                .into_iter()
                .map(|(code, button)| (code.to_string(), button))
                .collect(),
        }
    }
}

impl KeyBindings {
    pub fn with_overrides(overrides: &HashMap<String, Button>) -> Self {
        let mut bindings = Self::default();
        for (code, button) in overrides {
            bindings.by_code.insert(code.clone(), *button);
        }
        bindings
    }

    pub fn button_for(&self, code: &str) -> Option<Button> {
        self.by_code.get(code).copied()
    }
}

#[derive(Debug, Default)]
pub struct KeyboardCollector {
    bindings: KeyBindings,
    states: ButtonStates,
}

impl KeyboardCollector {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            states: ButtonStates::default(),
        }
    }

    pub fn key_down(&mut self, code: &str) -> Option<InputEvent> {
        let button = self.bindings.button_for(code)?;
        if self.states.is_down(button) {
            return None;
        }
        self.states.set(button, true);
        Some(InputEvent::press(InputSource::Keyboard, button))
    }

    pub fn key_up(&mut self, code: &str) -> Option<InputEvent> {
        let button = self.bindings.button_for(code)?;
        if !self.states.is_down(button) {
            return None;
        }
        self.states.set(button, false);
        Some(InputEvent::release(InputSource::Keyboard, button))
    }

    /// Drops held state without emitting releases, e.g. after the page loses
    /// focus and key-up events were never delivered.
    pub fn reset(&mut self) {
        self.states = ButtonStates::default();
    }
}
