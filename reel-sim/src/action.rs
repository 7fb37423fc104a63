//! Conversion from discrete policy actions to simulator input events.

use reel_core::{Action, Space};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    MousePressed { x: usize, y: usize },
    MouseReleased { x: usize, y: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("action {action} is outside the action space of size {size}")]
pub struct InvalidAction {
    pub action: Action,
    pub size: usize,
}

/// Stateful mapping from discrete actions to input events. Converters
/// remember what is currently held down, so they have to be reset with the
/// episode.
pub trait ActionConverter: Send {
    fn action_space(&self) -> Space;

    fn reset(&mut self);

    fn actions(&mut self, action: Action) -> Result<Vec<InputEvent>, InvalidAction>;
}

/// Treats the action as a bitmap over the key whitelist, bit `i` meaning
/// "key `i` is held". Emits only the transitions relative to the previous
/// step.
#[derive(Debug, Clone)]
pub struct KeyActions {
    keys: Vec<String>,
    pressed: Vec<bool>,
}

impl KeyActions {
    pub fn new(keys: Vec<String>) -> Self {
        let pressed = vec![false; keys.len()];
        Self { keys, pressed }
    }

    pub fn held(&self) -> impl Iterator<Item = &str> {
        self.keys
            .iter()
            .zip(&self.pressed)
            .filter(|(_, pressed)| **pressed)
            .map(|(key, _)| key.as_str())
    }
}

impl ActionConverter for KeyActions {
    fn action_space(&self) -> Space {
        Space::Discrete(1 << self.keys.len())
    }

    fn reset(&mut self) {
        self.pressed.iter_mut().for_each(|p| *p = false);
    }

    fn actions(&mut self, action: Action) -> Result<Vec<InputEvent>, InvalidAction> {
        let size = self.action_space().size();
        if action >= size {
            return Err(InvalidAction { action, size });
        }
        let mut events = Vec::new();
        for (idx, (key, pressed)) in self.keys.iter().zip(self.pressed.iter_mut()).enumerate() {
            let new_pressed = action & (1 << idx) != 0;
            match (*pressed, new_pressed) {
                (true, false) => events.push(InputEvent::KeyUp(key.clone())),
                (false, true) => events.push(InputEvent::KeyDown(key.clone())),
                _ => {}
            }
            *pressed = new_pressed;
        }
        Ok(events)
    }
}

/// Two actions, released and pressed, at a fixed screen position.
#[derive(Debug, Clone)]
pub struct TapActions {
    x: usize,
    y: usize,
    pressed: bool,
}

impl TapActions {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y, pressed: false }
    }
}

impl ActionConverter for TapActions {
    fn action_space(&self) -> Space {
        Space::Discrete(2)
    }

    fn reset(&mut self) {
        self.pressed = false;
    }

    fn actions(&mut self, action: Action) -> Result<Vec<InputEvent>, InvalidAction> {
        let pressed = match action {
            0 => false,
            1 => true,
            _ => return Err(InvalidAction { action, size: 2 }),
        };
        if pressed == self.pressed {
            return Ok(vec![]);
        }
        self.pressed = pressed;
        let (x, y) = (self.x, self.y);
        Ok(vec![if pressed {
            InputEvent::MousePressed { x, y }
        } else {
            InputEvent::MouseReleased { x, y }
        }])
    }
}
