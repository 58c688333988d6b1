//! Keyboard sampling for movement intent and menu actions

use macroquad::prelude::{is_key_down, KeyCode};
use shared::Keys;

/// One-shot actions triggered on key press rather than while held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actions {
    pub rematch: bool,
    pub leave: bool,
}

/// Samples the keyboard once per frame
pub struct InputManager {
    // Previous frame key states for edge detection
    prev_rematch: bool,
    prev_leave: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            prev_rematch: false,
            prev_leave: false,
        }
    }

    /// Reads the live keyboard.
    pub fn update(&mut self) -> (Keys, Actions) {
        self.update_with(is_key_down)
    }

    /// Same as [`InputManager::update`] with a supplied key probe.
    pub fn update_with(&mut self, down: impl Fn(KeyCode) -> bool) -> (Keys, Actions) {
        let keys = keys_from(&down);

        let rematch = down(KeyCode::R);
        let leave = down(KeyCode::Escape);
        let actions = Actions {
            rematch: rematch && !self.prev_rematch,
            leave: leave && !self.prev_leave,
        };
        self.prev_rematch = rematch;
        self.prev_leave = leave;

        (keys, actions)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps held keys to movement intent. Arrows and WASD both work.
pub fn keys_from(down: impl Fn(KeyCode) -> bool) -> Keys {
    Keys {
        left: down(KeyCode::A) || down(KeyCode::Left),
        right: down(KeyCode::D) || down(KeyCode::Right),
        up: down(KeyCode::W) || down(KeyCode::Up),
        kick: down(KeyCode::Space) || down(KeyCode::X) || down(KeyCode::RightShift),
    }
}
