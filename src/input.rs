//! Input emulation: named buttons with level and edge semantics.
//!
//! The engine's locomotion code polls these once per tick exactly as it
//! would poll a keyboard. `pressed` / `released` are one-tick edges and are
//! cleared by [`InputEmulation::end_frame`]; `down` is a level that stays
//! until the next [`InputEmulation::set_key`] for that name.

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub down: bool,
    pub pressed: bool,
    pub released: bool,
}

/// Buttons the navigation controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementKey {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
}

impl MovementKey {
    pub const ALL: [MovementKey; 4] = [
        MovementKey::Forward,
        MovementKey::Backward,
        MovementKey::TurnLeft,
        MovementKey::TurnRight,
    ];

    /// Button name the engine's locomotion reads.
    pub fn name(self) -> &'static str {
        match self {
            MovementKey::Forward => "keyW",
            MovementKey::Backward => "keyS",
            MovementKey::TurnLeft => "keyA",
            MovementKey::TurnRight => "keyD",
        }
    }
}

/// Shared between the engine (reader, once per tick) and the navigation
/// controller (writer).
#[derive(Debug, Default)]
pub struct InputEmulation {
    buttons: Mutex<HashMap<String, ButtonState>>,
}

impl InputEmulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown names are created on first use.
    pub fn set_key(&self, name: &str, is_down: bool) {
        let mut buttons = self.buttons.lock();
        let state = buttons.entry(name.to_string()).or_default();
        if is_down && !state.down {
            state.pressed = true;
            state.released = false;
        } else if !is_down && state.down {
            state.released = true;
            state.pressed = false;
        }
        state.down = is_down;
    }

    pub fn set_movement(&self, key: MovementKey, is_down: bool) {
        self.set_key(key.name(), is_down);
    }

    pub fn button(&self, name: &str) -> ButtonState {
        *self.buttons.lock().entry(name.to_string()).or_default()
    }

    pub fn is_down(&self, name: &str) -> bool {
        self.button(name).down
    }

    pub fn movement_down(&self, key: MovementKey) -> bool {
        self.is_down(key.name())
    }

    /// Release every movement button currently held. Returns how many
    /// were released.
    pub fn release_movement(&self) -> usize {
        let mut released = 0;
        for key in MovementKey::ALL {
            if self.movement_down(key) {
                self.set_key(key.name(), false);
                released += 1;
            }
        }
        released
    }

    /// End-of-frame hook: clears edges, keeps levels.
    pub fn end_frame(&self) {
        for state in self.buttons.lock().values_mut() {
            state.pressed = false;
            state.released = false;
        }
    }

    pub fn snapshot(&self) -> HashMap<String, ButtonState> {
        self.buttons.lock().clone()
    }
}
