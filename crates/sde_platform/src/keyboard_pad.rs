//! Keyboard stand-in for the console controller.
//!
//! Arrows and WASD drive the d-pad, Space is A, Enter is Start, and IJKL push
//! the analog stick to its limits.

use sde_core::input::{buttons, Controller, RawControllerState, RELEASED_MASK};
use winit::keyboard::KeyCode;

const AXIS_MIN: i32 = -128;
const AXIS_MAX: i32 = 127;

fn button_for_key(key: KeyCode) -> Option<u32> {
    let bit = match key {
        KeyCode::ArrowUp | KeyCode::KeyW => buttons::DPAD_UP,
        KeyCode::ArrowDown | KeyCode::KeyS => buttons::DPAD_DOWN,
        KeyCode::ArrowLeft | KeyCode::KeyA => buttons::DPAD_LEFT,
        KeyCode::ArrowRight | KeyCode::KeyD => buttons::DPAD_RIGHT,
        KeyCode::Space => buttons::A,
        KeyCode::KeyX => buttons::B,
        KeyCode::Enter => buttons::START,
        _ => return None,
    };
    Some(bit)
}

#[derive(Debug, Default, Clone, Copy)]
struct StickKeys {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl StickKeys {
    fn set(&mut self, key: KeyCode, down: bool) -> bool {
        let slot = match key {
            KeyCode::KeyI => &mut self.up,
            KeyCode::KeyK => &mut self.down,
            KeyCode::KeyJ => &mut self.left,
            KeyCode::KeyL => &mut self.right,
            _ => return false,
        };
        *slot = down;
        true
    }

    fn axis(negative: bool, positive: bool) -> i32 {
        match (negative, positive) {
            (true, false) => AXIS_MIN,
            (false, true) => AXIS_MAX,
            _ => 0,
        }
    }
}

/// Controller fed by window key events. Always reports as connected.
#[derive(Debug, Default)]
pub struct KeyboardPad {
    held: u32,
    stick: StickKeys,
}

impl KeyboardPad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, key: KeyCode) {
        self.set_key(key, true);
    }

    pub fn key_up(&mut self, key: KeyCode) {
        self.set_key(key, false);
    }

    /// Release everything, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn set_key(&mut self, key: KeyCode, down: bool) {
        if self.stick.set(key, down) {
            return;
        }
        if let Some(bit) = button_for_key(key) {
            if down {
                self.held |= bit;
            } else {
                self.held &= !bit;
            }
        }
    }

    pub fn state(&self) -> RawControllerState {
        RawControllerState {
            buttons: RELEASED_MASK & !self.held,
            joy_x: StickKeys::axis(self.stick.left, self.stick.right),
            joy_y: StickKeys::axis(self.stick.up, self.stick.down),
        }
    }
}

impl Controller for KeyboardPad {
    fn poll(&mut self) -> Option<RawControllerState> {
        Some(self.state())
    }
}
