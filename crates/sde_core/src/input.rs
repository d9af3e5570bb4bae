//! Controller state and the named queries scripts use to read it.
//!
//! The pad reports buttons as an **active-low** bitmask: a button is pressed
//! when its bit is `0`. A fresh `InputState` therefore starts at `0xFFFF_FFFF`
//! (nothing pressed). Analog axes arrive as raw signed bytes and are normalized
//! by dividing by 128.
//!
//! Two read paths exist:
//!
//! - **Named queries** (`is_pressed`, `axis`) serve the script bridge. Unknown
//!   names degrade to `false` / `0.0`, and axes pass through a deadzone.
//! - **Raw reads** (`raw_axes`, `is_button_down`) serve the overlay, which wants
//!   to visualize actual stick deflection.

/// Button bits, matching the Dreamcast controller layout.
pub mod buttons {
    pub const C: u32 = 1 << 0;
    pub const B: u32 = 1 << 1;
    pub const A: u32 = 1 << 2;
    pub const START: u32 = 1 << 3;
    pub const DPAD_UP: u32 = 1 << 4;
    pub const DPAD_DOWN: u32 = 1 << 5;
    pub const DPAD_LEFT: u32 = 1 << 6;
    pub const DPAD_RIGHT: u32 = 1 << 7;
    pub const Z: u32 = 1 << 8;
    pub const Y: u32 = 1 << 9;
    pub const X: u32 = 1 << 10;
    pub const D: u32 = 1 << 11;
}

/// Mask with no button pressed.
pub const RELEASED_MASK: u32 = 0xFFFF_FFFF;

/// Default half-width of the analog deadzone band.
pub const DEFAULT_DEADZONE: f32 = 0.15;

/// One reading from the physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawControllerState {
    pub buttons: u32,
    pub joy_x: i32,
    pub joy_y: i32,
}

impl Default for RawControllerState {
    fn default() -> Self {
        Self {
            buttons: RELEASED_MASK,
            joy_x: 0,
            joy_y: 0,
        }
    }
}

/// A source of controller readings. `None` means no device is attached this
/// frame; callers keep the previous state in that case.
pub trait Controller {
    fn poll(&mut self) -> Option<RawControllerState>;
}

/// Controller that never reports a device.
#[derive(Debug, Default)]
pub struct Disconnected;

impl Controller for Disconnected {
    fn poll(&mut self) -> Option<RawControllerState> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn bit(self) -> u32 {
        match self {
            Self::Up => buttons::DPAD_UP,
            Self::Down => buttons::DPAD_DOWN,
            Self::Left => buttons::DPAD_LEFT,
            Self::Right => buttons::DPAD_RIGHT,
        }
    }
}

/// Resolve a script-facing button name to its bit. `w/a/s/d` mirror the d-pad.
pub fn button_for_name(name: &str) -> Option<u32> {
    let bit = match name {
        "up" | "w" => Direction::Up.bit(),
        "down" | "s" => Direction::Down.bit(),
        "left" | "a" => Direction::Left.bit(),
        "right" | "d" => Direction::Right.bit(),
        "fire" => buttons::A,
        _ => return None,
    };
    Some(bit)
}

/// Zero any value strictly inside `(-deadzone, deadzone)`.
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value > -deadzone && value < deadzone {
        0.0
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputState {
    button_mask: u32,
    joy_x: i32,
    joy_y: i32,
    deadzone: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::with_deadzone(DEFAULT_DEADZONE)
    }

    pub fn with_deadzone(deadzone: f32) -> Self {
        Self {
            button_mask: RELEASED_MASK,
            joy_x: 0,
            joy_y: 0,
            deadzone,
        }
    }

    /// Overwrite the state with a fresh device reading. Called once per frame.
    pub fn apply(&mut self, raw: RawControllerState) {
        self.button_mask = raw.buttons;
        self.joy_x = raw.joy_x;
        self.joy_y = raw.joy_y;
    }

    pub fn button_mask(&self) -> u32 {
        self.button_mask
    }

    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    pub fn is_button_down(&self, bit: u32) -> bool {
        self.button_mask & bit == 0
    }

    pub fn is_direction_down(&self, direction: Direction) -> bool {
        self.is_button_down(direction.bit())
    }

    /// Named button query. Unknown names are never pressed.
    pub fn is_pressed(&self, name: &str) -> bool {
        button_for_name(name).is_some_and(|bit| self.is_button_down(bit))
    }

    /// Named analog query with deadzone filtering. Unknown names read `0.0`.
    pub fn axis(&self, name: &str) -> f32 {
        let value = match name {
            "x" => normalize_axis(self.joy_x),
            "y" => normalize_axis(self.joy_y),
            _ => return 0.0,
        };
        apply_deadzone(value, self.deadzone)
    }

    /// Normalized axes without the deadzone, for visualizing stick drift.
    pub fn raw_axes(&self) -> (f32, f32) {
        (normalize_axis(self.joy_x), normalize_axis(self.joy_y))
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_axis(raw: i32) -> f32 {
    raw as f32 / 128.0
}
