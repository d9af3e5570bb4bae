pub mod keyboard_pad;
pub mod window;

pub use keyboard_pad::KeyboardPad;
pub use window::{create_window, PlatformConfig};
