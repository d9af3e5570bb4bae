pub mod config;
pub mod frame_state;
pub mod input;
pub mod replay;
pub mod time;
