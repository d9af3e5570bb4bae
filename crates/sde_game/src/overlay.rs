//! Fixed input/pose HUD, drawn last in the translucent list.

use glam::Vec2;
use sde_core::frame_state::{DebugLine, SpritePose};
use sde_core::input::{Direction, InputState};
use sde_render::{argb, draw_rect, TileDevice};

use crate::diagnostics::DiagnosticSink;

const DPAD_BOX: f32 = 20.0;
const STICK_ANCHOR: Vec2 = Vec2::new(120.0, 45.0);
const STICK_RADIUS: f32 = 30.0;
const MARKER: f32 = 6.0;
/// Distance of the ahead/behind markers from the pose.
pub const FACING_RADIUS: f32 = 40.0;

fn dpad_origin(direction: Direction) -> Vec2 {
    match direction {
        Direction::Up => Vec2::new(20.0, 20.0),
        Direction::Down => Vec2::new(20.0, 45.0),
        Direction::Left => Vec2::new(45.0, 45.0),
        Direction::Right => Vec2::new(70.0, 45.0),
    }
}

/// Top-left corners of the (ahead, behind) markers for `pose`.
pub fn facing_markers(pose: &SpritePose) -> (Vec2, Vec2) {
    let center = Vec2::new(pose.x, pose.y);
    let offset = pose.forward() * FACING_RADIUS;
    let half = Vec2::splat(MARKER * 0.5);
    (center + offset - half, center - offset - half)
}

/// Top-left corner of the stick marker. Uses the raw (pre-deadzone) axes.
pub fn stick_marker(input: &InputState) -> Vec2 {
    let (ax, ay) = input.raw_axes();
    STICK_ANCHOR + Vec2::new(ax, ay) * STICK_RADIUS
}

/// Submit the HUD into the open list.
pub fn draw_overlay(device: &mut dyn TileDevice, input: &InputState, pose: &SpritePose) {
    for direction in Direction::ALL {
        let origin = dpad_origin(direction);
        let color = if input.is_direction_down(direction) {
            argb::GREEN
        } else {
            argb::DARK_GRAY
        };
        draw_rect(device, origin.x, origin.y, DPAD_BOX, DPAD_BOX, color);
    }

    let stick = stick_marker(input);
    draw_rect(device, stick.x, stick.y, MARKER, MARKER, argb::RED);

    let (ahead, behind) = facing_markers(pose);
    draw_rect(device, ahead.x, ahead.y, MARKER, MARKER, argb::GREEN);
    draw_rect(device, behind.x, behind.y, MARKER, MARKER, argb::RED);
}

/// Emit the debug line if it changed since the last flush.
pub fn flush_debug_line(line: &mut DebugLine, sink: &mut dyn DiagnosticSink) {
    if let Some(text) = line.take_dirty() {
        sink.info(text);
    }
}
