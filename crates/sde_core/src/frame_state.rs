//! Small pieces of per-frame state written by the script and read by the
//! overlay: the single debug text line and the reported sprite pose.

/// Default payload capacity of the debug line, in bytes.
pub const DEFAULT_DEBUG_LINE_CAPACITY: usize = 127;

const INITIAL_DEBUG_TEXT: &str = "dbg: (empty)";

/// One bounded line of debug text plus a dirty flag.
///
/// Writes truncate (on a UTF-8 boundary) rather than grow the buffer. The
/// overlay consumes the line with `take_dirty`, at most once per frame.
#[derive(Debug, Clone)]
pub struct DebugLine {
    text: String,
    capacity: usize,
    dirty: bool,
}

impl DebugLine {
    pub fn new(capacity: usize) -> Self {
        let mut line = Self {
            text: String::with_capacity(capacity),
            capacity,
            dirty: true,
        };
        line.set(INITIAL_DEBUG_TEXT);
        line
    }

    /// Replace the text. Last write in a frame wins.
    pub fn set(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(truncate_to_boundary(text, self.capacity));
        self.dirty = true;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return the text if it changed since the last call, clearing the flag.
    pub fn take_dirty(&mut self) -> Option<&str> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(&self.text)
    }
}

impl Default for DebugLine {
    fn default() -> Self {
        Self::new(DEFAULT_DEBUG_LINE_CAPACITY)
    }
}

fn truncate_to_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Position and facing the script reports for its sprite. Unvalidated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpritePose {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

impl SpritePose {
    /// Unit vector the sprite faces: angle 0 points up the screen.
    pub fn forward(&self) -> glam::Vec2 {
        glam::Vec2::new(self.angle.sin(), -self.angle.cos())
    }
}

impl Default for SpritePose {
    fn default() -> Self {
        Self {
            x: 320.0,
            y: 240.0,
            angle: 0.0,
        }
    }
}
