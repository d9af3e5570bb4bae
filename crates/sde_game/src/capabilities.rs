//! Host operations the script can reach, and the per-run state behind them.

use sde_core::config::RuntimeConfig;
use sde_core::frame_state::{DebugLine, SpritePose};
use sde_core::input::InputState;
use sde_render::renderer::draw_textured_quad;
use sde_render::{Handle, ResourceError, ResourceManager, TileDevice};

use crate::diagnostics::{DiagnosticSink, WarnOnce};

/// The six operations exposed to scripts, plus a reporting hook for
/// rejected arguments. Implementations must never panic on script input.
pub trait Capabilities {
    fn sprite_load(&mut self, path: &str) -> Result<Handle, ResourceError>;

    /// Draw a loaded sprite. Unknown handles draw nothing.
    fn sprite_draw(&mut self, handle: i64, x: f32, y: f32, w: f32, h: f32, angle: f32);

    fn input_down(&self, name: &str) -> bool;

    fn input_axis(&self, name: &str) -> f32;

    fn debug_print(&mut self, text: &str);

    fn set_pose(&mut self, x: f32, y: f32, angle: f32);

    /// Report a problem with a script call, once per `key`.
    fn warn_once(&mut self, key: &str, message: &str);
}

/// Everything a frame reads or writes, owned in one place.
pub struct FrameContext<D: TileDevice> {
    pub device: D,
    pub resources: ResourceManager,
    pub input: InputState,
    pub debug_line: DebugLine,
    pub pose: SpritePose,
    pub config: RuntimeConfig,
    pub diagnostics: Box<dyn DiagnosticSink>,
    warned: WarnOnce,
}

impl<D: TileDevice> FrameContext<D> {
    pub fn new(
        device: D,
        resources: ResourceManager,
        config: RuntimeConfig,
        diagnostics: Box<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            device,
            resources,
            input: InputState::with_deadzone(config.deadzone),
            debug_line: DebugLine::new(config.debug_line_capacity),
            pose: SpritePose::default(),
            config,
            diagnostics,
            warned: WarnOnce::default(),
        }
    }
}

impl<D: TileDevice> Capabilities for FrameContext<D> {
    fn sprite_load(&mut self, path: &str) -> Result<Handle, ResourceError> {
        let resolved = self.config.resolve_asset(path);
        let result = self.resources.load(&mut self.device, &resolved);
        if let Err(err) = &result {
            self.diagnostics
                .warn(&format!("sprite.load('{path}') failed: {err}"));
        }
        result
    }

    fn sprite_draw(&mut self, handle: i64, x: f32, y: f32, w: f32, h: f32, angle: f32) {
        let resource = self.resources.get(handle);
        if resource.is_none() {
            // One key for every bad handle; the script chooses the values.
            if self.warned.first("sprite.draw:handle") {
                self.diagnostics.warn(&format!(
                    "sprite.draw: invalid handle {handle} (loaded: {})",
                    self.resources.len()
                ));
            }
            return;
        }
        draw_textured_quad(&mut self.device, resource, x, y, w, h, angle);
    }

    fn input_down(&self, name: &str) -> bool {
        self.input.is_pressed(name)
    }

    fn input_axis(&self, name: &str) -> f32 {
        self.input.axis(name)
    }

    fn debug_print(&mut self, text: &str) {
        self.debug_line.set(text);
    }

    fn set_pose(&mut self, x: f32, y: f32, angle: f32) {
        self.pose = SpritePose { x, y, angle };
    }

    fn warn_once(&mut self, key: &str, message: &str) {
        if self.warned.first(key) {
            self.diagnostics.warn(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use sde_core::input::{buttons, RawControllerState, RELEASED_MASK};
    use sde_render::image_loader::{DecodedImage, ImageLoader};
    use sde_render::{ListKind, RecordingDevice};
    use std::path::Path;

    /// Serves an 8x8 image for any path under the romdisk root, fails otherwise.
    struct StubLoader;

    impl ImageLoader for StubLoader {
        fn decode(&self, path: &Path) -> Result<DecodedImage, String> {
            if path.starts_with("romdisk") {
                Ok(DecodedImage {
                    width: 8,
                    height: 8,
                    rgba: vec![200; 256],
                })
            } else {
                Err(format!("no such image {}", path.display()))
            }
        }
    }

    fn context(capacity: usize) -> (FrameContext<RecordingDevice>, MemorySink) {
        let mut config = RuntimeConfig::default();
        config.romdisk_root = "romdisk".into();
        config.sprite_capacity = capacity;
        let sink = MemorySink::default();
        let ctx = FrameContext::new(
            RecordingDevice::new(),
            ResourceManager::new(capacity, Box::new(StubLoader)),
            config,
            Box::new(sink.clone()),
        );
        (ctx, sink)
    }

    fn submitted(ctx: &FrameContext<RecordingDevice>) -> usize {
        ctx.device
            .last_frame()
            .and_then(|f| f.list(ListKind::Opaque))
            .map_or(0, |l| l.primitives.len())
    }

    fn draw_in_frame(ctx: &mut FrameContext<RecordingDevice>, handle: i64) {
        ctx.device.begin_frame();
        ctx.device.begin_list(ListKind::Opaque);
        ctx.sprite_draw(handle, 320.0, 240.0, 64.0, 64.0, 0.5);
        ctx.device.end_list();
        ctx.device.end_frame();
    }

    #[test]
    fn romdisk_paths_resolve_under_root() {
        let (mut ctx, _) = context(4);
        let handle = ctx.sprite_load("/rd/ship.png").expect("romdisk load");
        assert_eq!(handle.get(), 1);
        assert!(ctx.sprite_load("elsewhere/ship.png").is_err());
    }

    #[test]
    fn invalid_handles_draw_nothing_and_warn_once() {
        let (mut ctx, sink) = context(4);
        ctx.sprite_load("/rd/ship.png").expect("load");
        for handle in [0, -1, 2, i64::MAX] {
            draw_in_frame(&mut ctx, handle);
            assert_eq!(submitted(&ctx), 0, "handle {handle}");
        }
        assert_eq!(sink.count_containing("invalid handle"), 1);
        assert_eq!(sink.count_containing("invalid handle 0"), 1);

        draw_in_frame(&mut ctx, 1);
        assert_eq!(submitted(&ctx), 5);
    }

    #[test]
    fn distinct_bad_handles_share_one_warning() {
        let (mut ctx, sink) = context(4);
        ctx.device.begin_frame();
        ctx.device.begin_list(ListKind::Opaque);
        for handle in 100..1100 {
            ctx.sprite_draw(handle, 0.0, 0.0, 8.0, 8.0, 0.0);
        }
        ctx.device.end_list();
        ctx.device.end_frame();
        assert_eq!(submitted(&ctx), 0);
        assert_eq!(ctx.warned.len(), 1);
        assert_eq!(sink.count_containing("invalid handle"), 1);
    }

    #[test]
    fn pool_exhaustion_surfaces_and_count_is_pinned() {
        let (mut ctx, sink) = context(1);
        ctx.sprite_load("/rd/a.png").expect("first");
        let err = ctx.sprite_load("/rd/b.png").expect_err("full");
        assert!(matches!(err, ResourceError::PoolExhausted { capacity: 1 }));
        assert_eq!(ctx.resources.len(), 1);
        assert_eq!(sink.count_containing("sprite limit reached"), 1);
    }

    #[test]
    fn input_queries_follow_state() {
        let (mut ctx, _) = context(1);
        ctx.input.apply(RawControllerState {
            buttons: RELEASED_MASK & !buttons::DPAD_UP,
            joy_x: 64,
            joy_y: 10,
        });
        assert!(ctx.input_down("up"));
        assert_eq!(ctx.input_down("w"), ctx.input_down("up"));
        assert!(!ctx.input_down("jump"));
        assert_eq!(ctx.input_axis("x"), 0.5);
        assert_eq!(ctx.input_axis("y"), 0.0);
        assert_eq!(ctx.input_axis("z"), 0.0);
    }

    #[test]
    fn debug_print_and_pose_update_state() {
        let (mut ctx, _) = context(1);
        ctx.debug_print("hello");
        ctx.set_pose(10.0, 20.0, 1.5);
        assert_eq!(ctx.debug_line.text(), "hello");
        assert!(ctx.debug_line.is_dirty());
        assert_eq!(
            ctx.pose,
            SpritePose {
                x: 10.0,
                y: 20.0,
                angle: 1.5
            }
        );
    }
}
