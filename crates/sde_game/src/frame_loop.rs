//! One display refresh per iteration:
//!
//! ```text
//! poll -> dt -> update(dt) -> wait_ready -> begin_frame
//!   Opaque:      draw()
//!   Translucent: overlay + debug line flush
//! end_frame -> wait_vblank
//! ```
//!
//! The shared `FrameContext` is never borrowed across a script call, so the
//! bridge's native functions can always take it.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use sde_core::input::Controller;
use sde_core::time::FrameClock;
use sde_render::{ListKind, TileDevice};

use crate::capabilities::FrameContext;
use crate::lua_bridge::{ScriptError, ScriptRuntime};
use crate::overlay::{draw_overlay, flush_debug_line};

/// Cross-thread request to leave the loop after the current frame.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Ran { dt: f32, script_errors: u32 },
    /// No script; only waited for vblank.
    Inert,
}

pub struct FrameLoop<D: TileDevice, P: Controller, S: ScriptRuntime> {
    ctx: Rc<RefCell<FrameContext<D>>>,
    controller: P,
    script: Option<S>,
    clock: FrameClock,
    frames: u64,
}

impl<D: TileDevice, P: Controller, S: ScriptRuntime> FrameLoop<D, P, S> {
    /// `script: None` makes the loop inert.
    pub fn new(
        ctx: Rc<RefCell<FrameContext<D>>>,
        controller: P,
        script: Option<S>,
        clock: FrameClock,
    ) -> Self {
        Self {
            ctx,
            controller,
            script,
            clock,
            frames: 0,
        }
    }

    pub fn is_inert(&self) -> bool {
        self.script.is_none()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn context(&self) -> &Rc<RefCell<FrameContext<D>>> {
        &self.ctx
    }

    pub fn controller_mut(&mut self) -> &mut P {
        &mut self.controller
    }

    pub fn frame(&mut self) -> FrameOutcome {
        self.frame_at(Instant::now())
    }

    pub fn frame_at(&mut self, now: Instant) -> FrameOutcome {
        self.frames += 1;
        let Some(script) = self.script.as_mut() else {
            self.ctx.borrow_mut().device.wait_vblank();
            return FrameOutcome::Inert;
        };

        if let Some(raw) = self.controller.poll() {
            self.ctx.borrow_mut().input.apply(raw);
        }
        let dt = self.clock.tick_at(now);

        let mut script_errors = 0;
        if let Err(err) = script.call_update(dt) {
            report(&self.ctx, &err);
            script_errors += 1;
        }

        {
            let mut ctx = self.ctx.borrow_mut();
            ctx.device.wait_ready();
            ctx.device.begin_frame();
            ctx.device.begin_list(ListKind::Opaque);
        }
        if let Err(err) = script.call_draw() {
            report(&self.ctx, &err);
            script_errors += 1;
        }

        let mut guard = self.ctx.borrow_mut();
        let ctx = &mut *guard;
        ctx.device.end_list();
        ctx.device.begin_list(ListKind::Translucent);
        draw_overlay(&mut ctx.device, &ctx.input, &ctx.pose);
        flush_debug_line(&mut ctx.debug_line, ctx.diagnostics.as_mut());
        ctx.device.end_list();
        ctx.device.end_frame();
        ctx.device.wait_vblank();

        FrameOutcome::Ran { dt, script_errors }
    }

    /// Run until `shutdown` is requested or `max_frames` have run in total.
    pub fn run(&mut self, shutdown: &ShutdownSignal, max_frames: Option<u64>) -> u64 {
        let mut errors = 0u64;
        while !shutdown.is_requested() && max_frames.map_or(true, |max| self.frames < max) {
            if let FrameOutcome::Ran { dt, script_errors } = self.frame() {
                log::trace!("frame {} dt={dt:.4}", self.frames);
                errors += u64::from(script_errors);
            }
        }
        if errors > 0 {
            log::warn!("{errors} script error(s) over {} frame(s)", self.frames);
        }
        self.frames
    }
}

fn report<D: TileDevice>(ctx: &RefCell<FrameContext<D>>, err: &ScriptError) {
    ctx.borrow_mut().diagnostics.error(&err.to_string());
}
