//! Space Demo -- scripted sprite runtime entry point.
//!
//! Boots the frame context, loads the entry script, and hands control to a
//! `FrameLoop`. Two hosts:
//!
//!   - **window**: winit drives the event loop via `ApplicationHandler`, frames
//!     run on `RedrawRequested`, rendering goes through the wgpu backend and the
//!     keyboard stands in for the pad.
//!   - **headless** (`--headless`): a `RecordingDevice` and an optional replay
//!     file, for running a script without a display.

mod boot;
mod capabilities;
mod diagnostics;
mod frame_loop;
mod lua_bridge;
mod overlay;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use boot::{boot, Booted};
use diagnostics::LogSink;
use frame_loop::{FrameLoop, ShutdownSignal};
use lua_bridge::{LuaBridge, LuaStatus};
use sde_core::config::{load_config_or_default, ConfigError, RuntimeConfig};
use sde_core::input::{Controller, Disconnected, RawControllerState};
use sde_core::replay::{load_replay_from_path, ReplayController};
use sde_core::time::FrameClock;
use sde_platform::{create_window, KeyboardPad, PlatformConfig};
use sde_render::{DeviceError, PngLoader, RecordingDevice, ResourceManager, WgpuDevice};

/// Headless runs stop here unless `--frames` says otherwise.
const DEFAULT_HEADLESS_FRAMES: u64 = 600;
/// Window title refresh period, in frames.
const TITLE_REFRESH_FRAMES: u64 = 60;

#[derive(Debug, Parser)]
#[command(name = "sde_game", about = "Run a Lua sprite script")]
struct Cli {
    /// Runtime config (JSON). Missing file means defaults.
    #[arg(long, default_value = "assets/runtime.json")]
    config: PathBuf,

    /// Entry script, overriding the config (`/rd/` paths allowed).
    #[arg(long)]
    script: Option<String>,

    /// Run without a window.
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Controller replay file for headless runs.
    #[arg(long, requires = "headless")]
    replay: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

fn resources_for(config: &RuntimeConfig) -> ResourceManager {
    ResourceManager::new(config.sprite_capacity, Box::new(PngLoader))
}

fn lua_status(script: Option<&LuaBridge>) -> LuaStatus {
    script.map_or(LuaStatus::Error, LuaBridge::status)
}

// --- Headless host ------------------------------------------------------------

/// Replayed input, or no controller at all.
enum HeadlessPad {
    Replay(ReplayController),
    Absent(Disconnected),
}

impl Controller for HeadlessPad {
    fn poll(&mut self) -> Option<RawControllerState> {
        match self {
            Self::Replay(replay) => replay.poll(),
            Self::Absent(pad) => pad.poll(),
        }
    }
}

fn run_headless(
    config: RuntimeConfig,
    replay: Option<&Path>,
    frames: Option<u64>,
) -> Result<(), HostError> {
    let pad = match replay {
        Some(path) => {
            let sequence = load_replay_from_path(path)?;
            log::info!(
                "Replaying {} controller frame(s) from '{}'",
                sequence.frames.len(),
                path.display()
            );
            HeadlessPad::Replay(ReplayController::from_sequence(&sequence))
        }
        None => HeadlessPad::Absent(Disconnected),
    };

    let device = RecordingDevice::with_texture_memory(config.texture_memory_bytes);
    let resources = resources_for(&config);
    let clock = FrameClock::new(config.max_frame_dt);
    let Booted { ctx, script } = boot(device, resources, config, Box::new(LogSink));
    log::info!("{}", lua_status(script.as_ref()));

    let mut frame_loop = FrameLoop::new(ctx, pad, script, clock);
    let shutdown = ShutdownSignal::new();
    let ran = frame_loop.run(&shutdown, Some(frames.unwrap_or(DEFAULT_HEADLESS_FRAMES)));

    let ctx = frame_loop.context().borrow();
    log::info!(
        "Headless run finished: {} frame(s), {} rendered, {} sprite(s) loaded, {} primitive(s) dropped",
        ran,
        ctx.device.frames_completed(),
        ctx.resources.len(),
        ctx.device.dropped_primitives()
    );
    Ok(())
}

// --- Window host --------------------------------------------------------------

struct Running {
    window: Arc<Window>,
    title: String,
    frame_loop: FrameLoop<WgpuDevice, KeyboardPad, LuaBridge>,
}

impl Running {
    fn refresh_title(&self) {
        let clock = self.frame_loop.clock();
        self.window.set_title(&format!(
            "{} | {:.0} fps ({:.2} ms)",
            self.title, clock.smoothed_fps, clock.smoothed_frame_time_ms
        ));
    }
}

struct App {
    config: RuntimeConfig,
    max_frames: Option<u64>,
    shutdown: ShutdownSignal,
    state: Option<Running>,
    error: Option<HostError>,
}

impl App {
    fn new(config: RuntimeConfig, max_frames: Option<u64>) -> Self {
        Self {
            config,
            max_frames,
            shutdown: ShutdownSignal::new(),
            state: None,
            error: None,
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> Result<Running, HostError> {
        let platform = PlatformConfig::from(&self.config);
        let window = create_window(event_loop, &platform)?;
        log::info!("Window created: {}x{}", platform.width, platform.height);

        let device = WgpuDevice::new(
            Arc::clone(&window),
            (self.config.screen.width, self.config.screen.height),
            self.config.texture_memory_bytes,
        )?;
        let clock = FrameClock::new(self.config.max_frame_dt);
        let Booted { ctx, script } = boot(
            device,
            resources_for(&self.config),
            self.config.clone(),
            Box::new(LogSink),
        );
        let title = format!("{} [{}]", platform.title, lua_status(script.as_ref()));
        window.set_title(&title);

        Ok(Running {
            window,
            title,
            frame_loop: FrameLoop::new(ctx, KeyboardPad::new(), script, clock),
        })
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => self.state = Some(running),
            Err(err) => {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting.");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    state
                        .frame_loop
                        .context()
                        .borrow_mut()
                        .device
                        .resize(size.width, size.height);
                    log::info!("Resized to {}x{}", size.width, size.height);
                }
            }

            WindowEvent::Focused(false) => state.frame_loop.controller_mut().clear(),

            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    let pad = state.frame_loop.controller_mut();
                    match event.state {
                        ElementState::Pressed if key == KeyCode::Escape => self.shutdown.request(),
                        ElementState::Pressed => pad.key_down(key),
                        ElementState::Released => pad.key_up(key),
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                state.frame_loop.frame();
                let frames = state.frame_loop.frames();
                if frames % TITLE_REFRESH_FRAMES == 0 && !state.frame_loop.is_inert() {
                    state.refresh_title();
                }
            }

            _ => {}
        }

        let frames_done = self
            .max_frames
            .is_some_and(|max| state.frame_loop.frames() >= max);
        if self.shutdown.is_requested() || frames_done {
            log::info!("Stopping after {} frame(s).", state.frame_loop.frames());
            event_loop.exit();
        }
    }
}

fn run_windowed(config: RuntimeConfig, frames: Option<u64>) -> Result<(), HostError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, frames);
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn run(cli: Cli) -> Result<(), HostError> {
    let mut config = load_config_or_default(&cli.config)?;
    if let Some(script) = cli.script {
        config.script = script;
    }

    if cli.headless {
        run_headless(config, cli.replay.as_deref(), cli.frames)
    } else {
        run_windowed(config, cli.frames)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Space Demo starting...");

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_window_host() {
        let cli = Cli::parse_from(["sde_game"]);
        assert_eq!(cli.config, PathBuf::from("assets/runtime.json"));
        assert!(!cli.headless);
        assert!(cli.script.is_none());
        assert!(cli.frames.is_none());
    }

    #[test]
    fn replay_requires_headless() {
        assert!(Cli::try_parse_from(["sde_game", "--replay", "r.json"]).is_err());
        let cli = Cli::try_parse_from([
            "sde_game",
            "--headless",
            "--replay",
            "r.json",
            "--frames",
            "30",
        ])
        .expect("parse");
        assert_eq!(cli.replay, Some(PathBuf::from("r.json")));
        assert_eq!(cli.frames, Some(30));
    }

    #[test]
    fn headless_pad_without_replay_reports_nothing() {
        let mut pad = HeadlessPad::Absent(Disconnected);
        assert!(pad.poll().is_none());
    }

    #[test]
    fn headless_run_survives_missing_script() {
        let mut config = RuntimeConfig::default();
        config.romdisk_root = std::env::temp_dir().join(format!(
            "sde_test_main_missing_{}",
            std::process::id()
        ));
        assert!(run_headless(config, None, Some(3)).is_ok());
    }
}
