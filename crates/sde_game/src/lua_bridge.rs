//! Rust <-> Lua bridge for the demo script.
//!
//! The script sees three global tables, all backed by one `Capabilities`
//! object shared with the frame loop:
//!
//! ```text
//! sprite.load(path)                 -> handle | nil, message
//! sprite.draw(handle, x, y, w, h, angle)
//! input.down(name)                  -> boolean
//! input.axis(name)                  -> number
//! debug.print(text)                 (also reachable as dbg.print)
//! debug.set_pose(x, y, angle)
//! ```
//!
//! Native functions coerce their arguments the way Lua does (numeric strings
//! are numbers, numbers are strings) and never raise: a malformed call yields
//! `false`, `0`, a no-op, or `nil, message`, and is reported once.
//!
//! Per frame the host calls the optional globals `update(dt)` and `draw()`.
//! A missing global is skipped; an error is returned to the caller, which
//! logs it and carries on with the next frame.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::prelude::*;
use thiserror::Error;

use crate::capabilities::Capabilities;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("cannot open {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Load(String),
    #[error("Lua error in {function}: {message}")]
    Runtime { function: String, message: String },
    #[error("failed to install host API: {0}")]
    Api(#[source] LuaError),
}

/// Whether an entry point actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invoked {
    Called,
    Skipped,
}

/// The per-frame script entry points, as seen by the frame loop.
pub trait ScriptRuntime {
    fn call_update(&mut self, dt: f32) -> Result<Invoked, ScriptError>;
    fn call_draw(&mut self) -> Result<Invoked, ScriptError>;
}

/// Status of the Lua runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuaStatus {
    /// API installed, no script run yet.
    Empty,
    /// Script loaded and running normally.
    Loaded,
    /// Script failed to load; entry points will not be called.
    Error,
}

impl LuaStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Empty => "Lua: empty",
            Self::Loaded => "Lua: loaded",
            Self::Error => "Lua: ERROR",
        }
    }
}

impl std::fmt::Display for LuaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub struct LuaBridge {
    lua: Lua,
    status: LuaStatus,
}

impl LuaBridge {
    /// Create a Lua state with the host API bound to `caps`.
    pub fn new<C: Capabilities + 'static>(caps: Rc<RefCell<C>>) -> Result<Self, ScriptError> {
        let lua = Lua::new();
        install_api(&lua, caps).map_err(ScriptError::Api)?;
        Ok(Self {
            lua,
            status: LuaStatus::Empty,
        })
    }

    pub fn status(&self) -> LuaStatus {
        self.status
    }

    /// Read and execute the main script.
    pub fn load_script(&mut self, path: &Path) -> Result<(), ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|source| {
            self.status = LuaStatus::Error;
            ScriptError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.load_source(&path.to_string_lossy(), &source)
    }

    /// Execute `source` as the main chunk, named `name` in error messages.
    pub fn load_source(&mut self, name: &str, source: &str) -> Result<(), ScriptError> {
        match self.lua.load(source).set_name(format!("@{name}")).exec() {
            Ok(()) => {
                self.status = LuaStatus::Loaded;
                log::info!("Lua script loaded: {name}");
                Ok(())
            }
            Err(err) => {
                self.status = LuaStatus::Error;
                Err(ScriptError::Load(lua_message(&err)))
            }
        }
    }

    /// Call global `name` if it is a function.
    fn call_global(&self, name: &str, args: impl IntoLuaMulti) -> Result<Invoked, ScriptError> {
        let runtime = |err: LuaError| ScriptError::Runtime {
            function: name.to_string(),
            message: lua_message(&err),
        };
        let value: LuaValue = self.lua.globals().get(name).map_err(runtime)?;
        let LuaValue::Function(func) = value else {
            return Ok(Invoked::Skipped);
        };
        func.call::<()>(args).map_err(runtime)?;
        Ok(Invoked::Called)
    }
}

impl ScriptRuntime for LuaBridge {
    fn call_update(&mut self, dt: f32) -> Result<Invoked, ScriptError> {
        self.call_global("update", dt)
    }

    fn call_draw(&mut self) -> Result<Invoked, ScriptError> {
        self.call_global("draw", ())
    }
}

/// The interpreter's own message, without mlua's error-kind prefix.
fn lua_message(err: &LuaError) -> String {
    match err {
        LuaError::RuntimeError(msg) | LuaError::SyntaxError { message: msg, .. } => {
            first_line(msg)
        }
        LuaError::CallbackError { cause, .. } => lua_message(cause),
        other => first_line(&other.to_string()),
    }
}

/// One diagnostic line per error: drop the stack traceback mlua appends.
fn first_line(msg: &str) -> String {
    msg.lines().next().unwrap_or_default().trim_end().to_string()
}

fn arg_string(lua: &Lua, value: LuaValue) -> Option<String> {
    lua.coerce_string(value)
        .ok()
        .flatten()
        .map(|s| s.to_string_lossy())
}

fn arg_number(lua: &Lua, value: LuaValue) -> Option<f32> {
    lua.coerce_number(value).ok().flatten().map(|n| n as f32)
}

fn arg_integer(lua: &Lua, value: LuaValue) -> Option<i64> {
    lua.coerce_integer(value).ok().flatten()
}

fn arg_numbers<const N: usize>(lua: &Lua, values: [LuaValue; N]) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = arg_number(lua, value)?;
    }
    Some(out)
}

/// Borrow the shared capabilities for one native call. A failed borrow means
/// the host re-entered the script while holding the context; that surfaces as
/// a Lua error rather than a panic.
fn with_caps<C: Capabilities, R>(
    caps: &RefCell<C>,
    f: impl FnOnce(&mut C) -> R,
) -> LuaResult<R> {
    let mut guard = caps
        .try_borrow_mut()
        .map_err(|_| LuaError::runtime("host context is busy"))?;
    Ok(f(&mut guard))
}

fn install_api<C: Capabilities + 'static>(lua: &Lua, caps: Rc<RefCell<C>>) -> LuaResult<()> {
    let globals = lua.globals();

    // sprite
    let sprite = lua.create_table()?;
    let c = Rc::clone(&caps);
    sprite.set(
        "load",
        lua.create_function(move |lua, path: LuaValue| {
            let Some(path) = arg_string(lua, path) else {
                return (LuaNil, "sprite.load expects a path string").into_lua_multi(lua);
            };
            match with_caps(&c, |caps| caps.sprite_load(&path))? {
                Ok(handle) => i64::from(handle.get()).into_lua_multi(lua),
                Err(err) => (LuaNil, err.to_string()).into_lua_multi(lua),
            }
        })?,
    )?;
    let c = Rc::clone(&caps);
    sprite.set(
        "draw",
        lua.create_function(
            move |lua,
                  (handle, x, y, w, h, angle): (
                LuaValue,
                LuaValue,
                LuaValue,
                LuaValue,
                LuaValue,
                LuaValue,
            )| {
                let handle = arg_integer(lua, handle);
                let numbers = arg_numbers(lua, [x, y, w, h, angle]);
                with_caps(&c, |caps| match (handle, numbers) {
                    (Some(handle), Some([x, y, w, h, angle])) => {
                        caps.sprite_draw(handle, x, y, w, h, angle)
                    }
                    _ => caps.warn_once(
                        "sprite.draw:args",
                        "sprite.draw expects (handle, x, y, w, h, angle) numbers; call ignored",
                    ),
                })
            },
        )?,
    )?;
    globals.set("sprite", sprite)?;

    // input
    let input = lua.create_table()?;
    let c = Rc::clone(&caps);
    input.set(
        "down",
        lua.create_function(move |lua, name: LuaValue| {
            let name = arg_string(lua, name);
            with_caps(&c, |caps| match name {
                Some(name) => caps.input_down(&name),
                None => {
                    caps.warn_once("input.down:args", "input.down expects a name string");
                    false
                }
            })
        })?,
    )?;
    let c = Rc::clone(&caps);
    input.set(
        "axis",
        lua.create_function(move |lua, name: LuaValue| {
            let name = arg_string(lua, name);
            with_caps(&c, |caps| match name {
                Some(name) => caps.input_axis(&name),
                None => {
                    caps.warn_once("input.axis:args", "input.axis expects a name string");
                    0.0
                }
            })
        })?,
    )?;
    globals.set("input", input)?;

    // debug, extending the standard library table when one is loaded
    let debug = match globals.get::<LuaValue>("debug")? {
        LuaValue::Table(existing) => existing,
        _ => lua.create_table()?,
    };
    let c = Rc::clone(&caps);
    debug.set(
        "print",
        lua.create_function(move |lua, text: LuaValue| {
            let text = arg_string(lua, text);
            with_caps(&c, |caps| match text {
                Some(text) => caps.debug_print(&text),
                None => caps.warn_once("debug.print:args", "debug.print expects a string"),
            })
        })?,
    )?;
    let c = Rc::clone(&caps);
    debug.set(
        "set_pose",
        lua.create_function(move |lua, (x, y, angle): (LuaValue, LuaValue, LuaValue)| {
            let pose = arg_numbers(lua, [x, y, angle]);
            with_caps(&c, |caps| match pose {
                Some([x, y, angle]) => caps.set_pose(x, y, angle),
                None => caps.warn_once(
                    "debug.set_pose:args",
                    "debug.set_pose expects (x, y, angle) numbers; call ignored",
                ),
            })
        })?,
    )?;
    globals.set("debug", debug.clone())?;
    globals.set("dbg", debug)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sde_render::{Handle, ResourceError};
    use std::io::Write;

    /// Records every call; loads succeed until `capacity` is reached.
    #[derive(Default)]
    struct FakeCaps {
        loaded: Vec<String>,
        capacity: usize,
        draws: Vec<(i64, [f32; 5])>,
        pressed: Vec<&'static str>,
        axis_x: f32,
        printed: Vec<String>,
        pose: Option<(f32, f32, f32)>,
        warnings: Vec<String>,
    }

    impl Capabilities for FakeCaps {
        fn sprite_load(&mut self, path: &str) -> Result<Handle, ResourceError> {
            if self.loaded.len() >= self.capacity {
                return Err(ResourceError::PoolExhausted {
                    capacity: self.capacity,
                });
            }
            self.loaded.push(path.to_string());
            Handle::from_raw(self.loaded.len() as i64).ok_or(ResourceError::PoolExhausted {
                capacity: self.capacity,
            })
        }

        fn sprite_draw(&mut self, handle: i64, x: f32, y: f32, w: f32, h: f32, angle: f32) {
            self.draws.push((handle, [x, y, w, h, angle]));
        }

        fn input_down(&self, name: &str) -> bool {
            self.pressed.contains(&name)
        }

        fn input_axis(&self, name: &str) -> f32 {
            if name == "x" {
                self.axis_x
            } else {
                0.0
            }
        }

        fn debug_print(&mut self, text: &str) {
            self.printed.push(text.to_string());
        }

        fn set_pose(&mut self, x: f32, y: f32, angle: f32) {
            self.pose = Some((x, y, angle));
        }

        fn warn_once(&mut self, key: &str, _message: &str) {
            if !self.warnings.iter().any(|k| k == key) {
                self.warnings.push(key.to_string());
            }
        }
    }

    fn bridge_with(caps: FakeCaps, source: &str) -> (LuaBridge, Rc<RefCell<FakeCaps>>) {
        let caps = Rc::new(RefCell::new(caps));
        let mut bridge = LuaBridge::new(Rc::clone(&caps)).expect("install api");
        bridge.load_source("test.lua", source).expect("script loads");
        (bridge, caps)
    }

    fn temp_lua_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "sde_test_lua_bridge_{}_{}.lua",
            name,
            std::process::id()
        ));
        path
    }

    fn write_temp_script(path: &PathBuf, content: &str) {
        let mut f = std::fs::File::create(path).expect("failed to create temp script");
        f.write_all(content.as_bytes())
            .expect("failed to write temp script");
        f.flush().expect("failed to flush temp script");
    }

    #[test]
    fn lua_status_display_matches_label() {
        for status in [LuaStatus::Empty, LuaStatus::Loaded, LuaStatus::Error] {
            assert_eq!(format!("{status}"), status.label());
        }
    }

    #[test]
    fn loads_script_from_file() {
        let path = temp_lua_path("valid");
        write_temp_script(&path, "function update(dt) end");

        let caps = Rc::new(RefCell::new(FakeCaps::default()));
        let mut bridge = LuaBridge::new(caps).expect("install api");
        bridge.load_script(&path).expect("load");
        assert_eq!(bridge.status(), LuaStatus::Loaded);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let caps = Rc::new(RefCell::new(FakeCaps::default()));
        let mut bridge = LuaBridge::new(caps).expect("install api");
        let err = bridge
            .load_script(Path::new("__nonexistent_script_for_test__.lua"))
            .expect_err("missing");
        assert!(matches!(err, ScriptError::Read { .. }));
        assert_eq!(bridge.status(), LuaStatus::Error);
    }

    #[test]
    fn syntax_error_is_a_load_error() {
        let caps = Rc::new(RefCell::new(FakeCaps::default()));
        let mut bridge = LuaBridge::new(caps).expect("install api");
        let err = bridge
            .load_source("broken.lua", "this is not valid lua !@#$")
            .expect_err("syntax error");
        assert!(matches!(&err, ScriptError::Load(msg) if msg.contains("broken.lua")));
        assert_eq!(bridge.status(), LuaStatus::Error);
    }

    #[test]
    fn entry_points_are_optional() {
        let (mut bridge, _) = bridge_with(FakeCaps::default(), "x = 1");
        assert_eq!(bridge.call_update(0.016).expect("update"), Invoked::Skipped);
        assert_eq!(bridge.call_draw().expect("draw"), Invoked::Skipped);

        let (mut bridge, _) = bridge_with(FakeCaps::default(), "update = 42");
        assert_eq!(bridge.call_update(0.016).expect("update"), Invoked::Skipped);
    }

    #[test]
    fn update_receives_dt() {
        let (mut bridge, caps) = bridge_with(
            FakeCaps::default(),
            "function update(dt) debug.print(string.format('%.2f', dt)) end",
        );
        assert_eq!(bridge.call_update(0.1).expect("update"), Invoked::Called);
        assert_eq!(caps.borrow().printed, vec!["0.10".to_string()]);
    }

    #[test]
    fn runtime_errors_name_the_function_and_recover() {
        let (mut bridge, caps) = bridge_with(
            FakeCaps::default(),
            r#"
n = 0
function draw()
    n = n + 1
    if n == 2 then error("boom") end
    debug.print("frame " .. n)
end
"#,
        );
        bridge.call_draw().expect("first draw");
        let err = bridge.call_draw().expect_err("second draw fails");
        match &err {
            ScriptError::Runtime { function, message } => {
                assert_eq!(function, "draw");
                assert!(message.contains("boom"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().starts_with("Lua error in draw: "));
        assert_eq!(err.to_string().lines().count(), 1, "{err}");
        bridge.call_draw().expect("third draw");
        assert_eq!(
            caps.borrow().printed,
            vec!["frame 1".to_string(), "frame 3".to_string()]
        );
    }

    #[test]
    fn error_messages_drop_the_traceback() {
        let err = LuaError::RuntimeError(
            "main.lua:40: bad argument #2 to 'format'\nstack traceback:\n\t[C]: in ?".to_string(),
        );
        assert_eq!(lua_message(&err), "main.lua:40: bad argument #2 to 'format'");
        assert_eq!(lua_message(&LuaError::RuntimeError(String::new())), "");
    }

    #[test]
    fn sprite_load_returns_handle_or_nil_message() {
        let caps = FakeCaps {
            capacity: 1,
            ..Default::default()
        };
        let (bridge, caps) = bridge_with(
            caps,
            r#"
h1, e1 = sprite.load("/rd/ship.png")
h2, e2 = sprite.load("/rd/rock.png")
h3, e3 = sprite.load({})
"#,
        );
        let globals = bridge.lua.globals();
        assert_eq!(globals.get::<i64>("h1").expect("h1"), 1);
        assert!(globals.get::<Option<String>>("e1").expect("e1").is_none());
        assert!(globals.get::<Option<i64>>("h2").expect("h2").is_none());
        assert_eq!(
            globals.get::<String>("e2").expect("e2"),
            "sprite limit reached (1)"
        );
        assert!(globals.get::<Option<i64>>("h3").expect("h3").is_none());
        assert!(globals.get::<String>("e3").expect("e3").contains("path"));
        assert_eq!(caps.borrow().loaded, vec!["/rd/ship.png".to_string()]);
    }

    #[test]
    fn sprite_draw_coerces_and_ignores_malformed_calls() {
        let (_bridge, caps) = bridge_with(
            FakeCaps::default(),
            r#"
sprite.draw(1, 10, "20", 64, 64, 0.5)
sprite.draw("x", 10, 20, 64, 64, 0)
sprite.draw(1, 10)
sprite.draw(1.5, 1, 2, 3, 4, 5)
"#,
        );
        let caps = caps.borrow();
        assert_eq!(caps.draws, vec![(1, [10.0, 20.0, 64.0, 64.0, 0.5])]);
        assert_eq!(caps.warnings, vec!["sprite.draw:args".to_string()]);
    }

    #[test]
    fn input_queries_reach_capabilities() {
        let caps = FakeCaps {
            pressed: vec!["fire"],
            axis_x: -0.5,
            ..Default::default()
        };
        let (bridge, _) = bridge_with(
            caps,
            r#"
fire = input.down("fire")
left = input.down("left")
bad = input.down(nil)
ax = input.axis("x")
az = input.axis({})
"#,
        );
        let globals = bridge.lua.globals();
        assert!(globals.get::<bool>("fire").expect("fire"));
        assert!(!globals.get::<bool>("left").expect("left"));
        assert!(!globals.get::<bool>("bad").expect("bad"));
        assert_eq!(globals.get::<f32>("ax").expect("ax"), -0.5);
        assert_eq!(globals.get::<f32>("az").expect("az"), 0.0);
    }

    #[test]
    fn debug_table_and_dbg_alias() {
        let (_bridge, caps) = bridge_with(
            FakeCaps::default(),
            r#"
debug.print("hello")
dbg.print(42)
dbg.set_pose(1, 2, 3)
debug.set_pose("bad", 2, 3)
"#,
        );
        let caps = caps.borrow();
        assert_eq!(caps.printed, vec!["hello".to_string(), "42".to_string()]);
        assert_eq!(caps.pose, Some((1.0, 2.0, 3.0)));
        assert_eq!(caps.warnings, vec!["debug.set_pose:args".to_string()]);
    }

    #[test]
    fn busy_context_raises_instead_of_panicking() {
        let (mut bridge, caps) =
            bridge_with(FakeCaps::default(), "function draw() debug.print('x') end");
        let _held = caps.borrow_mut();
        let err = bridge.call_draw().expect_err("context is borrowed");
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn same_inputs_same_calls() {
        let script = r#"
x = 320
function update(dt)
    if input.down("right") then x = x + 100 * dt end
    if input.down("left") then x = x - 100 * dt end
end
function draw()
    sprite.draw(1, x, 240, 64, 64, 0)
end
"#;
        let run = || {
            let caps = FakeCaps {
                pressed: vec!["right"],
                ..Default::default()
            };
            let (mut bridge, caps) = bridge_with(caps, script);
            for _ in 0..10 {
                bridge.call_update(0.1).expect("update");
                bridge.call_draw().expect("draw");
            }
            let draws = caps.borrow().draws.clone();
            draws
        };
        let a = run();
        let b = run();
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert!((a[9].1[0] - 420.0).abs() < 1e-3);
    }
}
