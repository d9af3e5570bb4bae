//! Startup: asset report, optional console delay, script load.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use sde_core::config::RuntimeConfig;
use sde_render::{ResourceManager, TileDevice};

use crate::capabilities::FrameContext;
use crate::diagnostics::{check_required_assets, DiagnosticSink};
use crate::lua_bridge::LuaBridge;

pub struct Booted<D: TileDevice> {
    pub ctx: Rc<RefCell<FrameContext<D>>>,
    /// `None` when the script failed to load; the loop then runs inert.
    pub script: Option<LuaBridge>,
}

/// Build the frame context and load the entry script.
///
/// Never fails: a missing asset is only reported, and a script that cannot be
/// read, parsed or executed leaves the runtime inert.
pub fn boot<D: TileDevice + 'static>(
    device: D,
    resources: ResourceManager,
    config: RuntimeConfig,
    diagnostics: Box<dyn DiagnosticSink>,
) -> Booted<D> {
    let ctx = Rc::new(RefCell::new(FrameContext::new(
        device,
        resources,
        config,
        diagnostics,
    )));

    let (script_name, script_path, boot_delay) = {
        let mut guard = ctx.borrow_mut();
        let c = &mut *guard;
        c.diagnostics.info("BOOT");
        let missing = check_required_assets(&c.config, c.diagnostics.as_mut());
        if missing > 0 {
            log::warn!("{missing} required asset(s) missing; continuing");
        }
        (
            c.config.script.clone(),
            c.config.script_path(),
            Duration::from_millis(c.config.boot_delay_ms),
        )
    };

    if !boot_delay.is_zero() {
        std::thread::sleep(boot_delay);
    }

    report(&ctx, &format!("About to load {script_name}..."));
    let loaded = LuaBridge::new(Rc::clone(&ctx)).and_then(|mut bridge| {
        bridge.load_script(&script_path)?;
        Ok(bridge)
    });
    let script = match loaded {
        Ok(bridge) => {
            report(&ctx, "Lua loaded OK.");
            Some(bridge)
        }
        Err(err) => {
            ctx.borrow_mut()
                .diagnostics
                .error(&format!("Lua load error: {err}"));
            None
        }
    };

    Booted { ctx, script }
}

fn report<D: TileDevice>(ctx: &RefCell<FrameContext<D>>, line: &str) {
    ctx.borrow_mut().diagnostics.info(line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::lua_bridge::LuaStatus;
    use sde_render::{PngLoader, RecordingDevice};
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("sde_test_boot_{}_{}", name, std::process::id()));
        let _ = std::fs::create_dir_all(&path);
        path
    }

    fn boot_with_script(dir: &str, script: Option<&str>) -> (Booted<RecordingDevice>, MemorySink) {
        let root = temp_dir(dir);
        if let Some(source) = script {
            std::fs::write(root.join("main.lua"), source).expect("write script");
        }
        let mut config = RuntimeConfig::default();
        config.romdisk_root = root;
        let sink = MemorySink::default();
        let booted = boot(
            RecordingDevice::new(),
            ResourceManager::new(config.sprite_capacity, Box::new(PngLoader)),
            config,
            Box::new(sink.clone()),
        );
        (booted, sink)
    }

    #[test]
    fn good_script_boots_in_order() {
        let (booted, sink) = boot_with_script("good", Some("function update(dt) end"));
        assert!(booted.script.is_some());
        assert_eq!(
            booted.script.as_ref().map(LuaBridge::status),
            Some(LuaStatus::Loaded)
        );
        assert_eq!(
            sink.lines(),
            vec![
                "BOOT".to_string(),
                "FOUND:   /rd/main.lua".to_string(),
                "MISSING: /rd/es_sprite_64.png".to_string(),
                "About to load /rd/main.lua...".to_string(),
                "Lua loaded OK.".to_string(),
            ]
        );
    }

    #[test]
    fn syntax_error_leaves_runtime_inert() {
        let (booted, sink) = boot_with_script("syntax", Some("function update(dt"));
        assert!(booted.script.is_none());
        assert_eq!(sink.count_containing("Lua load error:"), 1);
        assert_eq!(sink.count_containing("Lua loaded OK."), 0);
    }

    #[test]
    fn missing_script_leaves_runtime_inert() {
        let (booted, sink) = boot_with_script("missing", None);
        assert!(booted.script.is_none());
        assert_eq!(sink.count_containing("MISSING: /rd/main.lua"), 1);
        assert_eq!(sink.count_containing("Lua load error: cannot open"), 1);
    }

    #[test]
    fn top_level_runtime_error_is_a_load_error() {
        let (booted, sink) = boot_with_script("toplevel", Some("error('nope')"));
        assert!(booted.script.is_none());
        assert_eq!(sink.count_containing("nope"), 1);
    }
}
