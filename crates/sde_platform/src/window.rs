use std::sync::Arc;

use sde_core::config::RuntimeConfig;
use winit::error::OsError;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Space Demo".to_string(),
            width: 640,
            height: 480,
        }
    }
}

impl From<&RuntimeConfig> for PlatformConfig {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            title: config.window_title.clone(),
            width: config.screen.width,
            height: config.screen.height,
        }
    }
}

pub fn create_window(
    event_loop: &ActiveEventLoop,
    config: &PlatformConfig,
) -> Result<Arc<Window>, OsError> {
    let attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

    log::debug!(
        "Creating window '{}' ({}x{})",
        config.title,
        config.width,
        config.height
    );
    let window = event_loop.create_window(attrs)?;
    Ok(Arc::new(window))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_config_follows_runtime_config() {
        let mut runtime = RuntimeConfig::default();
        runtime.window_title = "Demo".to_string();
        runtime.screen.width = 320;
        runtime.screen.height = 240;
        let platform = PlatformConfig::from(&runtime);
        assert_eq!(platform.title, "Demo");
        assert_eq!((platform.width, platform.height), (320, 240));
    }
}
