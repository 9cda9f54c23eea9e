use anyhow::Context;
use tracing::{info, warn};
use winit::window::Window;

use crate::config::{SceneConfig, WindowConfig};

pub fn logging_init() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
}

/// Pick the scene preset named by the page's query string, eg `?grove`.
pub fn config_from_location() -> SceneConfig {
    let search = web_sys::window()
        .and_then(|w| w.location().search().ok())
        .unwrap_or_default();
    let name = search.trim_start_matches('?');

    if name.is_empty() {
        return SceneConfig::classic();
    }

    SceneConfig::preset(name).unwrap_or_else(|| {
        warn!("unknown scene preset '{name}', using the classic scene");
        SceneConfig::classic()
    })
}

/// Append the window's canvas to the page element named in `config`.
pub fn mount_canvas(window: &Window, config: &WindowConfig) -> anyhow::Result<()> {
    // Winit prevents sizing with CSS so the size has to be manually specified.
    info!(
        "requesting canvas size of {} x {}",
        config.width, config.height
    );

    use winit::dpi::LogicalSize;
    let _ = window.request_inner_size(LogicalSize::new(config.width, config.height));

    use winit::platform::web::WindowExtWebSys;
    let canvas = window
        .canvas()
        .context("the main window has no canvas element")?;

    let element = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(&config.canvas_id))
        .with_context(|| format!("no page element with id '{}'", config.canvas_id))?;

    element
        .append_child(&web_sys::Element::from(canvas))
        .map_err(|e| anyhow::anyhow!("failed to append canvas to '{}': {e:?}", config.canvas_id))?;

    Ok(())
}
