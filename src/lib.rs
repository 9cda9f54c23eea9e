pub mod animation;
pub mod app;
pub mod builder;
pub mod camera;
pub mod config;
pub mod controls;
pub mod geometry;
pub mod lighting;
pub mod materials;
pub mod math_utils;
pub mod placement;
pub mod platform;
pub mod renderer;
pub mod scene;
pub mod textures;
pub mod viewport;

#[cfg(target_arch = "wasm32")]
mod wasm_support;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use wasm_bindgen::prelude::*;

    #[wasm_bindgen(start)]
    pub fn run() {
        super::wasm_support::logging_init();

        let config = super::wasm_support::config_from_location();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = super::app::run_async(config).await {
                tracing::error!("{e:#}");
            }
        });
    }
}
