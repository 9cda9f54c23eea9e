#[cfg(not(target_arch = "wasm32"))]
use anyhow::Context;
#[cfg(not(target_arch = "wasm32"))]
use haunted_house::config::SceneConfig;
#[cfg(not(target_arch = "wasm32"))]
use tracing_subscriber::EnvFilter;

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    tracing_log::LogTracer::init().context("failed to initialize LogTracer")?;

    // RUST_LOG overrides the default of INFO+ with wgpu limited to warnings.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wgpu_core=warn,wgpu_hal=warn,naga=warn"));

    let stdout_subscriber = tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(stdout_subscriber)
        .context("failed to install stdout global tracing subscriber")?;

    // An optional preset name or path to a TOML configuration file.
    let arg = std::env::args().nth(1);
    let config = SceneConfig::from_arg(arg.as_deref())?;

    haunted_house::app::run(config)
}

// The browser build starts from the library's `wasm_bindgen(start)` entry.
#[cfg(target_arch = "wasm32")]
fn main() {}
