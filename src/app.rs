//! Hosts the scene in a window: owns the event loop and routes platform events
//! to the camera controls, the viewport and the animation loop.
use std::sync::Arc;

use anyhow::Context;
use glam::Vec2;
use tracing::{debug, error, info, warn};
use winit::{
    dpi::{LogicalSize, PhysicalSize},
    event::{DeviceEvent, ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::{EventLoop, EventLoopWindowTarget},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowBuilder},
};

use crate::{
    animation::{AnimationLoop, RenderError, TickOutcome},
    builder::{build_scene, BuiltScene},
    camera::Camera,
    config::SceneConfig,
    controls::{CameraController, OrbitCameraController},
    platform::SystemTimeSource,
    renderer::Renderer,
    scene::SceneRoot,
    textures::{FileTextureSource, TextureBank},
    viewport::{handle_resize, Viewport},
};

/// Trackpads report scrolling in pixels, the controls expect lines.
const PIXELS_PER_LINE: f32 = 40.0;

/// Everything that lives for as long as the window is open.
pub struct SceneApp {
    window: Arc<Window>,
    renderer: Renderer,
    bank: TextureBank,
    scene: SceneRoot,
    camera: Camera,
    controls: OrbitCameraController,
    viewport: Viewport,
    animation: AnimationLoop<SystemTimeSource>,
}

impl SceneApp {
    /// Build the scene described by `config` and the renderer that draws it
    /// into `window`. Textures keep loading after this returns.
    pub async fn new(window: Arc<Window>, config: &SceneConfig) -> anyhow::Result<Self> {
        let (width, height) = logical_size(window.inner_size(), window.scale_factor());
        let viewport = Viewport::new(
            width,
            height,
            window.scale_factor() as f32,
            config.window.max_pixel_ratio,
        );

        let mut bank = TextureBank::new(Arc::new(FileTextureSource::new(&config.asset_root)));
        let mut rng = config.rng();
        let BuiltScene { scene, lights } =
            build_scene(config, &mut bank, &mut rng).context("failed to build the scene")?;

        info!(
            "scene built with {} meshes and {} lights, {} textures loading",
            scene.mesh_count(),
            scene.light_count(),
            bank.pending()
        );

        let camera = Camera::with_clip_planes(
            config.camera.position,
            config.camera.target,
            config.camera.fov_y,
            viewport.aspect(),
            config.camera.z_near,
            config.camera.z_far,
        )
        .context("invalid camera settings")?;

        let mut controls = OrbitCameraController::new(config.controls);
        controls.set_viewport_height(viewport.height());

        let renderer = Renderer::new(window.clone(), &viewport).await?;
        let animation = AnimationLoop::new(SystemTimeSource::new(), lights.ghost, config.ghost);

        Ok(Self {
            window,
            renderer,
            bank,
            scene,
            camera,
            controls,
            viewport,
            animation,
        })
    }

    /// Dispatch one event from the platform event loop.
    pub fn handle_event(&mut self, event: Event<()>, elwt: &EventLoopWindowTarget<()>) {
        match event {
            Event::WindowEvent { window_id, event } if window_id == self.window.id() => {
                self.window_event(event, elwt)
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta: (dx, dy) },
                ..
            } => self
                .controls
                .process_mouse_motion(Vec2::new(dx as f32, dy as f32)),
            Event::AboutToWait => self.window.request_redraw(),
            _ => {}
        }
    }

    fn window_event(&mut self, event: WindowEvent, elwt: &EventLoopWindowTarget<()>) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                info!("closing the main window");
                self.animation.cancellation_token().cancel();
                elwt.exit();
            }
            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::ScaleFactorChanged { .. } => self.resize(self.window.inner_size()),
            WindowEvent::RedrawRequested => self.redraw(elwt),
            WindowEvent::MouseWheel { delta, .. } => {
                self.controls.process_mouse_wheel(wheel_lines(delta))
            }
            other => {
                self.controls.process_input(&other);
            }
        }
    }

    fn redraw(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let loaded = self.bank.poll();
        if loaded > 0 {
            debug!("{loaded} texture(s) finished loading, {} pending", self.bank.pending());
        }

        match self.animation.tick(
            &mut self.scene,
            &mut self.camera,
            &mut self.controls,
            &mut self.renderer,
        ) {
            TickOutcome::Rendered => {}
            TickOutcome::RenderFailed(e) => self.report_render_error(e),
            TickOutcome::Stopped => elwt.exit(),
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        // Minimized windows report an empty size.
        if size.width == 0 || size.height == 0 {
            debug!("ignoring resize to {}x{}", size.width, size.height);
            return;
        }

        let scale_factor = self.window.scale_factor();
        let (width, height) = logical_size(size, scale_factor);

        let result = handle_resize(
            &mut self.viewport,
            width,
            height,
            scale_factor as f32,
            &mut self.camera,
            &mut self.renderer,
            &self.scene,
        );

        self.controls.set_viewport_height(self.viewport.height());

        if let Err(e) = result {
            self.report_render_error(e);
        }
    }

    fn report_render_error(&self, error: RenderError) {
        match error {
            RenderError::SurfaceLost => warn!("frame skipped, surface reconfigured: {error}"),
            _ => error!("frame skipped: {error}"),
        }
    }
}

fn logical_size(size: PhysicalSize<u32>, scale_factor: f64) -> (u32, u32) {
    let logical = size.to_logical::<f64>(scale_factor);
    (
        (logical.width.round() as u32).max(1),
        (logical.height.round() as u32).max(1),
    )
}

fn wheel_lines(delta: MouseScrollDelta) -> Vec2 {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => Vec2::new(x, y),
        MouseScrollDelta::PixelDelta(position) => {
            Vec2::new(position.x as f32, position.y as f32) / PIXELS_PER_LINE
        }
    }
}

/// Open the main window and run the scene until the window closes.
pub async fn run_async(config: SceneConfig) -> anyhow::Result<()> {
    info!("creating main window for rendering");

    let event_loop = EventLoop::new().context("failed to create main window event loop")?;
    let window = WindowBuilder::new()
        .with_title(config.window.title.as_str())
        .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
        .build(&event_loop)
        .context("failed to create the main window")?;
    let window = Arc::new(window);

    // Insert the main window into an HTML canvas element for WASM targets.
    #[cfg(target_arch = "wasm32")]
    crate::wasm_support::mount_canvas(&window, &config.window)?;

    let mut app = SceneApp::new(window, &config).await?;

    info!("starting main window event loop");
    event_loop
        .run(move |event, elwt| app.handle_event(event, elwt))
        .context("main window event loop processing failed")?;

    info!("main window event loop finished");
    Ok(())
}

/// Blocking wrapper around `run_async` for native targets.
#[cfg(not(target_arch = "wasm32"))]
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    pollster::block_on(run_async(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn logical_size_divides_out_the_scale_factor() {
        assert_eq!((640, 360), logical_size(PhysicalSize::new(1280, 720), 2.0));
        assert_eq!((1280, 720), logical_size(PhysicalSize::new(1280, 720), 1.0));
        assert_eq!((1, 1), logical_size(PhysicalSize::new(0, 0), 1.0));
    }

    #[test]
    fn pixel_scrolling_converts_to_lines() {
        assert_eq!(
            Vec2::new(0.0, 2.0),
            wheel_lines(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 80.0)))
        );
        assert_eq!(
            Vec2::new(0.0, -1.0),
            wheel_lines(MouseScrollDelta::LineDelta(0.0, -1.0))
        );
    }
}
