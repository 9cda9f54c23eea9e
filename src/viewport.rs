use tracing::debug;

use crate::{
    animation::{FrameRenderer, RenderError},
    camera::Camera,
    scene::SceneRoot,
};

/// Size of the drawable area and the pixel density it is rendered at.
///
/// `width` and `height` are in logical (device independent) pixels. The render
/// target is that size multiplied by the device pixel ratio, with the ratio
/// capped so high density displays do not multiply GPU cost without bound.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    width: u32,
    height: u32,
    device_pixel_ratio: f32,
    max_pixel_ratio: f32,
}

impl Viewport {
    pub const DEFAULT_MAX_PIXEL_RATIO: f32 = 2.0;

    /// Create a viewport. Dimensions below one are raised to one.
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32, max_pixel_ratio: f32) -> Self {
        let mut viewport = Self {
            width: 1,
            height: 1,
            device_pixel_ratio: 1.0,
            max_pixel_ratio: sanitize_ratio(max_pixel_ratio),
        };

        viewport.resize(width, height, device_pixel_ratio);
        viewport
    }

    /// Update the viewport dimensions and device pixel ratio.
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.device_pixel_ratio = sanitize_ratio(device_pixel_ratio);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// The device pixel ratio clamped to the configured maximum.
    pub fn pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio.min(self.max_pixel_ratio)
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    /// Size of the render target in physical pixels.
    pub fn render_target_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.pixel_ratio()).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }
}

fn sanitize_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

/// Apply a change in viewport size.
///
/// The camera aspect and projection are updated, the renderer is resized and a
/// frame is rendered immediately, all before returning, so the next scheduled
/// frame never shows a stale aspect ratio.
pub fn handle_resize<R: FrameRenderer + ?Sized>(
    viewport: &mut Viewport,
    width: u32,
    height: u32,
    device_pixel_ratio: f32,
    camera: &mut Camera,
    renderer: &mut R,
    scene: &SceneRoot,
) -> Result<(), RenderError> {
    viewport.resize(width, height, device_pixel_ratio);

    camera.set_aspect(viewport.aspect());
    camera.update_projection_matrix();

    renderer.resize(viewport);

    debug!(
        "viewport resized to {}x{} (render target {:?})",
        viewport.width(),
        viewport.height(),
        viewport.render_target_size()
    );

    renderer.render(scene, camera)
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::{
        animation::testing::{RecordedFrame, RecordingRenderer},
        scene::Environment,
    };

    fn camera() -> Camera {
        Camera::new(Vec3::new(6.0, 3.0, 7.0), Vec3::ZERO, 75.0, 800.0 / 600.0).unwrap()
    }

    #[test]
    fn aspect_matches_dimensions() {
        for (w, h) in [(1, 1), (800, 600), (1920, 1080), (3, 7000)] {
            let viewport = Viewport::new(w, h, 1.0, 2.0);
            assert_eq!(w as f32 / h as f32, viewport.aspect());
        }
    }

    #[test]
    fn zero_dimensions_are_clamped() {
        let viewport = Viewport::new(0, 0, 1.0, 2.0);

        assert_eq!(1, viewport.width());
        assert_eq!(1, viewport.height());
        assert_eq!(1.0, viewport.aspect());
    }

    #[test]
    fn pixel_ratio_is_capped() {
        assert_eq!((1600, 1200), Viewport::new(800, 600, 3.0, 2.0).render_target_size());
        assert_eq!((1200, 900), Viewport::new(800, 600, 1.5, 2.0).render_target_size());
        assert_eq!((800, 600), Viewport::new(800, 600, f32::NAN, 2.0).render_target_size());
        assert_eq!(2.0, Viewport::new(10, 10, 4.0, 2.0).pixel_ratio());
        assert_eq!(4.0, Viewport::new(10, 10, 4.0, 2.0).device_pixel_ratio());
    }

    #[test]
    fn resize_updates_camera_then_renders_immediately() {
        let scene = SceneRoot::new(Environment::default());
        let mut viewport = Viewport::new(800, 600, 1.0, 2.0);
        let mut camera = camera();
        let mut renderer = RecordingRenderer::default();

        handle_resize(&mut viewport, 400, 300, 1.0, &mut camera, &mut renderer, &scene).unwrap();

        assert_eq!(400.0 / 300.0, camera.aspect());
        assert_eq!(
            vec![
                RecordedFrame::Resize { width: 400, height: 300 },
                RecordedFrame::Render {
                    aspect: 400.0 / 300.0,
                    ghost: None
                },
            ],
            renderer.frames
        );
    }

    #[test]
    fn resize_reports_render_failures() {
        let scene = SceneRoot::new(Environment::default());
        let mut viewport = Viewport::new(800, 600, 1.0, 2.0);
        let mut camera = camera();
        let mut renderer = RecordingRenderer {
            fail_renders: true,
            ..Default::default()
        };

        let result = handle_resize(&mut viewport, 0, 300, 2.5, &mut camera, &mut renderer, &scene);

        assert!(result.is_err());
        assert_eq!((2, 600), viewport.render_target_size());
        assert_eq!(1.0 / 300.0, camera.aspect());
    }
}
