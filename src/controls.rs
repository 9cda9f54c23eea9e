use std::{f32::consts::PI, time::Duration};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use winit::event::{ElementState, MouseButton, WindowEvent};

use crate::camera::Camera;

pub trait CameraController {
    /// Updates the camera controller state with the given input event. This
    /// method returns `true` if `event` was used by this update method, other
    /// -wise false is returned.
    fn process_input(&mut self, event: &WindowEvent) -> bool;

    /// Accumulates mouse motion deltas (in pixels) until camera updates are
    /// applied in `update_camera`.
    fn process_mouse_motion(&mut self, delta: Vec2);

    /// Accumulates mouse scroll wheel deltas (in lines, positive is away from
    /// the user) until camera updates are applied in `update_camera`.
    fn process_mouse_wheel(&mut self, delta: Vec2);

    /// Applies updates to the camera that reflect the current state of this
    /// controller. Called once per animation tick.
    fn update_camera(&mut self, camera: &mut Camera, delta: Duration);
}

/// Settings for the orbit controller.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitSettings {
    /// Ease rotation towards the requested orientation over several ticks
    /// rather than snapping to it.
    pub enable_damping: bool,
    /// Fraction of the outstanding rotation applied each tick when damping.
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    /// Minimum view distance from target.
    pub min_distance: f32,
    /// Maximum view distance from target.
    pub max_distance: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }
}

/// Orbits the camera around its target. Dragging with the left mouse button
/// rotates, the mouse wheel moves closer or further away.
///
/// Rotation is tracked as a pending change in spherical coordinates around the
/// target. Without damping the whole change is applied on the next update.
/// With damping only `damping_factor` of it is applied per update and the
/// remainder decays geometrically, so the camera glides to a stop.
#[derive(Clone, Debug)]
pub struct OrbitCameraController {
    settings: OrbitSettings,
    /// Allows mouse motion to contribute to the camera controller when set to
    /// true, otherwise mouse motion is ignored.
    dragging: bool,
    /// Pending (azimuth, polar) rotation in radians.
    pending_rotation: Vec2,
    /// Pending distance multiplier.
    pending_scale: f32,
    /// Viewport height in pixels, mouse motion across the full height rotates
    /// one full turn.
    viewport_height: f32,
}

impl OrbitCameraController {
    /// Keeps the camera from flipping over the poles.
    const POLAR_EPSILON: f32 = 1e-6;

    pub fn new(settings: OrbitSettings) -> Self {
        Self {
            settings,
            dragging: false,
            pending_rotation: Vec2::ZERO,
            pending_scale: 1.0,
            viewport_height: 1.0,
        }
    }

    pub fn settings(&self) -> &OrbitSettings {
        &self.settings
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Queue a rotation of `azimuth` radians around the vertical axis and
    /// `polar` radians towards the bottom pole.
    pub fn rotate(&mut self, azimuth: f32, polar: f32) {
        self.pending_rotation += Vec2::new(azimuth, polar);
    }

    /// Queue a change in distance from the target. Values below 1 move the
    /// camera closer.
    pub fn dolly(&mut self, scale: f32) {
        if scale.is_finite() && scale > 0.0 {
            self.pending_scale *= scale;
        }
    }

    /// Whether the camera will still move on the next update.
    pub fn is_settling(&self) -> bool {
        self.pending_rotation.length_squared() > 1e-12 || self.pending_scale != 1.0
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.settings.zoom_speed)
    }
}

impl Default for OrbitCameraController {
    fn default() -> Self {
        Self::new(OrbitSettings::default())
    }
}

impl CameraController for OrbitCameraController {
    fn process_input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.set_dragging(*state == ElementState::Pressed);
                true
            }
            _ => false,
        }
    }

    fn process_mouse_motion(&mut self, delta: Vec2) {
        if self.dragging {
            let radians_per_pixel = 2.0 * PI * self.settings.rotate_speed / self.viewport_height;
            // Dragging right spins the scene right, which moves the camera left.
            self.rotate(-delta.x * radians_per_pixel, -delta.y * radians_per_pixel);
        }
    }

    fn process_mouse_wheel(&mut self, delta: Vec2) {
        if delta.y != 0.0 {
            self.dolly(self.zoom_scale().powf(delta.y));
        }
    }

    fn update_camera(&mut self, camera: &mut Camera, _delta: Duration) {
        let target = camera.target();
        let offset = camera.eye() - target;

        let radius = offset.length();
        let mut azimuth = offset.x.atan2(offset.z);
        let mut polar = (offset.y / radius.max(f32::EPSILON)).clamp(-1.0, 1.0).acos();

        let step = if self.settings.enable_damping {
            self.settings.damping_factor
        } else {
            1.0
        };

        azimuth += self.pending_rotation.x * step;
        polar += self.pending_rotation.y * step;
        polar = polar.clamp(Self::POLAR_EPSILON, PI - Self::POLAR_EPSILON);

        let radius = (radius * self.pending_scale)
            .clamp(self.settings.min_distance, self.settings.max_distance)
            .max(f32::EPSILON);

        let eye = target
            + radius
                * Vec3::new(
                    polar.sin() * azimuth.sin(),
                    polar.cos(),
                    polar.sin() * azimuth.cos(),
                );

        camera.reorient(eye, target);

        if self.settings.enable_damping {
            self.pending_rotation *= 1.0 - self.settings.damping_factor;
        } else {
            self.pending_rotation = Vec2::ZERO;
        }

        self.pending_scale = 1.0;
    }
}
