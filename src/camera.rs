use glam::{Mat4, Vec3};
use thiserror::Error;

/// Camera assumes a right-handed system with the +Z axis going _out_ of the
/// screen rather than in, +X to the right and +Y up.
///
/// The following transforms points from local space to clip space:
///  `V_clip = M_projection * M_view * M_model * M_local`
///
/// The projection matrix is cached. After changing the field of view, aspect
/// ratio or clip planes call `update_projection_matrix` for the change to take
/// effect, the same way a resize handler does.
#[derive(Clone, Debug)]
pub struct Camera {
    /// The position of the camera in world space.
    eye: Vec3,
    /// The target position the camera should look at.
    target: Vec3,
    /// The camera's up direction.
    up: Vec3,
    /// A world space direction vector indicating which direction is considered
    /// straight up.
    world_up: Vec3,
    /// The ratio of the viewport width to its height. An example is if the view
    /// is one unit high and two units wide then the aspect ratio is 2/1.
    aspect: f32,
    /// The vertical field of view in radians.
    fov_y: f32,
    /// The minimum camera view distance. Fragments closer than `z_near` will not
    /// be rendered.
    z_near: f32,
    /// The maximum camera view distance. Fragments further than `z_far` will not
    /// be rendered.
    z_far: f32,
    projection: Mat4,
}

impl Camera {
    pub const DEFAULT_Z_NEAR: f32 = 0.1;
    pub const DEFAULT_Z_FAR: f32 = 2000.0;

    /// Create a new camera centered at `eye` with the center of the view
    /// aiming at `target`. `fov_y` is the vertical field of view in degrees.
    pub fn new(
        eye: Vec3,
        target: Vec3,
        fov_y_degrees: f32,
        aspect: f32,
    ) -> Result<Self, InvalidCameraSettings> {
        Self::with_clip_planes(
            eye,
            target,
            fov_y_degrees,
            aspect,
            Self::DEFAULT_Z_NEAR,
            Self::DEFAULT_Z_FAR,
        )
    }

    pub fn with_clip_planes(
        eye: Vec3,
        target: Vec3,
        fov_y_degrees: f32,
        aspect: f32,
        z_near: f32,
        z_far: f32,
    ) -> Result<Self, InvalidCameraSettings> {
        if !(fov_y_degrees > 0.0 && fov_y_degrees < 180.0) {
            return Err(InvalidCameraSettings::FieldOfView(fov_y_degrees));
        }

        if !(z_near > 0.0 && z_far > z_near) {
            return Err(InvalidCameraSettings::ClipPlanes(z_near, z_far));
        }

        if eye == target {
            return Err(InvalidCameraSettings::EyeAtTarget);
        }

        let mut camera = Self {
            eye,
            target,
            up: Vec3::Y,
            world_up: Vec3::Y,
            aspect: Self::sanitize_aspect(aspect),
            fov_y: fov_y_degrees.to_radians(),
            z_near,
            z_far,
            projection: Mat4::IDENTITY,
        };

        camera.reorient(eye, target);
        camera.update_projection_matrix();

        Ok(camera)
    }

    /// Reorient the camera to be located at `eye` and look at `target`. Both
    /// points are should be in world space.
    ///
    /// Calling `reorient` will rebuild the camera's local coordinate system
    /// using the Gram-Schimdt process.
    pub fn reorient(&mut self, new_eye: Vec3, new_target: Vec3) {
        self.eye = new_eye;
        self.target = new_target;

        // NOTE: This direction is technically the _opposite_ of the camera's
        // facing direction (it goes from target to eye rather than eye to target).
        //
        // This is because the view matrix's coordinate system Z axis is positive
        // but by OpenGL convention the camera points towards the negative Z
        // axis.
        let new_direction = (self.eye - self.target).normalize_or_zero();
        let new_right = Vec3::cross(self.world_up, new_direction).normalize_or_zero();

        // Looking straight up or down leaves the previous up vector in place.
        if new_right != Vec3::ZERO {
            self.up = Vec3::cross(new_direction, new_right);
        }
    }

    /// Get the camera's view matrix.
    ///
    /// A view matrix transforms coordinates from world space to view space.
    /// View space is a coordinate space that can be imagined as the user's view
    /// into the scene, with the user's eye located at (0, 0, 0) and looking
    /// down the -Z axis.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Get the camera's cached projection matrix.
    ///
    /// A projection matrix transforms coordinates from view space to clip space.
    /// This camera applies a perspective projection to make objects farther from
    /// the camera appear smaller.
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Get the camera's view projection matrix. The view projection matrix will
    /// transform points from world space to clip space.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Rebuild the cached projection matrix from the current field of view,
    /// aspect ratio and clip planes.
    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
    }

    /// Set the aspect ratio. Non finite or non positive values are replaced
    /// with 1.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = Self::sanitize_aspect(aspect);
    }

    /// Set the vertical field of view in degrees.
    pub fn set_fov_y(&mut self, degrees: f32) -> Result<(), InvalidCameraSettings> {
        if degrees > 0.0 && degrees < 180.0 {
            self.fov_y = degrees.to_radians();
            Ok(())
        } else {
            Err(InvalidCameraSettings::FieldOfView(degrees))
        }
    }

    fn sanitize_aspect(aspect: f32) -> f32 {
        if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        }
    }

    /// Get the position of the camera in world space.
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// Get the point at which the camera is focused on.
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Get the camera's up axis.
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Unit vector pointing from the eye towards the target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Vertical field of view in radians.
    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    /// Get the world up axis (not the camera's up axis).
    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidCameraSettings {
    #[error("vertical field of view must be between 0 and 180 degrees but was {0}")]
    FieldOfView(f32),
    #[error("clip planes must satisfy 0 < near < far but near was {0} and far was {1}")]
    ClipPlanes(f32, f32),
    #[error("camera eye and target must be different points")]
    EyeAtTarget,
}
