//! The per frame update: advance time, move the ghost light, step the camera
//! controls and render.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{
    camera::Camera,
    controls::CameraController,
    lighting::LightKey,
    math_utils::rotate_around_pivot,
    platform::TimeSource,
    scene::SceneRoot,
    viewport::Viewport,
};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render surface was lost or is outdated")]
    SurfaceLost,
    #[error("timed out waiting for the next render surface texture")]
    Timeout,
    #[error("out of gpu memory")]
    OutOfMemory,
    #[error("render failed: {0}")]
    Other(String),
}

/// Something that can draw the scene. Implemented by the GPU backend and by
/// test doubles.
pub trait FrameRenderer {
    /// Resize the render target to match `viewport`.
    fn resize(&mut self, viewport: &Viewport);

    /// Draw one frame of `scene` as seen from `camera`.
    fn render(&mut self, scene: &SceneRoot, camera: &Camera) -> Result<(), RenderError>;
}

/// A shared flag that stops an animation loop. Clones refer to the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Accumulates elapsed time from a time source. Never reset.
#[derive(Debug)]
pub struct Clock<T: TimeSource> {
    source: T,
    last: Duration,
}

impl<T: TimeSource> Clock<T> {
    pub fn new(source: T) -> Self {
        Self {
            source,
            last: Duration::ZERO,
        }
    }

    /// Read the clock, returning the total elapsed time and the time since the
    /// previous read.
    pub fn tick(&mut self) -> (Duration, Duration) {
        let elapsed = self.source.elapsed().max(self.last);
        let delta = elapsed - self.last;
        self.last = elapsed;

        (elapsed, delta)
    }

    pub fn elapsed(&self) -> Duration {
        self.last
    }
}

/// How the ghost's height changes over time.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum GhostMotion {
    /// Stay at a fixed height.
    Constant { height: f32 },
    /// Bounce between the ground and `amplitude` following `|sin(t * frequency)|`.
    Bobbing { amplitude: f32, frequency: f32 },
}

impl GhostMotion {
    pub fn height_at(&self, seconds: f32) -> f32 {
        match *self {
            GhostMotion::Constant { height } => height,
            GhostMotion::Bobbing {
                amplitude,
                frequency,
            } => ((seconds * frequency).sin() * amplitude).abs(),
        }
    }
}

impl Default for GhostMotion {
    fn default() -> Self {
        GhostMotion::Constant { height: 0.0 }
    }
}

/// A circular path around the scene origin.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostOrbit {
    pub radius: f32,
    /// Radians per second.
    pub angular_speed: f32,
    pub motion: GhostMotion,
}

impl Default for GhostOrbit {
    fn default() -> Self {
        Self {
            radius: 4.0,
            angular_speed: 0.3,
            motion: GhostMotion::default(),
        }
    }
}

impl GhostOrbit {
    /// Position on the orbit `seconds` after the animation started.
    pub fn position_at(&self, seconds: f32) -> Vec3 {
        let p = rotate_around_pivot(Vec2::ZERO, self.radius, seconds * self.angular_speed);
        Vec3::new(p.x, self.motion.height_at(seconds), p.y)
    }
}

/// What happened during a single tick.
#[derive(Debug)]
pub enum TickOutcome {
    Rendered,
    /// The frame could not be drawn. The loop keeps running.
    RenderFailed(RenderError),
    /// The loop was cancelled and did nothing.
    Stopped,
}

/// Moves the ghost light and redraws the scene once per tick until cancelled.
#[derive(Debug)]
pub struct AnimationLoop<T: TimeSource> {
    clock: Clock<T>,
    ghost: LightKey,
    orbit: GhostOrbit,
    cancel: CancellationToken,
    ticks: u64,
}

impl<T: TimeSource> AnimationLoop<T> {
    pub fn new(time_source: T, ghost: LightKey, orbit: GhostOrbit) -> Self {
        Self {
            clock: Clock::new(time_source),
            ghost,
            orbit,
            cancel: CancellationToken::new(),
            ticks: 0,
        }
    }

    /// A token that stops this loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of ticks that ran (cancelled ticks are not counted).
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Run one frame: read the clock, move the ghost along its orbit, step the
    /// camera controls and render.
    pub fn tick<C, R>(
        &mut self,
        scene: &mut SceneRoot,
        camera: &mut Camera,
        controls: &mut C,
        renderer: &mut R,
    ) -> TickOutcome
    where
        C: CameraController + ?Sized,
        R: FrameRenderer + ?Sized,
    {
        if self.cancel.is_cancelled() {
            return TickOutcome::Stopped;
        }

        let (elapsed, delta) = self.clock.tick();
        let position = self.orbit.position_at(elapsed.as_secs_f32());

        match scene.light_mut(self.ghost) {
            Some(ghost) => ghost.set_position(position),
            None => warn!("ghost light is missing from the scene"),
        }

        controls.update_camera(camera, delta);
        self.ticks += 1;

        match renderer.render(scene, camera) {
            Ok(()) => TickOutcome::Rendered,
            Err(e) => TickOutcome::RenderFailed(e),
        }
    }

    /// Run up to `count` ticks, stopping early if the loop is cancelled.
    /// Returns the number of ticks that ran.
    pub fn run_ticks<C, R>(
        &mut self,
        count: usize,
        scene: &mut SceneRoot,
        camera: &mut Camera,
        controls: &mut C,
        renderer: &mut R,
    ) -> usize
    where
        C: CameraController + ?Sized,
        R: FrameRenderer + ?Sized,
    {
        let mut ran = 0;

        for _ in 0..count {
            match self.tick(scene, camera, controls, renderer) {
                TickOutcome::Stopped => break,
                TickOutcome::RenderFailed(e) => warn!("frame skipped: {e}"),
                TickOutcome::Rendered => {}
            }

            ran += 1;
        }

        ran
    }
}

#[cfg(test)]
pub mod testing {
    use glam::Vec3;

    use super::*;
    use crate::lighting::Light;

    #[derive(Clone, Debug, PartialEq)]
    pub enum RecordedFrame {
        /// Render target size after the resize.
        Resize { width: u32, height: u32 },
        Render { aspect: f32, ghost: Option<Vec3> },
    }

    /// Records every call instead of drawing.
    #[derive(Debug, Default)]
    pub struct RecordingRenderer {
        pub frames: Vec<RecordedFrame>,
        /// Light reported as the ghost position in render records.
        pub ghost: Option<LightKey>,
        pub fail_renders: bool,
    }

    impl FrameRenderer for RecordingRenderer {
        fn resize(&mut self, viewport: &Viewport) {
            let (width, height) = viewport.render_target_size();
            self.frames.push(RecordedFrame::Resize { width, height });
        }

        fn render(&mut self, scene: &SceneRoot, camera: &Camera) -> Result<(), RenderError> {
            let ghost = self
                .ghost
                .and_then(|key| scene.light(key))
                .and_then(Light::position);

            self.frames.push(RecordedFrame::Render {
                aspect: camera.aspect(),
                ghost,
            });

            if self.fail_renders {
                Err(RenderError::Other("test failure".to_string()))
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::*, *};
    use crate::{
        controls::{OrbitCameraController, OrbitSettings},
        lighting::{Light, PointLight},
        platform::ManualTimeSource,
        scene::Environment,
    };

    struct Fixture {
        scene: SceneRoot,
        camera: Camera,
        controls: OrbitCameraController,
        renderer: RecordingRenderer,
        time: ManualTimeSource,
        animation: AnimationLoop<ManualTimeSource>,
    }

    fn fixture(orbit: GhostOrbit) -> Fixture {
        let mut scene = SceneRoot::new(Environment::default());
        let ghost = scene
            .add_light(
                None,
                Light::Point(PointLight {
                    color: Vec3::ONE,
                    intensity: 2.0,
                    position: Vec3::ZERO,
                    range: 3.0,
                    decay: 1.0,
                    shadow: None,
                }),
            )
            .unwrap();
        let time = ManualTimeSource::new();

        Fixture {
            scene,
            camera: Camera::new(Vec3::new(6.0, 3.0, 7.0), Vec3::ZERO, 75.0, 1.0).unwrap(),
            controls: OrbitCameraController::default(),
            renderer: RecordingRenderer {
                ghost: Some(ghost),
                ..Default::default()
            },
            animation: AnimationLoop::new(time.clone(), ghost, orbit),
            time,
        }
    }

    fn ghost_positions(renderer: &RecordingRenderer) -> Vec<Vec3> {
        renderer
            .frames
            .iter()
            .filter_map(|f| match f {
                RecordedFrame::Render { ghost, .. } => *ghost,
                _ => None,
            })
            .collect()
    }

    #[test]
    fn ghost_stays_on_orbit_circle() {
        let orbit = GhostOrbit::default();

        for i in 0..200 {
            let p = orbit.position_at(i as f32 * 0.731);
            assert!((p.x * p.x + p.z * p.z - 16.0).abs() < 1e-3);
            assert_eq!(0.0, p.y);
        }
    }

    #[test]
    fn bobbing_height_stays_in_bounds() {
        let motion = GhostMotion::Bobbing {
            amplitude: 4.0,
            frequency: 1.0,
        };

        assert_eq!(0.0, motion.height_at(0.0));
        assert!((motion.height_at(std::f32::consts::FRAC_PI_2) - 4.0).abs() < 1e-5);
        for i in 0..100 {
            let h = motion.height_at(i as f32 * 0.1);
            assert!((0.0..=4.0).contains(&h));
        }
    }

    #[test]
    fn each_tick_moves_ghost_and_renders_once() {
        let mut f = fixture(GhostOrbit::default());

        for _ in 0..3 {
            f.time.advance(Duration::from_secs(1));
            let outcome = f.animation.tick(
                &mut f.scene,
                &mut f.camera,
                &mut f.controls,
                &mut f.renderer,
            );
            assert!(matches!(outcome, TickOutcome::Rendered));
        }

        let positions = ghost_positions(&f.renderer);
        assert_eq!(3, positions.len());

        for (i, p) in positions.iter().enumerate() {
            let expected = GhostOrbit::default().position_at((i + 1) as f32);
            assert!(p.abs_diff_eq(expected, 1e-5));
        }

        assert_eq!(Duration::from_secs(3), f.animation.elapsed());
        assert_eq!(3, f.animation.ticks());
    }

    #[test]
    fn cancelled_loop_stops_before_rendering() {
        let mut f = fixture(GhostOrbit::default());
        let token = f.animation.cancellation_token();

        let ran = f.animation.run_ticks(
            2,
            &mut f.scene,
            &mut f.camera,
            &mut f.controls,
            &mut f.renderer,
        );
        assert_eq!(2, ran);

        token.cancel();
        let outcome = f.animation.tick(
            &mut f.scene,
            &mut f.camera,
            &mut f.controls,
            &mut f.renderer,
        );
        assert!(matches!(outcome, TickOutcome::Stopped));

        let ran = f.animation.run_ticks(
            5,
            &mut f.scene,
            &mut f.camera,
            &mut f.controls,
            &mut f.renderer,
        );
        assert_eq!(0, ran);
        assert_eq!(2, f.renderer.frames.len());
    }

    #[test]
    fn render_failures_do_not_stop_the_loop() {
        let mut f = fixture(GhostOrbit::default());
        f.renderer.fail_renders = true;

        let ran = f.animation.run_ticks(
            4,
            &mut f.scene,
            &mut f.camera,
            &mut f.controls,
            &mut f.renderer,
        );

        assert_eq!(4, ran);
        assert_eq!(4, f.renderer.frames.len());
    }

    #[test]
    fn ticks_step_camera_damping() {
        let mut f = fixture(GhostOrbit::default());
        let mut controls = OrbitCameraController::new(OrbitSettings::default());
        controls.rotate(1.0, 0.0);
        let before = f.camera.eye();

        f.animation.run_ticks(
            1,
            &mut f.scene,
            &mut f.camera,
            &mut controls,
            &mut f.renderer,
        );
        let after_one = f.camera.eye();
        assert_ne!(before, after_one);

        // Without new input the camera keeps gliding.
        f.animation.run_ticks(
            1,
            &mut f.scene,
            &mut f.camera,
            &mut controls,
            &mut f.renderer,
        );
        assert_ne!(after_one, f.camera.eye());
    }

    #[test]
    fn clock_never_runs_backwards() {
        let time = ManualTimeSource::new();
        let mut clock = Clock::new(time.clone());

        time.advance(Duration::from_millis(16));
        assert_eq!(
            (Duration::from_millis(16), Duration::from_millis(16)),
            clock.tick()
        );
        assert_eq!((Duration::from_millis(16), Duration::ZERO), clock.tick());
    }

    #[test]
    fn bobbing_profile_parses_from_toml() {
        let orbit: GhostOrbit = toml::from_str(
            r#"
            radius = 4.0
            angular_speed = 0.3
            motion = { profile = "bobbing", amplitude = 4.0, frequency = 1.0 }
            "#,
        )
        .unwrap();

        assert_eq!(
            GhostMotion::Bobbing {
                amplitude: 4.0,
                frequency: 1.0
            },
            orbit.motion
        );
    }
}
