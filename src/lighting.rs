use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use tracing::debug;

use crate::{
    math_utils::color_from_hex,
    scene::{SceneError, SceneRoot},
};

new_key_type! {
    /// Identifies a light stored in a scene.
    pub struct LightKey;
}

/// Uniform light applied equally to every surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

/// Light arriving from a single direction, pointing from `position` towards
/// `target`. Both points are in the space of the light's parent group.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub shadow: Option<ShadowConfig>,
}

impl DirectionalLight {
    /// Unit vector pointing from the light towards its target.
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Transform from world space to the clip space of the light's shadow
    /// camera, or `None` when the light does not cast shadows.
    ///
    /// `position` and `target` are the light's world space position and
    /// target.
    pub fn shadow_view_projection(&self, position: Vec3, target: Vec3) -> Option<Mat4> {
        let shadow = self.shadow.as_ref()?;
        let bounds = shadow.bounds.unwrap_or_default();

        let forward = (target - position).normalize_or_zero();
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };

        let view = Mat4::look_at_rh(position, target, up);
        let projection = Mat4::orthographic_rh(
            bounds.left,
            bounds.right,
            bounds.bottom,
            bounds.top,
            shadow.near,
            shadow.far,
        );

        Some(projection * view)
    }
}

/// Light radiating in all directions from a point, fading out to nothing at
/// `range`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    /// Distance at which the light's contribution reaches zero. Zero means
    /// the light never fades out.
    pub range: f32,
    /// How quickly the light fades towards `range`.
    pub decay: f32,
    pub shadow: Option<ShadowConfig>,
}

impl PointLight {
    /// Fraction of the light's intensity reaching a surface `distance` units
    /// away.
    pub fn attenuation(&self, distance: f32) -> f32 {
        if self.range > 0.0 && self.decay > 0.0 {
            (1.0 - distance / self.range).clamp(0.0, 1.0).powf(self.decay)
        } else {
            1.0
        }
    }
}

/// The closed set of light kinds a scene can hold.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Light {
    Ambient(AmbientLight),
    Directional(DirectionalLight),
    Point(PointLight),
}

impl Light {
    /// Local position of positional lights.
    pub fn position(&self) -> Option<Vec3> {
        match self {
            Light::Ambient(_) => None,
            Light::Directional(light) => Some(light.position),
            Light::Point(light) => Some(light.position),
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        match self {
            Light::Ambient(_) => {}
            Light::Directional(light) => light.position = position,
            Light::Point(light) => light.position = position,
        }
    }

    pub fn casts_shadow(&self) -> bool {
        match self {
            Light::Ambient(_) => false,
            Light::Directional(light) => light.shadow.is_some(),
            Light::Point(light) => light.shadow.is_some(),
        }
    }
}

/// Left, right, top and bottom planes of an orthographic shadow camera.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrthoBounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl OrthoBounds {
    pub fn symmetric(half_extent: f32) -> Self {
        Self {
            left: -half_extent,
            right: half_extent,
            top: half_extent,
            bottom: -half_extent,
        }
    }
}

impl Default for OrthoBounds {
    fn default() -> Self {
        Self::symmetric(5.0)
    }
}

/// Shadow camera settings for a shadow casting light.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub near: f32,
    pub far: f32,
    /// Orthographic bounds, only used by directional lights.
    pub bounds: Option<OrthoBounds>,
    /// Width and height of the shadow map in texels.
    pub map_size: u32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            near: 0.5,
            far: 500.0,
            bounds: None,
            map_size: 512,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientLightConfig {
    pub color: String,
    pub intensity: f32,
}

impl Default for AmbientLightConfig {
    fn default() -> Self {
        Self {
            color: "#b9d5ff".to_string(),
            intensity: 0.12,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLightConfig {
    pub color: String,
    pub intensity: f32,
    pub position: Vec3,
    pub cast_shadow: bool,
    pub shadow: ShadowConfig,
}

impl Default for DirectionalLightConfig {
    fn default() -> Self {
        Self {
            color: "#b9d5ff".to_string(),
            intensity: 0.3,
            position: Vec3::new(2.0, 5.0, -4.2),
            cast_shadow: true,
            shadow: ShadowConfig {
                near: 1.0,
                far: 10.0,
                bounds: Some(OrthoBounds::symmetric(10.0)),
                map_size: 1024,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLightConfig {
    pub color: String,
    pub intensity: f32,
    pub range: f32,
    pub decay: f32,
    pub position: Vec3,
    pub cast_shadow: bool,
}

impl Default for PointLightConfig {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            intensity: 1.0,
            range: 0.0,
            decay: 1.0,
            position: Vec3::ZERO,
            cast_shadow: false,
        }
    }
}

/// Settings for every light in the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient: AmbientLightConfig,
    pub moon: DirectionalLightConfig,
    /// Porch light, positioned relative to the house.
    pub porch: PointLightConfig,
    /// Ghost light. Its position is driven by the animation loop.
    pub ghost: PointLightConfig,
    /// Name of the group the porch light is attached to.
    pub porch_parent: String,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient: AmbientLightConfig::default(),
            moon: DirectionalLightConfig::default(),
            porch: PointLightConfig {
                color: "#ff7d46".to_string(),
                intensity: 1.0,
                range: 10.0,
                decay: 1.0,
                position: Vec3::new(0.0, 2.0, 2.2),
                cast_shadow: true,
            },
            ghost: PointLightConfig {
                color: "#E933FF".to_string(),
                intensity: 2.0,
                range: 3.0,
                decay: 1.0,
                position: Vec3::ZERO,
                cast_shadow: true,
            },
            porch_parent: "house".to_string(),
        }
    }
}

impl PointLightConfig {
    fn to_light(&self) -> Result<PointLight, SceneError> {
        Ok(PointLight {
            color: color_from_hex(&self.color)?,
            intensity: self.intensity,
            position: self.position,
            range: self.range,
            decay: self.decay,
            shadow: self.cast_shadow.then(ShadowConfig::default),
        })
    }
}

/// Keys of the lights added by `configure`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LightSet {
    pub ambient: LightKey,
    pub moon: LightKey,
    pub porch: LightKey,
    pub ghost: LightKey,
}

/// Add the ambient fill, the moon, the porch light and the ghost to `scene`.
///
/// The porch light is attached to the group named by `config.porch_parent` so
/// it follows that group's transform. The ghost is added to the scene root so
/// it can move independently of every group.
pub fn configure(scene: &mut SceneRoot, config: &LightingConfig) -> Result<LightSet, SceneError> {
    let ambient = scene.add_light(
        None,
        Light::Ambient(AmbientLight {
            color: color_from_hex(&config.ambient.color)?,
            intensity: config.ambient.intensity,
        }),
    )?;

    let moon = scene.add_light(
        None,
        Light::Directional(DirectionalLight {
            color: color_from_hex(&config.moon.color)?,
            intensity: config.moon.intensity,
            position: config.moon.position,
            target: Vec3::ZERO,
            shadow: config.moon.cast_shadow.then_some(config.moon.shadow),
        }),
    )?;

    let porch = scene.add_light(
        Some(&config.porch_parent),
        Light::Point(config.porch.to_light()?),
    )?;

    let ghost = scene.add_light(None, Light::Point(config.ghost.to_light()?))?;

    debug!(
        "lighting configured, shadow casters: moon={} porch={} ghost={}",
        config.moon.cast_shadow, config.porch.cast_shadow, config.ghost.cast_shadow
    );

    Ok(LightSet {
        ambient,
        moon,
        porch,
        ghost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Environment, Group, Transform};

    fn scene_with_house() -> SceneRoot {
        let mut scene = SceneRoot::new(Environment::default());
        scene
            .root
            .add_group(Group::new("house").with_transform(Transform::from_position(Vec3::new(
                1.0, 0.0, 0.0,
            ))));
        scene
    }

    #[test]
    fn configure_adds_four_lights() {
        let mut scene = scene_with_house();
        let lights = configure(&mut scene, &LightingConfig::default()).unwrap();

        assert_eq!(4, scene.light_count());

        match scene.light(lights.ambient) {
            Some(Light::Ambient(ambient)) => assert_eq!(0.12, ambient.intensity),
            other => panic!("expected ambient light, got {other:?}"),
        }

        match scene.light(lights.ghost) {
            Some(Light::Point(ghost)) => {
                assert_eq!(3.0, ghost.range);
                assert_eq!(2.0, ghost.intensity);
                assert!(ghost.shadow.is_some());
            }
            other => panic!("expected point light, got {other:?}"),
        }
    }

    #[test]
    fn porch_light_follows_house_group() {
        let mut scene = scene_with_house();
        let lights = configure(&mut scene, &LightingConfig::default()).unwrap();

        let porch = scene
            .world_lights()
            .into_iter()
            .find(|l| l.key == lights.porch)
            .unwrap();
        assert!(porch
            .position
            .abs_diff_eq(Vec3::new(1.0, 2.0, 2.2), 1e-6));

        let ghost = scene
            .world_lights()
            .into_iter()
            .find(|l| l.key == lights.ghost)
            .unwrap();
        assert_eq!(Vec3::ZERO, ghost.position);
    }

    #[test]
    fn shadow_flags_are_per_light() {
        let mut scene = scene_with_house();
        let mut config = LightingConfig::default();
        config.porch.cast_shadow = false;
        config.moon.cast_shadow = false;

        let lights = configure(&mut scene, &config).unwrap();

        assert!(!scene.light(lights.porch).unwrap().casts_shadow());
        assert!(!scene.light(lights.moon).unwrap().casts_shadow());
        assert!(scene.light(lights.ghost).unwrap().casts_shadow());
    }

    #[test]
    fn missing_porch_parent_is_an_error() {
        let mut scene = SceneRoot::new(Environment::default());
        let result = configure(&mut scene, &LightingConfig::default());

        assert!(matches!(result, Err(SceneError::GroupNotFound(name)) if name == "house"));
    }

    #[test]
    fn point_light_fades_to_zero_at_range() {
        let light = PointLight {
            color: Vec3::ONE,
            intensity: 1.0,
            position: Vec3::ZERO,
            range: 10.0,
            decay: 1.0,
            shadow: None,
        };

        assert_eq!(1.0, light.attenuation(0.0));
        assert!((light.attenuation(5.0) - 0.5).abs() < 1e-6);
        assert_eq!(0.0, light.attenuation(10.0));
        assert_eq!(0.0, light.attenuation(25.0));
    }

    #[test]
    fn moon_shadow_frustum_covers_graveyard() {
        let config = DirectionalLightConfig::default();
        let moon = DirectionalLight {
            color: Vec3::ONE,
            intensity: 0.3,
            position: config.position,
            target: Vec3::ZERO,
            shadow: Some(config.shadow),
        };

        let view_projection = moon
            .shadow_view_projection(moon.position, moon.target)
            .unwrap();

        // The scene origin sits between the near and far planes, inside the
        // bounds.
        let origin = view_projection.project_point3(Vec3::ZERO);
        assert!(origin.x.abs() < 1.0 && origin.y.abs() < 1.0);
        assert!(origin.z > 0.0 && origin.z < 1.0);

        let no_shadow = DirectionalLight {
            shadow: None,
            ..moon
        };
        assert!(no_shadow
            .shadow_view_projection(moon.position, moon.target)
            .is_none());
    }
}
