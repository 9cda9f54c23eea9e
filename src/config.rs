//! Scene configuration: every dimension, offset, color and light setting the
//! scene is built from, with built in presets and TOML loading.
use std::{f32::consts::FRAC_PI_4, path::Path};

use glam::Vec3;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    animation::{GhostMotion, GhostOrbit},
    controls::OrbitSettings,
    lighting::LightingConfig,
    materials::MaterialsConfig,
    math_utils::{color_from_hex, ColorParseError},
    placement::{PlacementError, PlacementParams},
    scene::{Environment, Fog},
    viewport::Viewport,
};

/// Configuration that can be read from disk.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Unknown preset '{0}', expected 'classic', 'grove' or a path to a .toml file")]
    UnknownPreset(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Color(#[from] ColorParseError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
}

/// A bush sphere placed relative to the house.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BushConfig {
    pub position: Vec3,
    pub scale: f32,
}

/// Dimensions and offsets of the ground, house and grave meshes. Child
/// offsets are not derived from parent sizes, changing the house size means
/// updating the door, bush and porch light offsets to match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width and depth of the square ground plane.
    pub ground_size: f32,
    /// Width, height and depth of the house walls.
    pub walls_size: Vec3,
    pub walls_y: f32,
    pub roof_radius: f32,
    pub roof_height: f32,
    pub roof_radial_segments: u32,
    pub roof_height_segments: u32,
    pub roof_y: f32,
    /// Rotation about the vertical axis so a roof face points forward.
    pub roof_rotation_y: f32,
    pub door_size: f32,
    /// Subdivisions along each side of the door so the height map has
    /// vertices to displace.
    pub door_segments: u32,
    pub door_position: Vec3,
    pub bush_radius: f32,
    pub bush_segments: u32,
    pub bushes: Vec<BushConfig>,
    /// Width, height and depth of the upright grave post.
    pub grave_post_size: Vec3,
    /// Width, height and depth of the grave cross bar before it is turned on
    /// its side.
    pub grave_bar_size: Vec3,
    pub grave_bar_y: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            ground_size: 16.0,
            walls_size: Vec3::new(4.0, 2.5, 4.0),
            walls_y: 1.2,
            roof_radius: 4.0,
            roof_height: 1.0,
            roof_radial_segments: 4,
            roof_height_segments: 4,
            roof_y: 2.8,
            roof_rotation_y: FRAC_PI_4,
            door_size: 2.0,
            door_segments: 100,
            door_position: Vec3::new(0.0, 0.9, 2.01),
            bush_radius: 1.0,
            bush_segments: 16,
            bushes: vec![
                BushConfig {
                    position: Vec3::new(0.8, 0.2, 2.1),
                    scale: 0.5,
                },
                BushConfig {
                    position: Vec3::new(1.4, 0.1, 2.4),
                    scale: 0.25,
                },
                BushConfig {
                    position: Vec3::new(-0.8, 0.1, 2.4),
                    scale: 0.4,
                },
                BushConfig {
                    position: Vec3::new(-1.0, 0.05, 2.8),
                    scale: 0.15,
                },
            ],
            grave_post_size: Vec3::new(0.1, 1.2, 0.1),
            grave_bar_size: Vec3::new(0.1, 0.8, 0.1),
            grave_bar_y: 0.4,
        }
    }
}

impl LayoutConfig {
    /// Distance from the house center to the farthest corner of its walls.
    pub fn house_half_extent(&self) -> f32 {
        (self.walls_size.x * 0.5).hypot(self.walls_size.z * 0.5)
    }
}

/// A single tree: a cylinder trunk with a cone canopy.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationConfig {
    pub position: Vec3,
    pub trunk_radius_top: f32,
    pub trunk_radius_bottom: f32,
    pub trunk_height: f32,
    pub canopy_radius: f32,
    pub canopy_height: f32,
    pub canopy_segments: u32,
    /// Height of the canopy center above the tree's base.
    pub canopy_y: f32,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(-2.9, 0.0, -2.6),
            trunk_radius_top: 0.12,
            trunk_radius_bottom: 0.18,
            trunk_height: 1.4,
            canopy_radius: 0.9,
            canopy_height: 2.0,
            canopy_segments: 8,
            canopy_y: 2.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub fog_enabled: bool,
    pub fog_color: String,
    pub fog_near: f32,
    pub fog_far: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            fog_enabled: true,
            fog_color: "#262837".to_string(),
            fog_near: 1.0,
            fog_far: 15.0,
        }
    }
}

impl EnvironmentConfig {
    /// The frame is cleared to the fog color so distant geometry fades into
    /// the background.
    pub fn to_environment(&self) -> Result<Environment, ColorParseError> {
        let color = color_from_hex(&self.fog_color)?;

        Ok(Environment {
            fog: self.fog_enabled.then_some(Fog {
                color,
                near: self.fog_near,
                far: self.fog_far,
            }),
            clear_color: color,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y: 75.0,
            position: Vec3::new(6.0, 3.0, 7.0),
            target: Vec3::ZERO,
            z_near: 0.1,
            z_far: 2000.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Id of the page element the canvas is appended to on the web.
    pub canvas_id: String,
    /// Upper bound on the device pixel ratio used for the render target.
    pub max_pixel_ratio: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Haunted House".to_string(),
            width: 1280,
            height: 720,
            canvas_id: "haunted-house".to_string(),
            max_pixel_ratio: Viewport::DEFAULT_MAX_PIXEL_RATIO,
        }
    }
}

/// Everything needed to build and run the scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Seed for grave placement. A fresh seed is drawn from the OS when unset.
    pub seed: Option<u64>,
    /// Directory holding the `textures/` folder.
    pub asset_root: String,
    pub window: WindowConfig,
    pub layout: LayoutConfig,
    pub graves: PlacementParams,
    pub vegetation: Option<VegetationConfig>,
    pub materials: MaterialsConfig,
    pub lighting: LightingConfig,
    pub ghost: GhostOrbit,
    pub environment: EnvironmentConfig,
    pub camera: CameraConfig,
    pub controls: OrbitSettings,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::classic()
    }
}

impl Config for SceneConfig {}

impl SceneConfig {
    /// The classic scene: thirty graves, no tree and a ghost circling at
    /// ground height.
    pub fn classic() -> Self {
        Self {
            seed: None,
            asset_root: ".".to_string(),
            window: WindowConfig::default(),
            layout: LayoutConfig::default(),
            graves: PlacementParams::default(),
            vegetation: None,
            materials: MaterialsConfig::default(),
            lighting: LightingConfig::default(),
            ghost: GhostOrbit::default(),
            environment: EnvironmentConfig::default(),
            camera: CameraConfig::default(),
            controls: OrbitSettings::default(),
        }
    }

    /// The classic scene plus a tree, with a ghost that bobs up and down as it
    /// circles.
    pub fn grove() -> Self {
        Self {
            vegetation: Some(VegetationConfig::default()),
            ghost: GhostOrbit {
                motion: GhostMotion::Bobbing {
                    amplitude: 4.0,
                    frequency: 1.0,
                },
                ..GhostOrbit::default()
            },
            ..Self::classic()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "classic" => Some(Self::classic()),
            "grove" => Some(Self::grove()),
            _ => None,
        }
    }

    /// Resolve a command line argument into a configuration. No argument
    /// selects the classic preset, a preset name selects that preset and
    /// anything else is loaded as a configuration file.
    pub fn from_arg(arg: Option<&str>) -> Result<Self, ConfigError> {
        let config = match arg {
            None => Self::classic(),
            Some(name) => match Self::preset(name) {
                Some(config) => config,
                None if Path::new(name).extension().is_some() => Self::load_from_file(name)?,
                None => return Err(ConfigError::UnknownPreset(name.to_string())),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that the settings describe a scene that can be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.graves.validate()?;

        let half_extent = self.layout.house_half_extent();
        if self.graves.inner_radius <= half_extent {
            return Err(ConfigError::Invalid(format!(
                "grave inner radius {} must be larger than the house half extent {half_extent}",
                self.graves.inner_radius
            )));
        }

        let ground_half_extent = self.layout.ground_size / 2.0;
        if self.graves.outer_radius > ground_half_extent {
            return Err(ConfigError::Invalid(format!(
                "grave outer radius {} reaches past the ground edge at {ground_half_extent}",
                self.graves.outer_radius
            )));
        }

        if !(2..=4).contains(&self.layout.bushes.len()) {
            return Err(ConfigError::Invalid(format!(
                "the house needs between 2 and 4 bushes but {} were configured",
                self.layout.bushes.len()
            )));
        }

        if self.environment.fog_enabled && self.environment.fog_far < self.environment.fog_near {
            return Err(ConfigError::Invalid(
                "fog far distance is closer than the near distance".to_string(),
            ));
        }

        self.environment.to_environment()?;
        for category in crate::materials::MaterialCategory::ALL {
            self.materials.color_of(category)?;
        }

        Ok(())
    }

    /// Random generator for grave placement, seeded when a seed is set.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert!(SceneConfig::classic().validate().is_ok());
        assert!(SceneConfig::grove().validate().is_ok());

        assert!(SceneConfig::classic().vegetation.is_none());
        assert!(SceneConfig::grove().vegetation.is_some());
        assert_eq!(30, SceneConfig::classic().graves.count);
    }

    #[test]
    fn grave_band_must_clear_the_house() {
        let mut config = SceneConfig::classic();
        config.graves.inner_radius = 2.0;

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn graves_must_stay_on_the_ground() {
        let mut config = SceneConfig::classic();
        config.graves.outer_radius = 12.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.layout.ground_size = 24.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bush_count_is_bounded() {
        let mut config = SceneConfig::classic();
        config.layout.bushes.truncate(1);

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn from_arg_resolves_presets() {
        assert_eq!(SceneConfig::classic(), SceneConfig::from_arg(None).unwrap());
        assert_eq!(SceneConfig::grove(), SceneConfig::from_arg(Some("grove")).unwrap());
        assert!(matches!(
            SceneConfig::from_arg(Some("spooky")),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: SceneConfig = toml::from_str(
            r##"
            seed = 42

            [graves]
            count = 12

            [environment]
            fog_color = "#000000"
            "##,
        )
        .unwrap();

        assert_eq!(Some(42), config.seed);
        assert_eq!(12, config.graves.count);
        assert_eq!(3.2, config.graves.inner_radius);
        assert_eq!(15.0, config.environment.fog_far);
        assert_eq!(LayoutConfig::default(), config.layout);
    }

    #[test]
    fn written_toml_loads_back() {
        let path = std::env::temp_dir().join("haunted_house_config_test.toml");
        let mut config = SceneConfig::grove();
        config.seed = Some(7);

        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = SceneConfig::load_from_file(&path).unwrap();

        assert_eq!(config, loaded);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let path = std::env::temp_dir().join("haunted_house_config_test.yaml");
        std::fs::write(&path, "seed: 1").unwrap();

        assert!(matches!(
            SceneConfig::load_from_file(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        use rand::Rng;

        let config = SceneConfig {
            seed: Some(3),
            ..SceneConfig::classic()
        };

        assert_eq!(config.rng().gen::<u64>(), config.rng().gen::<u64>());
    }

    #[test]
    fn environment_clears_to_fog_color() {
        let environment = EnvironmentConfig::default().to_environment().unwrap();
        let fog = environment.fog.unwrap();

        assert_eq!(fog.color, environment.clear_color);
        assert_eq!(1.0, fog.near);
        assert_eq!(15.0, fog.far);
    }
}
