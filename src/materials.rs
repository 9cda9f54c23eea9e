use std::{collections::HashMap, rc::Rc};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    math_utils::{color_from_hex, ColorParseError},
    textures::{MapKind, TextureBank, TextureHandle, WrapMode},
};

/// The optional texture maps bound to a surface.
#[derive(Clone, Debug, Default)]
pub struct MapSet {
    pub color: Option<TextureHandle>,
    pub alpha: Option<TextureHandle>,
    pub ambient_occlusion: Option<TextureHandle>,
    /// Displacement (height) map.
    pub height: Option<TextureHandle>,
    pub normal: Option<TextureHandle>,
    pub metalness: Option<TextureHandle>,
    pub roughness: Option<TextureHandle>,
}

impl MapSet {
    /// Load each of `kinds` from the texture directory `dir`.
    pub fn load(bank: &mut TextureBank, dir: &str, kinds: &[MapKind]) -> Self {
        let mut maps = Self::default();

        for kind in kinds {
            maps.set(*kind, bank.load_map(dir, *kind));
        }

        maps
    }

    pub fn get(&self, kind: MapKind) -> Option<&TextureHandle> {
        self.slot(kind).as_ref()
    }

    pub fn set(&mut self, kind: MapKind, texture: TextureHandle) {
        *self.slot_mut(kind) = Some(texture);
    }

    /// Iterate over the maps that are present.
    pub fn iter(&self) -> impl Iterator<Item = (MapKind, &TextureHandle)> {
        [
            MapKind::Color,
            MapKind::Alpha,
            MapKind::AmbientOcclusion,
            MapKind::Height,
            MapKind::Normal,
            MapKind::Metalness,
            MapKind::Roughness,
        ]
        .into_iter()
        .filter_map(|kind| self.get(kind).map(|texture| (kind, texture)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Apply the same wrap mode and repeat factor to every map in the set.
    pub fn set_tiling(&self, wrap: WrapMode, repeat: Vec2) {
        for (_, texture) in self.iter() {
            texture.set_wrap(wrap, wrap);
            texture.set_repeat(repeat.x, repeat.y);
        }
    }

    fn slot(&self, kind: MapKind) -> &Option<TextureHandle> {
        match kind {
            MapKind::Color => &self.color,
            MapKind::Alpha => &self.alpha,
            MapKind::AmbientOcclusion => &self.ambient_occlusion,
            MapKind::Height => &self.height,
            MapKind::Normal => &self.normal,
            MapKind::Metalness => &self.metalness,
            MapKind::Roughness => &self.roughness,
        }
    }

    fn slot_mut(&mut self, kind: MapKind) -> &mut Option<TextureHandle> {
        match kind {
            MapKind::Color => &mut self.color,
            MapKind::Alpha => &mut self.alpha,
            MapKind::AmbientOcclusion => &mut self.ambient_occlusion,
            MapKind::Height => &mut self.height,
            MapKind::Normal => &mut self.normal,
            MapKind::Metalness => &mut self.metalness,
            MapKind::Roughness => &mut self.roughness,
        }
    }
}

/// Two map sets are equal when they reference the same textures by name.
impl PartialEq for MapSet {
    fn eq(&self, other: &Self) -> bool {
        let names = |maps: &MapSet| -> Vec<(MapKind, String)> {
            maps.iter()
                .map(|(kind, texture)| (kind, texture.name().to_string()))
                .collect()
        };

        names(self) == names(other)
    }
}

/// Describes how light interacts with a surface. This follows a metallic /
/// roughness model where each constant factor is multiplied by the matching
/// texture map when one is present.
///
/// Descriptors are immutable once built and shared between every mesh of the
/// same category.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceDescriptor {
    pub name: String,
    /// Linear RGB multiplier applied to the color map (or used directly when
    /// there is no color map).
    pub color: Vec3,
    /// Flat linear RGB color shown while the color map is missing, still
    /// loading or failed to load.
    pub fallback_color: Vec3,
    pub maps: MapSet,
    /// Blend the surface using the alpha map rather than drawing it opaque.
    pub transparent: bool,
    /// Distance in local units that a fully white height map texel pushes
    /// a vertex along its normal.
    pub displacement_scale: f32,
    pub roughness: f32,
    pub metalness: f32,
}

impl SurfaceDescriptor {
    /// Geometry using this descriptor must carry a secondary UV set because
    /// ambient occlusion maps are sampled with it.
    pub fn requires_secondary_uv(&self) -> bool {
        self.maps.ambient_occlusion.is_some()
    }

    /// Look for settings that are legal but have no visible effect.
    pub fn lint(&self) -> Vec<MaterialLint> {
        let mut findings = Vec::new();

        if self.maps.height.is_some() && self.displacement_scale == 0.0 {
            findings.push(MaterialLint::DisplacementWithoutScale);
        }

        if self.maps.height.is_none() && self.displacement_scale != 0.0 {
            findings.push(MaterialLint::ScaleWithoutDisplacement);
        }

        if self.maps.alpha.is_some() && !self.transparent {
            findings.push(MaterialLint::AlphaMapWhileOpaque);
        }

        findings
    }
}

/// A surface descriptor setting that will not show up on screen.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MaterialLint {
    /// A height map is bound but the displacement scale is zero.
    DisplacementWithoutScale,
    /// A displacement scale is set but there is no height map to scale.
    ScaleWithoutDisplacement,
    /// An alpha map is bound to a surface that is not transparent.
    AlphaMapWhileOpaque,
}

impl std::fmt::Display for MaterialLint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterialLint::DisplacementWithoutScale => {
                write!(f, "height map bound with a zero displacement scale")
            }
            MaterialLint::ScaleWithoutDisplacement => {
                write!(f, "displacement scale set without a height map")
            }
            MaterialLint::AlphaMapWhileOpaque => {
                write!(f, "alpha map bound to an opaque surface")
            }
        }
    }
}

/// A fluent builder for surface descriptors so callers only need to specify
/// the properties they care about.
#[derive(Debug)]
pub struct MaterialBuilder {
    name: String,
    color: Option<Vec3>,
    fallback_color: Option<Vec3>,
    maps: MapSet,
    transparent: bool,
    displacement_scale: Option<f32>,
    roughness: Option<f32>,
    metalness: Option<f32>,
}

impl MaterialBuilder {
    pub const DEFAULT_COLOR: Vec3 = Vec3::ONE;
    pub const DEFAULT_ROUGHNESS: f32 = 1.0;
    pub const DEFAULT_METALNESS: f32 = 0.0;

    /// Create a new material builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            fallback_color: None,
            maps: MapSet::default(),
            transparent: false,
            displacement_scale: None,
            roughness: None,
            metalness: None,
        }
    }

    /// Set the material's color multiplier to a constant value.
    pub fn color(mut self, color: Vec3) -> Self {
        self.color = Some(color);
        self
    }

    /// Set the flat color used while the color map is unavailable. Defaults to
    /// the color multiplier.
    pub fn fallback_color(mut self, color: Vec3) -> Self {
        self.fallback_color = Some(color);
        self
    }

    pub fn maps(mut self, maps: MapSet) -> Self {
        self.maps = maps;
        self
    }

    pub fn map(mut self, kind: MapKind, texture: TextureHandle) -> Self {
        self.maps.set(kind, texture);
        self
    }

    pub fn transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn displacement_scale(mut self, scale: f32) -> Self {
        self.displacement_scale = Some(scale);
        self
    }

    pub fn roughness(mut self, roughness: f32) -> Self {
        self.roughness = Some(roughness);
        self
    }

    pub fn metalness(mut self, metalness: f32) -> Self {
        self.metalness = Some(metalness);
        self
    }

    /// Use the properties of this builder to construct a surface descriptor.
    pub fn build(self) -> SurfaceDescriptor {
        let color = self.color.unwrap_or(Self::DEFAULT_COLOR);

        SurfaceDescriptor {
            name: self.name,
            color,
            fallback_color: self.fallback_color.unwrap_or(color),
            maps: self.maps,
            transparent: self.transparent,
            displacement_scale: self.displacement_scale.unwrap_or(0.0),
            roughness: self.roughness.unwrap_or(Self::DEFAULT_ROUGHNESS),
            metalness: self.metalness.unwrap_or(Self::DEFAULT_METALNESS),
        }
    }
}

/// The kinds of object in the scene that get their own shared surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialCategory {
    Floor,
    Walls,
    Roof,
    Door,
    Bush,
    Grave,
    Trunk,
    Leaves,
}

impl MaterialCategory {
    pub const ALL: [MaterialCategory; 8] = [
        MaterialCategory::Floor,
        MaterialCategory::Walls,
        MaterialCategory::Roof,
        MaterialCategory::Door,
        MaterialCategory::Bush,
        MaterialCategory::Grave,
        MaterialCategory::Trunk,
        MaterialCategory::Leaves,
    ];

    /// Texture directory and map kinds used by this category. Categories
    /// without textures are drawn with a flat color.
    pub fn texture_maps(self) -> Option<(&'static str, &'static [MapKind])> {
        const TILED: &[MapKind] = &[
            MapKind::Color,
            MapKind::AmbientOcclusion,
            MapKind::Normal,
            MapKind::Roughness,
        ];
        const DOOR: &[MapKind] = &[
            MapKind::Color,
            MapKind::Alpha,
            MapKind::AmbientOcclusion,
            MapKind::Height,
            MapKind::Normal,
            MapKind::Metalness,
            MapKind::Roughness,
        ];

        match self {
            MaterialCategory::Floor => Some(("ground", TILED)),
            MaterialCategory::Walls => Some(("bricks", TILED)),
            MaterialCategory::Roof => Some(("roof", TILED)),
            MaterialCategory::Door => Some(("door", DOOR)),
            MaterialCategory::Bush
            | MaterialCategory::Grave
            | MaterialCategory::Trunk
            | MaterialCategory::Leaves => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MaterialCategory::Floor => "floor",
            MaterialCategory::Walls => "walls",
            MaterialCategory::Roof => "roof",
            MaterialCategory::Door => "door",
            MaterialCategory::Bush => "bush",
            MaterialCategory::Grave => "grave",
            MaterialCategory::Trunk => "trunk",
            MaterialCategory::Leaves => "leaves",
        }
    }
}

/// Hex colors for each material category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialsConfig {
    pub floor: String,
    pub walls: String,
    pub roof: String,
    pub grave: String,
    pub bush: String,
    pub trunk: String,
    pub leaves: String,
    /// Displacement scale applied to the door height map.
    pub door_displacement_scale: f32,
    /// Tiles per face for the roof textures.
    pub roof_repeat: Vec2,
}

impl Default for MaterialsConfig {
    fn default() -> Self {
        Self {
            floor: "#c68767".to_string(),
            walls: "#ffffff".to_string(),
            roof: "#684132".to_string(),
            grave: "#b2b6b1".to_string(),
            bush: "#89c854".to_string(),
            trunk: "#4a3120".to_string(),
            leaves: "#2f4a2c".to_string(),
            door_displacement_scale: 0.1,
            roof_repeat: Vec2::new(4.0, 4.0),
        }
    }
}

impl MaterialsConfig {
    /// Get the linear color configured for `category`. The door has no flat
    /// color of its own and falls back to white.
    pub fn color_of(&self, category: MaterialCategory) -> Result<Vec3, ColorParseError> {
        match category {
            MaterialCategory::Floor => color_from_hex(&self.floor),
            MaterialCategory::Walls => color_from_hex(&self.walls),
            MaterialCategory::Roof => color_from_hex(&self.roof),
            MaterialCategory::Door => Ok(Vec3::ONE),
            MaterialCategory::Bush => color_from_hex(&self.bush),
            MaterialCategory::Grave => color_from_hex(&self.grave),
            MaterialCategory::Trunk => color_from_hex(&self.trunk),
            MaterialCategory::Leaves => color_from_hex(&self.leaves),
        }
    }
}

/// Build the descriptor for `category` from an already loaded map set. The
/// result depends only on the inputs.
pub fn build_descriptor(
    category: MaterialCategory,
    maps: &MapSet,
    config: &MaterialsConfig,
) -> Result<SurfaceDescriptor, ColorParseError> {
    let flat_color = config.color_of(category)?;
    let builder = MaterialBuilder::new(category.name());

    let builder = if maps.color.is_some() {
        // The map supplies the color, the flat color only shows through when
        // the map cannot be loaded.
        builder.color(Vec3::ONE).fallback_color(flat_color)
    } else {
        builder.color(flat_color)
    };

    let builder = match category {
        MaterialCategory::Door => builder
            .transparent(true)
            .displacement_scale(config.door_displacement_scale),
        _ => builder,
    };

    Ok(builder.maps(maps.clone()).build())
}

/// Shared surface descriptors for every material category, built once and
/// handed out by reference.
#[derive(Debug, Default)]
pub struct MaterialCatalog {
    descriptors: HashMap<MaterialCategory, Rc<SurfaceDescriptor>>,
}

impl MaterialCatalog {
    /// Load textures for every category and build their descriptors. Roof
    /// textures are set to repeat.
    pub fn load(
        bank: &mut TextureBank,
        config: &MaterialsConfig,
    ) -> Result<Self, ColorParseError> {
        let mut catalog = Self::default();

        for category in MaterialCategory::ALL {
            let maps = match category.texture_maps() {
                Some((dir, kinds)) => MapSet::load(bank, dir, kinds),
                None => MapSet::default(),
            };

            if category == MaterialCategory::Roof {
                maps.set_tiling(WrapMode::Repeat, config.roof_repeat);
            }

            catalog.insert(category, build_descriptor(category, &maps, config)?);
        }

        debug!("material catalog built with {} categories", catalog.descriptors.len());
        Ok(catalog)
    }

    /// Add or replace the descriptor for `category`.
    pub fn insert(&mut self, category: MaterialCategory, descriptor: SurfaceDescriptor) {
        for finding in descriptor.lint() {
            warn!("material '{}': {finding}", descriptor.name);
        }

        self.descriptors.insert(category, Rc::new(descriptor));
    }

    pub fn get(&self, category: MaterialCategory) -> Option<Rc<SurfaceDescriptor>> {
        self.descriptors.get(&category).cloned()
    }
}
