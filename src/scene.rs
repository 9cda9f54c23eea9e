//! Scene graph types: positioned meshes, groups that compose transforms and
//! the root that owns lights and environment settings.
use std::rc::Rc;

use glam::{EulerRot, Mat4, Quat, Vec3};
use slotmap::SlotMap;
use thiserror::Error;

use crate::{
    geometry::GeometryData,
    lighting::{Light, LightKey},
    materials::SurfaceDescriptor,
    math_utils::ColorParseError,
    placement::PlacementError,
};

/// Position, rotation and scale of an object relative to its parent.
///
/// Rotation is stored as Euler angles in radians and applied in X, Y, Z order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vec3::splat(scale))
    }

    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }

    /// Local to parent transform matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation_quat(), self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("mesh '{mesh}' uses surface '{surface}' which samples ambient occlusion from a secondary uv set the geometry does not have")]
    MissingSecondaryUv { mesh: String, surface: String },
    #[error("no group named '{0}' exists in the scene")]
    GroupNotFound(String),
    #[error("material catalog has no surface for '{0}'")]
    MissingSurface(String),
    #[error(transparent)]
    InvalidColor(#[from] ColorParseError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
}

/// A drawable object: shared geometry and surface plus its own transform and
/// shadow flags.
#[derive(Clone, Debug)]
pub struct MeshObject {
    name: String,
    geometry: Rc<GeometryData>,
    surface: Rc<SurfaceDescriptor>,
    pub transform: Transform,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl MeshObject {
    /// Create a mesh. Fails if the surface samples ambient occlusion but the
    /// geometry has no secondary UV set to sample it with.
    pub fn new(
        name: impl Into<String>,
        geometry: Rc<GeometryData>,
        surface: Rc<SurfaceDescriptor>,
        transform: Transform,
    ) -> Result<Self, SceneError> {
        let name = name.into();

        if surface.requires_secondary_uv() && !geometry.has_secondary_uv() {
            return Err(SceneError::MissingSecondaryUv {
                mesh: name,
                surface: surface.name.clone(),
            });
        }

        Ok(Self {
            name,
            geometry,
            surface,
            transform,
            cast_shadow: false,
            receive_shadow: false,
        })
    }

    pub fn cast_shadow(mut self, enabled: bool) -> Self {
        self.cast_shadow = enabled;
        self
    }

    pub fn receive_shadow(mut self, enabled: bool) -> Self {
        self.receive_shadow = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &Rc<GeometryData> {
        &self.geometry
    }

    pub fn surface(&self) -> &Rc<SurfaceDescriptor> {
        &self.surface
    }
}

/// A child of a group.
#[derive(Clone, Debug)]
pub enum Node {
    Mesh(MeshObject),
    Group(Group),
    /// A light owned by the scene root and positioned by the enclosing group.
    Light(LightKey),
}

/// An ordered collection of child nodes sharing a parent transform.
#[derive(Clone, Debug, Default)]
pub struct Group {
    pub name: String,
    pub transform: Transform,
    children: Vec<Node>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn add_mesh(&mut self, mesh: MeshObject) {
        self.children.push(Node::Mesh(mesh));
    }

    pub fn add_group(&mut self, group: Group) {
        self.children.push(Node::Group(group));
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Find this group or a descendant group by name, depth first.
    pub fn find(&self, name: &str) -> Option<&Group> {
        if self.name == name {
            return Some(self);
        }

        self.children.iter().find_map(|child| match child {
            Node::Group(group) => group.find(name),
            _ => None,
        })
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Group> {
        if self.name == name {
            return Some(self);
        }

        self.children.iter_mut().find_map(|child| match child {
            Node::Group(group) => group.find_mut(name),
            _ => None,
        })
    }

    /// Meshes directly in this group.
    pub fn meshes(&self) -> impl Iterator<Item = &MeshObject> {
        self.children.iter().filter_map(|child| match child {
            Node::Mesh(mesh) => Some(mesh),
            _ => None,
        })
    }

    /// Groups directly in this group.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.children.iter().filter_map(|child| match child {
            Node::Group(group) => Some(group),
            _ => None,
        })
    }

    /// Total number of meshes in this group and all descendant groups.
    pub fn mesh_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                Node::Mesh(_) => 1,
                Node::Group(group) => group.mesh_count(),
                Node::Light(_) => 0,
            })
            .sum()
    }

    fn visit<'a>(&'a self, parent: Mat4, visitor: &mut impl FnMut(Mat4, &'a Node)) {
        let world = parent * self.transform.matrix();

        for child in &self.children {
            visitor(world, child);

            if let Node::Group(group) = child {
                group.visit(world, visitor);
            }
        }
    }
}

/// Distance based fog blending surfaces towards `color` between `near` and
/// `far`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fog {
    pub color: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Fog {
    /// How much of the fog color replaces a surface `distance` units from the
    /// camera.
    pub fn factor(&self, distance: f32) -> f32 {
        if self.far <= self.near {
            return if distance >= self.far { 1.0 } else { 0.0 };
        }

        ((distance - self.near) / (self.far - self.near)).clamp(0.0, 1.0)
    }
}

/// Settings applied to the whole scene and read by the renderer every frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Environment {
    pub fog: Option<Fog>,
    /// Linear RGB color the frame is cleared to.
    pub clear_color: Vec3,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            fog: None,
            clear_color: Vec3::ZERO,
        }
    }
}

/// A mesh paired with its world transform.
#[derive(Copy, Clone, Debug)]
pub struct DrawItem<'a> {
    pub world: Mat4,
    pub mesh: &'a MeshObject,
}

/// A light paired with its world position.
#[derive(Copy, Clone, Debug)]
pub struct WorldLight<'a> {
    pub key: LightKey,
    pub light: &'a Light,
    /// World position for directional and point lights, zero for ambient.
    pub position: Vec3,
    /// World transform of the group holding the light.
    pub parent: Mat4,
}

/// The top of the scene graph. Owns every light so they can be updated by key
/// no matter which group positions them.
#[derive(Debug)]
pub struct SceneRoot {
    pub root: Group,
    pub environment: Environment,
    lights: SlotMap<LightKey, Light>,
}

impl SceneRoot {
    pub const ROOT_NAME: &'static str = "scene";

    pub fn new(environment: Environment) -> Self {
        Self {
            root: Group::new(Self::ROOT_NAME),
            environment,
            lights: SlotMap::with_key(),
        }
    }

    /// Add a light as a child of the group called `parent`, or the scene root
    /// when `parent` is `None`.
    pub fn add_light(&mut self, parent: Option<&str>, light: Light) -> Result<LightKey, SceneError> {
        let parent_name = parent.unwrap_or(Self::ROOT_NAME);

        // Look up the group first so a failed lookup does not leave an
        // orphaned light behind.
        if self.root.find(parent_name).is_none() {
            return Err(SceneError::GroupNotFound(parent_name.to_string()));
        }

        let key = self.lights.insert(light);
        if let Some(group) = self.root.find_mut(parent_name) {
            group.children.push(Node::Light(key));
        }

        Ok(key)
    }

    pub fn light(&self, key: LightKey) -> Option<&Light> {
        self.lights.get(key)
    }

    pub fn light_mut(&mut self, key: LightKey) -> Option<&mut Light> {
        self.lights.get_mut(key)
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.root.mesh_count()
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.root.find(name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.root.find_mut(name)
    }

    /// Every mesh in the scene with its composed world transform, in graph
    /// order.
    pub fn draw_items(&self) -> Vec<DrawItem<'_>> {
        let mut items = Vec::with_capacity(self.mesh_count());

        self.root.visit(Mat4::IDENTITY, &mut |world, node| {
            if let Node::Mesh(mesh) = node {
                items.push(DrawItem {
                    world: world * mesh.transform.matrix(),
                    mesh,
                });
            }
        });

        items
    }

    /// Every light in the scene with its world position, in graph order.
    pub fn world_lights(&self) -> Vec<WorldLight<'_>> {
        let mut lights = Vec::with_capacity(self.lights.len());

        self.root.visit(Mat4::IDENTITY, &mut |world, node| {
            if let Node::Light(key) = node {
                if let Some(light) = self.lights.get(*key) {
                    lights.push(WorldLight {
                        key: *key,
                        light,
                        position: light
                            .position()
                            .map(|p| world.transform_point3(p))
                            .unwrap_or(Vec3::ZERO),
                        parent: world,
                    });
                }
            }
        });

        lights
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;
    use crate::{
        geometry::Geometry,
        lighting::AmbientLight,
        materials::MaterialBuilder,
        textures::{MemoryTextureSource, TextureBank},
    };

    fn plain_surface() -> Rc<SurfaceDescriptor> {
        Rc::new(MaterialBuilder::new("plain").build())
    }

    fn cube() -> Rc<GeometryData> {
        Rc::new(Geometry::cuboid(1.0, 1.0, 1.0).tessellate())
    }

    #[test]
    fn transform_rotates_in_xyz_order() {
        let t = Transform::from_position(Vec3::new(0.0, 1.0, 0.0))
            .with_rotation(Vec3::new(-FRAC_PI_2, 0.0, 0.0))
            .with_uniform_scale(2.0);

        // A +Z normal on a plane rotated -90 degrees about X points up.
        let up = t.matrix().transform_vector3(Vec3::Z).normalize();
        assert!(up.abs_diff_eq(Vec3::Y, 1e-6));

        let p = t.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.abs_diff_eq(Vec3::new(2.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn mesh_requires_secondary_uv_for_ambient_occlusion() {
        let mut bank = TextureBank::new(std::sync::Arc::new(MemoryTextureSource::new()));
        let surface = Rc::new(
            MaterialBuilder::new("walls")
                .map(
                    crate::textures::MapKind::AmbientOcclusion,
                    bank.load("bricks/ambientOcclusion"),
                )
                .build(),
        );

        let result = MeshObject::new("walls", cube(), surface.clone(), Transform::IDENTITY);
        assert!(matches!(
            result,
            Err(SceneError::MissingSecondaryUv { .. })
        ));

        let geometry = Rc::new(Geometry::cuboid(1.0, 1.0, 1.0).tessellate().with_secondary_uv());
        assert!(MeshObject::new("walls", geometry, surface, Transform::IDENTITY).is_ok());
    }

    #[test]
    fn draw_items_compose_group_transforms() {
        let mut scene = SceneRoot::new(Environment::default());
        let mut outer = Group::new("outer")
            .with_transform(Transform::from_position(Vec3::new(10.0, 0.0, 0.0)));
        let mut inner = Group::new("inner")
            .with_transform(Transform::from_position(Vec3::new(0.0, 5.0, 0.0)));

        inner.add_mesh(
            MeshObject::new(
                "box",
                cube(),
                plain_surface(),
                Transform::from_position(Vec3::new(0.0, 0.0, 1.0)),
            )
            .unwrap(),
        );
        outer.add_group(inner);
        scene.root.add_group(outer);

        let items = scene.draw_items();
        assert_eq!(1, items.len());
        assert_eq!(1, scene.mesh_count());

        let origin = items[0].world.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(10.0, 5.0, 1.0), 1e-6));
    }

    #[test]
    fn meshes_share_geometry_and_surface() {
        let geometry = cube();
        let surface = plain_surface();
        let mut group = Group::new("graves");

        for i in 0..3 {
            group.add_mesh(
                MeshObject::new(
                    format!("grave {i}"),
                    geometry.clone(),
                    surface.clone(),
                    Transform::IDENTITY,
                )
                .unwrap(),
            );
        }

        assert!(group
            .meshes()
            .all(|m| Rc::ptr_eq(m.geometry(), &geometry) && Rc::ptr_eq(m.surface(), &surface)));
    }

    #[test]
    fn lights_can_be_found_and_updated() {
        let mut scene = SceneRoot::new(Environment::default());
        let key = scene
            .add_light(
                None,
                Light::Ambient(AmbientLight {
                    color: Vec3::ONE,
                    intensity: 0.5,
                }),
            )
            .unwrap();

        assert_eq!(1, scene.world_lights().len());

        let light = *scene.light(key).unwrap();
        assert!(scene.add_light(Some("missing"), light).is_err());
        assert_eq!(1, scene.light_count());
    }

    #[test]
    fn fog_blends_between_near_and_far() {
        let fog = Fog {
            color: Vec3::ZERO,
            near: 1.0,
            far: 15.0,
        };

        assert_eq!(0.0, fog.factor(0.5));
        assert_eq!(0.5, fog.factor(8.0));
        assert_eq!(1.0, fog.factor(20.0));
    }
}
