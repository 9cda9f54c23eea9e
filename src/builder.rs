use std::rc::Rc;

use glam::Vec3;
use rand::Rng;
use tracing::info;

use crate::{
    config::SceneConfig,
    geometry::{Geometry, GeometryData},
    lighting::{self, LightSet},
    materials::{MaterialCatalog, MaterialCategory, SurfaceDescriptor},
    scene::{Group, MeshObject, SceneError, SceneRoot, Transform},
    textures::TextureBank,
};

pub const HOUSE_GROUP: &str = "house";
pub const VEGETATION_GROUP: &str = "vegetation";
pub const GRAVEYARD_GROUP: &str = "graveyard";

/// A freshly built scene and the keys of the lights in it.
#[derive(Debug)]
pub struct BuiltScene {
    pub scene: SceneRoot,
    pub lights: LightSet,
}

/// Build the full scene described by `config`.
///
/// Textures are requested from `bank` and continue loading in the background.
/// Grave placement draws from `rng`, so a seeded generator always produces the
/// same graveyard.
pub fn build_scene<R: Rng + ?Sized>(
    config: &SceneConfig,
    bank: &mut TextureBank,
    rng: &mut R,
) -> Result<BuiltScene, SceneError> {
    let catalog = MaterialCatalog::load(bank, &config.materials)?;
    let surface = |category: MaterialCategory| -> Result<Rc<SurfaceDescriptor>, SceneError> {
        catalog
            .get(category)
            .ok_or_else(|| SceneError::MissingSurface(category.name().to_string()))
    };

    let mut scene = SceneRoot::new(config.environment.to_environment()?);
    let layout = &config.layout;

    // Ground.
    scene.root.add_mesh(
        MeshObject::new(
            "floor",
            shape_with_uv2(Geometry::plane(layout.ground_size, layout.ground_size, 1, 1)),
            surface(MaterialCategory::Floor)?,
            Transform::IDENTITY.with_rotation(Vec3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0)),
        )?
        .receive_shadow(true),
    );

    // House.
    let mut house = Group::new(HOUSE_GROUP);

    house.add_mesh(
        MeshObject::new(
            "walls",
            shape_with_uv2(Geometry::cuboid(
                layout.walls_size.x,
                layout.walls_size.y,
                layout.walls_size.z,
            )),
            surface(MaterialCategory::Walls)?,
            Transform::from_position(Vec3::new(0.0, layout.walls_y, 0.0)),
        )?
        .receive_shadow(true),
    );

    house.add_mesh(MeshObject::new(
        "roof",
        shape_with_uv2(Geometry::cone(
            layout.roof_radius,
            layout.roof_height,
            layout.roof_radial_segments,
            layout.roof_height_segments,
        )),
        surface(MaterialCategory::Roof)?,
        Transform::from_position(Vec3::new(0.0, layout.roof_y, 0.0))
            .with_rotation(Vec3::new(0.0, layout.roof_rotation_y, 0.0)),
    )?);

    house.add_mesh(MeshObject::new(
        "door",
        shape_with_uv2(Geometry::plane(
            layout.door_size,
            layout.door_size,
            layout.door_segments,
            layout.door_segments,
        )),
        surface(MaterialCategory::Door)?,
        Transform::from_position(layout.door_position),
    )?);

    let bush_geometry = shape(Geometry::sphere(
        layout.bush_radius,
        layout.bush_segments,
        layout.bush_segments,
    ));
    let bush_surface = surface(MaterialCategory::Bush)?;

    for (i, bush) in layout.bushes.iter().enumerate() {
        house.add_mesh(
            MeshObject::new(
                format!("bush {i}"),
                bush_geometry.clone(),
                bush_surface.clone(),
                Transform::from_position(bush.position).with_uniform_scale(bush.scale),
            )?
            .cast_shadow(true),
        );
    }

    scene.root.add_group(house);

    // Vegetation.
    if let Some(tree) = &config.vegetation {
        let mut vegetation =
            Group::new(VEGETATION_GROUP).with_transform(Transform::from_position(tree.position));

        vegetation.add_mesh(
            MeshObject::new(
                "trunk",
                shape(Geometry::cylinder(
                    tree.trunk_radius_top,
                    tree.trunk_radius_bottom,
                    tree.trunk_height,
                    tree.canopy_segments,
                )),
                surface(MaterialCategory::Trunk)?,
                Transform::from_position(Vec3::new(0.0, tree.trunk_height * 0.5, 0.0)),
            )?
            .cast_shadow(true),
        );

        vegetation.add_mesh(
            MeshObject::new(
                "leaves",
                shape(Geometry::cone(
                    tree.canopy_radius,
                    tree.canopy_height,
                    tree.canopy_segments,
                    1,
                )),
                surface(MaterialCategory::Leaves)?,
                Transform::from_position(Vec3::new(0.0, tree.canopy_y, 0.0)),
            )?
            .cast_shadow(true),
        );

        scene.root.add_group(vegetation);
    }

    // Graveyard.
    let mut graveyard = Group::new(GRAVEYARD_GROUP);
    let post = shape(Geometry::cuboid(
        layout.grave_post_size.x,
        layout.grave_post_size.y,
        layout.grave_post_size.z,
    ));
    let bar = shape(Geometry::cuboid(
        layout.grave_bar_size.x,
        layout.grave_bar_size.y,
        layout.grave_bar_size.z,
    ));
    let grave_surface = surface(MaterialCategory::Grave)?;

    for (i, transform) in config.graves.place(rng)?.into_iter().enumerate() {
        let mut grave = Group::new(format!("grave {i}")).with_transform(transform);

        grave.add_mesh(
            MeshObject::new("post", post.clone(), grave_surface.clone(), Transform::IDENTITY)?
                .cast_shadow(true),
        );
        grave.add_mesh(
            MeshObject::new(
                "bar",
                bar.clone(),
                grave_surface.clone(),
                Transform::from_position(Vec3::new(0.0, layout.grave_bar_y, 0.0))
                    .with_rotation(Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2)),
            )?
            .cast_shadow(true),
        );

        graveyard.add_group(grave);
    }

    scene.root.add_group(graveyard);

    // Lights last so the porch light can find the house group.
    let lights = lighting::configure(&mut scene, &config.lighting)?;

    info!(
        "scene built with {} meshes and {} lights",
        scene.mesh_count(),
        scene.light_count()
    );

    Ok(BuiltScene { scene, lights })
}

fn shape(geometry: Geometry) -> Rc<GeometryData> {
    Rc::new(geometry.tessellate())
}

fn shape_with_uv2(geometry: Geometry) -> Rc<GeometryData> {
    Rc::new(geometry.tessellate().with_secondary_uv())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{lighting::LightKey, scene::Node, textures::MemoryTextureSource};

    /// Transforms of every grave in a built scene, in placement order.
    fn grave_transforms(scene: &SceneRoot) -> Vec<Transform> {
        scene
            .group(GRAVEYARD_GROUP)
            .map(|graveyard| graveyard.groups().map(|g| g.transform).collect())
            .unwrap_or_default()
    }

    /// Whether `group` holds the light directly (not in a nested group).
    fn holds_light(group: &Group, key: LightKey) -> bool {
        group
            .children()
            .iter()
            .any(|child| matches!(child, Node::Light(k) if *k == key))
    }

    fn build(config: &SceneConfig, seed: u64) -> BuiltScene {
        let mut bank = TextureBank::new(Arc::new(MemoryTextureSource::new()));
        build_scene(config, &mut bank, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn classic_scene_contents() {
        let built = build(&SceneConfig::classic(), 1);
        let scene = &built.scene;

        // Floor, walls, roof, door, four bushes and two meshes per grave.
        assert_eq!(8 + 30 * 2, scene.mesh_count());
        assert_eq!(4, scene.light_count());
        assert!(scene.group(VEGETATION_GROUP).is_none());
        assert_eq!(30, grave_transforms(scene).len());
    }

    #[test]
    fn grove_scene_adds_a_tree() {
        let built = build(&SceneConfig::grove(), 1);

        assert_eq!(8 + 30 * 2 + 2, built.scene.mesh_count());
        assert_eq!(2, built.scene.group(VEGETATION_GROUP).unwrap().mesh_count());
    }

    #[test]
    fn same_seed_builds_identical_graveyard() {
        let config = SceneConfig::classic();

        let a = grave_transforms(&build(&config, 42).scene);
        let b = grave_transforms(&build(&config, 42).scene);
        let c = grave_transforms(&build(&config, 43).scene);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn graves_stay_clear_of_the_house() {
        let config = SceneConfig::classic();
        let built = build(&config, 9);

        for grave in grave_transforms(&built.scene) {
            let r = (grave.position.x.powi(2) + grave.position.z.powi(2)).sqrt();
            assert!(r > config.layout.house_half_extent());
            assert!(r <= config.graves.outer_radius + 1e-4);
        }
    }

    #[test]
    fn lights_are_attached_to_the_right_groups() {
        let built = build(&SceneConfig::classic(), 1);
        let scene = &built.scene;

        assert!(holds_light(scene.group(HOUSE_GROUP).unwrap(), built.lights.porch));
        assert!(holds_light(&scene.root, built.lights.ghost));
        assert!(!holds_light(&scene.root, built.lights.porch));
    }

    #[test]
    fn ambient_occlusion_meshes_have_secondary_uv() {
        let built = build(&SceneConfig::grove(), 1);

        for item in built.scene.draw_items() {
            if item.mesh.surface().requires_secondary_uv() {
                assert!(item.mesh.geometry().has_secondary_uv(), "{}", item.mesh.name());
            }
        }
    }

    #[test]
    fn shadow_flags_match_layout() {
        let built = build(&SceneConfig::classic(), 1);
        let items = built.scene.draw_items();
        let find = |name: &str| items.iter().find(|i| i.mesh.name() == name).unwrap().mesh;

        assert!(find("floor").receive_shadow);
        assert!(find("walls").receive_shadow);
        assert!(find("bush 0").cast_shadow);
        assert!(find("post").cast_shadow);
        assert!(find("bar").cast_shadow);
        assert!(!find("door").cast_shadow);
    }

    #[test]
    fn bushes_share_one_geometry_and_surface() {
        let built = build(&SceneConfig::classic(), 1);
        let house = built.scene.group(HOUSE_GROUP).unwrap();
        let bushes: Vec<_> = house
            .meshes()
            .filter(|m| m.name().starts_with("bush"))
            .collect();

        assert_eq!(4, bushes.len());
        assert!(bushes
            .windows(2)
            .all(|w| Rc::ptr_eq(w[0].geometry(), w[1].geometry())
                && Rc::ptr_eq(w[0].surface(), w[1].surface())));
    }

    #[test]
    fn roof_faces_forward_and_door_sits_off_the_wall() {
        let built = build(&SceneConfig::classic(), 1);
        let items = built.scene.draw_items();

        let door = items.iter().find(|i| i.mesh.name() == "door").unwrap();
        let door_center = door.world.transform_point3(Vec3::ZERO);
        assert!(door_center.z > 2.0);

        let roof = items.iter().find(|i| i.mesh.name() == "roof").unwrap();
        let (_, rotation, translation) = roof.world.to_scale_rotation_translation();
        assert!(translation.abs_diff_eq(Vec3::new(0.0, 2.8, 0.0), 1e-6));
        assert!((rotation.to_euler(glam::EulerRot::XYZ).1 - std::f32::consts::FRAC_PI_4).abs() < 1e-5);
    }
}
