//! Rust structs with memory layouts that match their same named counterparts
//! in shader code.
//!
//! Data is packed as tightly as possible, and any gaps after a `Vec3` are used
//! for an extra scalar. For example the point light color is encoded as:
//!
//!   light.color_decay.xyz = color * intensity
//!   light.color_decay.w   = decay exponent
//!
//! These structs must exactly match the memory layout whenever their
//! representation is changed in shader code or vice versa. All fields are
//! aligned to 16 bytes as WebGPU requires for uniform buffers.
use glam::{Mat4, Vec3, Vec4};

use crate::{
    camera::Camera,
    lighting::Light,
    materials::SurfaceDescriptor,
    scene::SceneRoot,
};

/// Number of point lights the standard shader evaluates per fragment.
pub const MAX_POINT_LIGHTS: usize = 4;

/// Rust struct with the same memory layout as `PackedPointLight` in the
/// standard shader.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedPointLight {
    pub position_range: Vec4, // .w is the range, zero for no falloff.
    pub color_decay: Vec4,    // .xyz is premultiplied by intensity.
}

/// Rust struct with the same memory layout as `PackedFrameConstants` in the
/// standard shader.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedFrameConstants {
    pub view_projection: Mat4,
    pub shadow_view_projection: Mat4,
    pub camera_position: Vec4, // .w is 1 when the output target is sRGB.
    pub ambient_color: Vec4,
    pub moon_direction: Vec4, // .xyz points towards the light, .w is 1 when shadowed.
    pub moon_color: Vec4,     // .w is the size of one shadow map texel in uv units.
    pub fog_color: Vec4,      // .w is 1 when fog is enabled.
    pub fog_range: Vec4,      // (near, far, point light count, unused).
    pub point_lights: [PackedPointLight; MAX_POINT_LIGHTS],
}

/// Rust struct with the same memory layout as `PackedMaterialConstants` in
/// the standard shader.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedMaterialConstants {
    pub color: Vec4,     // .w is unused.
    pub params: Vec4,    // (roughness, metalness, displacement scale, transparent).
    pub uv_repeat: Vec4, // .xy is the tiling factor, .zw unused.
}

impl PackedMaterialConstants {
    /// Pack a surface. `color_map_ready` selects between the surface color and
    /// its flat fallback, which stands in while the color map is unavailable.
    pub fn new(surface: &SurfaceDescriptor, color_map_ready: bool, uv_repeat: glam::Vec2) -> Self {
        let color = if surface.maps.color.is_some() && !color_map_ready {
            surface.fallback_color
        } else {
            surface.color
        };

        Self {
            color: vec3_w(color, 1.0),
            params: Vec4::new(
                surface.roughness,
                surface.metalness,
                surface.displacement_scale,
                if surface.transparent { 1.0 } else { 0.0 },
            ),
            uv_repeat: Vec4::new(uv_repeat.x, uv_repeat.y, 0.0, 0.0),
        }
    }
}

/// Rust struct with the same memory layout as `PackedObjectConstants` in the
/// standard and shadow shaders.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedObjectConstants {
    pub local_to_world: Mat4,
    pub normal_to_world: Mat4,
    pub flags: Vec4, // .x is 1 when the object receives shadows.
}

impl PackedObjectConstants {
    pub fn new(local_to_world: Mat4, receive_shadow: bool) -> Self {
        // A degenerate scale has no inverse; its normals are meaningless anyway.
        let normal_to_world = if local_to_world.determinant().abs() > f32::EPSILON {
            local_to_world.inverse().transpose()
        } else {
            local_to_world
        };

        Self {
            local_to_world,
            normal_to_world,
            flags: Vec4::new(if receive_shadow { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0),
        }
    }
}

/// Rust struct with the same memory layout as `PackedShadowConstants` in the
/// shadow shader.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedShadowConstants {
    pub light_view_projection: Mat4,
}

/// The directional shadow map requested by the scene's lights.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadowPlan {
    pub view_projection: Mat4,
    pub map_size: u32,
}

/// Everything the standard shader needs to know about the scene for one
/// frame, plus what had to be left out.
#[derive(Clone, Debug, PartialEq)]
pub struct PackedFrame {
    pub constants: PackedFrameConstants,
    pub shadow: Option<ShadowPlan>,
    /// Point lights beyond `MAX_POINT_LIGHTS`.
    pub dropped_point_lights: usize,
    /// Directional lights beyond the first.
    pub dropped_directional_lights: usize,
    /// Point lights asking for a shadow map.
    pub point_shadow_requests: usize,
}

/// Collect the camera, lights and fog of `scene` into shader constants.
///
/// Ambient lights add up. The first directional light is the moon and is the
/// only shadow caster that gets a shadow map.
pub fn pack_frame(scene: &SceneRoot, camera: &Camera, output_is_srgb: bool) -> PackedFrame {
    let mut constants = PackedFrameConstants {
        view_projection: camera.view_projection_matrix(),
        shadow_view_projection: Mat4::IDENTITY,
        camera_position: vec3_w(camera.eye(), if output_is_srgb { 1.0 } else { 0.0 }),
        ..Default::default()
    };

    let mut shadow = None;
    let mut ambient = Vec3::ZERO;
    let mut has_moon = false;
    let mut point_count = 0;
    let mut dropped_point_lights = 0;
    let mut dropped_directional_lights = 0;
    let mut point_shadow_requests = 0;

    for world_light in scene.world_lights() {
        match world_light.light {
            Light::Ambient(light) => ambient += light.color * light.intensity,
            Light::Directional(light) => {
                if has_moon {
                    dropped_directional_lights += 1;
                    continue;
                }

                has_moon = true;

                let target = world_light.parent.transform_point3(light.target);
                let towards_light = (world_light.position - target).normalize_or_zero();

                shadow = light
                    .shadow_view_projection(world_light.position, target)
                    .zip(light.shadow.map(|s| s.map_size.max(1)))
                    .map(|(view_projection, map_size)| ShadowPlan {
                        view_projection,
                        map_size,
                    });

                constants.moon_direction =
                    vec3_w(towards_light, if shadow.is_some() { 1.0 } else { 0.0 });
                constants.moon_color = vec3_w(
                    light.color * light.intensity,
                    shadow.map(|s| 1.0 / s.map_size as f32).unwrap_or(0.0),
                );

                if let Some(plan) = shadow {
                    constants.shadow_view_projection = plan.view_projection;
                }
            }
            Light::Point(light) => {
                if light.shadow.is_some() {
                    point_shadow_requests += 1;
                }

                if point_count == MAX_POINT_LIGHTS {
                    dropped_point_lights += 1;
                    continue;
                }

                constants.point_lights[point_count] = PackedPointLight {
                    position_range: vec3_w(world_light.position, light.range.max(0.0)),
                    color_decay: vec3_w(light.color * light.intensity, light.decay),
                };
                point_count += 1;
            }
        }
    }

    constants.ambient_color = vec3_w(ambient, 0.0);

    if let Some(fog) = scene.environment.fog {
        constants.fog_color = vec3_w(fog.color, 1.0);
        constants.fog_range = Vec4::new(fog.near, fog.far, 0.0, 0.0);
    }
    constants.fog_range.z = point_count as f32;

    PackedFrame {
        constants,
        shadow,
        dropped_point_lights,
        dropped_directional_lights,
        point_shadow_requests,
    }
}

/// Returns a new `Vec4` value that is the combination of a `Vec3` x, y and z
/// and an additional `w` value.
pub fn vec3_w(xyz: Vec3, w: f32) -> Vec4 {
    Vec4::new(xyz.x, xyz.y, xyz.z, w)
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::{
        lighting::{AmbientLight, PointLight},
        materials::MaterialBuilder,
        scene::{Environment, Fog, Group, Transform},
    };

    fn camera() -> Camera {
        Camera::new(Vec3::new(6.0, 3.0, 7.0), Vec3::ZERO, 75.0, 1.5).unwrap()
    }

    fn point(position: Vec3) -> Light {
        Light::Point(PointLight {
            color: Vec3::ONE,
            intensity: 2.0,
            position,
            range: 3.0,
            decay: 1.0,
            shadow: None,
        })
    }

    #[test]
    fn layouts_are_16_byte_multiples() {
        assert_eq!(0, std::mem::size_of::<PackedFrameConstants>() % 16);
        assert_eq!(0, std::mem::size_of::<PackedMaterialConstants>() % 16);
        assert_eq!(0, std::mem::size_of::<PackedObjectConstants>() % 16);
        assert_eq!(32, std::mem::size_of::<PackedPointLight>());
    }

    #[test]
    fn classic_scene_packs_every_light() {
        let mut bank = crate::textures::TextureBank::new(std::sync::Arc::new(
            crate::textures::MemoryTextureSource::new(),
        ));
        let config = crate::config::SceneConfig::classic();
        let mut rng = config.rng();
        let built = crate::builder::build_scene(&config, &mut bank, &mut rng).unwrap();

        let frame = pack_frame(&built.scene, &camera(), true);

        assert_eq!(2.0, frame.constants.fog_range.z);
        assert_eq!(1.0, frame.constants.fog_color.w);
        assert_eq!(1.0, frame.constants.moon_direction.w);
        assert_eq!(1024, frame.shadow.unwrap().map_size);
        assert_eq!(2, frame.point_shadow_requests);
        assert_eq!(0, frame.dropped_point_lights);

        // The moon sits above the scene so its direction points upwards.
        assert!(frame.constants.moon_direction.y > 0.0);
    }

    #[test]
    fn point_lights_use_world_positions() {
        let mut scene = SceneRoot::new(Environment::default());
        scene.root.add_group(
            Group::new("house").with_transform(Transform::from_position(Vec3::new(1.0, 0.0, 0.0))),
        );
        scene
            .add_light(Some("house"), point(Vec3::new(0.0, 2.0, 0.0)))
            .unwrap();

        let frame = pack_frame(&scene, &camera(), false);
        let light = frame.constants.point_lights[0];

        assert!(light
            .position_range
            .abs_diff_eq(Vec4::new(1.0, 2.0, 0.0, 3.0), 1e-6));
        assert!(light.color_decay.abs_diff_eq(Vec4::new(2.0, 2.0, 2.0, 1.0), 1e-6));
        assert_eq!(0.0, frame.constants.camera_position.w);
        assert!(frame.shadow.is_none());
    }

    #[test]
    fn extra_point_lights_are_dropped() {
        let mut scene = SceneRoot::new(Environment::default());
        for i in 0..6 {
            scene.add_light(None, point(Vec3::splat(i as f32))).unwrap();
        }

        let frame = pack_frame(&scene, &camera(), true);

        assert_eq!(MAX_POINT_LIGHTS as f32, frame.constants.fog_range.z);
        assert_eq!(2, frame.dropped_point_lights);
    }

    #[test]
    fn ambient_lights_add_up_and_fog_is_optional() {
        let mut scene = SceneRoot::new(Environment {
            fog: None,
            clear_color: Vec3::ZERO,
        });
        for _ in 0..2 {
            scene
                .add_light(
                    None,
                    Light::Ambient(AmbientLight {
                        color: Vec3::ONE,
                        intensity: 0.25,
                    }),
                )
                .unwrap();
        }

        let frame = pack_frame(&scene, &camera(), true);
        assert!(frame.constants.ambient_color.truncate().abs_diff_eq(Vec3::splat(0.5), 1e-6));
        assert_eq!(0.0, frame.constants.fog_color.w);

        scene.environment.fog = Some(Fog {
            color: Vec3::ONE,
            near: 1.0,
            far: 15.0,
        });
        let frame = pack_frame(&scene, &camera(), true);
        assert_eq!(Vec4::new(1.0, 15.0, 0.0, 0.0), frame.constants.fog_range);
    }

    #[test]
    fn material_uses_fallback_until_color_map_is_ready() {
        let mut bank = crate::textures::TextureBank::new(std::sync::Arc::new(
            crate::textures::MemoryTextureSource::new(),
        ));
        let surface = MaterialBuilder::new("floor")
            .color(Vec3::ONE)
            .fallback_color(Vec3::new(0.5, 0.25, 0.125))
            .map(
                crate::textures::MapKind::Color,
                bank.load_map("ground", crate::textures::MapKind::Color),
            )
            .build();

        let loading = PackedMaterialConstants::new(&surface, false, Vec2::ONE);
        let ready = PackedMaterialConstants::new(&surface, true, Vec2::new(4.0, 4.0));

        assert_eq!(Vec4::new(0.5, 0.25, 0.125, 1.0), loading.color);
        assert_eq!(Vec4::ONE, ready.color);
        assert_eq!(Vec4::new(4.0, 4.0, 0.0, 0.0), ready.uv_repeat);
    }

    #[test]
    fn object_normals_survive_non_uniform_scale() {
        let world = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let object = PackedObjectConstants::new(world, true);

        let normal = object
            .normal_to_world
            .transform_vector3(Vec3::new(1.0, 1.0, 0.0))
            .normalize();
        assert!(normal.abs_diff_eq(Vec3::new(0.5, 1.0, 0.0).normalize(), 1e-6));
        assert_eq!(1.0, object.flags.x);

        let flat = PackedObjectConstants::new(Mat4::from_scale(Vec3::ZERO), false);
        assert_eq!(Mat4::from_scale(Vec3::ZERO), flat.normal_to_world);
    }
}
