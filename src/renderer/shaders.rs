pub mod packed_structs;

use crate::textures::MapKind;

/// Texture slots of the material bind group, in binding order after the
/// material constants. Each slot is filled with a placeholder when the surface
/// has no such map.
pub const MATERIAL_MAP_SLOTS: [MapKind; 7] = [
    MapKind::Color,
    MapKind::Alpha,
    MapKind::AmbientOcclusion,
    MapKind::Height,
    MapKind::Normal,
    MapKind::Metalness,
    MapKind::Roughness,
];

/// Binding index of the material sampler, after the constants and maps.
pub const MATERIAL_SAMPLER_BINDING: u32 = MATERIAL_MAP_SLOTS.len() as u32 + 1;

/// A registry of bind group layouts used by this renderer.
pub struct BindGroupLayouts {
    /// Frame constants, shadow map and shadow comparison sampler.
    pub per_frame_layout: wgpu::BindGroupLayout,
    /// Material constants, every material map and one sampler.
    pub per_material_layout: wgpu::BindGroupLayout,
    /// Object transform.
    pub per_object_layout: wgpu::BindGroupLayout,
    /// Light view projection used while drawing into the shadow map.
    pub per_shadow_layout: wgpu::BindGroupLayout,
}

impl BindGroupLayouts {
    /// Create a new bind group layout registry.
    pub fn new(device: &wgpu::Device) -> Self {
        let material_entries = Self::per_material_entries();

        Self {
            per_frame_layout: device.create_bind_group_layout(&Self::per_frame_desc()),
            per_material_layout: device.create_bind_group_layout(
                &wgpu::BindGroupLayoutDescriptor {
                    label: Some("per-material bind group layout"),
                    entries: &material_entries,
                },
            ),
            per_object_layout: device.create_bind_group_layout(&Self::per_object_desc()),
            per_shadow_layout: device.create_bind_group_layout(&Self::per_shadow_desc()),
        }
    }

    /// Expected bind group inputs:
    ///  0 - frame constants
    ///  1 - shadow map depth texture
    ///  2 - shadow map comparison sampler
    pub fn per_frame_desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("per-frame bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        }
    }

    /// Gets the bind group layout describing any instance of `ObjectUniforms`.
    pub fn per_object_desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("per-object bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        }
    }

    /// Gets the bind group layout describing the shadow pass constants.
    pub fn per_shadow_desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("per-shadow bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        }
    }

    /// Expected bind group inputs:
    ///  0 - material constants
    ///  1..=7 - maps in `MATERIAL_MAP_SLOTS` order
    ///  8 - sampler shared by every map
    ///
    /// Maps are visible to the vertex stage because the height map displaces
    /// vertices.
    fn per_material_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];

        entries.extend((1..=MATERIAL_MAP_SLOTS.len() as u32).map(|binding| {
            wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }
        }));

        entries.push(wgpu::BindGroupLayoutEntry {
            binding: MATERIAL_SAMPLER_BINDING,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            // This needs to match the filterable field for the textures from
            // above.
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });

        entries
    }
}

/// Mesh vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    /// Secondary texture coordinates read by the ambient occlusion map.
    pub tex_coords_2: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x2,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_attributes_are_tightly_packed() {
        let desc = Vertex::desc();

        assert_eq!(40, desc.array_stride);
        assert_eq!(
            vec![0, 12, 24, 32],
            desc.attributes.iter().map(|a| a.offset).collect::<Vec<_>>()
        );
    }

    #[test]
    fn sampler_follows_the_maps() {
        assert_eq!(8, MATERIAL_SAMPLER_BINDING);
        assert_eq!(MapKind::Color, MATERIAL_MAP_SLOTS[0]);
    }
}
