use std::{collections::HashMap, rc::Rc};

use tracing::debug;

use super::{
    gpu_buffers::{GenericUniformBuffer, UniformBindGroup},
    shaders::{packed_structs::PackedMaterialConstants, MATERIAL_MAP_SLOTS, MATERIAL_SAMPLER_BINDING},
    textures::{create_sampler, GpuTexture},
};
use crate::{
    materials::SurfaceDescriptor,
    textures::{MapKind, TextureSettings},
};

/// GPU side state of one surface descriptor: its constants and a bind group
/// with every map slot filled.
pub struct GpuMaterial {
    constants: GenericUniformBuffer<PackedMaterialConstants>,
    bind_group: wgpu::BindGroup,
    /// Map revisions the bind group was built from, in slot order.
    revisions: [u64; MATERIAL_MAP_SLOTS.len()],
}

impl GpuMaterial {
    pub fn is_transparent(&self) -> bool {
        self.constants.values().params.w > 0.0
    }
}

impl UniformBindGroup for GpuMaterial {
    fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// Uploads surface maps as they finish loading and keeps one `GpuMaterial` per
/// surface descriptor.
///
/// Materials are rebuilt whenever one of their maps changes revision, which
/// happens when it finishes loading, fails, or has its sampling settings
/// changed.
pub struct MaterialCache {
    /// One placeholder per map slot.
    placeholders: Vec<GpuTexture>,
    /// Uploaded images keyed by texture name.
    textures: HashMap<String, GpuTexture>,
    /// The descriptor handle is held to keep its address from being reused.
    materials: HashMap<usize, (Rc<SurfaceDescriptor>, GpuMaterial)>,
}

impl MaterialCache {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            placeholders: MATERIAL_MAP_SLOTS
                .iter()
                .map(|kind| GpuTexture::placeholder(device, queue, *kind))
                .collect(),
            textures: HashMap::new(),
            materials: HashMap::new(),
        }
    }

    /// Make sure `surface` has an up to date material. Returns the cache key.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        surface: &Rc<SurfaceDescriptor>,
    ) -> usize {
        let key = Rc::as_ptr(surface) as usize;
        let revisions = map_revisions(surface);

        if let Some((_, material)) = self.materials.get(&key) {
            if material.revisions == revisions {
                return key;
            }
        }

        for (_, texture) in surface.maps.iter() {
            if let Some(image) = texture.image() {
                self.textures
                    .entry(texture.name().to_string())
                    .or_insert_with(|| {
                        debug!("uploading texture '{}'", texture.name());
                        GpuTexture::from_rgba(
                            device,
                            queue,
                            &image,
                            texture.color_space(),
                            Some(texture.name()),
                        )
                    });
            }
        }

        let material = self.build(device, layout, surface, revisions);
        self.materials.insert(key, (surface.clone(), material));

        key
    }

    pub fn get(&self, key: usize) -> Option<&GpuMaterial> {
        self.materials.get(&key).map(|(_, material)| material)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    fn build(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        surface: &SurfaceDescriptor,
        revisions: [u64; MATERIAL_MAP_SLOTS.len()],
    ) -> GpuMaterial {
        let settings = tiling(surface);
        let color_ready = surface
            .maps
            .color
            .as_ref()
            .is_some_and(|texture| self.textures.contains_key(texture.name()));

        let constants = GenericUniformBuffer::new(
            device,
            Some(surface.name.as_str()),
            PackedMaterialConstants::new(surface, color_ready, settings.repeat),
        );

        let views: Vec<&wgpu::TextureView> = MATERIAL_MAP_SLOTS
            .iter()
            .zip(&self.placeholders)
            .map(|(kind, placeholder)| {
                let texture = surface
                    .maps
                    .get(*kind)
                    .and_then(|texture| self.textures.get(texture.name()))
                    .unwrap_or(placeholder);
                &texture.view
            })
            .collect();

        let sampler = create_sampler(device, settings, Some(surface.name.as_str()));

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: constants.as_binding(),
        }];
        entries.extend(views.iter().enumerate().map(|(i, view)| wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: wgpu::BindingResource::TextureView(view),
        }));
        entries.push(wgpu::BindGroupEntry {
            binding: MATERIAL_SAMPLER_BINDING,
            resource: wgpu::BindingResource::Sampler(&sampler),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(surface.name.as_str()),
            layout,
            entries: &entries,
        });

        GpuMaterial {
            constants,
            bind_group,
            revisions,
        }
    }
}

/// Current revision of every map slot, zero for empty slots.
fn map_revisions(surface: &SurfaceDescriptor) -> [u64; MATERIAL_MAP_SLOTS.len()] {
    MATERIAL_MAP_SLOTS.map(|kind| {
        surface
            .maps
            .get(kind)
            .map(|texture| texture.revision() + 1)
            .unwrap_or(0)
    })
}

/// Sampling settings shared by every map of a surface. The maps of one surface
/// are tiled together, so the color map decides, falling back to the first
/// map present.
fn tiling(surface: &SurfaceDescriptor) -> TextureSettings {
    surface
        .maps
        .get(MapKind::Color)
        .or_else(|| surface.maps.iter().next().map(|(_, texture)| texture))
        .map(|texture| texture.settings())
        .unwrap_or_default()
}
