use glam::Mat4;

use crate::renderer::{
    gpu_buffers::{DynamicGpuBuffer, GenericUniformBuffer, UniformBindGroup},
    meshes::{DrawMesh, GpuMesh},
    models::ObjectUniforms,
    shaders::{packed_structs::PackedShadowConstants, BindGroupLayouts, Vertex},
    textures::{create_shadow_sampler, GpuTexture},
};

/// Renders shadow casters into a depth map from the moon's point of view. The
/// standard pass then samples the map to decide what is in shadow.
pub struct ShadowPass {
    /// The shadow map written by this pass and sampled by the standard pass.
    map: GpuTexture,
    /// Width and height of `map` in texels.
    map_size: u32,
    /// Comparison sampler used by the standard pass to read `map`.
    sampler: wgpu::Sampler,
    /// Light view projection for the current frame.
    constants: GenericUniformBuffer<PackedShadowConstants>,
    bind_group: wgpu::BindGroup,
    render_pipeline: wgpu::RenderPipeline,
}

impl ShadowPass {
    /// Create a new shadow pass. Only one instance is needed per renderer. The
    /// map starts out as a single texel until a light asks for a real one.
    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        let constants = GenericUniformBuffer::new(
            device,
            Some("shadow pass uniforms"),
            PackedShadowConstants {
                light_view_projection: Mat4::IDENTITY,
            },
        );

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow pass bind group"),
            layout: &layouts.per_shadow_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: constants.as_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/shadow.wgsl").into()),
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow pass render pipeline"),
            layout: Some(
                &device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("shadow pass pipeline layout"),
                    bind_group_layouts: &[&layouts.per_shadow_layout, &layouts.per_object_layout],
                    push_constant_ranges: &[],
                }),
            ),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc()],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Back faces cast the shadow, which keeps lit faces from
                // shadowing themselves.
                cull_mode: Some(wgpu::Face::Front),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: GpuTexture::DEPTH_TEXTURE_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[],
            }),
            multiview: None,
        });

        Self {
            map: Self::create_map(device, 1),
            map_size: 1,
            sampler: create_shadow_sampler(device),
            constants,
            bind_group,
            render_pipeline,
        }
    }

    /// The shadow map view, bound by the standard pass.
    pub fn map_view(&self) -> &wgpu::TextureView {
        &self.map.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn map_size(&self) -> u32 {
        self.map_size
    }

    /// Recreate the shadow map if `size` differs from the current one. Returns
    /// true when the map was recreated, in which case any bind group holding
    /// the old view must be rebuilt.
    pub fn resize(&mut self, device: &wgpu::Device, size: u32) -> bool {
        let size = size.clamp(1, device.limits().max_texture_dimension_2d);
        if size == self.map_size {
            return false;
        }

        self.map = Self::create_map(device, size);
        self.map_size = size;
        true
    }

    /// Set the light view projection used by the next `draw`.
    pub fn set_view_projection(&mut self, queue: &wgpu::Queue, view_projection: Mat4) {
        if self.constants.values().light_view_projection != view_projection {
            self.constants.values_mut().light_view_projection = view_projection;
        }

        if self.constants.is_dirty() {
            self.constants.update_gpu(queue);
        }
    }

    /// Draw every shadow caster into the shadow map.
    pub fn draw<'a>(
        &'a self,
        command_encoder: &mut wgpu::CommandEncoder,
        casters: impl Iterator<Item = (&'a GpuMesh, &'a ObjectUniforms)>,
    ) {
        let mut shadow_render_pass =
            command_encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow render pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

        shadow_render_pass.set_pipeline(&self.render_pipeline);
        shadow_render_pass.set_bind_group(0, &self.bind_group, &[]);

        for (mesh, object) in casters {
            shadow_render_pass.set_bind_group(1, object.bind_group(), &[]);
            shadow_render_pass.draw_mesh(mesh);
        }
    }

    fn create_map(device: &wgpu::Device, size: u32) -> GpuTexture {
        GpuTexture::create_depth_texture(device, size, size, true, Some("shadow map"))
    }
}
