mod gpu_buffers;
mod materials;
mod meshes;
mod models;
mod passes;
mod shaders;
mod textures;

use std::{cmp::Ordering, sync::Arc};

use anyhow::Context;
use tracing::{debug, info, warn};
use winit::window::Window;

use crate::{
    animation::{FrameRenderer, RenderError},
    camera::Camera,
    math_utils::linear_to_srgb,
    scene::SceneRoot,
    viewport::Viewport,
};

use gpu_buffers::{DynamicGpuBuffer, GenericUniformBuffer, UniformBindGroup};
use materials::MaterialCache;
use meshes::{DrawMesh, MeshCache};
use models::ObjectPool;
use passes::shadow_pass::ShadowPass;
use shaders::{
    packed_structs::{pack_frame, PackedFrame, PackedFrameConstants},
    BindGroupLayouts, Vertex,
};
use textures::GpuTexture;

/// One mesh ready to be drawn this frame, referring into the renderer caches.
#[derive(Copy, Clone, Debug)]
struct PreparedDraw {
    mesh: usize,
    material: usize,
    object: usize,
    cast_shadow: bool,
    transparent: bool,
    /// Squared distance from the camera, used to order transparent surfaces.
    depth: f32,
}

/// Forward renderer for a `SceneRoot`. Draws the moon's shadow map first, then
/// every opaque surface, then transparent surfaces from back to front.
pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    /// True when the back buffer encodes to sRGB on write. Otherwise the shader
    /// encodes its output itself.
    output_is_srgb: bool,
    depth_texture: GpuTexture,
    layouts: BindGroupLayouts,
    opaque_pipeline: wgpu::RenderPipeline,
    transparent_pipeline: wgpu::RenderPipeline,
    frame_constants: GenericUniformBuffer<PackedFrameConstants>,
    /// Holds the shadow map view, so it is rebuilt whenever the map is.
    frame_bind_group: wgpu::BindGroup,
    shadow_pass: ShadowPass,
    meshes: MeshCache,
    materials: MaterialCache,
    objects: ObjectPool,
    reported_dropped_lights: bool,
    reported_point_shadows: bool,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, viewport: &Viewport) -> anyhow::Result<Self> {
        // Create a WGPU instance that can use any supported graphics API.
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Create the main rendering surface and then get an adapter that acts
        // as the handle to one of the machine's physical GPU(s).
        let surface = instance
            .create_surface(window)
            .context("failed to create the main rendering surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("no graphics adapter is compatible with the surface"))?;

        let adapter_info = adapter.get_info();
        info!(
            "using adapter '{}' with the {:?} backend",
            adapter_info.name, adapter_info.backend
        );

        // Get a communication channel to the graphics card and a queue for
        // submitting commands to.
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: if cfg!(target_arch = "wasm32") {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default()
                    },
                    label: None,
                },
                None,
            )
            .await
            .context("failed to acquire a graphics device")?;

        // Prefer an sRGB back buffer. When none is offered the standard shader
        // encodes its own output.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("the rendering surface offers no texture formats"))?;

        if surface_format.is_srgb() {
            info!("rendering surface supports sRGB");
        } else {
            info!("no sRGB support found for the main rendering surface, encoding in the shader");
        }

        let (width, height) = clamp_target_size(&device, viewport.render_target_size());
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &surface_config);

        let layouts = BindGroupLayouts::new(&device);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("standard shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("renderer/shaders/standard.wgsl").into()),
        });

        let opaque_pipeline =
            create_standard_pipeline(&device, &layouts, &shader, surface_format, false);
        let transparent_pipeline =
            create_standard_pipeline(&device, &layouts, &shader, surface_format, true);

        let depth_texture =
            GpuTexture::create_depth_texture(&device, width, height, false, Some("depth buffer"));

        let frame_constants = GenericUniformBuffer::new(
            &device,
            Some("per-frame uniforms"),
            PackedFrameConstants::default(),
        );

        let shadow_pass = ShadowPass::new(&device, &layouts);
        let frame_bind_group =
            create_frame_bind_group(&device, &layouts, &frame_constants, &shadow_pass);

        let materials = MaterialCache::new(&device, &queue);

        info!("renderer ready with a {width}x{height} render target");

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            output_is_srgb: surface_format.is_srgb(),
            depth_texture,
            layouts,
            opaque_pipeline,
            transparent_pipeline,
            frame_constants,
            frame_bind_group,
            shadow_pass,
            meshes: MeshCache::default(),
            materials,
            objects: ObjectPool::default(),
            reported_dropped_lights: false,
            reported_point_shadows: false,
        })
    }

    /// Log light setups the renderer cannot show in full. Each message is
    /// written once.
    fn report_unsupported_lights(&mut self, frame: &PackedFrame) {
        if !self.reported_dropped_lights
            && (frame.dropped_point_lights > 0 || frame.dropped_directional_lights > 0)
        {
            warn!(
                "ignoring {} point light(s) and {} directional light(s) beyond what the standard shader supports",
                frame.dropped_point_lights, frame.dropped_directional_lights
            );
            self.reported_dropped_lights = true;
        }

        if !self.reported_point_shadows && frame.point_shadow_requests > 0 {
            debug!(
                "{} point light(s) request shadows, only the moon's shadow map is rendered",
                frame.point_shadow_requests
            );
            self.reported_point_shadows = true;
        }
    }

    /// Upload frame constants and the moon's shadow camera.
    fn prepare_frame(&mut self, mut frame: PackedFrame) {
        if let Some(plan) = frame.shadow {
            if self.shadow_pass.resize(&self.device, plan.map_size) {
                debug!("shadow map resized to {}", self.shadow_pass.map_size());
                self.frame_bind_group = create_frame_bind_group(
                    &self.device,
                    &self.layouts,
                    &self.frame_constants,
                    &self.shadow_pass,
                );
            }

            // The map may have been clamped to the device limits.
            frame.constants.moon_color.w = 1.0 / self.shadow_pass.map_size() as f32;
            self.shadow_pass
                .set_view_projection(&self.queue, plan.view_projection);
        }

        if *self.frame_constants.values() != frame.constants {
            *self.frame_constants.values_mut() = frame.constants;
        }

        if self.frame_constants.is_dirty() {
            self.frame_constants.update_gpu(&self.queue);
        }
    }

    /// Upload any new geometry, materials and object transforms, returning the
    /// draw list in scene graph order.
    fn prepare_draws(&mut self, scene: &SceneRoot, camera: &Camera) -> Vec<PreparedDraw> {
        let eye = camera.eye();
        let cached = (self.meshes.len(), self.materials.len());

        let draws: Vec<PreparedDraw> = scene
            .draw_items()
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let mesh = self.meshes.prepare(&self.device, item.mesh.geometry());
                let material = self.materials.prepare(
                    &self.device,
                    &self.queue,
                    &self.layouts.per_material_layout,
                    item.mesh.surface(),
                );
                self.objects.prepare(
                    &self.device,
                    &self.queue,
                    &self.layouts.per_object_layout,
                    index,
                    item.world,
                    item.mesh.receive_shadow,
                );

                PreparedDraw {
                    mesh,
                    material,
                    object: index,
                    cast_shadow: item.mesh.cast_shadow,
                    transparent: self
                        .materials
                        .get(material)
                        .is_some_and(|m| m.is_transparent()),
                    depth: item.world.w_axis.truncate().distance_squared(eye),
                }
            })
            .collect();

        if cached != (self.meshes.len(), self.materials.len()) {
            debug!(
                "gpu caches now hold {} meshes and {} materials",
                self.meshes.len(),
                self.materials.len()
            );
        }

        draws
    }

    /// Handle a failure to acquire the next back buffer. A lost or outdated
    /// surface is reconfigured so the next frame can try again.
    fn surface_error(&mut self, error: wgpu::SurfaceError) -> RenderError {
        let error = map_surface_error(error);

        if matches!(error, RenderError::SurfaceLost) {
            self.surface.configure(&self.device, &self.surface_config);
        }

        error
    }
}

impl FrameRenderer for Renderer {
    fn resize(&mut self, viewport: &Viewport) {
        let (width, height) = clamp_target_size(&self.device, viewport.render_target_size());

        if width == self.surface_config.width && height == self.surface_config.height {
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);

        // Recreate the depth buffer to match the new surface size.
        self.depth_texture = GpuTexture::create_depth_texture(
            &self.device,
            width,
            height,
            false,
            Some("depth buffer"),
        );
    }

    fn render(&mut self, scene: &SceneRoot, camera: &Camera) -> Result<(), RenderError> {
        let frame = pack_frame(scene, camera, self.output_is_srgb);
        self.report_unsupported_lights(&frame);

        let draw_shadows = frame.shadow.is_some();
        let clear_color = scene.environment.clear_color;
        self.prepare_frame(frame);

        let mut draws = self.prepare_draws(scene, camera);

        // Opaque first in graph order, then transparent from back to front.
        draws.sort_by(|a, b| match (a.transparent, b.transparent) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => b.depth.total_cmp(&a.depth),
        });

        let backbuffer = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(e) => return Err(self.surface_error(e)),
        };

        let view = backbuffer
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut command_encoder =
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render loop encoder"),
                });

        if draw_shadows {
            let casters = draws
                .iter()
                .filter(|draw| draw.cast_shadow)
                .filter_map(|draw| Some((self.meshes.get(draw.mesh)?, self.objects.get(draw.object)?)));

            self.shadow_pass.draw(&mut command_encoder, casters);
        }

        {
            // Clear values bypass the shader's output encoding.
            let clear_color = if self.output_is_srgb {
                clear_color
            } else {
                glam::Vec3::new(
                    linear_to_srgb(clear_color.x),
                    linear_to_srgb(clear_color.y),
                    linear_to_srgb(clear_color.z),
                )
            };

            let mut render_pass = command_encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("standard render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear_color.x as f64,
                            g: clear_color.y as f64,
                            b: clear_color.z as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);

            let mut transparent_bound = false;
            render_pass.set_pipeline(&self.opaque_pipeline);

            for draw in &draws {
                let (Some(mesh), Some(material), Some(object)) = (
                    self.meshes.get(draw.mesh),
                    self.materials.get(draw.material),
                    self.objects.get(draw.object),
                ) else {
                    continue;
                };

                if draw.transparent && !transparent_bound {
                    render_pass.set_pipeline(&self.transparent_pipeline);
                    transparent_bound = true;
                }

                render_pass.set_bind_group(1, material.bind_group(), &[]);
                render_pass.set_bind_group(2, object.bind_group(), &[]);
                render_pass.draw_mesh(mesh);
            }
        }

        // All done - submit commands for execution.
        self.queue.submit(std::iter::once(command_encoder.finish()));
        backbuffer.present();

        Ok(())
    }
}

/// Map a failure to acquire the back buffer to the error reported to the
/// animation loop.
fn map_surface_error(error: wgpu::SurfaceError) -> RenderError {
    match error {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => RenderError::SurfaceLost,
        wgpu::SurfaceError::Timeout => RenderError::Timeout,
        wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
    }
}

fn clamp_target_size(device: &wgpu::Device, (width, height): (u32, u32)) -> (u32, u32) {
    let max = device.limits().max_texture_dimension_2d;
    (width.clamp(1, max), height.clamp(1, max))
}

fn create_frame_bind_group(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    frame_constants: &GenericUniformBuffer<PackedFrameConstants>,
    shadow_pass: &ShadowPass,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("per-frame bind group"),
        layout: &layouts.per_frame_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_constants.as_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(shadow_pass.map_view()),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(shadow_pass.sampler()),
            },
        ],
    })
}

/// Create the pipeline for the standard material. Transparent surfaces blend
/// over what is already drawn.
fn create_standard_pipeline(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    transparent: bool,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("standard pipeline layout"),
        bind_group_layouts: &[
            &layouts.per_frame_layout,
            &layouts.per_material_layout,
            &layouts.per_object_layout,
        ],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(if transparent {
            "standard transparent pipeline"
        } else {
            "standard opaque pipeline"
        }),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[Vertex::desc()],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(if transparent {
                    wgpu::BlendState::ALPHA_BLENDING
                } else {
                    wgpu::BlendState::REPLACE
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: GpuTexture::DEPTH_TEXTURE_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_and_outdated_surfaces_are_recoverable() {
        assert!(matches!(
            map_surface_error(wgpu::SurfaceError::Lost),
            RenderError::SurfaceLost
        ));
        assert!(matches!(
            map_surface_error(wgpu::SurfaceError::Outdated),
            RenderError::SurfaceLost
        ));
    }

    #[test]
    fn other_surface_errors_are_reported() {
        assert!(matches!(
            map_surface_error(wgpu::SurfaceError::Timeout),
            RenderError::Timeout
        ));
        assert!(matches!(
            map_surface_error(wgpu::SurfaceError::OutOfMemory),
            RenderError::OutOfMemory
        ));
    }
}
