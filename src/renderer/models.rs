use glam::Mat4;

use super::{
    gpu_buffers::{DynamicGpuBuffer, GenericUniformBuffer, UniformBindGroup},
    shaders::packed_structs::PackedObjectConstants,
};

/// Per-object shader uniforms. One instance per drawn scene object.
#[derive(Debug)]
pub struct ObjectUniforms {
    buffer: GenericUniformBuffer<PackedObjectConstants>,
    bind_group: wgpu::BindGroup,
}

impl ObjectUniforms {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let buffer = GenericUniformBuffer::new(
            device,
            Some("per-object uniforms"),
            PackedObjectConstants::default(),
        );

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("per-object bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_binding(),
            }],
        });

        Self { buffer, bind_group }
    }

    /// Set the object's world transform and shadow flags. Nothing is marked
    /// dirty when the values are unchanged.
    pub fn set(&mut self, local_to_world: Mat4, receive_shadow: bool) {
        let values = PackedObjectConstants::new(local_to_world, receive_shadow);

        if *self.buffer.values() != values {
            *self.buffer.values_mut() = values;
        }
    }

    /// Prepare the object for rendering.
    pub fn prepare(&self, queue: &wgpu::Queue) {
        if self.buffer.is_dirty() {
            self.buffer.update_gpu(queue);
        }
    }
}

impl UniformBindGroup for ObjectUniforms {
    fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// Object uniforms indexed by draw order. The scene graph is walked in the same
/// order every frame, so a slot keeps serving the same object and only
/// objects that moved are written to the GPU.
#[derive(Default)]
pub struct ObjectPool {
    objects: Vec<ObjectUniforms>,
}

impl ObjectPool {
    /// Update slot `index`, creating slots as needed.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        index: usize,
        local_to_world: Mat4,
        receive_shadow: bool,
    ) {
        while self.objects.len() <= index {
            self.objects.push(ObjectUniforms::new(device, layout));
        }

        let object = &mut self.objects[index];
        object.set(local_to_world, receive_shadow);
        object.prepare(queue);
    }

    pub fn get(&self, index: usize) -> Option<&ObjectUniforms> {
        self.objects.get(index)
    }
}
