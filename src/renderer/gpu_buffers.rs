use std::cell::Cell;

/// Trait for objects that represent a GPU buffer that can be updated from the
/// CPU.
pub trait DynamicGpuBuffer {
    /// Copy data stored in this buffer to the GPU.
    ///
    /// Updating the GPU will also clear the dirty flag on this buffer.
    fn update_gpu(&self, queue: &wgpu::Queue);

    /// Check if this buffer has values that have not yet been copied to the GPU.
    fn is_dirty(&self) -> bool;
}

/// A trait for bind groups that contain uniforms.
pub trait UniformBindGroup {
    /// Get the bind group representing this uniform buffer.
    fn bind_group(&self) -> &wgpu::BindGroup;
}

/// A utility struct that simplifies mapping a Rust struct of uniform values to
/// a wgpu uniform buffer accessible via shader.
///
/// Once created a program can update the values stored in the buffer by calling
/// `values_mut()`, and then calling `update_gpu()` to ensure the new values are
/// copied to the GPU. The buffer is bound by its owner, which is free to put
/// textures and samplers into the same bind group.
#[derive(Debug)]
pub struct GenericUniformBuffer<T>
where
    T: Clone + Copy + std::fmt::Debug + bytemuck::Pod + bytemuck::Zeroable,
{
    /// The values stored in this uniform buffer.
    values: T,
    /// The GPU buffer storing a copy of this uniform buffer's values.
    gpu_buffer: wgpu::Buffer,
    /// True if `values` is potentially out of sync with the GPU buffer and
    /// should be sent to the GPU during the next update phase.
    is_dirty: Cell<bool>,
}

impl<T> GenericUniformBuffer<T>
where
    T: Clone + Copy + std::fmt::Debug + bytemuck::Pod + bytemuck::Zeroable,
{
    /// Create a new generic uniform buffer.
    ///
    /// `device`: The wgpu device owning this uniform buffer.
    /// `label`: Optional name representing this uniform buffer.
    /// `values`: Initial values to store in this uniform buffer.
    pub fn new(device: &wgpu::Device, label: Option<&str>, values: T) -> Self {
        let gpu_buffer = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label,
                contents: bytemuck::bytes_of(&values),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            },
        );

        Self {
            values,
            gpu_buffer,
            is_dirty: Cell::new(false),
        }
    }

    /// Access the values stored in this uniform buffer.
    pub fn values(&self) -> &T {
        &self.values
    }

    /// Access the values stored in this uniform buffer with a mutable ref.
    ///
    /// Calling this method will set the buffer's dirty flag even if no values
    /// are changed.
    pub fn values_mut(&mut self) -> &mut T {
        self.is_dirty.set(true);
        &mut self.values
    }

    /// The whole buffer as a bind group resource.
    pub fn as_binding(&self) -> wgpu::BindingResource<'_> {
        self.gpu_buffer.as_entire_binding()
    }
}

impl<T> DynamicGpuBuffer for GenericUniformBuffer<T>
where
    T: Clone + Copy + std::fmt::Debug + bytemuck::Pod + bytemuck::Zeroable,
{
    fn update_gpu(&self, queue: &wgpu::Queue) {
        self.is_dirty.set(false);
        queue.write_buffer(&self.gpu_buffer, 0, bytemuck::bytes_of(&self.values));
    }

    fn is_dirty(&self) -> bool {
        self.is_dirty.get()
    }
}
