//! NOTES:
//! Mesh vertex winding order is CCW.
use std::{collections::HashMap, rc::Rc};

use wgpu::util::DeviceExt;

use super::shaders::Vertex;
use crate::geometry::GeometryData;

/// Interleave the attributes of tessellated geometry into vertices. Geometry
/// without a secondary UV set reuses its primary UVs.
pub fn interleave(geometry: &GeometryData) -> Vec<Vertex> {
    let uv2 = geometry.uv2.as_ref().unwrap_or(&geometry.uvs);

    geometry
        .positions
        .iter()
        .zip(&geometry.normals)
        .zip(geometry.uvs.iter().zip(uv2))
        .map(|((position, normal), (uv, uv2))| Vertex {
            position: position.to_array(),
            normal: normal.to_array(),
            tex_coords: uv.to_array(),
            tex_coords_2: uv2.to_array(),
        })
        .collect()
}

/// Vertex and index buffers for one tessellated geometry.
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, geometry: &GeometryData, label: Option<&str>) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label,
            contents: bytemuck::cast_slice(&interleave(geometry)),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label,
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: geometry.indices.len() as u32,
        }
    }
}

/// GPU meshes keyed by the geometry they were built from, so geometry shared
/// between scene objects is uploaded once.
#[derive(Default)]
pub struct MeshCache {
    /// The geometry handle is held to keep its address from being reused.
    meshes: HashMap<usize, (Rc<GeometryData>, GpuMesh)>,
}

impl MeshCache {
    /// Upload `geometry` unless it is already cached. Returns the cache key.
    pub fn prepare(&mut self, device: &wgpu::Device, geometry: &Rc<GeometryData>) -> usize {
        let key = Rc::as_ptr(geometry) as usize;

        self.meshes.entry(key).or_insert_with(|| {
            (
                geometry.clone(),
                GpuMesh::new(device, geometry, Some("scene mesh")),
            )
        });

        key
    }

    pub fn get(&self, key: usize) -> Option<&GpuMesh> {
        self.meshes.get(&key).map(|(_, mesh)| mesh)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }
}

/// A trait for render passes that can draw meshes.
pub trait DrawMesh<'a> {
    fn draw_mesh(&mut self, mesh: &'a GpuMesh);
}

impl<'rpass, 'a> DrawMesh<'a> for wgpu::RenderPass<'rpass>
where
    'a: 'rpass,
{
    fn draw_mesh(&mut self, mesh: &'a GpuMesh) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.index_count, 0, 0..1);
    }
}
