//! Primitive shapes and their tessellation into indexed triangle lists.
//!
//! Vertex layouts, UV orientation and triangle winding (counter clockwise
//! front faces) follow the conventions used by most web 3D engines so that
//! texture sets authored for them map the same way here.
use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

/// An axis aligned box centered on the origin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoxParams {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub depth_segments: u32,
}

/// A flat rectangle in the XY plane facing +Z.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlaneParams {
    pub width: f32,
    pub height: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

/// A cone with its apex pointing up +Y, centered on the origin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConeParams {
    pub radius: f32,
    pub height: f32,
    pub radial_segments: u32,
    pub height_segments: u32,
}

/// A (possibly tapered) cylinder along the Y axis, centered on the origin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CylinderParams {
    pub radius_top: f32,
    pub radius_bottom: f32,
    pub height: f32,
    pub radial_segments: u32,
    pub height_segments: u32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SphereParams {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

/// The closed set of primitive shapes the scene is built from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Geometry {
    Box(BoxParams),
    Plane(PlaneParams),
    Cone(ConeParams),
    Cylinder(CylinderParams),
    Sphere(SphereParams),
}

impl Geometry {
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Self::Box(BoxParams {
            width,
            height,
            depth,
            width_segments: 1,
            height_segments: 1,
            depth_segments: 1,
        })
    }

    pub fn plane(width: f32, height: f32, width_segments: u32, height_segments: u32) -> Self {
        Self::Plane(PlaneParams {
            width,
            height,
            width_segments,
            height_segments,
        })
    }

    pub fn cone(radius: f32, height: f32, radial_segments: u32, height_segments: u32) -> Self {
        Self::Cone(ConeParams {
            radius,
            height,
            radial_segments,
            height_segments,
        })
    }

    pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, radial_segments: u32) -> Self {
        Self::Cylinder(CylinderParams {
            radius_top,
            radius_bottom,
            height,
            radial_segments,
            height_segments: 1,
        })
    }

    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        Self::Sphere(SphereParams {
            radius,
            width_segments,
            height_segments,
        })
    }

    /// Generate vertices and triangle indices for this shape. Segment counts
    /// below the minimum a shape needs are raised to that minimum.
    pub fn tessellate(&self) -> GeometryData {
        let mut data = GeometryData::default();

        match *self {
            Geometry::Box(p) => build_box(&mut data, p),
            Geometry::Plane(p) => build_plane(&mut data, p),
            Geometry::Cone(p) => build_cylinder(
                &mut data,
                CylinderParams {
                    radius_top: 0.0,
                    radius_bottom: p.radius,
                    height: p.height,
                    radial_segments: p.radial_segments,
                    height_segments: p.height_segments,
                },
            ),
            Geometry::Cylinder(p) => build_cylinder(&mut data, p),
            Geometry::Sphere(p) => build_sphere(&mut data, p),
        }

        data
    }
}

/// Tessellated vertex attributes and triangle indices for a shape.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Secondary texture coordinates used by ambient occlusion maps.
    pub uv2: Option<Vec<Vec2>>,
    pub indices: Vec<u32>,
}

impl GeometryData {
    /// Duplicate the primary UV set into the secondary UV set.
    pub fn with_secondary_uv(mut self) -> Self {
        self.uv2 = Some(self.uvs.clone());
        self
    }

    pub fn has_secondary_uv(&self) -> bool {
        self.uv2
            .as_ref()
            .is_some_and(|uv2| uv2.len() == self.positions.len())
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2) -> u32 {
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        (self.positions.len() - 1) as u32
    }
}

fn build_box(data: &mut GeometryData, p: BoxParams) {
    let (ws, hs, ds) = (
        p.width_segments.max(1),
        p.height_segments.max(1),
        p.depth_segments.max(1),
    );

    // (u axis, v axis, w axis, u dir, v dir, face width, face height, face depth,
    //  u segments, v segments) for +x, -x, +y, -y, +z, -z.
    let faces = [
        (2, 1, 0, -1.0, -1.0, p.depth, p.height, p.width, ds, hs),
        (2, 1, 0, 1.0, -1.0, p.depth, p.height, -p.width, ds, hs),
        (0, 2, 1, 1.0, 1.0, p.width, p.depth, p.height, ws, ds),
        (0, 2, 1, 1.0, -1.0, p.width, p.depth, -p.height, ws, ds),
        (0, 1, 2, 1.0, -1.0, p.width, p.height, p.depth, ws, hs),
        (0, 1, 2, -1.0, -1.0, p.width, p.height, -p.depth, ws, hs),
    ];

    for (u, v, w, udir, vdir, width, height, depth, grid_x, grid_y) in faces {
        let start = data.positions.len() as u32;
        let segment_width = width / grid_x as f32;
        let segment_height = height / grid_y as f32;

        for iy in 0..=grid_y {
            let y = iy as f32 * segment_height - height / 2.0;

            for ix in 0..=grid_x {
                let x = ix as f32 * segment_width - width / 2.0;

                let mut position = Vec3::ZERO;
                position[u] = x * udir;
                position[v] = y * vdir;
                position[w] = depth / 2.0;

                let mut normal = Vec3::ZERO;
                normal[w] = if depth > 0.0 { 1.0 } else { -1.0 };

                data.push_vertex(
                    position,
                    normal,
                    Vec2::new(ix as f32 / grid_x as f32, 1.0 - iy as f32 / grid_y as f32),
                );
            }
        }

        push_grid_indices(data, start, grid_x, grid_y);
    }
}

fn build_plane(data: &mut GeometryData, p: PlaneParams) {
    let grid_x = p.width_segments.max(1);
    let grid_y = p.height_segments.max(1);
    let segment_width = p.width / grid_x as f32;
    let segment_height = p.height / grid_y as f32;

    for iy in 0..=grid_y {
        let y = iy as f32 * segment_height - p.height / 2.0;

        for ix in 0..=grid_x {
            let x = ix as f32 * segment_width - p.width / 2.0;

            data.push_vertex(
                Vec3::new(x, -y, 0.0),
                Vec3::Z,
                Vec2::new(ix as f32 / grid_x as f32, 1.0 - iy as f32 / grid_y as f32),
            );
        }
    }

    push_grid_indices(data, 0, grid_x, grid_y);
}

/// Two triangles per cell of a `(grid_x + 1) * (grid_y + 1)` vertex grid
/// starting at `start`.
fn push_grid_indices(data: &mut GeometryData, start: u32, grid_x: u32, grid_y: u32) {
    let row = grid_x + 1;

    for iy in 0..grid_y {
        for ix in 0..grid_x {
            let a = start + ix + row * iy;
            let b = start + ix + row * (iy + 1);
            let c = start + (ix + 1) + row * (iy + 1);
            let d = start + (ix + 1) + row * iy;

            data.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }
}

fn build_cylinder(data: &mut GeometryData, p: CylinderParams) {
    let radial = p.radial_segments.max(3);
    let rows = p.height_segments.max(1);
    let half_height = p.height / 2.0;
    let slope = (p.radius_bottom - p.radius_top) / p.height;

    // Torso.
    let mut grid: Vec<Vec<u32>> = Vec::with_capacity(rows as usize + 1);

    for y in 0..=rows {
        let v = y as f32 / rows as f32;
        let radius = v * (p.radius_bottom - p.radius_top) + p.radius_top;
        let mut grid_row = Vec::with_capacity(radial as usize + 1);

        for x in 0..=radial {
            let u = x as f32 / radial as f32;
            let (sin, cos) = (u * TAU).sin_cos();

            grid_row.push(data.push_vertex(
                Vec3::new(radius * sin, -v * p.height + half_height, radius * cos),
                Vec3::new(sin, slope, cos).normalize(),
                Vec2::new(u, 1.0 - v),
            ));
        }

        grid.push(grid_row);
    }

    for x in 0..radial as usize {
        for y in 0..rows as usize {
            let a = grid[y][x];
            let b = grid[y + 1][x];
            let c = grid[y + 1][x + 1];
            let d = grid[y][x + 1];

            // Skip triangles that collapse to a point at a zero radius end.
            if p.radius_top > 0.0 || y != 0 {
                data.indices.extend_from_slice(&[a, b, d]);
            }

            if p.radius_bottom > 0.0 || y != rows as usize - 1 {
                data.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    if p.radius_top > 0.0 {
        build_cap(data, radial, p.radius_top, half_height, true);
    }

    if p.radius_bottom > 0.0 {
        build_cap(data, radial, p.radius_bottom, half_height, false);
    }
}

fn build_cap(data: &mut GeometryData, radial: u32, radius: f32, half_height: f32, top: bool) {
    let sign = if top { 1.0 } else { -1.0 };
    let normal = Vec3::new(0.0, sign, 0.0);

    // One center vertex per segment so each wedge gets its own UV.
    let center_start = data.positions.len() as u32;
    for _ in 0..radial {
        data.push_vertex(
            Vec3::new(0.0, half_height * sign, 0.0),
            normal,
            Vec2::splat(0.5),
        );
    }

    let rim_start = data.positions.len() as u32;
    for x in 0..=radial {
        let (sin, cos) = (x as f32 / radial as f32 * TAU).sin_cos();

        data.push_vertex(
            Vec3::new(radius * sin, half_height * sign, radius * cos),
            normal,
            Vec2::new(cos * 0.5 + 0.5, sin * 0.5 * sign + 0.5),
        );
    }

    for x in 0..radial {
        let c = center_start + x;
        let i = rim_start + x;

        if top {
            data.indices.extend_from_slice(&[i, i + 1, c]);
        } else {
            data.indices.extend_from_slice(&[i + 1, i, c]);
        }
    }
}

fn build_sphere(data: &mut GeometryData, p: SphereParams) {
    let width_segments = p.width_segments.max(3);
    let height_segments = p.height_segments.max(2);
    let mut grid: Vec<Vec<u32>> = Vec::with_capacity(height_segments as usize + 1);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;

        // Shift the pole UVs to the middle of their segment.
        let u_offset = if iy == 0 {
            0.5 / width_segments as f32
        } else if iy == height_segments {
            -0.5 / width_segments as f32
        } else {
            0.0
        };

        let (sin_theta, cos_theta) = (v * PI).sin_cos();
        let mut grid_row = Vec::with_capacity(width_segments as usize + 1);

        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let (sin_phi, cos_phi) = (u * TAU).sin_cos();

            let position = Vec3::new(
                -p.radius * cos_phi * sin_theta,
                p.radius * cos_theta,
                p.radius * sin_phi * sin_theta,
            );

            grid_row.push(data.push_vertex(
                position,
                position.normalize_or_zero(),
                Vec2::new(u + u_offset, 1.0 - v),
            ));
        }

        grid.push(grid_row);
    }

    for iy in 0..height_segments as usize {
        for ix in 0..width_segments as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];

            if iy != 0 {
                data.indices.extend_from_slice(&[a, b, d]);
            }

            if iy != height_segments as usize - 1 {
                data.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(data: &GeometryData) {
        assert_eq!(data.positions.len(), data.normals.len());
        assert_eq!(data.positions.len(), data.uvs.len());
        assert_eq!(0, data.indices.len() % 3);
        assert!(data
            .indices
            .iter()
            .all(|i| (*i as usize) < data.positions.len()));
        assert!(data
            .normals
            .iter()
            .all(|n| (n.length() - 1.0).abs() < 1e-4));
    }

    #[test]
    fn box_has_four_vertices_per_face() {
        let data = Geometry::cuboid(4.0, 2.5, 4.0).tessellate();
        assert_well_formed(&data);

        assert_eq!(24, data.vertex_count());
        assert_eq!(12, data.triangle_count());

        let max = data
            .positions
            .iter()
            .fold(Vec3::splat(f32::MIN), |acc, p| acc.max(*p));
        assert!(max.abs_diff_eq(Vec3::new(2.0, 1.25, 2.0), 1e-6));
    }

    #[test]
    fn box_faces_wind_counter_clockwise() {
        let data = Geometry::cuboid(1.0, 1.0, 1.0).tessellate();

        for tri in data.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| data.positions[tri[i] as usize]);
            let face_normal = (b - a).cross(c - a).normalize();
            assert!(face_normal.abs_diff_eq(data.normals[tri[0] as usize], 1e-5));
        }
    }

    #[test]
    fn plane_faces_positive_z() {
        let data = Geometry::plane(2.0, 2.0, 100, 100).tessellate();
        assert_well_formed(&data);

        assert_eq!(101 * 101, data.vertex_count());
        assert_eq!(100 * 100 * 2, data.triangle_count());
        assert!(data.normals.iter().all(|n| *n == Vec3::Z));

        // Top left corner maps to the top left of the texture.
        assert!(data.positions[0].abs_diff_eq(Vec3::new(-1.0, 1.0, 0.0), 1e-6));
        assert_eq!(Vec2::new(0.0, 1.0), data.uvs[0]);
    }

    #[test]
    fn cone_has_open_apex_and_bottom_cap() {
        let data = Geometry::cone(4.0, 1.0, 4, 4).tessellate();
        assert_well_formed(&data);

        // 5x5 torso grid plus 4 cap centers and 5 rim vertices.
        assert_eq!(25 + 4 + 5, data.vertex_count());
        // 32 torso triangles minus 4 collapsed at the apex, plus the cap.
        assert_eq!(28 + 4, data.triangle_count());

        let top = data
            .positions
            .iter()
            .map(|p| p.y)
            .fold(f32::MIN, f32::max);
        assert_eq!(0.5, top);
    }

    #[test]
    fn cylinder_has_both_caps() {
        let data = Geometry::cylinder(0.2, 0.3, 2.0, 8).tessellate();
        assert_well_formed(&data);

        assert_eq!(9 * 2 + 2 * (8 + 9), data.vertex_count());
        assert_eq!(16 + 8 + 8, data.triangle_count());
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let data = Geometry::sphere(1.0, 16, 16).tessellate();
        assert_well_formed(&data);

        assert_eq!(17 * 17, data.vertex_count());
        assert_eq!(16 * 16 * 2 - 32, data.triangle_count());
        assert!(data
            .positions
            .iter()
            .all(|p| (p.length() - 1.0).abs() < 1e-5));
    }

    #[test]
    fn secondary_uv_copies_primary() {
        let data = Geometry::plane(16.0, 16.0, 1, 1).tessellate();
        assert!(!data.has_secondary_uv());

        let data = data.with_secondary_uv();
        assert!(data.has_secondary_uv());
        assert_eq!(Some(&data.uvs), data.uv2.as_ref());
    }
}
