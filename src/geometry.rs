//! Static vertex data for the cube, UV sphere and full-screen quad.
//!
//! Everything is emitted as a plain triangle list so each shape draws with a
//! single non-indexed call sized by its vertex count.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

pub const SPHERE_SECTORS: u32 = 64;
pub const SPHERE_STACKS: u32 = 32;

/// Vertex type with a fixed GPU layout.
pub trait Vertex: Pod {
    fn layout() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    pub position: [f32; 3],
}

impl PositionVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
}

impl Vertex for PositionVertex {
    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl SphereVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
}

impl Vertex for SphereVertex {
    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
}

impl Vertex for QuadVertex {
    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Unit-extent cube (corners at ±1) for the skybox, 36 vertices.
pub fn cube() -> Vec<PositionVertex> {
    const FACES: [[f32; 3]; 36] = [
        // -Z
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        // -X
        [-1.0, -1.0, 1.0],
        [-1.0, -1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, 1.0, 1.0],
        [-1.0, -1.0, 1.0],
        // +X
        [1.0, -1.0, -1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [1.0, 1.0, -1.0],
        [1.0, -1.0, -1.0],
        // +Z
        [-1.0, -1.0, 1.0],
        [-1.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [1.0, -1.0, 1.0],
        [-1.0, -1.0, 1.0],
        // +Y
        [-1.0, 1.0, -1.0],
        [1.0, 1.0, -1.0],
        [1.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
        [-1.0, 1.0, -1.0],
        // -Y
        [-1.0, -1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
    ];
    FACES
        .iter()
        .map(|&position| PositionVertex { position })
        .collect()
}

/// UV sphere of `radius` centred on the origin, using the default
/// tessellation.
pub fn sphere(radius: f32) -> Vec<SphereVertex> {
    sphere_with(radius, SPHERE_SECTORS, SPHERE_STACKS)
}

/// UV sphere with explicit tessellation. The polar stacks emit a single
/// triangle per sector, so the vertex count is `6 * sectors * (stacks - 1)`.
pub fn sphere_with(radius: f32, sectors: u32, stacks: u32) -> Vec<SphereVertex> {
    let sectors = sectors.max(3);
    let stacks = stacks.max(2);

    let point = |sector: u32, stack: u32| {
        let u = sector as f32 / sectors as f32;
        let v = stack as f32 / stacks as f32;
        let theta = u * 2.0 * PI;
        let phi = v * PI;
        let normal = [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()];
        SphereVertex {
            position: normal.map(|c| c * radius),
            normal,
            uv: [1.0 - u, v],
        }
    };

    let mut vertices = Vec::with_capacity((6 * sectors * (stacks - 1)) as usize);
    for stack in 0..stacks {
        for sector in 0..sectors {
            let top_left = point(sector, stack);
            let top_right = point(sector + 1, stack);
            let bottom_left = point(sector, stack + 1);
            let bottom_right = point(sector + 1, stack + 1);

            // Counter-clockwise seen from outside.
            if stack != 0 {
                vertices.extend([top_left, top_right, bottom_left]);
            }
            if stack != stacks - 1 {
                vertices.extend([top_right, bottom_right, bottom_left]);
            }
        }
    }
    vertices
}

/// Two triangles covering normalized device coordinates.
pub fn screen_quad() -> Vec<QuadVertex> {
    [
        [-1.0, 1.0],
        [-1.0, -1.0],
        [1.0, -1.0],
        [-1.0, 1.0],
        [1.0, -1.0],
        [1.0, 1.0],
    ]
    .into_iter()
    .map(|position| QuadVertex { position })
    .collect()
}

/// Immutable GPU vertex buffer plus the number of vertices it holds.
pub struct GeometryBuffer {
    vertex: wgpu::Buffer,
    vertex_count: u32,
}

impl GeometryBuffer {
    pub fn upload<V: Vertex>(device: &wgpu::Device, vertices: &[V], label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            vertex,
            vertex_count: vertices.len() as u32,
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn slice(&self) -> wgpu::BufferSlice<'_> {
        self.vertex.slice(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn cube_has_twelve_triangles_on_unit_extent() {
        let cube = cube();
        assert_eq!(cube.len(), 36);
        assert!(cube
            .iter()
            .all(|v| v.position.iter().all(|c| c.abs() == 1.0)));
    }

    #[test]
    fn sphere_vertex_count_skips_pole_degenerates() {
        assert_eq!(sphere_with(1.0, 8, 4).len(), 6 * 8 * 3);
        assert_eq!(
            sphere(5.0).len() as u32,
            6 * SPHERE_SECTORS * (SPHERE_STACKS - 1)
        );
    }

    #[test]
    fn sphere_vertices_sit_on_radius_with_unit_normals() {
        for vertex in sphere_with(20.0, 16, 8) {
            let position = Vec3::from(vertex.position);
            let normal = Vec3::from(vertex.normal);
            assert!((position.length() - 20.0).abs() < 1e-3);
            assert!((normal.length() - 1.0).abs() < 1e-5);
            assert!(vertex.uv.iter().all(|c| (0.0..=1.0).contains(c)));
        }
    }

    #[test]
    fn sphere_triangles_face_outward() {
        let vertices = sphere_with(1.0, 12, 6);
        for tri in vertices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|v| Vec3::from(v.position));
            let face_normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(face_normal.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn quad_covers_clip_space() {
        let quad = screen_quad();
        assert_eq!(quad.len(), 6);
        let area: f32 = quad
            .chunks(3)
            .map(|t| {
                let [a, b, c] = [t[0].position, t[1].position, t[2].position];
                ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])) / 2.0
            })
            .sum();
        assert_eq!(area, 4.0);
    }
}
