//! Proxy geometry for offscreen passes and the skybox.
//!
//! The unit cube is rasterized from the inside for cubemap captures and the
//! skybox, the quad covers the viewport for the BRDF integration pass.

use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CubeVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl CubeVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CubeVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl QuadVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// (outward normal, u axis, v axis) per face, `u x v = normal`.
const CUBE_FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
];

/// The [-1, 1] cube as a triangle list, 36 vertices, counter-clockwise
/// seen from outside.
pub fn cube_vertices() -> Vec<CubeVertex> {
    let corner = |n: [f32; 3], u: [f32; 3], v: [f32; 3], s: f32, t: f32| CubeVertex {
        position: [
            n[0] + s * u[0] + t * v[0],
            n[1] + s * u[1] + t * v[1],
            n[2] + s * u[2] + t * v[2],
        ],
        normal: n,
        tex_coords: [(s + 1.0) * 0.5, (1.0 - t) * 0.5],
    };
    CUBE_FACES
        .iter()
        .flat_map(|&(n, u, v)| {
            [
                corner(n, u, v, -1.0, -1.0),
                corner(n, u, v, 1.0, -1.0),
                corner(n, u, v, 1.0, 1.0),
                corner(n, u, v, -1.0, -1.0),
                corner(n, u, v, 1.0, 1.0),
                corner(n, u, v, -1.0, 1.0),
            ]
        })
        .collect()
}

/// Full-viewport quad as a 4 vertex triangle strip. Texture coordinates have
/// their origin at the top-left, matching wgpu render targets, so `v` grows
/// with the row index of the target.
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, 1.0, 0.0],
        tex_coords: [0.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, -1.0, 0.0],
        tex_coords: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0, 0.0],
        tex_coords: [1.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0, 0.0],
        tex_coords: [1.0, 1.0],
    },
];

/// GPU buffers for the cube and the quad.
#[derive(Debug)]
pub struct ProxyGeometry {
    pub cube: wgpu::Buffer,
    pub cube_vertex_count: u32,
    pub quad: wgpu::Buffer,
    pub quad_vertex_count: u32,
}

impl ProxyGeometry {
    pub fn new(device: &wgpu::Device) -> Self {
        let cube_vertices = cube_vertices();
        let cube = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Unit Cube Vertex Buffer"),
            contents: bytemuck::cast_slice(&cube_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            cube,
            cube_vertex_count: cube_vertices.len() as u32,
            quad,
            quad_vertex_count: QUAD_VERTICES.len() as u32,
        }
    }
}
