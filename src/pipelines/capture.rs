//! Programs of the offscreen passes that build the image based lighting maps.

use crate::{
    data_structures::geometry::{CubeVertex, QuadVertex},
    error::ViewerError,
    pipelines::{
        depth_state, mk_render_pipeline, sampler_entry, texture_entry, uniform_entry,
    },
    resources::shader::{Program, ShaderLibrary},
};

/// Per-draw data of a cube face capture.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CaptureUniform {
    pub view_projection: [[f32; 4]; 4],
    /// x: roughness
    pub params: [f32; 4],
}

/// Color format of the three cubemaps.
pub const CUBE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Two channel (scale, bias) lookup table.
pub const LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

pub struct CapturePipelines {
    pub uniform_layout: wgpu::BindGroupLayout,
    /// Equirectangular 2-D source.
    pub flat_source_layout: wgpu::BindGroupLayout,
    /// Cubemap source.
    pub cube_source_layout: wgpu::BindGroupLayout,
    pub equirectangular: wgpu::RenderPipeline,
    pub irradiance: wgpu::RenderPipeline,
    pub prefilter: wgpu::RenderPipeline,
    pub brdf_lut: wgpu::RenderPipeline,
}

fn source_layout(
    device: &wgpu::Device,
    label: &str,
    dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[texture_entry(0, dimension), sampler_entry(1)],
    })
}

impl CapturePipelines {
    /// Compiles the four programs. Any failure is fatal for the caller.
    pub fn new(device: &wgpu::Device, shaders: &ShaderLibrary) -> Result<Self, ViewerError> {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("capture uniform layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                true,
            )],
        });
        let flat_source_layout = source_layout(
            device,
            "equirectangular source layout",
            wgpu::TextureViewDimension::D2,
        );
        let cube_source_layout =
            source_layout(device, "cube source layout", wgpu::TextureViewDimension::Cube);

        let mk_cube_pipeline = |program: Program, source: &wgpu::BindGroupLayout| {
            let shader = shaders.load(device, program)?;
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(program.name()),
                bind_group_layouts: &[&uniform_layout, source],
                ..Default::default()
            });
            Ok::<_, ViewerError>(mk_render_pipeline(
                device,
                program.name(),
                &layout,
                &shader,
                &[CubeVertex::desc()],
                CUBE_FORMAT,
                Some(depth_state(wgpu::CompareFunction::Less, true)),
                // the camera sits inside the cube
                wgpu::PrimitiveState {
                    cull_mode: None,
                    ..Default::default()
                },
            ))
        };
        let equirectangular = mk_cube_pipeline(Program::Equirectangular, &flat_source_layout)?;
        let irradiance = mk_cube_pipeline(Program::Irradiance, &cube_source_layout)?;
        let prefilter = mk_cube_pipeline(Program::Prefilter, &cube_source_layout)?;

        let brdf_shader = shaders.load(device, Program::BrdfLut)?;
        let brdf_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("brdf lut pipeline layout"),
            bind_group_layouts: &[],
            ..Default::default()
        });
        let brdf_lut = mk_render_pipeline(
            device,
            Program::BrdfLut.name(),
            &brdf_layout,
            &brdf_shader,
            &[QuadVertex::desc()],
            LUT_FORMAT,
            Some(depth_state(wgpu::CompareFunction::Less, true)),
            wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                cull_mode: None,
                ..Default::default()
            },
        );

        Ok(Self {
            uniform_layout,
            flat_source_layout,
            cube_source_layout,
            equirectangular,
            irradiance,
            prefilter,
            brdf_lut,
        })
    }
}
