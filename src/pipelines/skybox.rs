use crate::{
    data_structures::geometry::CubeVertex,
    pipelines::{
        depth_state, mk_render_pipeline, sampler_entry, texture_entry, uniform_entry,
    },
};

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkyboxUniform {
    pub view_projection: [[f32; 4]; 4],
}

impl SkyboxUniform {
    /// Drops the translation of `view` so the cube stays centered on the eye.
    pub fn new(projection: cgmath::Matrix4<f32>, view: cgmath::Matrix4<f32>) -> Self {
        let mut rotation = view;
        rotation.w = cgmath::Vector4::new(0.0, 0.0, 0.0, 1.0);
        Self {
            view_projection: (projection * rotation).into(),
        }
    }
}

pub struct SkyboxPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_layout: wgpu::BindGroupLayout,
    pub environment_layout: wgpu::BindGroupLayout,
}

impl SkyboxPipeline {
    pub fn new(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("skybox uniform layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX, false)],
        });
        let environment_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("skybox environment layout"),
                entries: &[
                    texture_entry(0, wgpu::TextureViewDimension::Cube),
                    sampler_entry(1),
                ],
            });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("skybox pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &environment_layout],
            ..Default::default()
        });
        let pipeline = mk_render_pipeline(
            device,
            "skybox pipeline",
            &layout,
            shader,
            &[CubeVertex::desc()],
            color_format,
            // at the far plane, behind everything drawn later
            Some(depth_state(wgpu::CompareFunction::LessEqual, false)),
            wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
        );
        Self {
            pipeline,
            uniform_layout,
            environment_layout,
        }
    }
}
