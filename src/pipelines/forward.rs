use std::collections::HashMap;

use crate::{
    data_structures::vertex_array::{VERTEX_SLOTS, VertexLayoutKey},
    pipelines::{
        depth_state, mk_render_pipeline, sampler_entry, texture_entry, uniform_entry,
    },
};

/// Binding of the per-node uniforms, indexed with a dynamic offset.
pub fn node_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("node bind group layout"),
        entries: &[uniform_entry(
            0,
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            true,
        )],
    })
}

/// Material uniform followed by five texture/sampler pairs: base color,
/// metallic-roughness, emissive, occlusion, normal.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = vec![uniform_entry(0, wgpu::ShaderStages::FRAGMENT, false)];
    for channel in 0..5 {
        entries.push(texture_entry(1 + 2 * channel, wgpu::TextureViewDimension::D2));
        entries.push(sampler_entry(2 + 2 * channel));
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("material bind group layout"),
        entries: &entries,
    })
}

/// Irradiance cube, prefiltered cube, BRDF LUT and their samplers.
pub fn environment_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("environment bind group layout"),
        entries: &[
            texture_entry(0, wgpu::TextureViewDimension::Cube),
            texture_entry(1, wgpu::TextureViewDimension::Cube),
            texture_entry(2, wgpu::TextureViewDimension::D2),
            sampler_entry(3),
            sampler_entry(4),
        ],
    })
}

/// Forward pipelines keyed by vertex layout and topology. All of them share
/// one shader module and one pipeline layout.
pub struct ForwardPipelines {
    pub node_layout: wgpu::BindGroupLayout,
    pub material_layout: wgpu::BindGroupLayout,
    pub environment_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    shader: wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    pipelines: HashMap<VertexLayoutKey, wgpu::RenderPipeline>,
}

impl ForwardPipelines {
    pub fn new(
        device: &wgpu::Device,
        shader: wgpu::ShaderModule,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let node_layout = node_layout(device);
        let material_layout = material_layout(device);
        let environment_layout = environment_layout(device);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("forward pipeline layout"),
            bind_group_layouts: &[&node_layout, &material_layout, &environment_layout],
            ..Default::default()
        });
        Self {
            node_layout,
            material_layout,
            environment_layout,
            layout,
            shader,
            color_format,
            pipelines: HashMap::new(),
        }
    }

    /// Builds the pipeline for `key` unless it exists already.
    pub fn prepare(&mut self, device: &wgpu::Device, key: VertexLayoutKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let pipeline = mk_forward_pipeline(
            device,
            &self.layout,
            &self.shader,
            self.color_format,
            &key,
        );
        self.pipelines.insert(key, pipeline);
    }

    pub fn get(&self, key: &VertexLayoutKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

/// One vertex buffer per attribute slot, each with a single attribute at
/// offset 0; the byte offset is applied when the buffer is bound.
fn mk_forward_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    key: &VertexLayoutKey,
) -> wgpu::RenderPipeline {
    let attributes: [[wgpu::VertexAttribute; 1]; VERTEX_SLOTS] = std::array::from_fn(|slot| {
        [wgpu::VertexAttribute {
            format: key.slots[slot].1,
            offset: 0,
            shader_location: slot as u32,
        }]
    });
    let buffers: Vec<wgpu::VertexBufferLayout> = attributes
        .iter()
        .enumerate()
        .map(|(slot, attributes)| wgpu::VertexBufferLayout {
            array_stride: key.slots[slot].0,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        })
        .collect();

    mk_render_pipeline(
        device,
        "forward pipeline",
        layout,
        shader,
        &buffers,
        color_format,
        Some(depth_state(wgpu::CompareFunction::LessEqual, true)),
        wgpu::PrimitiveState {
            topology: key.topology,
            strip_index_format: key.strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            // glTF double sided materials are not tracked, draw both faces
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
    )
}
