//! Scene traversal and draw recording.
//!
//! A frame is drawn in two steps. [`plan_frame`] walks the active scene,
//! accumulating transforms, and produces a [`FramePlan`]: one uniform block
//! per mesh node and one [`PrimitiveDraw`] per drawable primitive, each with
//! its resolved material. [`SceneRenderer`] then uploads the uniforms,
//! makes sure every pipeline and material bind group exists, and records the
//! draws into a render pass.
//!
//! Planning touches no GPU state so it is unit tested directly.

use cgmath::{Matrix, Matrix4, SquareMatrix, Vector3};

use crate::{
    camera::Camera,
    data_structures::{
        document::Document,
        material::{FeatureFlags, ResolvedMaterial, resolve_material},
        vertex_array::{DrawCall, VaoRange, VertexArray},
    },
    pipelines::{aligned_uniform_stride, forward::ForwardPipelines},
    resources::gpu_scene::{BoundDraw, GpuScene},
};

/// Per-node block at group 0, laid out like `NodeUniforms` in the forward program.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeUniforms {
    pub model: [[f32; 4]; 4],
    pub model_view: [[f32; 4]; 4],
    pub model_view_projection: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub light_direction: [f32; 4],
    pub light_intensity: [f32; 4],
    pub camera_position: [f32; 4],
    pub camera_direction: [f32; 4],
    /// x: image based lighting enabled
    pub options: [u32; 4],
}

/// Everything about a frame that is the same for every node.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    pub camera: Camera,
    pub projection: Matrix4<f32>,
    /// Toward the light, world space.
    pub light_direction: Vector3<f32>,
    pub light_radiance: [f32; 3],
    pub features: FeatureFlags,
}

impl NodeUniforms {
    pub fn new(model: Matrix4<f32>, frame: &FrameInputs) -> Self {
        let view = frame.camera.view_matrix();
        let model_view = view * model;
        // singular models (zero scale) keep their own matrix
        let normal_matrix = model.invert().map_or(model, |inverse| inverse.transpose());
        let eye = frame.camera.eye;
        let direction = frame.camera.front();
        let light = frame.light_direction;
        let [r, g, b] = frame.light_radiance;
        Self {
            model: model.into(),
            model_view: model_view.into(),
            model_view_projection: (frame.projection * model_view).into(),
            normal_matrix: normal_matrix.into(),
            light_direction: [light.x, light.y, light.z, 0.0],
            light_intensity: [r, g, b, 1.0],
            camera_position: [eye.x, eye.y, eye.z, 1.0],
            camera_direction: [direction.x, direction.y, direction.z, 0.0],
            options: [frame.features.environment as u32, 0, 0, 0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveDraw {
    /// Index into [`FramePlan::nodes`].
    pub node_slot: usize,
    pub vertex_array: usize,
    pub material: ResolvedMaterial,
    pub call: DrawCall,
}

#[derive(Debug, Clone, Default)]
pub struct FramePlan {
    pub nodes: Vec<NodeUniforms>,
    pub draws: Vec<PrimitiveDraw>,
}

/// Walks the active scene and lists what to draw, in traversal order.
pub fn plan_frame(
    doc: &Document,
    vertex_arrays: &[VertexArray],
    vao_ranges: &[VaoRange],
    frame: &FrameInputs,
) -> FramePlan {
    let mut plan = FramePlan::default();
    doc.visit_nodes(|_, node, local_to_world| {
        let Some(mesh_index) = node.mesh else {
            return;
        };
        let (Some(mesh), Some(range)) = (doc.meshes.get(mesh_index), vao_ranges.get(mesh_index))
        else {
            log::warn!("Node references mesh {} which does not exist", mesh_index);
            return;
        };
        let node_slot = plan.nodes.len();
        plan.nodes.push(NodeUniforms::new(*local_to_world, frame));

        for (primitive, vertex_array) in mesh.primitives.iter().zip(range.indices()) {
            let Some(array) = vertex_arrays.get(vertex_array) else {
                continue;
            };
            if !array.drawable {
                continue;
            }
            plan.draws.push(PrimitiveDraw {
                node_slot,
                vertex_array,
                material: resolve_material(doc, primitive.material, &frame.features),
                call: array.draw_call(),
            });
        }
    });
    plan
}

/// Owns the per-node uniform buffer and records planned draws.
pub struct SceneRenderer {
    stride: wgpu::BufferAddress,
    capacity: usize,
    node_buffer: wgpu::Buffer,
    node_bind_group: wgpu::BindGroup,
}

impl SceneRenderer {
    pub fn new(device: &wgpu::Device, node_layout: &wgpu::BindGroupLayout) -> Self {
        let stride = aligned_uniform_stride::<NodeUniforms>(device);
        let (node_buffer, node_bind_group) = node_resources(device, node_layout, stride, 1);
        Self {
            stride,
            capacity: 1,
            node_buffer,
            node_bind_group,
        }
    }

    /// Uploads the node uniforms of `plan` and creates the pipelines and
    /// material bind groups it needs.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &mut ForwardPipelines,
        scene: &mut GpuScene,
        plan: &FramePlan,
    ) {
        if plan.nodes.len() > self.capacity {
            self.capacity = plan.nodes.len().next_power_of_two();
            (self.node_buffer, self.node_bind_group) =
                node_resources(device, &pipelines.node_layout, self.stride, self.capacity);
            log::debug!("Node uniform buffer grown to {} slots", self.capacity);
        }
        for (slot, uniforms) in plan.nodes.iter().enumerate() {
            queue.write_buffer(
                &self.node_buffer,
                slot as wgpu::BufferAddress * self.stride,
                bytemuck::bytes_of(uniforms),
            );
        }
        for draw in &plan.draws {
            if let Some(array) = scene.vertex_arrays.get(draw.vertex_array) {
                pipelines.prepare(device, array.layout_key());
            }
            scene.prepare_material(device, &pipelines.material_layout, &draw.material);
        }
    }

    /// Records every draw of `plan`. Returns the number of draw calls issued.
    pub fn record(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        plan: &FramePlan,
        pipelines: &ForwardPipelines,
        scene: &GpuScene,
        environment: &wgpu::BindGroup,
    ) -> usize {
        pass.set_bind_group(2, environment, &[]);
        let mut issued = 0;
        for draw in &plan.draws {
            let Some(array) = scene.vertex_arrays.get(draw.vertex_array) else {
                continue;
            };
            let (Some(pipeline), Some(material)) = (
                pipelines.get(&array.layout_key()),
                scene.material(&draw.material.key),
            ) else {
                continue;
            };
            pass.set_pipeline(pipeline);
            let offset = (draw.node_slot as wgpu::BufferAddress * self.stride) as wgpu::DynamicOffset;
            pass.set_bind_group(0, &self.node_bind_group, &[offset]);
            pass.set_bind_group(1, material, &[]);
            match scene.bind_vertex_array(pass, draw.vertex_array) {
                Some(BoundDraw::Indexed { count }) => pass.draw_indexed(0..count, 0, 0..1),
                Some(BoundDraw::NonIndexed { vertex_count }) => pass.draw(0..vertex_count, 0..1),
                None => continue,
            }
            issued += 1;
        }
        issued
    }
}

fn node_resources(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: wgpu::BufferAddress,
    capacity: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("node uniform buffer"),
        size: stride * capacity as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("node bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<NodeUniforms>() as u64),
            }),
        }],
    });
    (buffer, bind_group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{
        document::{ComponentType, Material, Node, Texture, tests::triangle_document},
        material::{Fallback, TextureSource},
        transform::{LocalTransform, Transform},
        vertex_array::build_vertex_arrays,
    };
    use cgmath::{Point3, Transform as _};

    fn frame() -> FrameInputs {
        FrameInputs {
            camera: Camera::new(Point3::new(0.0, 0.0, 5.0), Point3::new(0.0, 0.0, 0.0), Vector3::unit_y()),
            projection: Matrix4::identity(),
            light_direction: Vector3::unit_z(),
            light_radiance: [1.0, 1.0, 1.0],
            features: FeatureFlags::default(),
        }
    }

    fn plan(doc: &Document, frame: &FrameInputs) -> FramePlan {
        let (vertex_arrays, ranges) = build_vertex_arrays(doc);
        plan_frame(doc, &vertex_arrays, &ranges, frame)
    }

    #[test]
    fn node_uniforms_match_the_shader_block() {
        assert_eq!(std::mem::size_of::<NodeUniforms>(), 336);
    }

    #[test]
    fn position_and_indices_only_primitive_is_drawn_indexed() {
        let doc = triangle_document(true);
        let (vertex_arrays, _) = build_vertex_arrays(&doc);
        assert!(vertex_arrays[0].drawable);
        assert!(vertex_arrays[0].slots[0].is_some());
        assert!(vertex_arrays[0].slots[1].is_none() && vertex_arrays[0].slots[2].is_none());

        let plan = plan(&doc, &frame());
        assert_eq!(plan.nodes.len(), 1);
        assert_eq!(plan.draws.len(), 1);
        assert_eq!(
            plan.draws[0].call,
            DrawCall::Indexed {
                component_type: ComponentType::U16,
                count: 3
            }
        );
    }

    #[test]
    fn primitive_without_indices_draws_position_count() {
        let doc = triangle_document(false);
        let plan = plan(&doc, &frame());
        assert_eq!(plan.draws[0].call, DrawCall::NonIndexed { vertex_count: 3 });
    }

    #[test]
    fn scene_without_textures_binds_only_fallbacks() {
        let mut doc = triangle_document(true);
        doc.materials.push(Material {
            base_color_texture: Some(0),
            normal_texture: Some(3),
            ..Default::default()
        });
        doc.meshes[0].primitives[0].material = Some(0);
        assert!(doc.textures.is_empty());

        let plan = plan(&doc, &frame());
        let material = plan.draws[0].material;
        assert!(
            material
                .sources()
                .iter()
                .all(|s| matches!(s, TextureSource::Fallback(_)))
        );
        assert_eq!(material.normal, TextureSource::Fallback(Fallback::FlatNormal));
    }

    #[test]
    fn textured_material_samples_the_texture_table() {
        let mut doc = triangle_document(true);
        doc.textures.push(Texture {
            source: 0,
            sampler: None,
        });
        doc.materials.push(Material {
            base_color_texture: Some(0),
            ..Default::default()
        });
        doc.meshes[0].primitives[0].material = Some(0);
        let plan = plan(&doc, &frame());
        assert_eq!(plan.draws[0].material.base_color, TextureSource::Scene(0));
        assert_eq!(
            plan.draws[0].material.emissive,
            TextureSource::Fallback(Fallback::Black)
        );
    }

    #[test]
    fn child_nodes_inherit_parent_transforms() {
        let mut doc = triangle_document(true);
        let mut parent = Transform::new();
        parent.position = Vector3::new(0.0, 3.0, 0.0);
        let mut child = Transform::new();
        child.scale = Vector3::new(2.0, 2.0, 2.0);
        doc.nodes = vec![
            Node {
                local: LocalTransform::Decomposed(parent),
                children: vec![1],
                ..Default::default()
            },
            Node {
                local: LocalTransform::Decomposed(child),
                mesh: Some(0),
                ..Default::default()
            },
        ];
        let plan = plan(&doc, &frame());
        assert_eq!(plan.nodes.len(), 1);
        let model = Matrix4::from(plan.nodes[0].model);
        let p = model.transform_point(Point3::new(1.0, 0.0, 0.0));
        assert_eq!(p, Point3::new(2.0, 3.0, 0.0));
        assert_eq!(plan.draws[0].node_slot, 0);
    }

    #[test]
    fn environment_toggle_reaches_the_node_uniforms() {
        let doc = triangle_document(true);
        let mut inputs = frame();
        assert_eq!(plan(&doc, &inputs).nodes[0].options[0], 1);
        inputs.features.environment = false;
        let off = plan(&doc, &inputs);
        assert_eq!(off.nodes[0].options[0], 0);
        // the material bind group does not depend on the environment toggle
        assert_eq!(off.draws[0].material.key, plan(&doc, &frame()).draws[0].material.key);
    }

    #[test]
    fn normal_matrix_is_the_inverse_transpose() {
        let model = Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0);
        let uniforms = NodeUniforms::new(model, &frame());
        assert_eq!(uniforms.normal_matrix[0][0], 0.5);
        assert_eq!(uniforms.normal_matrix[1][1], 1.0);
    }

    #[test]
    fn undrawable_primitives_are_skipped() {
        let mut doc = triangle_document(true);
        doc.meshes[0].primitives[0].position = None;
        let plan = plan(&doc, &frame());
        assert_eq!(plan.nodes.len(), 1);
        assert!(plan.draws.is_empty());
    }
}
