use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        geometry::ProxyGeometry,
        texture::{Texture, create_clamp_sampler},
    },
    ibl::{
        BRDF_LUT_SIZE, CapturePass, ENVIRONMENT_SIZE, IRRADIANCE_SIZE, PREFILTER_MIP_LEVELS,
        PREFILTER_SIZE, Stage, capture_plan, capture_projection, capture_views,
    },
    pipelines::{
        aligned_uniform_stride,
        capture::{CUBE_FORMAT, CaptureUniform, CapturePipelines, LUT_FORMAT},
    },
    resources::texture::EnvironmentImage,
};

/// The maps the forward shader samples for image based lighting, plus the
/// environment cubemap the skybox draws.
pub struct IblResources {
    pub environment: Texture,
    pub irradiance: Texture,
    pub prefilter: Texture,
    pub brdf_lut: Texture,
    pub cube_sampler: wgpu::Sampler,
    pub lut_sampler: wgpu::Sampler,
}

/// Uniforms of every cube face draw in plan order. The LUT pass has none.
pub fn capture_uniforms(plan: &[CapturePass]) -> Vec<CaptureUniform> {
    let projection = capture_projection();
    let views = capture_views();
    plan.iter()
        .flat_map(|pass| pass.draws.iter())
        .filter_map(|draw| {
            draw.face.map(|face| CaptureUniform {
                view_projection: (projection * views[face as usize]).into(),
                params: [draw.roughness, 0.0, 0.0, 0.0],
            })
        })
        .collect()
}

impl IblResources {
    /// Runs the four capture stages on `source`. Each stage is submitted
    /// before the next one, so the maps are ready for any later submission.
    pub fn compute(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &CapturePipelines,
        geometry: &ProxyGeometry,
        source: &EnvironmentImage,
    ) -> Self {
        let equirectangular = source.upload(device, queue);
        let environment =
            Texture::create_cube_target(device, ENVIRONMENT_SIZE, 1, CUBE_FORMAT, "environment cubemap");
        let irradiance =
            Texture::create_cube_target(device, IRRADIANCE_SIZE, 1, CUBE_FORMAT, "irradiance cubemap");
        let prefilter = Texture::create_cube_target(
            device,
            PREFILTER_SIZE,
            PREFILTER_MIP_LEVELS,
            CUBE_FORMAT,
            "prefiltered cubemap",
        );
        let brdf_lut = Texture::create_render_target(device, BRDF_LUT_SIZE, LUT_FORMAT, "brdf lut");
        let cube_sampler = create_clamp_sampler(device, "environment sampler");
        let lut_sampler = create_clamp_sampler(device, "brdf lut sampler");

        let plan = capture_plan();
        let stride = aligned_uniform_stride::<CaptureUniform>(device);
        let uniforms = capture_uniforms(&plan);
        let mut contents = vec![0u8; stride as usize * uniforms.len().max(1)];
        for (i, uniform) in uniforms.iter().enumerate() {
            let start = i * stride as usize;
            contents[start..start + std::mem::size_of::<CaptureUniform>()]
                .copy_from_slice(bytemuck::bytes_of(uniform));
        }
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("capture uniform buffer"),
            contents: &contents,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("capture uniform bind group"),
            layout: &pipelines.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<CaptureUniform>() as u64),
                }),
            }],
        });

        let source_bind_group = |layout: &wgpu::BindGroupLayout, view: &wgpu::TextureView, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&cube_sampler),
                    },
                ],
            })
        };
        let equirectangular_source = source_bind_group(
            &pipelines.flat_source_layout,
            &equirectangular.view,
            "equirectangular source bind group",
        );
        let environment_source = source_bind_group(
            &pipelines.cube_source_layout,
            &environment.view,
            "environment source bind group",
        );

        let mut depth_targets: HashMap<u32, Texture> = HashMap::new();
        let mut uniform_index = 0u64;
        for pass in &plan {
            let (pipeline, source, target) = match pass.stage {
                Stage::Equirectangular => (
                    &pipelines.equirectangular,
                    Some(&equirectangular_source),
                    &environment,
                ),
                Stage::Irradiance => (&pipelines.irradiance, Some(&environment_source), &irradiance),
                Stage::Prefilter => (&pipelines.prefilter, Some(&environment_source), &prefilter),
                Stage::BrdfLut => (&pipelines.brdf_lut, None, &brdf_lut),
            };

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("capture encoder"),
            });
            for draw in &pass.draws {
                let depth = depth_targets.entry(draw.size).or_insert_with(|| {
                    Texture::create_depth_texture(device, [draw.size, draw.size], "capture depth")
                });
                let view = match draw.face {
                    Some(face) => target.face_view(face, draw.mip),
                    None => target.mip_view(draw.mip),
                };
                let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("capture pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Discard,
                        }),
                        stencil_ops: None,
                    }),
                    ..Default::default()
                });
                render_pass.set_pipeline(pipeline);
                match source {
                    Some(source) => {
                        let offset = (uniform_index * stride) as wgpu::DynamicOffset;
                        uniform_index += 1;
                        render_pass.set_bind_group(0, &uniform_bind_group, &[offset]);
                        render_pass.set_bind_group(1, source, &[]);
                        render_pass.set_vertex_buffer(0, geometry.cube.slice(..));
                        render_pass.draw(0..geometry.cube_vertex_count, 0..1);
                    }
                    None => {
                        render_pass.set_vertex_buffer(0, geometry.quad.slice(..));
                        render_pass.draw(0..geometry.quad_vertex_count, 0..1);
                    }
                }
            }
            queue.submit(std::iter::once(encoder.finish()));
            log::debug!("IBL stage {:?}: {} draws", pass.stage, pass.draws.len());
        }
        log::info!(
            "Computed IBL maps from a {}x{} environment",
            source.width,
            source.height
        );

        Self {
            environment,
            irradiance,
            prefilter,
            brdf_lut,
            cube_sampler,
            lut_sampler,
        }
    }

    /// Group 2 of the forward pipeline.
    pub fn bind_group(&self, device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("environment bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.irradiance.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.prefilter.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.brdf_lut.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.cube_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.lut_sampler),
                },
            ],
        })
    }

    /// Group 1 of the skybox pipeline.
    pub fn skybox_bind_group(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skybox bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.environment.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.cube_sampler),
                },
            ],
        })
    }
}
