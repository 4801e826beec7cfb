//! The viewer: every GPU resource of a loaded scene and its environment,
//! and the frame they are drawn in.
//!
//! [`Viewer`] is the single owner of the scene buffers, textures, IBL maps
//! and pipelines; dropping it releases all of them. The same
//! [`Viewer::render`] draws into the window surface or into the offscreen
//! target of [`Viewer::capture`].

use std::path::Path;

use anyhow::Context as _;
use wgpu::util::DeviceExt;

use crate::{
    camera::{Camera, CameraController, InputState, Projection, max_distance},
    context::CAPTURE_FORMAT,
    data_structures::{
        document::{Document, empty_bounds},
        geometry::ProxyGeometry,
        texture::Texture,
    },
    error::ViewerError,
    ibl::IblResources,
    pipelines::{
        capture::CapturePipelines,
        forward::ForwardPipelines,
        skybox::{SkyboxPipeline, SkyboxUniform},
    },
    readback::{RowOrder, read_texture, rgba_to_rgb, to_top_down},
    render::{FrameInputs, SceneRenderer, plan_frame},
    resources::{
        gpu_scene::GpuScene,
        shader::{Program, ShaderLibrary},
        texture::EnvironmentImage,
    },
    settings::ViewerSettings,
};

/// Render targets larger than the device's 2D texture limit cannot be created.
pub fn check_target_size(device: &wgpu::Device, size: [u32; 2]) -> Result<(), ViewerError> {
    let max = device.limits().max_texture_dimension_2d;
    if size[0] > max || size[1] > max {
        return Err(ViewerError::Resource(format!(
            "a {}x{} frame exceeds the device limit of {} pixels per side",
            size[0], size[1], max
        )));
    }
    Ok(())
}

struct Skybox {
    pipeline: SkyboxPipeline,
    uniform: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    environment_bind_group: wgpu::BindGroup,
}

pub struct Viewer {
    document: Document,
    scene: GpuScene,
    ibl: IblResources,
    forward: ForwardPipelines,
    environment_bind_group: wgpu::BindGroup,
    skybox: Skybox,
    geometry: ProxyGeometry,
    renderer: SceneRenderer,
    depth: Texture,
    depth_size: [u32; 2],
    max_distance: f32,
    pub controller: CameraController,
    pub projection: Projection,
    pub settings: ViewerSettings,
}

impl Viewer {
    /// Uploads `document`, runs the IBL precomputation on `environment` and
    /// compiles every program. `camera` overrides the camera derived from
    /// the scene bounds.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_format: wgpu::TextureFormat,
        document: Document,
        environment: &EnvironmentImage,
        shaders: &ShaderLibrary,
        camera: Option<Camera>,
        size: [u32; 2],
    ) -> Result<Self, ViewerError> {
        check_target_size(device, size)?;
        let capture_pipelines = CapturePipelines::new(device, shaders)?;
        let forward_shader = shaders.load(device, Program::Forward)?;
        let skybox_shader = shaders.load(device, Program::Skybox)?;

        let geometry = ProxyGeometry::new(device);
        let ibl = IblResources::compute(device, queue, &capture_pipelines, &geometry, environment);
        let scene = GpuScene::new(device, queue, shaders, &document)?;

        let mut forward = ForwardPipelines::new(device, forward_shader, color_format);
        for key in scene.layout_keys() {
            forward.prepare(device, key);
        }
        log::debug!("{} forward pipelines", forward.len());
        let environment_bind_group = ibl.bind_group(device, &forward.environment_layout);
        let renderer = SceneRenderer::new(device, &forward.node_layout);

        let pipeline = SkyboxPipeline::new(device, &skybox_shader, color_format);
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("skybox uniform buffer"),
            contents: bytemuck::bytes_of(&SkyboxUniform {
                view_projection: [[0.0; 4]; 4],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skybox uniform bind group"),
            layout: &pipeline.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });
        let skybox = Skybox {
            environment_bind_group: ibl.skybox_bind_group(device, &pipeline.environment_layout),
            pipeline,
            uniform,
            uniform_bind_group,
        };

        let bounds = document.bounds().unwrap_or_else(empty_bounds);
        let max_distance = max_distance(&bounds);
        let mut controller = CameraController::trackball(max_distance);
        controller.set_camera(camera.unwrap_or_else(|| Camera::from_bounds(&bounds)));
        let projection = Projection::for_scene(size[0], size[1], max_distance);
        let depth = Texture::create_depth_texture(device, size, "depth texture");

        Ok(Self {
            document,
            scene,
            ibl,
            forward,
            environment_bind_group,
            skybox,
            geometry,
            renderer,
            depth,
            depth_size: size,
            max_distance,
            controller,
            projection,
            settings: ViewerSettings::default(),
        })
    }

    pub fn ibl(&self) -> &IblResources {
        &self.ibl
    }

    pub fn camera(&self) -> Camera {
        self.controller.camera()
    }

    pub fn update_camera(&mut self, input: &InputState, dt: instant::Duration) {
        self.controller.update(input, dt);
    }

    pub fn swap_controller(&mut self) {
        self.controller.swap(self.max_distance);
        log::info!("{} camera", self.controller.name());
    }

    pub fn resize(&mut self, device: &wgpu::Device, size: [u32; 2]) {
        if size[0] == 0 || size[1] == 0 || size == self.depth_size {
            return;
        }
        self.projection.resize(size[0], size[1]);
        self.depth = Texture::create_depth_texture(device, size, "depth texture");
        self.depth_size = size;
    }

    /// Draws the skybox and then the scene into `target`. Returns the
    /// number of scene draw calls.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        size: [u32; 2],
    ) -> usize {
        self.resize(device, size);

        let camera = self.controller.camera();
        let projection = self.projection.calc_matrix();
        let frame = FrameInputs {
            camera,
            projection,
            light_direction: self.settings.light.direction(&camera),
            light_radiance: self.settings.light.radiance,
            features: self.settings.features,
        };
        let plan = plan_frame(
            &self.document,
            &self.scene.vertex_arrays,
            &self.scene.vao_ranges,
            &frame,
        );
        self.renderer
            .prepare(device, queue, &mut self.forward, &mut self.scene, &plan);
        queue.write_buffer(
            &self.skybox.uniform,
            0,
            bytemuck::bytes_of(&SkyboxUniform::new(projection, camera.view_matrix())),
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });
        let issued = {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&self.skybox.pipeline.pipeline);
            pass.set_bind_group(0, &self.skybox.uniform_bind_group, &[]);
            pass.set_bind_group(1, &self.skybox.environment_bind_group, &[]);
            pass.set_vertex_buffer(0, self.geometry.cube.slice(..));
            pass.draw(0..self.geometry.cube_vertex_count, 0..1);

            self.renderer.record(
                &mut pass,
                &plan,
                &self.forward,
                &self.scene,
                &self.environment_bind_group,
            )
        };
        queue.submit(std::iter::once(encoder.finish()));
        issued
    }

    /// Renders one frame offscreen and returns it as 8-bit RGB, rows top to
    /// bottom.
    pub async fn capture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
    ) -> anyhow::Result<image::RgbImage> {
        check_target_size(device, [width, height])?;
        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("capture target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAPTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let draws = self.render(device, queue, &view, [width, height]);
        log::debug!("Captured frame with {} draws", draws);

        let rgba = read_texture(device, queue, &target, 0, 0, [width, height], 4)
            .await
            .context("reading back the captured frame")?;
        // wgpu render targets are read top row first
        let rgba = to_top_down(rgba, 4 * width as usize, RowOrder::TopDown);
        image::RgbImage::from_raw(width, height, rgba_to_rgb(&rgba))
            .context("captured frame has the wrong size")
    }

    /// [`Viewer::capture`] written to `path`; the format follows the extension.
    pub async fn capture_to_file(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        path: &Path,
    ) -> anyhow::Result<()> {
        let frame = self.capture(device, queue, width, height).await?;
        frame
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Wrote {}x{} capture to {}", width, height, path.display());
        Ok(())
    }
}
