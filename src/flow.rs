//! Frame driver and application event loop.
//!
//! The viewer runs in one of two modes, chosen once from the configuration:
//!
//! - interactive: a winit window; every redraw updates the camera controller
//!   by the elapsed time (only while the window has focus), draws the skybox
//!   and the scene, presents and requests the next redraw
//! - single-shot: no window; one frame is drawn offscreen, read back and
//!   written to the output image, then the process exits
//!
//! Both modes draw through [`Viewer::render`].

use std::sync::Arc;

use anyhow::Context as _;
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    window::Window,
};

use crate::{
    camera::InputState,
    config::ViewerConfig,
    context::Context,
    data_structures::document::Document,
    resources::{load_document, texture::EnvironmentImage},
    settings::KeyAction,
    viewer::Viewer,
};

/// Everything that exists once the window is open.
struct AppState {
    ctx: Context,
    viewer: Viewer,
    input: InputState,
    focused: bool,
}

impl AppState {
    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        self.viewer.resize(&self.ctx.device, [width, height]);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let Some(target) = self.ctx.surface.as_ref() else {
            return Ok(());
        };
        let output = target.surface.get_current_texture()?;
        let size = [target.config.width, target.config.height];
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.viewer
            .render(&self.ctx.device, &self.ctx.queue, &view, size);
        target.window.pre_present_notify();
        output.present();
        Ok(())
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        match self.viewer.settings.handle_key(code) {
            Some(KeyAction::SwapController) => self.viewer.swap_controller(),
            Some(KeyAction::PrintCamera) => {
                log::info!("{}", self.viewer.camera().lookat_args())
            }
            Some(KeyAction::Exit) => event_loop.exit(),
            Some(KeyAction::Updated) | None => (),
        }
    }
}

pub struct App {
    config: ViewerConfig,
    /// Taken when the window opens.
    startup: Option<(Document, EnvironmentImage)>,
    async_runtime: tokio::runtime::Runtime,
    state: Option<AppState>,
    last_time: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(
        config: ViewerConfig,
        document: Document,
        environment: EnvironmentImage,
        async_runtime: tokio::runtime::Runtime,
    ) -> Self {
        Self {
            config,
            startup: Some((document, environment)),
            async_runtime,
            state: None,
            last_time: Instant::now(),
            error: None,
        }
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let (document, environment) = self
            .startup
            .take()
            .context("the viewer was already started")?;
        let window_attributes = Window::default_attributes()
            .with_title(format!("flow-viewer - {}", self.config.scene.display()))
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.width,
                self.config.height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("creating the window")?,
        );

        let ctx = self.async_runtime.block_on(Context::new(window.clone()))?;
        let size = window.inner_size();
        let viewer = Viewer::new(
            &ctx.device,
            &ctx.queue,
            ctx.color_format,
            document,
            &environment,
            &self.config.shaders,
            self.config.camera,
            [size.width.max(1), size.height.max(1)],
        )?;
        window.request_redraw();
        Ok(AppState {
            ctx,
            viewer,
            input: InputState::default(),
            focused: true,
        })
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.open(event_loop) {
            Ok(state) => {
                self.last_time = Instant::now();
                self.state = Some(state);
            }
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if state.focused {
                state.input.handle_mouse_motion(dx, dy);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.input.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::Focused(focused) => state.focused = focused,
            WindowEvent::KeyboardInput { event, .. } => state.handle_key(event_loop, &event),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                // the viewer does not own input while unfocused
                if state.focused {
                    state.viewer.update_camera(&state.input, dt);
                }
                state.input.end_frame();

                match state.render() {
                    Ok(()) => (),
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        state.ctx.reconfigure();
                    }
                    Err(e) => log::error!("Unable to render {}", e),
                }
                if let Some(target) = state.ctx.surface.as_ref() {
                    target.window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Draws one frame offscreen and writes it to `output`.
async fn capture(
    config: &ViewerConfig,
    document: Document,
    environment: &EnvironmentImage,
    output: &std::path::Path,
) -> anyhow::Result<()> {
    let ctx = Context::headless().await?;
    let size = [config.width, config.height];
    let mut viewer = Viewer::new(
        &ctx.device,
        &ctx.queue,
        ctx.color_format,
        document,
        environment,
        &config.shaders,
        config.camera,
        size,
    )?;
    viewer
        .capture_to_file(&ctx.device, &ctx.queue, size[0], size[1], output)
        .await
}

/// Loads the scene and the environment, then runs the interactive viewer
/// or the single-shot capture.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let document = load_document(&config.scene)?;
    let environment = EnvironmentImage::load_or_black(config.environment.as_deref());
    let async_runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;

    if let Some(output) = config.output.clone() {
        return async_runtime.block_on(capture(&config, document, &environment, &output));
    }

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, document, environment, async_runtime);
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
