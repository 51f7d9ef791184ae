//! Application event loop.
//!
//! The viewer is a single winit application. Loads run off the event loop
//! (on the tokio runtime natively, on the browser's microtask queue in wasm)
//! and hand their result back as a [`ViewerEvent`]; GPU uploads then happen
//! on the event loop thread.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window and the GPU [`Context`]
//! 2. the configured model is requested
//! 3. every frame applies camera input, draws the scene and requests the next frame
//! 4. `display` (wasm export) or `R` (reload) requests another model; only
//!    the most recent request may replace what is on screen

use std::{fmt::Debug, iter, sync::Arc};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::Context,
    data_structures::scene::{RequestId, Scene},
    resources::{ModelData, fetch_model, paths::ModelSelection},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// GPU context plus what is being shown.
#[derive(Debug)]
pub struct AppState {
    pub(crate) ctx: Context,
    scene: Scene,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>, config: &ViewerConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, config).await?;
        Ok(Self {
            ctx,
            scene: Scene::default(),
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.ctx.resize(width, height) {
            self.is_surface_configured = true;
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // keep the loop running
        self.ctx.window.request_redraw();

        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.ctx.pipeline);
            self.scene
                .draw(&mut render_pass, &self.ctx.camera.bind_group);
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Upload a finished load and make it the scene, unless a newer request superseded it.
    fn show(&mut self, request: RequestId, selection: ModelSelection, data: ModelData) {
        if !self.scene.is_current(request) {
            log::debug!("ignoring {selection}, a newer model was requested");
            return;
        }
        let model = data.upload(
            &self.ctx.device,
            &self.ctx.queue,
            &self.ctx.material_layout,
            self.ctx.supports_bc,
        );
        log::info!(
            "showing {selection}: {} meshes, {} materials",
            model.meshes.len(),
            model.materials.len()
        );
        if let Some(bounds) = &model.bounds {
            self.ctx
                .camera
                .camera
                .focus(bounds, self.ctx.projection.fovy);
        }
        self.scene.replace(request, selection, model);
    }
}

pub enum ViewerEvent {
    Initialized(anyhow::Result<AppState>),
    Display(ModelSelection),
    Loaded {
        request: RequestId,
        selection: ModelSelection,
        result: anyhow::Result<ModelData>,
    },
}

impl Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(state) => f
                .debug_tuple("Initialized")
                .field(&state.is_ok())
                .finish(),
            Self::Display(selection) => f.debug_tuple("Display").field(selection).finish(),
            Self::Loaded {
                request,
                selection,
                result,
            } => f
                .debug_struct("Loaded")
                .field("request", request)
                .field("selection", selection)
                .field("ok", &result.is_ok())
                .finish(),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    state: Option<AppState>,
    config: ViewerConfig,
    /// The model most recently asked for, shown or not.
    requested: ModelSelection,
    last_time: Instant,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(target_arch = "wasm32")]
        PROXY.with(|p| *p.borrow_mut() = Some(proxy.clone()));
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy,
            state: None,
            requested: config.selection,
            config,
            last_time: Instant::now(),
        })
    }

    /// Start loading `selection`; the scene changes once it has arrived.
    fn display(&mut self, selection: ModelSelection) {
        self.requested = selection;
        let Some(state) = &mut self.state else {
            // picked up once the context exists
            return;
        };
        let request = state.scene.request();
        let source = self.config.source.clone();
        let proxy = self.proxy.clone();
        let load = async move {
            let result = fetch_model(&source, selection).await;
            if proxy
                .send_event(ViewerEvent::Loaded {
                    request,
                    selection,
                    result,
                })
                .is_err()
            {
                log::warn!("event loop closed before {selection} finished loading");
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        self.async_runtime.spawn(load);

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(load);
    }

    fn initialized(&mut self, event_loop: &ActiveEventLoop, state: anyhow::Result<AppState>) {
        let mut state = match state {
            Ok(state) => state,
            Err(e) => {
                log::error!("App initialization failed: {e:#}");
                event_loop.exit();
                return;
            }
        };
        let size = state.ctx.window.inner_size();
        state.resize(size.width, size.height);
        state.ctx.window.request_redraw();
        self.state = Some(state);
        self.display(self.requested);
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("mdl viewer");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        let config = self.config.clone();
        let init_future = async move { AppState::new(window, &config).await };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let state = self.async_runtime.block_on(init_future);
            self.initialized(event_loop, state);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let state = init_future.await;
                if proxy.send_event(ViewerEvent::Initialized(state)).is_err() {
                    log::error!("event loop closed during initialization");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            // only sent by the wasm `spawn_local` above
            ViewerEvent::Initialized(state) => self.initialized(event_loop, state),
            ViewerEvent::Display(selection) => self.display(selection),
            ViewerEvent::Loaded {
                request,
                selection,
                result,
            } => {
                let Some(state) = &mut self.state else {
                    return;
                };
                match result {
                    Ok(data) => state.show(request, selection, data),
                    Err(e) => log::error!("could not load {selection}: {e:#}"),
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        state.ctx.camera.controller.handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::KeyR),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                log::info!("reloading {}", self.requested);
                self.display(self.requested);
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                state
                    .ctx
                    .camera
                    .update(&state.ctx.queue, &state.ctx.projection, dt);

                match state.render() {
                    Ok(_) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static PROXY: std::cell::RefCell<Option<EventLoopProxy<ViewerEvent>>> =
        const { std::cell::RefCell::new(None) };
}

/// Show another model. The ids are the raw text of the page's input fields.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn display(monster: &str, body: &str, variant: &str) -> Result<(), JsValue> {
    let selection = ModelSelection::parse(monster, body, variant)
        .map_err(|e| JsValue::from_str(&format!("{e:#}")))?;
    PROXY.with(|proxy| match proxy.borrow().as_ref() {
        Some(proxy) => proxy
            .send_event(ViewerEvent::Display(selection))
            .map_err(|_| JsValue::from_str("the viewer has stopped")),
        None => Err(JsValue::from_str("the viewer has not been started")),
    })
}

/// Browser entry point: render into `#canvas`, configured from the page URL.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start() -> Result<(), JsValue> {
    let config = ViewerConfig::from_location().map_err(|e| JsValue::from_str(&format!("{e:#}")))?;
    run(config).map_err(|e| JsValue::from_str(&format!("{e:#}")))
}

pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    log::info!("starting with {:?}", config.source);
    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
