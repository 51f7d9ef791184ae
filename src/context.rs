use std::sync::Arc;

use anyhow::{Context as _, Result};
use winit::window::Window;

use crate::{
    camera::{self, CameraResources, Projection},
    config::ViewerConfig,
    data_structures::texture,
    pipelines::basic::mk_basic_pipeline,
    resources::texture::material_layout,
};

/// Everything the renderer owns: device, surface, camera and the one pipeline.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub pipeline: wgpu::RenderPipeline,
    pub material_layout: wgpu::BindGroupLayout,
    pub clear_colour: wgpu::Color,
    /// Whether BC1/BC3 textures can be uploaded without decoding them first.
    pub supports_bc: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("could not create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;

        let supports_bc = adapter
            .features()
            .contains(wgpu::Features::TEXTURE_COMPRESSION_BC);
        log::info!("device and queue (BC textures: {supports_bc})");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: if supports_bc {
                    wgpu::Features::TEXTURE_COMPRESSION_BC
                } else {
                    wgpu::Features::empty()
                },
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    adapter.limits()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("could not open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes sRGB-decoded colours, so prefer an sRGB surface.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera = camera::Camera::new(
            (0.0, 0.0, 0.0),
            viewer.distance,
            cgmath::Deg(0.0),
            cgmath::Deg(0.0),
        );
        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(viewer.fov),
            viewer.near,
            viewer.far,
        );
        let controller = camera::CameraController::new(0.4, 4.0);
        let camera = CameraResources::new(&device, camera, controller, &projection);

        let material_layout = material_layout(&device);
        let pipeline = mk_basic_pipeline(
            &device,
            &config,
            &material_layout,
            &camera.bind_group_layout,
        );

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        let [r, g, b, a] = viewer.clear_colour;
        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            pipeline,
            material_layout,
            clear_colour: wgpu::Color { r, g, b, a },
            supports_bc,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.projection.resize(width, height);
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            texture::Texture::create_depth_texture(&self.device, [width, height], "depth_texture");
        true
    }
}
