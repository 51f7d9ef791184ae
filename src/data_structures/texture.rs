//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around WGPU GPU texture resources,
//! and helpers for depth buffers, placeholder maps, decoded RGBA images and
//! block-compressed (BC1/BC3) data.

use anyhow::*;

/// A GPU texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

/// Block-compressed encodings the viewer can upload without decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockFormat {
    Bc1,
    Bc3,
}

impl BlockFormat {
    pub fn block_bytes(&self) -> u32 {
        match self {
            BlockFormat::Bc1 => 8,
            BlockFormat::Bc3 => 16,
        }
    }

    fn texture_format(&self, is_linear: bool) -> wgpu::TextureFormat {
        match (self, is_linear) {
            (BlockFormat::Bc1, false) => wgpu::TextureFormat::Bc1RgbaUnormSrgb,
            (BlockFormat::Bc1, true) => wgpu::TextureFormat::Bc1RgbaUnorm,
            (BlockFormat::Bc3, false) => wgpu::TextureFormat::Bc3RgbaUnormSrgb,
            (BlockFormat::Bc3, true) => wgpu::TextureFormat::Bc3RgbaUnorm,
        }
    }
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// A 1x1 texture of a single colour, used for material slots without a map.
    pub fn create_solid_colour(
        colour: [u8; 4],
        label: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Texture {
        let image = image::RgbaImage::from_pixel(1, 1, image::Rgba(colour));
        Self::from_rgba(device, queue, &image, Some(label), true)
    }

    /// Create a default normal map (neutral blue, representing no deformation).
    pub fn create_default_normal_map(device: &wgpu::Device, queue: &wgpu::Queue) -> Texture {
        // The blue/purple-ish colour that represents the default for normal maps
        Self::create_solid_colour([127, 127, 255, 255], "default normal map", device, queue)
    }

    /// Upload a decoded RGBA8 image.
    ///
    /// * `is_linear` toggles between sRGB (false, colour maps) and linear (true,
    ///   normal/specular maps) sampling
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &image::RgbaImage,
        label: Option<&str>,
        is_linear: bool,
    ) -> Self {
        let dimensions = rgba.dimensions();

        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let format = if is_linear {
            wgpu::TextureFormat::Rgba8Unorm
        } else {
            wgpu::TextureFormat::Rgba8UnormSrgb
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Upload the top mip level of a block-compressed texture as-is.
    ///
    /// The device must have been created with `TEXTURE_COMPRESSION_BC` and both
    /// dimensions must be multiples of the 4x4 block size.
    pub fn from_compressed(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        blocks: &[u8],
        width: u32,
        height: u32,
        format: BlockFormat,
        label: Option<&str>,
        is_linear: bool,
    ) -> Result<Self> {
        if width % 4 != 0 || height % 4 != 0 {
            bail!("{width}x{height} is not a whole number of 4x4 blocks");
        }
        let blocks_wide = width / 4;
        let blocks_high = height / 4;
        let expected = (blocks_wide * blocks_high * format.block_bytes()) as usize;
        if blocks.len() < expected {
            bail!(
                "compressed texture needs {expected} bytes but only {} were given",
                blocks.len()
            );
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.texture_format(is_linear),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &blocks[..expected],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(blocks_wide * format.block_bytes()),
                rows_per_image: Some(blocks_high),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));

        Ok(Self {
            texture,
            view,
            sampler,
        })
    }
}

/// Linear filtering without mipmaps; only the top level is ever uploaded.
pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}
