use anyhow::{Result, bail};
use half::f16;

use crate::{
    data_structures::texture::{BlockFormat, Texture},
    resources::documents::{TextureDocument, TextureKind},
};

/// Bind group layout shared by every material: diffuse, specular and normal
/// map, each followed by its sampler.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            texture_entry(0),
            sampler_entry(1),
            texture_entry(2),
            sampler_entry(3),
            texture_entry(4),
            sampler_entry(5),
        ],
        label: Some("material_bind_group_layout"),
    })
}

/// Top mip level of a fetched texture, ready for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub pixels: TexturePixels,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TexturePixels {
    Rgba(image::RgbaImage),
    Compressed { format: BlockFormat, blocks: Vec<u8> },
}

impl TextureData {
    /// Decode the `tex_data/` payload described by `document`.
    ///
    /// Uncompressed encodings are expanded to RGBA8 right away; BC1/BC3 data
    /// stays compressed until upload decides whether the device can sample it.
    pub fn decode(path: &str, document: &TextureDocument, data: &[u8]) -> Result<Self> {
        let TextureDocument {
            kind,
            width,
            height,
        } = *document;
        if width == 0 || height == 0 {
            bail!("{path} has an empty {width}x{height} surface");
        }
        let expected = kind.top_level_size(width, height)?;
        if data.len() < expected {
            bail!(
                "{path} is {kind:?} {width}x{height} and needs {expected} bytes, got {}",
                data.len()
            );
        }
        let data = &data[..expected];

        let pixels = match kind {
            TextureKind::Dxt1 => TexturePixels::Compressed {
                format: BlockFormat::Bc1,
                blocks: data.to_vec(),
            },
            TextureKind::Dxt5 => TexturePixels::Compressed {
                format: BlockFormat::Bc3,
                blocks: data.to_vec(),
            },
            TextureKind::Rgb8a8 => rgba_image(
                width,
                height,
                data.chunks_exact(4).flat_map(|p| [p[2], p[1], p[0], p[3]]),
            )?,
            TextureKind::Rgb4a4 => rgba_image(
                width,
                height,
                data.chunks_exact(2).flat_map(|p| {
                    let v = u16::from_le_bytes([p[0], p[1]]);
                    let channel = |shift: u16| ((v >> shift) & 0xF) as u8 * 17;
                    [channel(8), channel(4), channel(0), channel(12)]
                }),
            )?,
            TextureKind::Rgb5a1 => rgba_image(
                width,
                height,
                data.chunks_exact(2).flat_map(|p| {
                    let v = u16::from_le_bytes([p[0], p[1]]);
                    let channel = |shift: u16| {
                        let c = ((v >> shift) & 0x1F) as u8;
                        (c << 3) | (c >> 2)
                    };
                    let alpha = if v & 0x8000 != 0 { 255 } else { 0 };
                    [channel(10), channel(5), channel(0), alpha]
                }),
            )?,
            TextureKind::Rgbaf => rgba_image(
                width,
                height,
                data.chunks_exact(2).map(|p| {
                    let value = f16::from_bits(u16::from_le_bytes([p[0], p[1]])).to_f32();
                    (value.clamp(0.0, 1.0) * 255.0).round() as u8
                }),
            )?,
        };

        Ok(Self {
            path: path.to_string(),
            width,
            height,
            pixels,
        })
    }

    /// Expand to RGBA8 regardless of the stored encoding.
    pub fn to_rgba(&self) -> Result<image::RgbaImage> {
        match &self.pixels {
            TexturePixels::Rgba(image) => Ok(image.clone()),
            TexturePixels::Compressed { format, blocks } => {
                let pixels = decompress(*format, blocks, self.width, self.height);
                image::RgbaImage::from_raw(self.width, self.height, pixels)
                    .ok_or_else(|| anyhow::anyhow!("{} decoded to the wrong size", self.path))
            }
        }
    }

    /// Create the GPU texture, keeping BC data compressed when `supports_bc` allows it.
    pub fn upload(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        supports_bc: bool,
        is_linear: bool,
    ) -> Result<Texture> {
        let max = device.limits().max_texture_dimension_2d;
        if self.width > max || self.height > max {
            bail!(
                "{} is {}x{}, larger than the device limit of {max}",
                self.path,
                self.width,
                self.height
            );
        }
        if let TexturePixels::Compressed { format, blocks } = &self.pixels {
            if supports_bc && self.width % 4 == 0 && self.height % 4 == 0 {
                return Texture::from_compressed(
                    device,
                    queue,
                    blocks,
                    self.width,
                    self.height,
                    *format,
                    Some(&self.path),
                    is_linear,
                );
            }
            log::debug!("decompressing {} on the CPU", self.path);
        }
        let rgba = self.to_rgba()?;
        Ok(Texture::from_rgba(
            device,
            queue,
            &rgba,
            Some(&self.path),
            is_linear,
        ))
    }
}

fn rgba_image(width: u32, height: u32, bytes: impl Iterator<Item = u8>) -> Result<TexturePixels> {
    let buffer: Vec<u8> = bytes.collect();
    match image::RgbaImage::from_raw(width, height, buffer) {
        Some(image) => Ok(TexturePixels::Rgba(image)),
        None => bail!("pixel data does not fill a {width}x{height} image"),
    }
}

fn rgb565(v: u16) -> [u8; 3] {
    let r = ((v >> 11) & 0x1F) as u8;
    let g = ((v >> 5) & 0x3F) as u8;
    let b = (v & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

fn mix(a: [u8; 3], b: [u8; 3], wa: u16, wb: u16) -> [u8; 3] {
    [0, 1, 2].map(|i| ((a[i] as u16 * wa + b[i] as u16 * wb) / (wa + wb)) as u8)
}

/// Colour half of a BC1/BC3 block. BC3 always uses the four-colour palette.
/// Alpha is ignored when drawing, so the BC1 transparent entry is plain black.
fn colour_palette(block: &[u8], force_four: bool) -> [[u8; 4]; 4] {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let (p0, p1) = (rgb565(c0), rgb565(c1));
    let opaque = |c: [u8; 3]| [c[0], c[1], c[2], 255];
    if c0 > c1 || force_four {
        [
            opaque(p0),
            opaque(p1),
            opaque(mix(p0, p1, 2, 1)),
            opaque(mix(p0, p1, 1, 2)),
        ]
    } else {
        [opaque(p0), opaque(p1), opaque(mix(p0, p1, 1, 1)), opaque([0; 3])]
    }
}

fn alpha_palette(block: &[u8]) -> [u8; 8] {
    let (a0, a1) = (block[0] as u16, block[1] as u16);
    let mut palette = [0u8; 8];
    palette[0] = a0 as u8;
    palette[1] = a1 as u8;
    if a0 > a1 {
        for i in 1..7u16 {
            palette[i as usize + 1] = (((7 - i) * a0 + i * a1) / 7) as u8;
        }
    } else {
        for i in 1..5u16 {
            palette[i as usize + 1] = (((5 - i) * a0 + i * a1) / 5) as u8;
        }
        palette[6] = 0;
        palette[7] = 255;
    }
    palette
}

/// Decode BC1 or BC3 blocks into tightly packed RGBA8, clipped to `width` x `height`.
pub fn decompress(format: BlockFormat, blocks: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    let blocks_wide = width.div_ceil(4).max(1);
    let block_bytes = format.block_bytes() as usize;
    let mut out = vec![0u8; width * height * 4];

    for (n, block) in blocks.chunks_exact(block_bytes).enumerate() {
        let (bx, by) = ((n % blocks_wide) * 4, (n / blocks_wide) * 4);
        if by >= height {
            break;
        }
        let (alpha, colour) = match format {
            BlockFormat::Bc1 => (None, block),
            BlockFormat::Bc3 => (Some(&block[..8]), &block[8..]),
        };
        let palette = colour_palette(colour, alpha.is_some());
        let colour_bits = u32::from_le_bytes([colour[4], colour[5], colour[6], colour[7]]);
        let alpha_bits = alpha.map(|a| {
            let mut bits = [0u8; 8];
            bits[..6].copy_from_slice(&a[2..8]);
            (alpha_palette(a), u64::from_le_bytes(bits))
        });

        for texel in 0..16 {
            let (x, y) = (bx + texel % 4, by + texel / 4);
            if x >= width || y >= height {
                continue;
            }
            let mut pixel = palette[((colour_bits >> (2 * texel)) & 0b11) as usize];
            if let Some((alphas, bits)) = alpha_bits {
                pixel[3] = alphas[((bits >> (3 * texel)) & 0b111) as usize];
            }
            let offset = (y * width + x) * 4;
            out[offset..offset + 4].copy_from_slice(&pixel);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(kind: TextureKind, width: u32, height: u32) -> TextureDocument {
        TextureDocument {
            kind,
            width,
            height,
        }
    }

    fn rgba(data: &TextureData) -> &image::RgbaImage {
        match &data.pixels {
            TexturePixels::Rgba(image) => image,
            other => panic!("expected rgba pixels, got {other:?}"),
        }
    }

    #[test]
    fn bgra_is_swizzled() {
        let data = TextureData::decode(
            "t.tex",
            &document(TextureKind::Rgb8a8, 1, 1),
            &[10, 20, 30, 40],
        )
        .unwrap();
        assert_eq!(rgba(&data).get_pixel(0, 0).0, [30, 20, 10, 40]);
    }

    #[test]
    fn sixteen_bit_formats_are_expanded() {
        // a=0xF r=0x8 g=0x0 b=0xF
        let data = TextureData::decode(
            "t.tex",
            &document(TextureKind::Rgb4a4, 1, 1),
            &0xF80Fu16.to_le_bytes(),
        )
        .unwrap();
        assert_eq!(rgba(&data).get_pixel(0, 0).0, [136, 0, 255, 255]);

        // a=1 r=31 g=0 b=1
        let data = TextureData::decode(
            "t.tex",
            &document(TextureKind::Rgb5a1, 1, 1),
            &0xFC01u16.to_le_bytes(),
        )
        .unwrap();
        assert_eq!(rgba(&data).get_pixel(0, 0).0, [255, 0, 8, 255]);
    }

    #[test]
    fn half_floats_are_clamped() {
        let halves: Vec<u8> = [1.0f32, 0.5, -2.0, 4.0]
            .into_iter()
            .flat_map(|v| f16::from_f32(v).to_bits().to_le_bytes())
            .collect();
        let data =
            TextureData::decode("t.tex", &document(TextureKind::Rgbaf, 1, 1), &halves).unwrap();
        assert_eq!(rgba(&data).get_pixel(0, 0).0, [255, 128, 0, 255]);
    }

    #[test]
    fn short_payloads_are_rejected_and_lower_mips_ignored() {
        assert!(TextureData::decode("t.tex", &document(TextureKind::Rgb8a8, 2, 2), &[0; 15]).is_err());
        assert!(TextureData::decode("t.tex", &document(TextureKind::Dxt1, 4, 4), &[0; 7]).is_err());
        assert!(TextureData::decode("t.tex", &document(TextureKind::Dxt1, 0, 4), &[0; 8]).is_err());

        let data =
            TextureData::decode("t.tex", &document(TextureKind::Dxt1, 4, 4), &[0; 24]).unwrap();
        match data.pixels {
            TexturePixels::Compressed { format, blocks } => {
                assert_eq!(format, BlockFormat::Bc1);
                assert_eq!(blocks.len(), 8);
            }
            other => panic!("expected compressed pixels, got {other:?}"),
        }
    }

    #[test]
    fn bc1_blocks_decode_to_their_endpoints() {
        // c0 = pure red, c1 = pure blue, texel 0 -> c0, texel 1 -> c1, rest -> c0
        let mut block = Vec::new();
        block.extend_from_slice(&0xF800u16.to_le_bytes());
        block.extend_from_slice(&0x001Fu16.to_le_bytes());
        block.extend_from_slice(&0b0100u32.to_le_bytes());
        let pixels = decompress(BlockFormat::Bc1, &block, 4, 4);
        assert_eq!(&pixels[0..4], &[255, 0, 0, 255]);
        assert_eq!(&pixels[4..8], &[0, 0, 255, 255]);
        assert_eq!(pixels.len(), 64);
    }

    #[test]
    fn bc1_three_colour_mode_has_opaque_black() {
        let mut block = Vec::new();
        block.extend_from_slice(&0x001Fu16.to_le_bytes());
        block.extend_from_slice(&0xF800u16.to_le_bytes());
        block.extend_from_slice(&0b11u32.to_le_bytes());
        let pixels = decompress(BlockFormat::Bc1, &block, 4, 4);
        assert_eq!(&pixels[0..4], &[0, 0, 0, 255]);
    }

    #[test]
    fn bc3_blocks_carry_interpolated_alpha() {
        let mut block = vec![255, 0];
        // texel 0 -> index 1 (alpha 0), texel 1 -> index 0 (alpha 255)
        block.extend_from_slice(&[0b0000_0001, 0, 0, 0, 0, 0]);
        block.extend_from_slice(&0xFFFFu16.to_le_bytes());
        block.extend_from_slice(&0x0000u16.to_le_bytes());
        block.extend_from_slice(&0u32.to_le_bytes());
        let pixels = decompress(BlockFormat::Bc3, &block, 4, 4);
        assert_eq!(&pixels[0..4], &[255, 255, 255, 0]);
        assert_eq!(&pixels[4..8], &[255, 255, 255, 255]);
    }

    #[test]
    fn small_textures_clip_their_blocks() {
        let mut block = Vec::new();
        block.extend_from_slice(&0x07E0u16.to_le_bytes());
        block.extend_from_slice(&0x0000u16.to_le_bytes());
        block.extend_from_slice(&0u32.to_le_bytes());
        let data = TextureData::decode("t.tex", &document(TextureKind::Dxt1, 2, 2), &block).unwrap();
        let image = data.to_rgba().unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(1, 1).0, [0, 255, 0, 255]);
    }
}
