use std::{borrow::Cow, path::Path};

use half::f16;
use image::imageops::FilterType;

use crate::{
    data_structures::{
        document::{Image, MagFilter, MinFilter, PixelFormat, Sampler, WrapMode},
        texture::Texture,
    },
    error::ViewerError,
};

/// Expands any glTF pixel format to tightly packed RGBA8.
///
/// Single channel images are replicated to grey, 16-bit channels keep their
/// high byte and float channels are clamped to [0, 1].
pub fn to_rgba8(image: &Image) -> Vec<u8> {
    let (channels, bytes_per_channel) = match image.format {
        PixelFormat::R8 => (1, 1),
        PixelFormat::R8G8 => (2, 1),
        PixelFormat::R8G8B8 => (3, 1),
        PixelFormat::R8G8B8A8 => (4, 1),
        PixelFormat::R16 => (1, 2),
        PixelFormat::R16G16 => (2, 2),
        PixelFormat::R16G16B16 => (3, 2),
        PixelFormat::R16G16B16A16 => (4, 2),
        PixelFormat::R32G32B32Float => (3, 4),
        PixelFormat::R32G32B32A32Float => (4, 4),
    };
    let channel = |bytes: &[u8]| -> u8 {
        match bytes_per_channel {
            1 => bytes[0],
            // little endian, keep the most significant byte
            2 => bytes[1],
            _ => {
                let value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                (value.clamp(0.0, 1.0) * 255.0).round() as u8
            }
        }
    };

    let pixel_size = channels * bytes_per_channel;
    let pixel_count = (image.width * image.height) as usize;
    let mut rgba = Vec::with_capacity(pixel_count * 4);
    for pixel in image.pixels.chunks_exact(pixel_size).take(pixel_count) {
        let c = |i: usize| channel(&pixel[i * bytes_per_channel..]);
        let texel = match channels {
            1 => [c(0), c(0), c(0), 255],
            2 => [c(0), c(1), 0, 255],
            3 => [c(0), c(1), c(2), 255],
            _ => [c(0), c(1), c(2), c(3)],
        };
        rgba.extend_from_slice(&texel);
    }
    // Truncated pixel data is padded with opaque black rather than rejected.
    while rgba.len() < pixel_count * 4 {
        rgba.extend_from_slice(&[0, 0, 0, 255]);
    }
    rgba
}

/// Largest size with the same aspect ratio that fits `max` on both axes,
/// or `None` when `width` x `height` already fits.
pub fn fit_within(width: u32, height: u32, max: u32) -> Option<[u32; 2]> {
    if width <= max && height <= max {
        return None;
    }
    let scale = max as f64 / width.max(height) as f64;
    let fit = |v: u32| ((v as f64 * scale).floor() as u32).clamp(1, max);
    Some([fit(width), fit(height)])
}

/// Downscales tightly packed RGBA8 pixels until they fit `max` on both
/// axes. `None` when the pixel data does not match `size`.
pub fn fit_rgba8(rgba: Vec<u8>, size: [u32; 2], max: u32) -> Option<(Vec<u8>, [u32; 2])> {
    let Some([width, height]) = fit_within(size[0], size[1], max) else {
        return Some((rgba, size));
    };
    let source = image::RgbaImage::from_raw(size[0], size[1], rgba)?;
    let resized = image::imageops::resize(&source, width, height, FilterType::Triangle);
    Some((resized.into_raw(), [width, height]))
}

/// Number of levels of a full mip chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Whether a texture sampled through `sampler` needs a mip chain. Textures
/// without a sampler use linear filtering without mipmaps.
pub fn wants_mipmaps(sampler: Option<&Sampler>) -> bool {
    sampler
        .and_then(|s| s.min_filter)
        .is_some_and(MinFilter::uses_mipmaps)
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

/// Sampler state for a glTF sampler; unspecified filters are linear.
pub fn sampler_descriptor(sampler: &Sampler) -> wgpu::SamplerDescriptor<'static> {
    let mag_filter = match sampler.mag_filter {
        Some(MagFilter::Nearest) => wgpu::FilterMode::Nearest,
        Some(MagFilter::Linear) | None => wgpu::FilterMode::Linear,
    };
    let (min_filter, mipmap_filter) = match sampler.min_filter {
        Some(MinFilter::Nearest) => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest),
        Some(MinFilter::Linear) | None => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest),
        Some(MinFilter::NearestMipmapNearest) => {
            (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest)
        }
        Some(MinFilter::LinearMipmapNearest) => {
            (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest)
        }
        Some(MinFilter::NearestMipmapLinear) => {
            (wgpu::FilterMode::Nearest, wgpu::FilterMode::Linear)
        }
        Some(MinFilter::LinearMipmapLinear) => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear),
    };
    wgpu::SamplerDescriptor {
        label: Some("scene sampler"),
        address_mode_u: address_mode(sampler.wrap_s),
        address_mode_v: address_mode(sampler.wrap_t),
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter,
        min_filter,
        mipmap_filter,
        ..Default::default()
    }
}

/// Equirectangular radiance image as half float RGBA, rows top to bottom.
#[derive(Debug, Clone)]
pub struct EnvironmentImage {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<f16>,
}

impl EnvironmentImage {
    /// Format the environment is uploaded in.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// 1x1 black environment used when no image is given.
    pub fn black() -> Self {
        Self {
            width: 1,
            height: 1,
            texels: vec![f16::ZERO, f16::ZERO, f16::ZERO, f16::ONE],
        }
    }

    /// Reads an HDR (or any format `image` decodes) equirectangular image.
    pub fn load(path: &Path) -> Result<Self, ViewerError> {
        let image = image::open(path)
            .map_err(|source| ViewerError::EnvironmentLoad {
                path: path.to_path_buf(),
                source,
            })?
            .into_rgb32f();
        let (width, height) = image.dimensions();
        let texels = image
            .pixels()
            .flat_map(|p| [p.0[0], p.0[1], p.0[2], 1.0])
            .map(f16::from_f32)
            .collect();
        log::info!("Loaded environment {} ({}x{})", path.display(), width, height);
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// Loads `path` when given, else a black environment. An unreadable
    /// image degrades to black with a warning.
    pub fn load_or_black(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load(path).unwrap_or_else(|e| {
                log::warn!("{:#}, using a black environment", anyhow::Error::new(e));
                Self::black()
            }),
            None => {
                log::info!("No environment image given, using a black environment");
                Self::black()
            }
        }
    }

    /// This image, downscaled when either side exceeds `max_dimension`.
    pub fn fit_to(&self, max_dimension: u32) -> Cow<'_, Self> {
        let Some([width, height]) = fit_within(self.width, self.height, max_dimension) else {
            return Cow::Borrowed(self);
        };
        let texels = self.texels.iter().map(|t| t.to_f32()).collect();
        let Some(source) = image::Rgba32FImage::from_raw(self.width, self.height, texels) else {
            log::warn!("Environment texels do not match its size, using a black environment");
            return Cow::Owned(Self::black());
        };
        log::warn!(
            "Environment {}x{} exceeds the device limit of {}, downscaled to {}x{}",
            self.width,
            self.height,
            max_dimension,
            width,
            height
        );
        let resized = image::imageops::resize(&source, width, height, FilterType::Triangle);
        Cow::Owned(Self {
            width,
            height,
            texels: resized.into_raw().into_iter().map(f16::from_f32).collect(),
        })
    }

    /// Uploads the image, downscaled to the device's 2D texture limit.
    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Texture {
        let source = self.fit_to(device.limits().max_texture_dimension_2d);
        source.upload_unchecked(device, queue)
    }

    fn upload_unchecked(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Texture {
        let size = wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("equirectangular environment"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
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
            bytemuck::cast_slice(&self.texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(8 * self.width),
                rows_per_image: Some(self.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Texture {
            texture,
            view,
            sampler: None,
        }
    }
}
