//! GPU side of a loaded [`Document`].
//!
//! [`GpuScene`] owns one vertex/index buffer per glTF buffer, one texture per
//! glTF texture, the neutral fallback textures and the material bind groups
//! built from them. Nothing in here is resized or rebuilt after creation
//! except the material bind group cache, which grows as feature toggles
//! change.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        document::{ComponentType, Document},
        material::{Fallback, MaterialKey, ResolvedMaterial, TextureSource},
        texture::{Texture, create_default_sampler},
        vertex_array::{
            DrawCall, IndexBinding, VERTEX_SLOTS, VaoRange, VertexArray, VertexLayoutKey,
            build_vertex_arrays,
        },
    },
    error::ViewerError,
    resources::{
        mipmap::MipmapGenerator,
        shader::ShaderLibrary,
        texture::{fit_rgba8, mip_level_count, sampler_descriptor, to_rgba8, wants_mipmaps},
    },
};

/// Bytes bound to a disabled attribute slot; large enough for any fallback format.
const ZERO_BUFFER_SIZE: usize = 16;

/// Converts 8-bit indices, which have no GPU index format, to 16-bit ones.
pub fn widen_u8_indices(bytes: &[u8]) -> Vec<u16> {
    bytes.iter().map(|&i| i as u16).collect()
}

/// Draw parameters after the vertex array is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundDraw {
    Indexed { count: u32 },
    NonIndexed { vertex_count: u32 },
}

pub struct GpuScene {
    buffers: Vec<wgpu::Buffer>,
    /// 16-bit copies of `u8` index data, keyed by vertex array.
    widened_indices: HashMap<usize, wgpu::Buffer>,
    zero_buffer: wgpu::Buffer,
    textures: Vec<Texture>,
    fallbacks: HashMap<Fallback, Texture>,
    default_sampler: wgpu::Sampler,
    pub vertex_arrays: Vec<VertexArray>,
    pub vao_ranges: Vec<VaoRange>,
    materials: HashMap<MaterialKey, wgpu::BindGroup>,
}

impl GpuScene {
    /// Uploads every buffer and texture of `doc` and wires its primitives.
    ///
    /// Fails when a buffer is larger than the device allows or the mipmap
    /// program does not compile; everything else that is missing or
    /// malformed degrades to a fallback.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        shaders: &ShaderLibrary,
        doc: &Document,
    ) -> Result<Self, ViewerError> {
        let max_buffer_size = device.limits().max_buffer_size;
        let buffers = doc
            .buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| {
                if buffer.data.len() as u64 > max_buffer_size {
                    return Err(ViewerError::Resource(format!(
                        "buffer {} is {} bytes, the device allows at most {}",
                        i,
                        buffer.data.len(),
                        max_buffer_size
                    )));
                }
                Ok(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("scene buffer {i}")),
                    contents: &buffer.data,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX,
                }))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (vertex_arrays, vao_ranges) = build_vertex_arrays(doc);
        let widened_indices = vertex_arrays
            .iter()
            .enumerate()
            .filter_map(|(i, vertex_array)| {
                let index = vertex_array.index?;
                if index.component_type != ComponentType::U8 {
                    return None;
                }
                let data = &doc.buffers.get(index.buffer)?.data;
                let start = index.byte_offset as usize;
                let bytes = data.get(start..start + index.count as usize)?;
                if bytes.is_empty() {
                    return None;
                }
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("widened index buffer"),
                    contents: bytemuck::cast_slice(&widen_u8_indices(bytes)),
                    usage: wgpu::BufferUsages::INDEX,
                });
                Some((i, buffer))
            })
            .collect();

        let zero_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("zero vertex buffer"),
            contents: &[0u8; ZERO_BUFFER_SIZE],
            usage: wgpu::BufferUsages::VERTEX,
        });

        let default_sampler = create_default_sampler(device);
        let fallbacks = [Fallback::White, Fallback::Black, Fallback::FlatNormal]
            .into_iter()
            .map(|fallback| (fallback, Texture::create_fallback(fallback, device, queue)))
            .collect();
        let textures = upload_textures(device, queue, shaders, doc)?;

        log::info!(
            "Uploaded {} buffers, {} textures, {} primitives",
            buffers.len(),
            textures.len(),
            vertex_arrays.len()
        );

        Ok(Self {
            buffers,
            widened_indices,
            zero_buffer,
            textures,
            fallbacks,
            default_sampler,
            vertex_arrays,
            vao_ranges,
            materials: HashMap::new(),
        })
    }

    /// Pipeline keys of every drawable primitive.
    pub fn layout_keys(&self) -> impl Iterator<Item = VertexLayoutKey> + '_ {
        self.vertex_arrays
            .iter()
            .filter(|v| v.drawable)
            .map(VertexArray::layout_key)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// The uploaded texture for glTF texture `index`.
    pub fn texture(&self, index: usize) -> Option<&Texture> {
        self.textures.get(index)
    }

    fn fallback(&self, fallback: Fallback) -> (&wgpu::TextureView, &wgpu::Sampler) {
        (&self.fallbacks[&fallback].view, &self.default_sampler)
    }

    fn source(&self, source: TextureSource) -> (&wgpu::TextureView, &wgpu::Sampler) {
        match source {
            TextureSource::Scene(i) => match self.textures.get(i) {
                Some(texture) => (
                    &texture.view,
                    texture.sampler.as_ref().unwrap_or(&self.default_sampler),
                ),
                None => self.fallback(Fallback::White),
            },
            TextureSource::Fallback(f) => self.fallback(f),
        }
    }

    /// Builds the bind group of `material` unless it is cached already.
    pub fn prepare_material(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        material: &ResolvedMaterial,
    ) {
        if self.materials.contains_key(&material.key) {
            return;
        }
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("material uniform buffer"),
            contents: bytemuck::bytes_of(&material.uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let channels = material.sources().map(|source| self.source(source));
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        }];
        for (channel, (view, sampler)) in channels.iter().enumerate() {
            let binding = 1 + 2 * channel as u32;
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: binding + 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material bind group"),
            layout,
            entries: &entries,
        });
        log::debug!("Created material bind group for {:?}", material.key);
        self.materials.insert(material.key, bind_group);
    }

    pub fn material(&self, key: &MaterialKey) -> Option<&wgpu::BindGroup> {
        self.materials.get(key)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Sets vertex and index buffers of vertex array `index` on `pass`.
    ///
    /// Returns `None` for primitives that cannot be drawn.
    pub fn bind_vertex_array(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        index: usize,
    ) -> Option<BoundDraw> {
        let vertex_array = self.vertex_arrays.get(index)?;
        if !vertex_array.drawable {
            return None;
        }
        for slot in 0..VERTEX_SLOTS {
            match vertex_array.slots[slot] {
                Some(binding) => {
                    let buffer = &self.buffers[binding.buffer];
                    if binding.byte_offset >= buffer.size() {
                        return None;
                    }
                    pass.set_vertex_buffer(slot as u32, buffer.slice(binding.byte_offset..));
                }
                None => pass.set_vertex_buffer(slot as u32, self.zero_buffer.slice(..)),
            }
        }
        match vertex_array.draw_call() {
            DrawCall::Indexed { count, .. } => {
                let index_binding = vertex_array.index?;
                self.bind_indices(pass, index, &index_binding)?;
                Some(BoundDraw::Indexed { count })
            }
            DrawCall::NonIndexed { vertex_count } => Some(BoundDraw::NonIndexed { vertex_count }),
        }
    }

    fn bind_indices(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        vertex_array: usize,
        binding: &IndexBinding,
    ) -> Option<()> {
        match binding.component_type {
            ComponentType::U8 => {
                let widened = self.widened_indices.get(&vertex_array)?;
                pass.set_index_buffer(widened.slice(..), wgpu::IndexFormat::Uint16);
            }
            ComponentType::U16 | ComponentType::U32 => {
                let buffer = &self.buffers[binding.buffer];
                if binding.byte_offset >= buffer.size() {
                    return None;
                }
                let format = if binding.component_type == ComponentType::U16 {
                    wgpu::IndexFormat::Uint16
                } else {
                    wgpu::IndexFormat::Uint32
                };
                pass.set_index_buffer(buffer.slice(binding.byte_offset..), format);
            }
            _ => return None,
        }
        Some(())
    }
}

/// One texture per glTF texture. A texture whose image is missing becomes a
/// white 1x1 so texture indices stay valid; an image larger than the device
/// allows is downscaled.
fn upload_textures(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    shaders: &ShaderLibrary,
    doc: &Document,
) -> Result<Vec<Texture>, ViewerError> {
    if doc.textures.is_empty() {
        return Ok(Vec::new());
    }
    let mipmaps = MipmapGenerator::new(device, shaders, Texture::COLOR_FORMAT)?;
    let max_dimension = device.limits().max_texture_dimension_2d;
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("mipmap encoder"),
    });

    let textures = doc
        .textures
        .iter()
        .enumerate()
        .map(|(i, texture)| {
            let sampler = texture.sampler.and_then(|s| doc.samplers.get(s));
            let label = format!("scene texture {i}");
            let pixels = doc
                .images
                .get(texture.source)
                .filter(|image| image.width > 0 && image.height > 0)
                .and_then(|image| {
                    fit_rgba8(to_rgba8(image), [image.width, image.height], max_dimension)
                        .inspect(|(_, size)| {
                            if *size != [image.width, image.height] {
                                log::warn!(
                                    "Image {} is {}x{}, downscaled to {}x{} for the device",
                                    texture.source,
                                    image.width,
                                    image.height,
                                    size[0],
                                    size[1]
                                );
                            }
                        })
                });
            let mut gpu_texture = match pixels {
                Some((rgba, size)) => {
                    let mips = if wants_mipmaps(sampler) {
                        mip_level_count(size[0], size[1])
                    } else {
                        1
                    };
                    let uploaded =
                        Texture::from_rgba8(device, queue, &rgba, size, mips, &label);
                    if mips > 1 {
                        mipmaps.generate(device, &mut encoder, &uploaded.texture);
                    }
                    uploaded
                }
                None => {
                    log::warn!(
                        "Texture {} references missing image {}, using white",
                        i,
                        texture.source
                    );
                    Texture::create_fallback(Fallback::White, device, queue)
                }
            };
            gpu_texture.sampler = Some(match sampler {
                Some(sampler) => device.create_sampler(&sampler_descriptor(sampler)),
                None => create_default_sampler(device),
            });
            gpu_texture
        })
        .collect();

    queue.submit(std::iter::once(encoder.finish()));
    Ok(textures)
}
