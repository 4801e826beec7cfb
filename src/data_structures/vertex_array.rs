//! Per-primitive vertex input wiring.
//!
//! A [`VertexArray`] is the GPU-side description of one mesh primitive: which
//! buffer feeds each attribute slot, at which byte offset and stride, and how
//! the primitive is drawn. Building these is pure bookkeeping over the
//! [`Document`], the GPU scene only turns them into `set_vertex_buffer` calls
//! and pipeline layouts.

use std::ops::Range;

use crate::data_structures::document::{
    Accessor, AccessorType, Attribute, ComponentType, Document, PrimitiveMode,
};

/// POSITION, NORMAL and TEXCOORD_0.
pub const VERTEX_SLOTS: usize = 3;

/// wgpu requires vertex strides and offsets to be multiples of four.
const VERTEX_ALIGNMENT: u64 = 4;

/// Span of vertex arrays belonging to one mesh, one per primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VaoRange {
    pub begin: usize,
    pub count: usize,
}

impl VaoRange {
    pub fn indices(&self) -> Range<usize> {
        self.begin..self.begin + self.count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeBinding {
    pub buffer: usize,
    pub byte_offset: u64,
    pub stride: u64,
    pub format: wgpu::VertexFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBinding {
    pub buffer: usize,
    pub byte_offset: u64,
    pub component_type: ComponentType,
    pub count: u32,
}

/// How a primitive is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    Indexed {
        component_type: ComponentType,
        count: u32,
    },
    NonIndexed {
        vertex_count: u32,
    },
}

/// Everything that decides which render pipeline a primitive needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexLayoutKey {
    pub slots: [(u64, wgpu::VertexFormat); VERTEX_SLOTS],
    pub topology: wgpu::PrimitiveTopology,
    pub strip_index_format: Option<wgpu::IndexFormat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexArray {
    /// `None` marks a disabled slot; the shader then reads zeros.
    pub slots: [Option<AttributeBinding>; VERTEX_SLOTS],
    pub index: Option<IndexBinding>,
    /// Element count of the POSITION accessor, used for non-indexed draws.
    pub vertex_count: u32,
    pub topology: Option<wgpu::PrimitiveTopology>,
    pub drawable: bool,
}

impl VertexArray {
    pub fn draw_call(&self) -> DrawCall {
        match self.index {
            Some(index) => DrawCall::Indexed {
                component_type: index.component_type,
                count: index.count,
            },
            None => DrawCall::NonIndexed {
                vertex_count: self.vertex_count,
            },
        }
    }

    pub fn layout_key(&self) -> VertexLayoutKey {
        let topology = self
            .topology
            .unwrap_or(wgpu::PrimitiveTopology::TriangleList);
        let mut slots = [(0, wgpu::VertexFormat::Float32x3); VERTEX_SLOTS];
        for (slot, binding) in self.slots.iter().enumerate() {
            slots[slot] = match binding {
                Some(b) => (b.stride, b.format),
                None => (0, fallback_format(slot)),
            };
        }
        let strip_index_format = match (topology, self.index) {
            (
                wgpu::PrimitiveTopology::TriangleStrip | wgpu::PrimitiveTopology::LineStrip,
                Some(index),
            ) => index_format(index.component_type),
            _ => None,
        };
        VertexLayoutKey {
            slots,
            topology,
            strip_index_format,
        }
    }
}

/// Format the shader expects on a slot that has no data.
pub fn fallback_format(slot: usize) -> wgpu::VertexFormat {
    match slot {
        2 => wgpu::VertexFormat::Float32x2,
        _ => wgpu::VertexFormat::Float32x3,
    }
}

/// Stride of an attribute. A view stride of 0 means tightly packed.
pub fn effective_stride(view_stride: usize, accessor: &Accessor) -> usize {
    if view_stride == 0 {
        accessor.element_size()
    } else {
        view_stride
    }
}

/// Vertex format for float-readable accessors. Integer attributes that are
/// not normalized cannot feed the float inputs of the forward program.
pub fn vertex_format(accessor: &Accessor) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    let format = match (
        accessor.component_type,
        accessor.accessor_type,
        accessor.normalized,
    ) {
        (ComponentType::F32, AccessorType::Scalar, _) => F::Float32,
        (ComponentType::F32, AccessorType::Vec2, _) => F::Float32x2,
        (ComponentType::F32, AccessorType::Vec3, _) => F::Float32x3,
        (ComponentType::F32, AccessorType::Vec4, _) => F::Float32x4,
        (ComponentType::U8, AccessorType::Vec2, true) => F::Unorm8x2,
        (ComponentType::U8, AccessorType::Vec4, true) => F::Unorm8x4,
        (ComponentType::I8, AccessorType::Vec2, true) => F::Snorm8x2,
        (ComponentType::I8, AccessorType::Vec4, true) => F::Snorm8x4,
        (ComponentType::U16, AccessorType::Vec2, true) => F::Unorm16x2,
        (ComponentType::U16, AccessorType::Vec4, true) => F::Unorm16x4,
        (ComponentType::I16, AccessorType::Vec2, true) => F::Snorm16x2,
        (ComponentType::I16, AccessorType::Vec4, true) => F::Snorm16x4,
        _ => return None,
    };
    Some(format)
}

/// Index format on the GPU. `U8` indices are widened to `U16` at upload.
pub fn index_format(component_type: ComponentType) -> Option<wgpu::IndexFormat> {
    match component_type {
        ComponentType::U8 | ComponentType::U16 => Some(wgpu::IndexFormat::Uint16),
        ComponentType::U32 => Some(wgpu::IndexFormat::Uint32),
        _ => None,
    }
}

/// Triangle fans and line loops have no wgpu topology.
pub fn topology(mode: PrimitiveMode) -> Option<wgpu::PrimitiveTopology> {
    match mode {
        PrimitiveMode::Points => Some(wgpu::PrimitiveTopology::PointList),
        PrimitiveMode::Lines => Some(wgpu::PrimitiveTopology::LineList),
        PrimitiveMode::LineStrip => Some(wgpu::PrimitiveTopology::LineStrip),
        PrimitiveMode::Triangles => Some(wgpu::PrimitiveTopology::TriangleList),
        PrimitiveMode::TriangleStrip => Some(wgpu::PrimitiveTopology::TriangleStrip),
        PrimitiveMode::LineLoop | PrimitiveMode::TriangleFan => None,
    }
}

/// Resolves accessor -> buffer view -> buffer and returns
/// `(buffer, combined byte offset, view stride)`.
fn resolve(doc: &Document, accessor: &Accessor) -> Option<(usize, u64, usize)> {
    let view = doc.buffer_views.get(accessor.buffer_view?)?;
    doc.buffers.get(view.buffer)?;
    let offset = (view.byte_offset + accessor.byte_offset) as u64;
    Some((view.buffer, offset, view.byte_stride))
}

fn bind_attribute(
    doc: &Document,
    attribute: Attribute,
    accessor_index: usize,
) -> Option<AttributeBinding> {
    let accessor = doc.accessors.get(accessor_index)?;
    let (buffer, byte_offset, view_stride) = match resolve(doc, accessor) {
        Some(found) => found,
        None => {
            log::warn!(
                "{} accessor {} has no buffer data, leaving the slot disabled",
                attribute.name(),
                accessor_index
            );
            return None;
        }
    };
    let format = match vertex_format(accessor) {
        Some(format) => format,
        None => {
            log::warn!(
                "{} accessor {} uses an unsupported layout ({:?} {:?}), leaving the slot disabled",
                attribute.name(),
                accessor_index,
                accessor.component_type,
                accessor.accessor_type
            );
            return None;
        }
    };
    let stride = effective_stride(view_stride, accessor) as u64;
    if stride % VERTEX_ALIGNMENT != 0 || byte_offset % VERTEX_ALIGNMENT != 0 {
        log::warn!(
            "{} accessor {} is not 4-byte aligned (stride {}, offset {}), leaving the slot disabled",
            attribute.name(),
            accessor_index,
            stride,
            byte_offset
        );
        return None;
    }
    Some(AttributeBinding {
        buffer,
        byte_offset,
        stride,
        format,
    })
}

fn bind_indices(doc: &Document, accessor_index: usize) -> Option<IndexBinding> {
    let accessor = doc.accessors.get(accessor_index)?;
    index_format(accessor.component_type)?;
    let (buffer, byte_offset, _) = resolve(doc, accessor)?;
    Some(IndexBinding {
        buffer,
        byte_offset,
        component_type: accessor.component_type,
        count: accessor.count as u32,
    })
}

/// Builds one vertex array per primitive, meshes in document order, and the
/// range of vertex arrays each mesh owns.
pub fn build_vertex_arrays(doc: &Document) -> (Vec<VertexArray>, Vec<VaoRange>) {
    let mut vertex_arrays = Vec::new();
    let mut ranges = Vec::with_capacity(doc.meshes.len());

    for (mesh_index, mesh) in doc.meshes.iter().enumerate() {
        let range = VaoRange {
            begin: vertex_arrays.len(),
            count: mesh.primitives.len(),
        };
        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            let mut slots = [None; VERTEX_SLOTS];
            for attribute in Attribute::ALL {
                if let Some(accessor) = primitive.attribute(attribute) {
                    slots[attribute.slot()] = bind_attribute(doc, attribute, accessor);
                }
            }

            let (index, indices_ok) = match primitive.indices {
                Some(accessor) => {
                    let binding = bind_indices(doc, accessor);
                    if binding.is_none() {
                        log::warn!(
                            "Mesh {} primitive {} has unusable indices (accessor {})",
                            mesh_index,
                            primitive_index,
                            accessor
                        );
                    }
                    (binding, binding.is_some())
                }
                None => (None, true),
            };

            let topology = topology(primitive.mode);
            if topology.is_none() {
                log::warn!(
                    "Mesh {} primitive {} uses {:?}, which cannot be drawn",
                    mesh_index,
                    primitive_index,
                    primitive.mode
                );
            }
            let vertex_count = primitive
                .position
                .and_then(|a| doc.accessors.get(a))
                .map_or(0, |a| a.count as u32);
            let drawable = slots[0].is_some() && topology.is_some() && indices_ok;

            vertex_arrays.push(VertexArray {
                slots,
                index,
                vertex_count,
                topology,
                drawable,
            });
        }
        ranges.push(range);
    }

    (vertex_arrays, ranges)
}
