//! Typed scene description.
//!
//! A [`Document`] is the flattened, index-based view of a glTF file that the
//! rest of the viewer works on. Every cross reference is an index into one of
//! the document's arrays, so nodes form an arena and no value owns another
//! except buffers owning their bytes.

use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix, Transform as _, Vector3};

use crate::data_structures::transform::LocalTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    pub fn component_count(self) -> usize {
        match self {
            AccessorType::Scalar => 1,
            AccessorType::Vec2 => 2,
            AccessorType::Vec3 => 3,
            AccessorType::Vec4 | AccessorType::Mat2 => 4,
            AccessorType::Mat3 => 9,
            AccessorType::Mat4 => 16,
        }
    }
}

/// Raw bytes. One GPU buffer is created per `Buffer`.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    pub data: Vec<u8>,
}

/// Byte range inside a [`Buffer`]. A `byte_stride` of 0 means tightly packed.
#[derive(Debug, Clone, Default)]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: usize,
}

/// Typed interpretation of a buffer view.
#[derive(Debug, Clone)]
pub struct Accessor {
    /// `None` for sparse-only or zero-filled accessors, which the viewer does not bind.
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub count: usize,
    pub component_type: ComponentType,
    pub accessor_type: AccessorType,
    pub normalized: bool,
}

impl Accessor {
    /// Size of one tightly packed element.
    pub fn element_size(&self) -> usize {
        self.accessor_type.component_count() * self.component_type.size()
    }
}

/// The vertex inputs the forward program reads, with their fixed slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Position,
    Normal,
    TexCoord0,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Position, Attribute::Normal, Attribute::TexCoord0];

    pub fn slot(self) -> usize {
        match self {
            Attribute::Position => 0,
            Attribute::Normal => 1,
            Attribute::TexCoord0 => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Attribute::Position => "POSITION",
            Attribute::Normal => "NORMAL",
            Attribute::TexCoord0 => "TEXCOORD_0",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Default)]
pub struct Primitive {
    pub position: Option<usize>,
    pub normal: Option<usize>,
    pub tex_coord_0: Option<usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    pub mode: PrimitiveMode,
}

impl Primitive {
    /// Accessor index bound to `attribute`, if the primitive declares it.
    pub fn attribute(&self, attribute: Attribute) -> Option<usize> {
        match attribute {
            Attribute::Position => self.position,
            Attribute::Normal => self.normal,
            Attribute::TexCoord0 => self.tex_coord_0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

/// Metallic-roughness material. Texture fields index [`Document::textures`].
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<usize>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<usize>,
    pub emissive_factor: [f32; 3],
    pub emissive_texture: Option<usize>,
    pub occlusion_texture: Option<usize>,
    pub occlusion_strength: f32,
    pub normal_texture: Option<usize>,
    pub normal_scale: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            emissive_factor: [0.0; 3],
            emissive_texture: None,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            normal_texture: None,
            normal_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MagFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, MinFilter::Nearest | MinFilter::Linear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    ClampToEdge,
    MirroredRepeat,
    #[default]
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sampler {
    pub mag_filter: Option<MagFilter>,
    pub min_filter: Option<MinFilter>,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

#[derive(Debug, Clone, Default)]
pub struct Texture {
    pub source: usize,
    pub sampler: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    R8,
    R8G8,
    R8G8B8,
    R8G8B8A8,
    R16,
    R16G16,
    R16G16B16,
    R16G16B16A16,
    R32G32B32Float,
    R32G32B32A32Float,
}

/// Decoded image pixels, rows top to bottom.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub local: LocalTransform,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub buffers: Vec<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub samplers: Vec<Sampler>,
    pub images: Vec<Image>,
    pub nodes: Vec<Node>,
    pub scenes: Vec<Scene>,
    pub default_scene: Option<usize>,
}

/// World-space axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Bounds {
    fn from_point(p: Point3<f32>) -> Self {
        Self { min: p, max: p }
    }

    fn grow(&mut self, p: Point3<f32>) {
        self.min = Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    pub fn diagonal(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f32> {
        self.min + self.diagonal() * 0.5
    }
}

impl Document {
    /// The scene the viewer draws: the declared default, else the first one.
    pub fn active_scene(&self) -> Option<&Scene> {
        match self.default_scene {
            Some(index) => self.scenes.get(index),
            None => self.scenes.first(),
        }
    }

    /// Depth-first walk over the active scene with accumulated world matrices.
    ///
    /// Children are visited in array order. The walk uses an explicit stack
    /// over the node arena; a node reached twice (a cycle or a shared child,
    /// both invalid in glTF) is skipped with a warning instead of looping.
    pub fn visit_nodes(&self, mut visitor: impl FnMut(usize, &Node, &Matrix4<f32>)) {
        let scene = match self.active_scene() {
            Some(scene) => scene,
            None => return,
        };
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<(usize, Matrix4<f32>)> = scene
            .nodes
            .iter()
            .rev()
            .map(|&root| (root, Matrix4::identity()))
            .collect();

        while let Some((index, parent_to_world)) = stack.pop() {
            let node = match self.nodes.get(index) {
                Some(node) => node,
                None => {
                    log::warn!("Scene references node {} which does not exist", index);
                    continue;
                }
            };
            if visited[index] {
                log::warn!("Node {} is reachable more than once, skipping it", index);
                continue;
            }
            visited[index] = true;

            let local_to_world = parent_to_world * node.local.matrix();
            visitor(index, node, &local_to_world);
            stack.extend(
                node.children
                    .iter()
                    .rev()
                    .map(|&child| (child, local_to_world)),
            );
        }
    }

    /// Reads a float `VEC3` accessor (the only form core glTF allows for POSITION).
    pub fn read_vec3(&self, accessor_index: usize) -> Vec<Point3<f32>> {
        let accessor = match self.accessors.get(accessor_index) {
            Some(a) => a,
            None => return Vec::new(),
        };
        if accessor.component_type != ComponentType::F32
            || accessor.accessor_type != AccessorType::Vec3
        {
            log::debug!(
                "Accessor {} is not a float vec3, ignoring it for bounds",
                accessor_index
            );
            return Vec::new();
        }
        let (view, buffer) = match accessor
            .buffer_view
            .and_then(|v| self.buffer_views.get(v))
            .and_then(|view| self.buffers.get(view.buffer).map(|b| (view, b)))
        {
            Some(found) => found,
            None => return Vec::new(),
        };
        let stride = if view.byte_stride == 0 {
            accessor.element_size()
        } else {
            view.byte_stride
        };
        let start = view.byte_offset + accessor.byte_offset;
        (0..accessor.count)
            .filter_map(|i| {
                let offset = start + i * stride;
                let bytes = buffer.data.get(offset..offset + 12)?;
                let v: [f32; 3] = bytemuck::pod_read_unaligned(bytes);
                Some(Point3::from(v))
            })
            .collect()
    }

    /// World-space bounds of every POSITION in the active scene.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        self.visit_nodes(|_, node, local_to_world| {
            let mesh = match node.mesh.and_then(|m| self.meshes.get(m)) {
                Some(mesh) => mesh,
                None => return,
            };
            for position in mesh.primitives.iter().filter_map(|p| p.position) {
                for p in self.read_vec3(position) {
                    let world = local_to_world.transform_point(p);
                    match bounds.as_mut() {
                        Some(b) => b.grow(world),
                        None => bounds = Some(Bounds::from_point(world)),
                    }
                }
            }
        });
        bounds
    }
}

/// Origin-centred bounds used when a scene has nothing to measure.
pub fn empty_bounds() -> Bounds {
    Bounds::from_point(Point3::origin())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data_structures::transform::Transform;
    use cgmath::Transform as _;

    /// A single triangle with positions only, optionally indexed.
    pub(crate) fn triangle_document(indexed: bool) -> Document {
        let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, -1.0]];
        let mut data: Vec<u8> = bytemuck::cast_slice(&positions).to_vec();
        let indices: [u16; 4] = [0, 1, 2, 0];
        data.extend_from_slice(bytemuck::cast_slice(&indices));

        let mut doc = Document {
            buffers: vec![Buffer { data }],
            buffer_views: vec![
                BufferView {
                    buffer: 0,
                    byte_offset: 0,
                    byte_length: 36,
                    byte_stride: 0,
                },
                BufferView {
                    buffer: 0,
                    byte_offset: 36,
                    byte_length: 6,
                    byte_stride: 0,
                },
            ],
            accessors: vec![
                Accessor {
                    buffer_view: Some(0),
                    byte_offset: 0,
                    count: 3,
                    component_type: ComponentType::F32,
                    accessor_type: AccessorType::Vec3,
                    normalized: false,
                },
                Accessor {
                    buffer_view: Some(1),
                    byte_offset: 0,
                    count: 3,
                    component_type: ComponentType::U16,
                    accessor_type: AccessorType::Scalar,
                    normalized: false,
                },
            ],
            meshes: vec![Mesh {
                primitives: vec![Primitive {
                    position: Some(0),
                    indices: indexed.then_some(1),
                    ..Default::default()
                }],
            }],
            nodes: vec![Node {
                mesh: Some(0),
                ..Default::default()
            }],
            scenes: vec![Scene { nodes: vec![0] }],
            default_scene: Some(0),
            ..Default::default()
        };
        if !indexed {
            doc.accessors.truncate(1);
        }
        doc
    }

    #[test]
    fn component_and_type_sizes() {
        assert_eq!(ComponentType::U8.size(), 1);
        assert_eq!(ComponentType::I16.size(), 2);
        assert_eq!(ComponentType::F32.size(), 4);
        assert_eq!(AccessorType::Vec3.component_count(), 3);
        assert_eq!(AccessorType::Mat4.component_count(), 16);
    }

    #[test]
    fn active_scene_falls_back_to_first() {
        let mut doc = triangle_document(true);
        doc.default_scene = None;
        assert!(doc.active_scene().is_some());
        doc.scenes.clear();
        assert!(doc.active_scene().is_none());
    }

    #[test]
    fn visit_order_is_depth_first_in_child_order() {
        let mut doc = Document::default();
        doc.nodes = vec![
            Node {
                children: vec![1, 3],
                ..Default::default()
            },
            Node {
                children: vec![2],
                ..Default::default()
            },
            Node::default(),
            Node::default(),
        ];
        doc.scenes = vec![Scene { nodes: vec![0] }];
        let mut order = Vec::new();
        doc.visit_nodes(|index, _, _| order.push(index));
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn visit_accumulates_parent_transforms() {
        let mut doc = Document::default();
        let mut parent = Transform::new();
        parent.position = Vector3::new(1.0, 0.0, 0.0);
        let mut child = Transform::new();
        child.position = Vector3::new(0.0, 2.0, 0.0);
        doc.nodes = vec![
            Node {
                local: LocalTransform::Decomposed(parent),
                children: vec![1],
                ..Default::default()
            },
            Node {
                local: LocalTransform::Decomposed(child),
                ..Default::default()
            },
        ];
        doc.scenes = vec![Scene { nodes: vec![0] }];
        let mut child_world = None;
        doc.visit_nodes(|index, _, m| {
            if index == 1 {
                child_world = Some(m.transform_point(Point3::origin()));
            }
        });
        assert_eq!(child_world, Some(Point3::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn cycles_terminate() {
        let mut doc = Document::default();
        doc.nodes = vec![
            Node {
                children: vec![1],
                ..Default::default()
            },
            Node {
                children: vec![0],
                ..Default::default()
            },
        ];
        doc.scenes = vec![Scene { nodes: vec![0] }];
        let mut visits = 0;
        doc.visit_nodes(|_, _, _| visits += 1);
        assert_eq!(visits, 2);
    }

    #[test]
    fn bounds_cover_positions() {
        let doc = triangle_document(true);
        let bounds = doc.bounds().unwrap();
        assert_eq!(bounds.min, Point3::new(0.0, 0.0, -1.0));
        assert_eq!(bounds.max, Point3::new(1.0, 2.0, 0.0));
        assert_eq!(bounds.center(), Point3::new(0.5, 1.0, -0.5));
    }

    #[test]
    fn bounds_of_empty_scene_are_none() {
        assert!(Document::default().bounds().is_none());
    }
}
