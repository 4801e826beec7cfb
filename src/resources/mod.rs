//! Loading of external files and creation of GPU resources from them.
//!
//! - [`load_document`] turns a glTF file into the typed [`Document`]
//! - `texture` converts images and samplers and loads the HDR environment
//! - `mipmap` fills mip chains with a blit pass
//! - `shader` reads, validates and compiles the WGSL programs
//! - `gpu_scene` uploads buffers and textures and wires vertex arrays

use std::path::Path;

use crate::{
    data_structures::{
        document::{
            Accessor, AccessorType, Buffer, BufferView, ComponentType, Document, Image,
            MagFilter, Material, Mesh, MinFilter, Node, PixelFormat, Primitive, PrimitiveMode,
            Sampler, Scene, Texture, WrapMode,
        },
        transform::{LocalTransform, Transform},
    },
    error::ViewerError,
};

pub mod gpu_scene;
pub mod mipmap;
pub mod shader;
pub mod texture;

/// Parses a `.gltf`/`.glb` file together with its buffers and images.
pub fn load_document(path: &Path) -> Result<Document, ViewerError> {
    let (gltf, buffers, images) = gltf::import(path).map_err(|source| ViewerError::SceneLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let document = Document {
        buffers: buffers
            .into_iter()
            .map(|data| Buffer { data: data.0 })
            .collect(),
        buffer_views: gltf
            .views()
            .map(|view| BufferView {
                buffer: view.buffer().index(),
                byte_offset: view.offset(),
                byte_length: view.length(),
                byte_stride: view.stride().unwrap_or(0),
            })
            .collect(),
        accessors: gltf.accessors().map(convert_accessor).collect(),
        meshes: gltf
            .meshes()
            .map(|mesh| Mesh {
                primitives: mesh.primitives().map(convert_primitive).collect(),
            })
            .collect(),
        materials: gltf.materials().map(convert_material).collect(),
        textures: gltf
            .textures()
            .map(|texture| Texture {
                source: texture.source().index(),
                sampler: texture.sampler().index(),
            })
            .collect(),
        samplers: gltf.samplers().map(convert_sampler).collect(),
        images: images.into_iter().map(convert_image).collect(),
        nodes: gltf.nodes().map(convert_node).collect(),
        scenes: gltf
            .scenes()
            .map(|scene| Scene {
                nodes: scene.nodes().map(|node| node.index()).collect(),
            })
            .collect(),
        default_scene: gltf.default_scene().map(|scene| scene.index()),
    };

    log::info!(
        "Loaded {}: {} buffers, {} meshes, {} materials, {} textures, {} nodes",
        path.display(),
        document.buffers.len(),
        document.meshes.len(),
        document.materials.len(),
        document.textures.len(),
        document.nodes.len()
    );
    Ok(document)
}

fn convert_accessor(accessor: gltf::Accessor) -> Accessor {
    use gltf::accessor::{DataType, Dimensions};

    Accessor {
        buffer_view: accessor.view().map(|view| view.index()),
        byte_offset: accessor.offset(),
        count: accessor.count(),
        component_type: match accessor.data_type() {
            DataType::I8 => ComponentType::I8,
            DataType::U8 => ComponentType::U8,
            DataType::I16 => ComponentType::I16,
            DataType::U16 => ComponentType::U16,
            DataType::U32 => ComponentType::U32,
            DataType::F32 => ComponentType::F32,
        },
        accessor_type: match accessor.dimensions() {
            Dimensions::Scalar => AccessorType::Scalar,
            Dimensions::Vec2 => AccessorType::Vec2,
            Dimensions::Vec3 => AccessorType::Vec3,
            Dimensions::Vec4 => AccessorType::Vec4,
            Dimensions::Mat2 => AccessorType::Mat2,
            Dimensions::Mat3 => AccessorType::Mat3,
            Dimensions::Mat4 => AccessorType::Mat4,
        },
        normalized: accessor.normalized(),
    }
}

fn convert_primitive(primitive: gltf::Primitive) -> Primitive {
    use gltf::{Semantic, mesh::Mode};

    let attribute = |semantic: &Semantic| primitive.get(semantic).map(|a| a.index());
    Primitive {
        position: attribute(&Semantic::Positions),
        normal: attribute(&Semantic::Normals),
        tex_coord_0: attribute(&Semantic::TexCoords(0)),
        indices: primitive.indices().map(|a| a.index()),
        material: primitive.material().index(),
        mode: match primitive.mode() {
            Mode::Points => PrimitiveMode::Points,
            Mode::Lines => PrimitiveMode::Lines,
            Mode::LineLoop => PrimitiveMode::LineLoop,
            Mode::LineStrip => PrimitiveMode::LineStrip,
            Mode::Triangles => PrimitiveMode::Triangles,
            Mode::TriangleStrip => PrimitiveMode::TriangleStrip,
            Mode::TriangleFan => PrimitiveMode::TriangleFan,
        },
    }
}

fn convert_material(material: gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let occlusion = material.occlusion_texture();
    let normal = material.normal_texture();
    Material {
        base_color_factor: pbr.base_color_factor(),
        base_color_texture: pbr.base_color_texture().map(|t| t.texture().index()),
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        metallic_roughness_texture: pbr
            .metallic_roughness_texture()
            .map(|t| t.texture().index()),
        emissive_factor: material.emissive_factor(),
        emissive_texture: material.emissive_texture().map(|t| t.texture().index()),
        occlusion_texture: occlusion.as_ref().map(|t| t.texture().index()),
        occlusion_strength: occlusion.as_ref().map_or(1.0, |t| t.strength()),
        normal_texture: normal.as_ref().map(|t| t.texture().index()),
        normal_scale: normal.as_ref().map_or(1.0, |t| t.scale()),
    }
}

fn convert_sampler(sampler: gltf::texture::Sampler) -> Sampler {
    use gltf::texture::{MagFilter as GMag, MinFilter as GMin, WrappingMode};

    let wrap = |mode: WrappingMode| match mode {
        WrappingMode::ClampToEdge => WrapMode::ClampToEdge,
        WrappingMode::MirroredRepeat => WrapMode::MirroredRepeat,
        WrappingMode::Repeat => WrapMode::Repeat,
    };
    Sampler {
        mag_filter: sampler.mag_filter().map(|f| match f {
            GMag::Nearest => MagFilter::Nearest,
            GMag::Linear => MagFilter::Linear,
        }),
        min_filter: sampler.min_filter().map(|f| match f {
            GMin::Nearest => MinFilter::Nearest,
            GMin::Linear => MinFilter::Linear,
            GMin::NearestMipmapNearest => MinFilter::NearestMipmapNearest,
            GMin::LinearMipmapNearest => MinFilter::LinearMipmapNearest,
            GMin::NearestMipmapLinear => MinFilter::NearestMipmapLinear,
            GMin::LinearMipmapLinear => MinFilter::LinearMipmapLinear,
        }),
        wrap_s: wrap(sampler.wrap_s()),
        wrap_t: wrap(sampler.wrap_t()),
    }
}

fn convert_image(image: gltf::image::Data) -> Image {
    use gltf::image::Format;

    Image {
        width: image.width,
        height: image.height,
        format: match image.format {
            Format::R8 => PixelFormat::R8,
            Format::R8G8 => PixelFormat::R8G8,
            Format::R8G8B8 => PixelFormat::R8G8B8,
            Format::R8G8B8A8 => PixelFormat::R8G8B8A8,
            Format::R16 => PixelFormat::R16,
            Format::R16G16 => PixelFormat::R16G16,
            Format::R16G16B16 => PixelFormat::R16G16B16,
            Format::R16G16B16A16 => PixelFormat::R16G16B16A16,
            Format::R32G32B32FLOAT => PixelFormat::R32G32B32Float,
            Format::R32G32B32A32FLOAT => PixelFormat::R32G32B32A32Float,
        },
        pixels: image.pixels,
    }
}

fn convert_node(node: gltf::Node) -> Node {
    let local = match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => LocalTransform::Matrix(matrix.into()),
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => LocalTransform::Decomposed(Transform::from((translation, rotation, scale))),
    };
    Node {
        local,
        mesh: node.mesh().map(|mesh| mesh.index()),
        children: node.children().map(|child| child.index()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // One triangle: three f32 positions followed by u16 indices [0, 1, 2].
    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "mesh": 0, "translation": [1.0, 2.0, 3.0] } ],
        "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1 } ] } ],
        "buffers": [ {
            "byteLength": 44,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAA="
        } ],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".gltf")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_a_minimal_triangle() {
        let file = write_temp(TRIANGLE_GLTF);
        let doc = load_document(file.path()).unwrap();

        assert_eq!(doc.buffers.len(), 1);
        assert_eq!(doc.buffers[0].data.len(), 44);
        assert_eq!(doc.buffer_views[1].byte_offset, 36);
        assert_eq!(doc.buffer_views[0].byte_stride, 0);
        assert_eq!(doc.accessors[0].component_type, ComponentType::F32);
        assert_eq!(doc.accessors[0].accessor_type, AccessorType::Vec3);
        assert_eq!(doc.accessors[1].component_type, ComponentType::U16);

        let primitive = &doc.meshes[0].primitives[0];
        assert_eq!(primitive.position, Some(0));
        assert_eq!(primitive.normal, None);
        assert_eq!(primitive.indices, Some(1));
        assert_eq!(primitive.material, None);
        assert_eq!(primitive.mode, PrimitiveMode::Triangles);

        assert_eq!(doc.default_scene, Some(0));
        assert_eq!(doc.scenes[0].nodes, vec![0]);
        let translation = doc.nodes[0].local.matrix().w;
        assert_eq!([translation.x, translation.y, translation.z], [1.0, 2.0, 3.0]);
    }

    #[test]
    fn malformed_file_is_a_scene_load_error() {
        let file = write_temp("{ this is not gltf");
        let err = load_document(file.path()).unwrap_err();
        assert!(matches!(err, ViewerError::SceneLoad { .. }));
    }

    #[test]
    fn missing_file_is_a_scene_load_error() {
        let err = load_document(Path::new("does/not/exist.gltf")).unwrap_err();
        assert!(matches!(err, ViewerError::SceneLoad { .. }));
    }
}
