use std::path::{Path, PathBuf};

use flow_viewer::{
    context::Context,
    data_structures::document::Document,
    resources::{load_document, shader::ShaderLibrary},
};

/// One triangle in the z = 0 plane, positions then u16 indices.
const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": [0] } ],
  "nodes": [ { "mesh": 0 } ],
  "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1 } ] } ],
  "buffers": [ {
    "byteLength": 44,
    "uri": "data:application/octet-stream;base64,AAAAvwAAAL8AAAAAAAAAPwAAAL8AAAAAAAAAAAAAAD8AAAAAAAABAAIAAAA="
  } ],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [-0.5, -0.5, 0.0], "max": [0.5, 0.5, 0.0] },
    { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
  ]
}"#;

/// Shader sources straight from the repository.
pub fn shaders() -> ShaderLibrary {
    ShaderLibrary::new(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders"),
        None,
        None,
    )
}

pub fn write_triangle(dir: &Path) -> PathBuf {
    let path = dir.join("triangle.gltf");
    std::fs::write(&path, TRIANGLE_GLTF).expect("write test scene");
    path
}

pub fn triangle(dir: &Path) -> Document {
    load_document(&write_triangle(dir)).expect("load test scene")
}

pub fn headless() -> Context {
    block_on(Context::headless()).expect("no adapter for headless tests")
}

/// Runs a future to completion on a fresh current-thread runtime.
pub fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
        .block_on(future)
}
