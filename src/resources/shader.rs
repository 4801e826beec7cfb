//! Shader programs.
//!
//! A program is a vertex file and a fragment file under the shaders root. The
//! two are concatenated into one WGSL module, vertex file first, so the
//! vertex file declares the interface both stages share. Sources are parsed
//! and validated with naga before the device sees them, which turns a broken
//! program into a startup error instead of a device loss later on.

use std::path::{Path, PathBuf};

use crate::error::ViewerError;

/// Every program the viewer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    Forward,
    Skybox,
    Equirectangular,
    Irradiance,
    Prefilter,
    BrdfLut,
    Blit,
}

impl Program {
    pub const ALL: [Program; 7] = [
        Program::Forward,
        Program::Skybox,
        Program::Equirectangular,
        Program::Irradiance,
        Program::Prefilter,
        Program::BrdfLut,
        Program::Blit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Program::Forward => "forward",
            Program::Skybox => "skybox",
            Program::Equirectangular => "equirectangular",
            Program::Irradiance => "irradiance",
            Program::Prefilter => "prefilter",
            Program::BrdfLut => "brdf lut",
            Program::Blit => "mipmap blit",
        }
    }

    /// (vertex, fragment) file names.
    pub fn default_files(self) -> (&'static str, &'static str) {
        match self {
            Program::Forward => ("forward.vs.wgsl", "pbr.fs.wgsl"),
            Program::Skybox => ("skybox.vs.wgsl", "skybox.fs.wgsl"),
            Program::Equirectangular => ("cubemap.vs.wgsl", "equirect.fs.wgsl"),
            Program::Irradiance => ("cubemap.vs.wgsl", "irradiance.fs.wgsl"),
            Program::Prefilter => ("cubemap.vs.wgsl", "prefilter.fs.wgsl"),
            Program::BrdfLut => ("quad.vs.wgsl", "brdf.fs.wgsl"),
            Program::Blit => ("blit.vs.wgsl", "blit.fs.wgsl"),
        }
    }
}

/// Where shader sources come from. Only the forward program can be
/// overridden, the offscreen passes are fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderLibrary {
    root: PathBuf,
    forward_vertex: String,
    forward_fragment: String,
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new(default_shaders_root(), None, None)
    }
}

/// The shaders directory copied next to the build output.
pub fn default_shaders_root() -> PathBuf {
    Path::new(env!("OUT_DIR")).join("shaders")
}

impl ShaderLibrary {
    pub fn new(
        root: PathBuf,
        forward_vertex: Option<String>,
        forward_fragment: Option<String>,
    ) -> Self {
        let (vertex, fragment) = Program::Forward.default_files();
        Self {
            root,
            forward_vertex: forward_vertex.unwrap_or_else(|| vertex.to_string()),
            forward_fragment: forward_fragment.unwrap_or_else(|| fragment.to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self, program: Program) -> (PathBuf, PathBuf) {
        let (vertex, fragment) = match program {
            Program::Forward => (self.forward_vertex.as_str(), self.forward_fragment.as_str()),
            other => other.default_files(),
        };
        (self.root.join(vertex), self.root.join(fragment))
    }

    /// Concatenated WGSL of `program`.
    pub fn source(&self, program: Program) -> Result<String, ViewerError> {
        let (vertex, fragment) = self.files(program);
        let read = |path: PathBuf| {
            std::fs::read_to_string(&path).map_err(|source| ViewerError::ShaderSource { path, source })
        };
        Ok(format!("{}\n{}", read(vertex)?, read(fragment)?))
    }

    /// Reads and validates `program` without touching the GPU.
    pub fn validate(&self, program: Program) -> Result<String, ViewerError> {
        let source = self.source(program)?;
        validate_wgsl(program.name(), &source)?;
        Ok(source)
    }

    /// Reads, validates and compiles `program`.
    pub fn load(
        &self,
        device: &wgpu::Device,
        program: Program,
    ) -> Result<wgpu::ShaderModule, ViewerError> {
        let source = self.validate(program)?;
        log::debug!("Compiled shader program {}", program.name());
        Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(program.name()),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        }))
    }
}

/// Parses and validates WGSL, reporting diagnostics against `source`.
pub fn validate_wgsl(program: &str, source: &str) -> Result<naga::Module, ViewerError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ViewerError::ShaderCompile {
        program: program.to_string(),
        message: e.emit_to_string(source),
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| ViewerError::ShaderCompile {
        program: program.to_string(),
        message: e.emit_to_string(source),
    })?;
    Ok(module)
}
