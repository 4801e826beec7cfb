//! Command line arguments and the configuration they resolve to.

use std::path::PathBuf;

use cgmath::{InnerSpace, Point3, Vector3};
use clap::Parser;

use crate::{camera::Camera, resources::shader::{ShaderLibrary, default_shaders_root}};

/// glTF 2.0 viewer with image based lighting.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "flow-viewer", version, about)]
pub struct Cli {
    /// glTF scene to load.
    pub file: PathBuf,

    /// Equirectangular HDR environment image.
    #[arg(long)]
    pub env: Option<PathBuf>,

    /// Window or capture width in pixels.
    #[arg(long, default_value_t = 1280, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Window or capture height in pixels.
    #[arg(long, default_value_t = 720, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Initial camera as eye_x,eye_y,eye_z,center_x,center_y,center_z,up_x,up_y,up_z.
    #[arg(long, value_parser = parse_lookat, allow_hyphen_values = true)]
    pub lookat: Option<Camera>,

    /// Vertex stage of the forward program, relative to the shaders root.
    #[arg(long)]
    pub vertex_shader: Option<String>,

    /// Fragment stage of the forward program, relative to the shaders root.
    #[arg(long)]
    pub fragment_shader: Option<String>,

    /// Directory holding the shader programs.
    #[arg(long)]
    pub shaders: Option<PathBuf>,

    /// Render one frame into this image and exit.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Parses the nine comma separated floats of `--lookat`.
pub fn parse_lookat(value: &str) -> Result<Camera, String> {
    let numbers = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| format!("`{}` is not a number: {e}", part.trim()))
        })
        .collect::<Result<Vec<f32>, String>>()?;
    let &[ex, ey, ez, cx, cy, cz, ux, uy, uz] = numbers.as_slice() else {
        return Err(format!("expected 9 comma separated numbers, got {}", numbers.len()));
    };
    let (eye, center, up) = (
        Point3::new(ex, ey, ez),
        Point3::new(cx, cy, cz),
        Vector3::new(ux, uy, uz),
    );
    let direction = center - eye;
    if direction.magnitude2() <= f32::EPSILON {
        return Err("eye and center must differ".to_string());
    }
    if direction.normalize().cross(up).magnitude2() <= f32::EPSILON * up.magnitude2().max(1.0) {
        return Err("up must not be zero or parallel to the view direction".to_string());
    }
    Ok(Camera::new(eye, center, up))
}

/// Everything the viewer needs to start, independent of argument parsing.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub scene: PathBuf,
    pub environment: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub camera: Option<Camera>,
    pub shaders: ShaderLibrary,
    /// Single-shot capture target. `None` opens a window.
    pub output: Option<PathBuf>,
}

impl From<Cli> for ViewerConfig {
    fn from(cli: Cli) -> Self {
        let root = cli.shaders.unwrap_or_else(default_shaders_root);
        Self {
            scene: cli.file,
            environment: cli.env,
            width: cli.width,
            height: cli.height,
            camera: cli.lookat,
            shaders: ShaderLibrary::new(root, cli.vertex_shader, cli.fragment_shader),
            output: cli.output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::shader::Program;

    #[test]
    fn defaults_open_a_window() {
        let cli = Cli::try_parse_from(["flow-viewer", "scene.gltf"]).unwrap();
        let config = ViewerConfig::from(cli);
        assert_eq!(config.scene, PathBuf::from("scene.gltf"));
        assert_eq!((config.width, config.height), (1280, 720));
        assert!(config.output.is_none());
        assert!(config.environment.is_none());
        assert!(config.camera.is_none());
    }

    #[test]
    fn capture_arguments() {
        let cli = Cli::try_parse_from([
            "flow-viewer",
            "scene.gltf",
            "--env",
            "sky.hdr",
            "--width",
            "800",
            "--height",
            "600",
            "--output",
            "out.png",
            "--lookat",
            "-1,2,3,0,0,0,0,1,0",
        ])
        .unwrap();
        let config = ViewerConfig::from(cli);
        assert_eq!(config.output, Some(PathBuf::from("out.png")));
        assert_eq!(config.environment, Some(PathBuf::from("sky.hdr")));
        assert_eq!((config.width, config.height), (800, 600));
        let camera = config.camera.unwrap();
        assert_eq!(camera.eye, Point3::new(-1.0, 2.0, 3.0));
        assert_eq!(camera.up, Vector3::unit_y());
    }

    #[test]
    fn lookat_needs_nine_numbers() {
        assert!(parse_lookat("1,2,3").is_err());
        assert!(parse_lookat("1,2,3,4,5,6,7,8,x").is_err());
        assert!(parse_lookat("1,2,3,4,5,6,7,8,9,10").is_err());
        // degenerate poses
        assert!(parse_lookat("1,1,1,1,1,1,0,1,0").is_err());
        assert!(parse_lookat("0,5,0,0,0,0,0,1,0").is_err());
        assert!(parse_lookat("0,0,5,0,0,0,0,0,0").is_err());
        assert!(parse_lookat("0,5,0,0,0,0,0,0,1").is_ok());
        let camera = parse_lookat(" 0, 0, 5, 0,0,0, 0,1,0").unwrap();
        assert_eq!(camera.eye, Point3::new(0.0, 0.0, 5.0));
        assert!(Cli::try_parse_from(["flow-viewer", "a.gltf", "--lookat", "1,2"]).is_err());
    }

    #[test]
    fn zero_sized_output_is_rejected() {
        assert!(Cli::try_parse_from(["flow-viewer", "a.gltf", "--width", "0"]).is_err());
    }

    #[test]
    fn lookat_round_trips_through_the_printed_flag() {
        let camera = parse_lookat("1.5,2,3,0,0,0,0,1,0").unwrap();
        let printed = camera.lookat_args();
        let value = printed.trim_start_matches("--lookat ");
        assert_eq!(parse_lookat(value).unwrap(), camera);
    }

    #[test]
    fn shader_overrides_apply_to_the_forward_program() {
        let cli = Cli::try_parse_from([
            "flow-viewer",
            "a.gltf",
            "--shaders",
            "/tmp/shaders",
            "--fragment-shader",
            "flat.fs.wgsl",
        ])
        .unwrap();
        let config = ViewerConfig::from(cli);
        let (vertex, fragment) = config.shaders.files(Program::Forward);
        assert_eq!(vertex, PathBuf::from("/tmp/shaders/forward.vs.wgsl"));
        assert_eq!(fragment, PathBuf::from("/tmp/shaders/flat.fs.wgsl"));
    }
}
