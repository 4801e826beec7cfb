//! Image based lighting precomputation.
//!
//! Four offscreen stages run once at startup, in this order:
//!
//! 1. the equirectangular environment is projected onto a 512² cubemap
//! 2. that cubemap is convolved into a 32² diffuse irradiance cubemap
//! 3. that cubemap is prefiltered into a 128² cubemap with 5 mip levels,
//!    mip `m` holding roughness `m / 4`
//! 4. the split-sum BRDF is integrated into a 512² two channel LUT
//!
//! This module describes the passes as plain data ([`CapturePass`]), which
//! `capture` replays on the GPU.

use cgmath::{Matrix4, Point3, Vector3};

use crate::camera::OPENGL_TO_WGPU_MATRIX;

pub mod capture;

pub use capture::IblResources;

pub const ENVIRONMENT_SIZE: u32 = 512;
pub const IRRADIANCE_SIZE: u32 = 32;
pub const PREFILTER_SIZE: u32 = 128;
pub const PREFILTER_MIP_LEVELS: u32 = 5;
pub const BRDF_LUT_SIZE: u32 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Equirectangular,
    Irradiance,
    Prefilter,
    BrdfLut,
}

/// One draw of a capture pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureDraw {
    /// Cube face (`+X, -X, +Y, -Y, +Z, -Z`), `None` for the 2-D LUT.
    pub face: Option<u32>,
    pub mip: u32,
    /// Width and height of the target level, also the depth attachment size.
    pub size: u32,
    pub roughness: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturePass {
    pub stage: Stage,
    pub draws: Vec<CaptureDraw>,
}

/// Edge length of mip level `mip` of a `base` sized texture.
pub fn mip_size(base: u32, mip: u32) -> u32 {
    (base >> mip).max(1)
}

/// Roughness stored in prefilter mip `mip` out of `levels`.
pub fn prefilter_roughness(mip: u32, levels: u32) -> f32 {
    if levels <= 1 {
        return 0.0;
    }
    mip as f32 / (levels - 1) as f32
}

/// Look-at matrices from the origin toward each cube face, in face order.
pub fn capture_views() -> [Matrix4<f32>; 6] {
    let origin = Point3::new(0.0, 0.0, 0.0);
    let face = |target: [f32; 3], up: [f32; 3]| {
        Matrix4::look_at_rh(origin, Point3::from(target), Vector3::from(up))
    };
    [
        face([1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
        face([-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]),
        face([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        face([0.0, -1.0, 0.0], [0.0, 0.0, -1.0]),
        face([0.0, 0.0, 1.0], [0.0, -1.0, 0.0]),
        face([0.0, 0.0, -1.0], [0.0, -1.0, 0.0]),
    ]
}

/// 90 degree square frustum for a cube face.
///
/// Render target rows run top to bottom while cubemap face addressing
/// follows the OpenGL convention of the face views above, so clip space y is
/// mirrored.
pub fn capture_projection() -> Matrix4<f32> {
    let flip_y = Matrix4::from_nonuniform_scale(1.0, -1.0, 1.0);
    flip_y * OPENGL_TO_WGPU_MATRIX * cgmath::perspective(cgmath::Deg(90.0), 1.0, 0.1, 10.0)
}

fn cube_pass(stage: Stage, size: u32, mip_levels: u32) -> CapturePass {
    let draws = (0..mip_levels)
        .flat_map(|mip| {
            let roughness = match stage {
                Stage::Prefilter => prefilter_roughness(mip, mip_levels),
                _ => 0.0,
            };
            (0..6).map(move |face| CaptureDraw {
                face: Some(face),
                mip,
                size: mip_size(size, mip),
                roughness,
            })
        })
        .collect();
    CapturePass { stage, draws }
}

/// The four passes in dependency order.
pub fn capture_plan() -> Vec<CapturePass> {
    vec![
        cube_pass(Stage::Equirectangular, ENVIRONMENT_SIZE, 1),
        cube_pass(Stage::Irradiance, IRRADIANCE_SIZE, 1),
        cube_pass(Stage::Prefilter, PREFILTER_SIZE, PREFILTER_MIP_LEVELS),
        CapturePass {
            stage: Stage::BrdfLut,
            draws: vec![CaptureDraw {
                face: None,
                mip: 0,
                size: BRDF_LUT_SIZE,
                roughness: 0.0,
            }],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Matrix, Vector4};

    fn pass(stage: Stage) -> CapturePass {
        capture_plan()
            .into_iter()
            .find(|p| p.stage == stage)
            .unwrap()
    }

    #[test]
    fn stages_run_in_dependency_order() {
        let stages: Vec<Stage> = capture_plan().iter().map(|p| p.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Equirectangular,
                Stage::Irradiance,
                Stage::Prefilter,
                Stage::BrdfLut
            ]
        );
    }

    #[test]
    fn face_views_are_distinct_and_look_outward_along_the_axes() {
        let views = capture_views();
        let expected = [
            Vector3::unit_x(),
            -Vector3::unit_x(),
            Vector3::unit_y(),
            -Vector3::unit_y(),
            Vector3::unit_z(),
            -Vector3::unit_z(),
        ];
        for (i, view) in views.iter().enumerate() {
            // the camera looks down -z in view space; row 2 of the rotation is -forward
            let forward = -view.row(2).truncate();
            assert!((forward - expected[i]).magnitude() < 1e-6, "face {i}");
            for other in views.iter().skip(i + 1) {
                assert_ne!(view, other);
            }
        }
    }

    #[test]
    fn cube_passes_draw_every_face_once_per_mip() {
        for stage in [Stage::Equirectangular, Stage::Irradiance] {
            let pass = pass(stage);
            assert_eq!(pass.draws.len(), 6);
            let faces: Vec<_> = pass.draws.iter().map(|d| d.face).collect();
            assert_eq!(faces, (0..6).map(Some).collect::<Vec<_>>());
        }
        assert_eq!(pass(Stage::Equirectangular).draws[0].size, 512);
        assert_eq!(pass(Stage::Irradiance).draws[0].size, 32);

        let prefilter = pass(Stage::Prefilter);
        assert_eq!(prefilter.draws.len(), 6 * 5);
        for mip in 0..5 {
            let level: Vec<_> = prefilter.draws.iter().filter(|d| d.mip == mip).collect();
            assert_eq!(level.len(), 6);
            assert!(level.iter().all(|d| d.size == 128 >> mip));
        }
    }

    #[test]
    fn prefilter_roughness_spans_zero_to_one() {
        assert_eq!(prefilter_roughness(0, 5), 0.0);
        assert_eq!(prefilter_roughness(1, 5), 0.25);
        assert_eq!(prefilter_roughness(4, 5), 1.0);
        let prefilter = pass(Stage::Prefilter);
        assert!(
            prefilter
                .draws
                .iter()
                .all(|d| d.roughness == d.mip as f32 / 4.0)
        );
    }

    #[test]
    fn brdf_lut_is_a_single_draw() {
        let lut = pass(Stage::BrdfLut);
        assert_eq!(lut.draws.len(), 1);
        assert_eq!(lut.draws[0].face, None);
        assert_eq!(lut.draws[0].size, 512);
    }

    #[test]
    fn projection_maps_face_center_into_wgpu_depth_range() {
        let clip = capture_projection() * capture_views()[0] * Vector4::new(1.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn mip_sizes_never_reach_zero() {
        assert_eq!(mip_size(128, 4), 8);
        assert_eq!(mip_size(1, 3), 1);
    }

    #[test]
    fn face_content_lands_where_cube_sampling_reads_it() {
        // Cube addressing picks the major axis `ma` and face coordinates
        // (sc, tc); texel rows run top to bottom, so a direction must land at
        // NDC (sc / ma, -tc / ma) of its face.
        let expected: [fn(Vector3<f32>) -> (f32, f32); 6] = [
            |d| (-d.z / d.x, d.y / d.x),
            |d| (d.z / -d.x, d.y / -d.x),
            |d| (d.x / d.y, -d.z / d.y),
            |d| (d.x / -d.y, d.z / -d.y),
            |d| (d.x / d.z, d.y / d.z),
            |d| (-d.x / -d.z, d.y / -d.z),
        ];
        let axes = [
            Vector3::unit_x(),
            -Vector3::unit_x(),
            Vector3::unit_y(),
            -Vector3::unit_y(),
            Vector3::unit_z(),
            -Vector3::unit_z(),
        ];
        let projection = capture_projection();
        let views = capture_views();
        let offset = Vector3::new(0.3, -0.2, 0.1);

        for face in 0..6 {
            let d = axes[face] + offset;
            let clip = projection * views[face] * d.extend(1.0);
            let (x, y, z) = (clip.x / clip.w, clip.y / clip.w, clip.z / clip.w);
            let (ex, ey) = expected[face](d);
            assert!((x - ex).abs() < 1e-5, "face {face}: x {x} expected {ex}");
            assert!((y - ey).abs() < 1e-5, "face {face}: y {y} expected {ey}");
            assert!((0.0..=1.0).contains(&z), "face {face}: depth {z}");
        }
    }
}
