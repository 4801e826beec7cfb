#![cfg(feature = "integration-tests")]

mod common;

use common::test_utils::{block_on, headless, shaders};
use flow_viewer::{
    data_structures::geometry::ProxyGeometry,
    ibl::{BRDF_LUT_SIZE, IRRADIANCE_SIZE, IblResources},
    pipelines::capture::CapturePipelines,
    readback::read_texture,
    resources::texture::EnvironmentImage,
};
use half::f16;

/// Small sky: bright upper half, dark lower half.
fn split_sky() -> EnvironmentImage {
    let (width, height) = (16, 8);
    let texels = (0..width * height)
        .flat_map(|i| {
            let v = if i / width < height / 2 { 2.0 } else { 0.1 };
            [v, v, v, 1.0]
        })
        .map(f16::from_f32)
        .collect();
    EnvironmentImage {
        width,
        height,
        texels,
    }
}

fn read_maps(ibl: &IblResources, ctx: &flow_viewer::context::Context) -> (Vec<Vec<u8>>, Vec<u8>) {
    let irradiance = (0..6)
        .map(|face| {
            block_on(read_texture(
                &ctx.device,
                &ctx.queue,
                &ibl.irradiance.texture,
                0,
                face,
                [IRRADIANCE_SIZE; 2],
                8,
            ))
            .unwrap()
        })
        .collect();
    let lut = block_on(read_texture(
        &ctx.device,
        &ctx.queue,
        &ibl.brdf_lut.texture,
        0,
        0,
        [BRDF_LUT_SIZE; 2],
        4,
    ))
    .unwrap();
    (irradiance, lut)
}

#[test]
fn precomputation_is_repeatable() {
    let ctx = headless();
    let pipelines = CapturePipelines::new(&ctx.device, &shaders()).unwrap();
    let geometry = ProxyGeometry::new(&ctx.device);
    let sky = split_sky();

    let first = IblResources::compute(&ctx.device, &ctx.queue, &pipelines, &geometry, &sky);
    let second = IblResources::compute(&ctx.device, &ctx.queue, &pipelines, &geometry, &sky);

    let (irradiance_a, lut_a) = read_maps(&first, &ctx);
    let (irradiance_b, lut_b) = read_maps(&second, &ctx);
    assert_eq!(irradiance_a, irradiance_b);
    assert_eq!(lut_a, lut_b);

    assert_eq!(lut_a.len(), (BRDF_LUT_SIZE * BRDF_LUT_SIZE * 4) as usize);
    assert!(lut_a.iter().any(|&b| b != 0), "BRDF LUT was not written");
}

#[test]
fn black_environment_gives_black_irradiance() {
    let ctx = headless();
    let pipelines = CapturePipelines::new(&ctx.device, &shaders()).unwrap();
    let geometry = ProxyGeometry::new(&ctx.device);
    let ibl = IblResources::compute(
        &ctx.device,
        &ctx.queue,
        &pipelines,
        &geometry,
        &EnvironmentImage::black(),
    );

    let (irradiance, _) = read_maps(&ibl, &ctx);
    for face in irradiance {
        for texel in face.chunks_exact(8) {
            let rgb: Vec<f32> = texel[..6]
                .chunks_exact(2)
                .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect();
            assert!(rgb.iter().all(|&c| c.abs() < 1e-3), "{rgb:?}");
        }
    }
}
