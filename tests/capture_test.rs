#![cfg(feature = "integration-tests")]

mod common;

use common::test_utils::{block_on, headless, shaders, triangle, write_triangle};
use flow_viewer::{
    config::ViewerConfig,
    resources::texture::EnvironmentImage,
    viewer::Viewer,
};

#[test]
fn capture_writes_an_rgb_image_of_the_requested_size() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = headless();
    let mut viewer = Viewer::new(
        &ctx.device,
        &ctx.queue,
        ctx.color_format,
        triangle(dir.path()),
        &EnvironmentImage::black(),
        &shaders(),
        None,
        [800, 600],
    )
    .unwrap();

    let output = dir.path().join("capture.png");
    block_on(viewer.capture_to_file(&ctx.device, &ctx.queue, 800, 600, &output)).unwrap();

    let image = image::open(&output).unwrap().into_rgb8();
    assert_eq!(image.dimensions(), (800, 600));
    assert_eq!(image.as_raw().len(), 800 * 600 * 3);
}

#[test]
fn triangle_is_visible_from_the_default_camera() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = headless();
    let mut viewer = Viewer::new(
        &ctx.device,
        &ctx.queue,
        ctx.color_format,
        triangle(dir.path()),
        &EnvironmentImage::black(),
        &shaders(),
        None,
        [64, 64],
    )
    .unwrap();

    let frame = block_on(viewer.capture(&ctx.device, &ctx.queue, 64, 64)).unwrap();
    // black sky, so only the lit triangle can produce color
    assert!(frame.pixels().any(|p| p.0 != [0, 0, 0]));
    // corners lie outside the triangle
    assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0]);
}

#[test]
fn single_shot_run_writes_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run.png");
    let config = ViewerConfig {
        scene: write_triangle(dir.path()),
        environment: None,
        width: 320,
        height: 240,
        camera: None,
        shaders: shaders(),
        output: Some(output.clone()),
    };
    flow_viewer::flow::run(config).unwrap();
    let image = image::open(&output).unwrap();
    assert_eq!((image.width(), image.height()), (320, 240));
}

#[test]
fn missing_scene_fails_before_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let config = ViewerConfig {
        scene: dir.path().join("nope.gltf"),
        environment: None,
        width: 32,
        height: 32,
        camera: None,
        shaders: shaders(),
        output: Some(dir.path().join("never.png")),
    };
    assert!(flow_viewer::flow::run(config).is_err());
    assert!(!dir.path().join("never.png").exists());
}

#[test]
fn capture_larger_than_the_device_allows_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = headless();
    let mut viewer = Viewer::new(
        &ctx.device,
        &ctx.queue,
        ctx.color_format,
        triangle(dir.path()),
        &EnvironmentImage::black(),
        &shaders(),
        None,
        [64, 64],
    )
    .unwrap();
    let too_wide = ctx.device.limits().max_texture_dimension_2d + 1;
    assert!(block_on(viewer.capture(&ctx.device, &ctx.queue, too_wide, 16)).is_err());
}
