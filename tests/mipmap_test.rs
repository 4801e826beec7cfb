#![cfg(feature = "integration-tests")]

mod common;

use common::test_utils::{block_on, headless, shaders};
use flow_viewer::{
    data_structures::document::{Document, Image, MinFilter, PixelFormat, Sampler, Texture},
    readback::read_texture,
    resources::gpu_scene::GpuScene,
};

/// 4x4 texture, left half red and right half blue.
fn split_texture(min_filter: MinFilter) -> Document {
    let pixels = (0..16)
        .flat_map(|i| {
            if i % 4 < 2 {
                [255u8, 0, 0, 255]
            } else {
                [0, 0, 255, 255]
            }
        })
        .collect();
    Document {
        images: vec![Image {
            width: 4,
            height: 4,
            format: PixelFormat::R8G8B8A8,
            pixels,
        }],
        samplers: vec![Sampler {
            min_filter: Some(min_filter),
            ..Default::default()
        }],
        textures: vec![Texture {
            source: 0,
            sampler: Some(0),
        }],
        ..Default::default()
    }
}

#[test]
fn mipmapping_sampler_gets_an_averaged_chain() {
    let ctx = headless();
    let doc = split_texture(MinFilter::LinearMipmapLinear);
    let scene = GpuScene::new(&ctx.device, &ctx.queue, &shaders(), &doc).unwrap();
    let texture = &scene.texture(0).unwrap().texture;
    assert_eq!(texture.mip_level_count(), 3);

    let half = block_on(read_texture(&ctx.device, &ctx.queue, texture, 1, 0, [2, 2], 4)).unwrap();
    assert_eq!(&half[0..4], &[255, 0, 0, 255]);
    assert_eq!(&half[4..8], &[0, 0, 255, 255]);

    let last = block_on(read_texture(&ctx.device, &ctx.queue, texture, 2, 0, [1, 1], 4)).unwrap();
    for (channel, expected) in last.iter().zip([128u8, 0, 128, 255]) {
        assert!(
            channel.abs_diff(expected) <= 2,
            "last mip {last:?}, expected about {expected}"
        );
    }
}

#[test]
fn linear_sampler_keeps_a_single_level() {
    let ctx = headless();
    let doc = split_texture(MinFilter::Linear);
    let scene = GpuScene::new(&ctx.device, &ctx.queue, &shaders(), &doc).unwrap();
    assert_eq!(scene.texture(0).unwrap().texture.mip_level_count(), 1);
}
