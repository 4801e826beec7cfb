//! Copying rendered textures back to the CPU.

use std::time::Duration;

use anyhow::Context as _;

/// Row order of pixels read from a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// First row is the top of the image (wgpu render targets).
    TopDown,
    /// First row is the bottom of the image (OpenGL style framebuffers).
    BottomUp,
}

/// Bytes per row of a texture-to-buffer copy, rounded up to the copy alignment.
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let alignment = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(alignment) * alignment
}

/// Drops the alignment padding at the end of every row.
pub fn strip_padding(data: &[u8], unpadded: usize, padded: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(unpadded * height);
    for row in data.chunks(padded).take(height) {
        pixels.extend_from_slice(&row[..unpadded]);
    }
    pixels
}

/// Returns rows top to bottom whatever order they were read in.
pub fn to_top_down(mut pixels: Vec<u8>, row_bytes: usize, order: RowOrder) -> Vec<u8> {
    if order == RowOrder::BottomUp {
        let rows: Vec<Vec<u8>> = pixels.chunks(row_bytes).rev().map(<[u8]>::to_vec).collect();
        pixels = rows.concat();
    }
    pixels
}

/// Drops the alpha channel of tightly packed RGBA8 pixels.
pub fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect()
}

/// Reads one mip level of one array layer, tightly packed, rows top to bottom.
pub async fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    mip_level: u32,
    layer: u32,
    size: [u32; 2],
    bytes_per_pixel: u32,
) -> anyhow::Result<Vec<u8>> {
    let [width, height] = size;
    let unpadded = width * bytes_per_pixel;
    let padded = padded_bytes_per_row(unpadded);
    let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback buffer"),
        size: (padded * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
    let buffer_slice = output_buffer.slice(..);
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(30)),
        })
        .context("waiting for the readback copy")?;
    rx.receive()
        .await
        .context("readback callback was dropped")?
        .context("mapping the readback buffer")?;

    let pixels = {
        let data = buffer_slice.get_mapped_range();
        strip_padding(&data, unpadded as usize, padded as usize, height as usize)
    };
    output_buffer.unmap();
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_256_bytes() {
        assert_eq!(padded_bytes_per_row(800 * 4), 3328);
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(4), 256);
    }

    #[test]
    fn padding_is_stripped_per_row() {
        let mut data = vec![1, 2, 0, 0];
        data.extend([3, 4, 0, 0]);
        assert_eq!(strip_padding(&data, 2, 4, 2), vec![1, 2, 3, 4]);
    }

    #[test]
    fn bottom_up_rows_are_flipped() {
        let rows = vec![1, 1, 2, 2, 3, 3];
        assert_eq!(
            to_top_down(rows.clone(), 2, RowOrder::BottomUp),
            vec![3, 3, 2, 2, 1, 1]
        );
        assert_eq!(to_top_down(rows.clone(), 2, RowOrder::TopDown), rows);
    }

    #[test]
    fn alpha_is_dropped() {
        assert_eq!(rgba_to_rgb(&[1, 2, 3, 255, 4, 5, 6, 0]), vec![1, 2, 3, 4, 5, 6]);
    }
}
