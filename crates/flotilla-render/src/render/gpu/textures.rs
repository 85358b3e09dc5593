use anyhow::{Result, ensure};
use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::render::{TextureFilter, TextureSampling, TextureWrap};

pub(super) struct GpuTexture {
    pub label: &'static str,
    // Kept alive for the bind group.
    _texture: wgpu::Texture,
    pub bind_group: wgpu::BindGroup,
}

/// Number of levels in a full mip chain down to 1×1.
pub(super) fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Box-filtered chain starting at `image` itself.
pub(super) fn mip_chain(image: &RgbaImage) -> Vec<RgbaImage> {
    let levels = mip_level_count(image.width(), image.height());
    let mut chain = Vec::with_capacity(levels as usize);
    chain.push(image.clone());
    for _ in 1..levels {
        let Some(prev) = chain.last() else { break };
        let w = (prev.width() / 2).max(1);
        let h = (prev.height() / 2).max(1);
        chain.push(imageops::resize(prev, w, h, FilterType::Triangle));
    }
    chain
}

pub(super) fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    label: &'static str,
    image: &RgbaImage,
    sampling: TextureSampling,
) -> Result<GpuTexture> {
    let (width, height) = image.dimensions();
    ensure!(width > 0 && height > 0, "{label}: texture has zero size ({width}x{height})");

    let limit = device.limits().max_texture_dimension_2d;
    ensure!(
        width <= limit && height <= limit,
        "{label}: {width}x{height} exceeds the device limit of {limit}"
    );

    let levels = if sampling.mipmaps {
        mip_chain(image)
    } else {
        vec![image.clone()]
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: levels.len() as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (mip_level, level) in levels.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: mip_level as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            level.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * level.width()),
                rows_per_image: Some(level.height()),
            },
            wgpu::Extent3d {
                width: level.width(),
                height: level.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    let address_mode = match sampling.wrap {
        TextureWrap::Repeat => wgpu::AddressMode::Repeat,
        TextureWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    };
    let filter = match sampling.filter {
        TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        TextureFilter::Linear => wgpu::FilterMode::Linear,
    };

    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    });

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });

    log::debug!("{label}: uploaded {width}x{height}, {} mip levels", levels.len());

    Ok(GpuTexture {
        label,
        _texture: texture,
        bind_group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_count_reaches_one_pixel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(256, 64), 9);
        assert_eq!(mip_level_count(300, 2), 9);
    }

    #[test]
    fn mip_chain_halves_down_to_one() {
        let chain = mip_chain(&RgbaImage::new(8, 2));
        let dims: Vec<(u32, u32)> = chain.iter().map(|i| i.dimensions()).collect();
        assert_eq!(dims, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
    }
}
