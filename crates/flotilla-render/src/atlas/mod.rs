//! Texture atlas handle and the per-frame metadata generic textures are built from.

use std::collections::HashMap;

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::coords::Vec2;
use crate::render::{RenderDevice, TextureFilter, TextureId, TextureSampling, TextureWrap};

/// Identifies one frame inside an atlas.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureFrameId(pub u32);

/// Where a frame lives in the atlas and how large it is in the world.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AtlasFrameMetadata {
    /// UV of the frame's bottom-left corner.
    pub texture_coordinates_bottom_left: Vec2,
    /// UV of the frame's top-right corner.
    pub texture_coordinates_top_right: Vec2,
    pub world_width: f32,
    pub world_height: f32,
    /// Point of the frame, in world units from its bottom-left corner, placed at the
    /// instance position.
    pub anchor_world: Vec2,
}

/// A device texture shared by every generic-texture draw, plus its frames.
#[derive(Debug)]
pub struct TextureAtlas {
    texture: TextureId,
    frames: HashMap<TextureFrameId, AtlasFrameMetadata>,
}

impl TextureAtlas {
    pub fn upload<D: RenderDevice + ?Sized>(
        device: &mut D,
        image: &RgbaImage,
        frames: impl IntoIterator<Item = (TextureFrameId, AtlasFrameMetadata)>,
    ) -> Result<Self> {
        let texture = device
            .create_texture(
                "texture atlas",
                image,
                TextureSampling {
                    wrap: TextureWrap::ClampToEdge,
                    filter: TextureFilter::Linear,
                    mipmaps: false,
                },
            )
            .context("failed to upload texture atlas")?;

        let frames: HashMap<_, _> = frames.into_iter().collect();
        log::debug!(
            "texture atlas uploaded: {}x{}, {} frames",
            image.width(),
            image.height(),
            frames.len()
        );

        Ok(Self { texture, frames })
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn frame(&self, id: TextureFrameId) -> Option<&AtlasFrameMetadata> {
        self.frames.get(&id)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        device.release_texture(self.texture);
    }
}
