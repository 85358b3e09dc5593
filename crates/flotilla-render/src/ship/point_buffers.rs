use anyhow::{Context, Result};

use crate::coords::Vec2;
use crate::paint::Color;
use crate::render::{AttributeSetId, BufferUsage, FixedArena, PointAttributeBuffers, RenderDevice};

use super::PlaneId;

/// The six per-point attribute buffers of one ship.
///
/// Every buffer holds exactly `point_count` elements for the life of the ship.
#[derive(Debug)]
pub(crate) struct PointBuffers {
    position: FixedArena<Vec2>,
    light: FixedArena<f32>,
    water: FixedArena<f32>,
    color: FixedArena<Color>,
    plane_id: FixedArena<PlaneId>,
    texture_coordinates: FixedArena<Vec2>,
    attribute_set: AttributeSetId,
}

impl PointBuffers {
    pub(crate) fn new<D: RenderDevice + ?Sized>(device: &mut D, point_count: usize) -> Result<Self> {
        let position = FixedArena::new(device, "point positions", point_count, BufferUsage::Dynamic)?;
        let light = FixedArena::new(device, "point light", point_count, BufferUsage::Dynamic)?;
        let water = FixedArena::new(device, "point water", point_count, BufferUsage::Dynamic)?;
        let color = FixedArena::new(device, "point colors", point_count, BufferUsage::Static)?;
        let plane_id = FixedArena::new(device, "point plane ids", point_count, BufferUsage::Static)?;
        let texture_coordinates =
            FixedArena::new(device, "point texture coordinates", point_count, BufferUsage::Static)?;

        let attribute_set = device
            .create_attribute_set(
                "ship points",
                &PointAttributeBuffers {
                    position: position.buffer(),
                    light: light.buffer(),
                    water: water.buffer(),
                    color: color.buffer(),
                    plane_id: plane_id.buffer(),
                    texture_coordinates: texture_coordinates.buffer(),
                },
            )
            .context("failed to bind ship point buffers")?;

        Ok(Self {
            position,
            light,
            water,
            color,
            plane_id,
            texture_coordinates,
            attribute_set,
        })
    }

    #[inline]
    pub(crate) fn point_count(&self) -> usize {
        self.position.len()
    }

    #[inline]
    pub(crate) fn attribute_set(&self) -> AttributeSetId {
        self.attribute_set
    }

    pub(crate) fn upload_immutable_attributes<D: RenderDevice + ?Sized>(
        &self,
        device: &mut D,
        color: &[Color],
        texture_coordinates: &[Vec2],
    ) {
        self.color.upload(device, color);
        self.texture_coordinates.upload(device, texture_coordinates);
    }

    pub(crate) fn upload_points<D: RenderDevice + ?Sized>(
        &self,
        device: &mut D,
        position: &[Vec2],
        light: &[f32],
        water: &[f32],
    ) {
        self.position.upload(device, position);
        self.light.upload(device, light);
        self.water.upload(device, water);
    }

    pub(crate) fn upload_color_range<D: RenderDevice + ?Sized>(
        &self,
        device: &mut D,
        color: &[Color],
        start: usize,
    ) {
        self.color.upload_range(device, color, start);
    }

    pub(crate) fn upload_plane_ids<D: RenderDevice + ?Sized>(&self, device: &mut D, plane_id: &[PlaneId]) {
        self.plane_id.upload(device, plane_id);
    }

    #[cfg(test)]
    pub(crate) fn color_buffer(&self) -> crate::render::BufferId {
        self.color.buffer()
    }

    #[cfg(test)]
    pub(crate) fn position_buffer(&self) -> crate::render::BufferId {
        self.position.buffer()
    }

    pub(crate) fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        device.release_attribute_set(self.attribute_set);
        self.position.release(device);
        self.light.release(device);
        self.water.release(device);
        self.color.release(device);
        self.plane_id.release(device);
        self.texture_coordinates.release(device);
    }
}
