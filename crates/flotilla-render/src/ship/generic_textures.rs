//! Textured quads drawn from the shared atlas, grouped by connected component.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};

use crate::atlas::AtlasFrameMetadata;
use crate::coords::Vec2;
use crate::render::{BufferUsage, GrowOnlyArena, RenderDevice};

use super::PlaneId;

/// One vertex of a generic-texture quad.
///
/// Ten floats: placement (`center`, `vertex_offset`), texture coordinate, then
/// the packed `plane_id, scale, angle, alpha`. The vertex shader rotates and
/// scales the offset about the centre.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct TextureRenderPolygonVertex {
    pub center_position: Vec2,
    pub vertex_offset: Vec2,
    pub texture_coordinate: Vec2,
    pub plane_id: f32,
    pub scale: f32,
    pub angle: f32,
    pub alpha: f32,
}

pub const VERTICES_PER_QUAD: usize = 6;

/// Upper bound (exclusive) on connected-component ids.
pub const MAX_GENERIC_TEXTURE_COMPONENTS: usize = 1 << 16;

/// Where and how one atlas frame is drawn.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GenericTexturePlacement {
    pub position: Vec2,
    pub scale: f32,
    /// Radians, counter-clockwise.
    pub angle: f32,
    pub alpha: f32,
    pub plane_id: PlaneId,
}

/// Builds the two triangles of a quad showing `frame` at `placement`.
pub fn build_quad(
    frame: &AtlasFrameMetadata,
    placement: &GenericTexturePlacement,
) -> [TextureRenderPolygonVertex; VERTICES_PER_QUAD] {
    let left = -frame.anchor_world.x;
    let right = frame.world_width - frame.anchor_world.x;
    let top = frame.world_height - frame.anchor_world.y;
    let bottom = -frame.anchor_world.y;

    let uv_bl = frame.texture_coordinates_bottom_left;
    let uv_tr = frame.texture_coordinates_top_right;

    let vertex = |offset: Vec2, uv: Vec2| TextureRenderPolygonVertex {
        center_position: placement.position,
        vertex_offset: offset,
        texture_coordinate: uv,
        plane_id: placement.plane_id as f32,
        scale: placement.scale,
        angle: placement.angle,
        alpha: placement.alpha,
    };

    let top_left = vertex(Vec2::new(left, top), Vec2::new(uv_bl.x, uv_tr.y));
    let bottom_left = vertex(Vec2::new(left, bottom), uv_bl);
    let top_right = vertex(Vec2::new(right, top), uv_tr);
    let bottom_right = vertex(Vec2::new(right, bottom), Vec2::new(uv_tr.x, uv_bl.y));

    [top_left, bottom_left, top_right, bottom_left, top_right, bottom_right]
}

/// Contiguous range of the packed vertex buffer belonging to one component.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct ComponentRange {
    pub(crate) first_vertex: u32,
    pub(crate) vertex_count: u32,
}

/// Per-frame component list packed into one grow-only vertex buffer.
#[derive(Debug)]
pub(crate) struct GenericTextureBatch {
    components: Vec<Vec<TextureRenderPolygonVertex>>,
    active_components: usize,
    packed: Vec<TextureRenderPolygonVertex>,
    peak_vertex_count: usize,
    vertices: GrowOnlyArena<TextureRenderPolygonVertex>,
}

impl GenericTextureBatch {
    pub(crate) fn new<D: RenderDevice + ?Sized>(device: &mut D) -> Result<Self> {
        Ok(Self {
            components: Vec::new(),
            active_components: 0,
            packed: Vec::new(),
            peak_vertex_count: 0,
            vertices: GrowOnlyArena::new(device, "generic texture vertices", 0, BufferUsage::Dynamic)?,
        })
    }

    /// Empties every component and resets the per-frame peak.
    ///
    /// Component vectors are kept so their capacity is reused.
    pub(crate) fn reset(&mut self) {
        for c in &mut self.components[..self.active_components] {
            c.clear();
        }
        self.active_components = 0;
        self.peak_vertex_count = 0;
    }

    /// Appends a new component after every existing one.
    pub(crate) fn add_component(&mut self, vertices: &[TextureRenderPolygonVertex]) {
        let id = self.active_components;
        self.component_mut(id).extend_from_slice(vertices);
        self.peak_vertex_count += vertices.len();
    }

    /// Appends to component `id`, growing the list with empty components.
    pub(crate) fn append(&mut self, id: usize, vertices: &[TextureRenderPolygonVertex]) {
        self.component_mut(id).extend_from_slice(vertices);
        self.peak_vertex_count += vertices.len();
    }

    fn component_mut(&mut self, id: usize) -> &mut Vec<TextureRenderPolygonVertex> {
        assert!(
            id < MAX_GENERIC_TEXTURE_COMPONENTS,
            "generic texture component {id} out of range (max {MAX_GENERIC_TEXTURE_COMPONENTS})"
        );
        if id >= self.components.len() {
            self.components.resize_with(id + 1, Vec::new);
        }
        self.active_components = self.active_components.max(id + 1);
        &mut self.components[id]
    }

    #[cfg(test)]
    pub(crate) fn component_count(&self) -> usize {
        self.active_components
    }

    #[inline]
    pub(crate) fn peak_vertex_count(&self) -> usize {
        self.peak_vertex_count
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.vertices.capacity()
    }

    #[inline]
    pub(crate) fn buffer(&self) -> crate::render::BufferId {
        self.vertices.buffer()
    }

    /// Packs the non-empty components back to back and transfers them.
    ///
    /// Returns the draw range of each non-empty component, in list order.
    pub(crate) fn transfer<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<Vec<ComponentRange>> {
        self.packed.clear();
        let mut ranges = Vec::new();
        for c in self.components[..self.active_components].iter().filter(|c| !c.is_empty()) {
            ranges.push(ComponentRange {
                first_vertex: self.packed.len() as u32,
                vertex_count: c.len() as u32,
            });
            self.packed.extend_from_slice(c);
        }

        if self.packed.is_empty() {
            return Ok(ranges);
        }

        self.vertices.reserve(device, self.peak_vertex_count.max(self.packed.len()))?;
        self.vertices.write(device, &self.packed, 0);
        Ok(ranges)
    }

    pub(crate) fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        self.vertices.release(device);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::render::RecordingDevice;

    fn frame() -> AtlasFrameMetadata {
        AtlasFrameMetadata {
            texture_coordinates_bottom_left: Vec2::new(0.25, 0.5),
            texture_coordinates_top_right: Vec2::new(0.5, 0.75),
            world_width: 2.0,
            world_height: 1.0,
            anchor_world: Vec2::new(1.0, 0.5),
        }
    }

    fn placement() -> GenericTexturePlacement {
        GenericTexturePlacement {
            position: Vec2::new(3.0, 4.0),
            scale: 1.0,
            angle: 0.0,
            alpha: 0.5,
            plane_id: 2,
        }
    }

    fn quad() -> Vec<TextureRenderPolygonVertex> {
        build_quad(&frame(), &placement()).to_vec()
    }

    // ── quad ─────────────────────────────────────────────────────────────

    #[test]
    fn quad_offsets_are_relative_to_anchor() {
        let q = build_quad(&frame(), &placement());
        let xs: Vec<f32> = q.iter().map(|v| v.vertex_offset.x).collect();
        let ys: Vec<f32> = q.iter().map(|v| v.vertex_offset.y).collect();
        assert_relative_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), -1.0);
        assert_relative_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 1.0);
        assert_relative_eq!(ys.iter().cloned().fold(f32::MAX, f32::min), -0.5);
        assert_relative_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), 0.5);
        assert!(q.iter().all(|v| v.center_position == Vec2::new(3.0, 4.0)));
        assert!(q.iter().all(|v| v.plane_id == 2.0 && v.alpha == 0.5));
    }

    #[test]
    fn quad_uvs_follow_corners() {
        let q = build_quad(&frame(), &placement());
        // bottom-left vertex
        assert_eq!(q[1].texture_coordinate, Vec2::new(0.25, 0.5));
        // bottom-right vertex
        assert_eq!(q[5].texture_coordinate, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn vertex_is_ten_floats() {
        assert_eq!(std::mem::size_of::<TextureRenderPolygonVertex>(), 40);
    }

    // ── batch ────────────────────────────────────────────────────────────

    #[test]
    fn components_pack_contiguously_skipping_empty() {
        let mut dev = RecordingDevice::new();
        let mut batch = GenericTextureBatch::new(&mut dev).unwrap();
        batch.add_component(&quad());
        batch.append(3, &quad());
        batch.append(3, &quad());

        let ranges = batch.transfer(&mut dev).unwrap();
        assert_eq!(
            ranges,
            vec![
                ComponentRange { first_vertex: 0, vertex_count: 6 },
                ComponentRange { first_vertex: 6, vertex_count: 12 },
            ]
        );
        assert_eq!(batch.component_count(), 4);
        assert_eq!(batch.peak_vertex_count(), 18);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn component_id_past_bound_panics() {
        let mut dev = RecordingDevice::new();
        let mut batch = GenericTextureBatch::new(&mut dev).unwrap();
        batch.append(usize::MAX, &quad());
    }

    #[test]
    fn last_component_id_is_accepted() {
        let mut dev = RecordingDevice::new();
        let mut batch = GenericTextureBatch::new(&mut dev).unwrap();
        batch.append(MAX_GENERIC_TEXTURE_COMPONENTS - 1, &[]);
        assert_eq!(batch.component_count(), MAX_GENERIC_TEXTURE_COMPONENTS);
    }

    #[test]
    fn capacity_never_shrinks_below_reached_peak() {
        let mut dev = RecordingDevice::new();
        let mut batch = GenericTextureBatch::new(&mut dev).unwrap();

        for _ in 0..4 {
            batch.add_component(&quad());
        }
        batch.transfer(&mut dev).unwrap();
        assert_eq!(batch.capacity(), 24);

        batch.reset();
        assert_eq!(batch.peak_vertex_count(), 0);
        batch.add_component(&quad());
        batch.transfer(&mut dev).unwrap();
        assert_eq!(batch.capacity(), 24);

        batch.reset();
        batch.transfer(&mut dev).unwrap();
        assert_eq!(batch.capacity(), 24);
    }
}
