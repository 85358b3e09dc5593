use anyhow::Result;
use image::RgbaImage;

use super::program::{ProgramKind, ProgramParameter, TextureSlot};

slotmap::new_key_type! {
    /// Handle to a device buffer.
    pub struct BufferId;
    /// Handle to a device texture.
    pub struct TextureId;
    /// Handle to a bound set of the six point attribute buffers.
    pub struct AttributeSetId;
}

/// Update cadence hint for a buffer's contents.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    /// Written rarely, drawn many times.
    Static,
    /// Rewritten every frame.
    Dynamic,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    Triangles,
}

impl Primitive {
    #[inline]
    pub const fn indices_per_element(self) -> u32 {
        match self {
            Primitive::Points => 1,
            Primitive::Lines => 2,
            Primitive::Triangles => 3,
        }
    }
}

/// How filled primitives are rasterized.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
}

/// Layout of a vertex buffer consumed by `draw_arrays`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexLayout {
    /// `TextureRenderPolygonVertex` (10 floats).
    GenericTexture,
    /// A bare `Vec2` position.
    Position2,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureWrap {
    Repeat,
    ClampToEdge,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// Sampling state baked into a texture at creation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureSampling {
    pub wrap: TextureWrap,
    pub filter: TextureFilter,
    /// Build a full box-filtered mip chain, sampled with nearest-mip filtering.
    pub mipmaps: bool,
}

/// The six per-point buffers a ship's element draws index into.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PointAttributeBuffers {
    pub position: BufferId,
    pub light: BufferId,
    pub water: BufferId,
    pub color: BufferId,
    pub plane_id: BufferId,
    pub texture_coordinates: BufferId,
}

impl PointAttributeBuffers {
    pub fn all(&self) -> [BufferId; 6] {
        [
            self.position,
            self.light,
            self.water,
            self.color,
            self.plane_id,
            self.texture_coordinates,
        ]
    }
}

/// Indexed draw over a ship's point attributes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ElementDraw {
    pub primitive: Primitive,
    pub attributes: AttributeSetId,
    pub elements: BufferId,
    /// Number of elements (not indices).
    pub element_count: u32,
}

/// Non-indexed draw over a self-contained vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ArrayDraw {
    pub primitive: Primitive,
    pub layout: VertexLayout,
    pub vertices: BufferId,
    pub first_vertex: u32,
    pub vertex_count: u32,
}

/// Binding state shared by every draw issued through a device.
///
/// Draws read whatever is current here, so each draw sets what it depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingCursor {
    program: Option<ProgramKind>,
    active_slot: TextureSlot,
    bound: [Option<TextureId>; TextureSlot::COUNT],
    line_width: f32,
    point_size: f32,
    polygon_mode: PolygonMode,
}

impl BindingCursor {
    #[inline]
    pub fn program(&self) -> Option<ProgramKind> {
        self.program
    }

    #[inline]
    pub fn active_slot(&self) -> TextureSlot {
        self.active_slot
    }

    #[inline]
    pub fn bound_texture(&self, slot: TextureSlot) -> Option<TextureId> {
        self.bound[slot.index()]
    }

    #[inline]
    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    #[inline]
    pub fn point_size(&self) -> f32 {
        self.point_size
    }

    #[inline]
    pub fn polygon_mode(&self) -> PolygonMode {
        self.polygon_mode
    }

    pub fn set_program(&mut self, program: ProgramKind) {
        self.program = Some(program);
    }

    pub fn set_active_slot(&mut self, slot: TextureSlot) {
        self.active_slot = slot;
    }

    /// Binds `texture` to the active slot.
    pub fn bind(&mut self, texture: TextureId) {
        self.bound[self.active_slot.index()] = Some(texture);
    }

    /// Clears every slot holding `texture`.
    pub fn unbind(&mut self, texture: TextureId) {
        for slot in &mut self.bound {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.line_width = width;
    }

    pub fn set_point_size(&mut self, size: f32) {
        self.point_size = size;
    }

    pub fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.polygon_mode = mode;
    }
}

impl Default for BindingCursor {
    fn default() -> Self {
        Self {
            program: None,
            active_slot: TextureSlot::SharedTexture,
            bound: [None; TextureSlot::COUNT],
            line_width: 1.0,
            point_size: 1.0,
            polygon_mode: PolygonMode::Fill,
        }
    }
}

/// The rendering device a ship context draws through.
///
/// Resource creation and growth are fallible; writes, binds and draws are not.
/// Passing a handle the device does not know is a caller bug and panics.
pub trait RenderDevice {
    fn cursor(&self) -> &BindingCursor;
    fn cursor_mut(&mut self) -> &mut BindingCursor;

    // ── buffers ──────────────────────────────────────────────────────────

    /// Creates a zero-filled buffer of at least `size` bytes.
    fn create_buffer(&mut self, label: &'static str, size: u64, usage: BufferUsage) -> Result<BufferId>;

    /// Writes `data` at `offset`; the range must fit the buffer's size.
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);

    /// Replaces the buffer's contents with `data`; its size becomes `data.len()`.
    ///
    /// Existing storage is reused when the data fits.
    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8], usage: BufferUsage) -> Result<()>;

    /// Reallocates the buffer to `size` bytes. Previous contents are discarded.
    fn allocate_buffer(&mut self, buffer: BufferId, size: u64) -> Result<()>;

    fn buffer_size(&self, buffer: BufferId) -> u64;

    fn release_buffer(&mut self, buffer: BufferId);

    // ── point attribute sets ─────────────────────────────────────────────

    /// Groups the six point buffers so element draws can index into them.
    ///
    /// Member buffers must not be reallocated while the set is alive.
    fn create_attribute_set(
        &mut self,
        label: &'static str,
        buffers: &PointAttributeBuffers,
    ) -> Result<AttributeSetId>;

    fn release_attribute_set(&mut self, set: AttributeSetId);

    // ── textures ─────────────────────────────────────────────────────────

    fn create_texture(
        &mut self,
        label: &'static str,
        image: &RgbaImage,
        sampling: TextureSampling,
    ) -> Result<TextureId>;

    fn release_texture(&mut self, texture: TextureId);

    // ── state ────────────────────────────────────────────────────────────

    fn activate_program(&mut self, program: ProgramKind) {
        self.cursor_mut().set_program(program);
    }

    /// Sets a parameter on the active program. The value sticks to that program.
    fn set_program_parameter(&mut self, parameter: ProgramParameter);

    fn activate_texture(&mut self, slot: TextureSlot) {
        self.cursor_mut().set_active_slot(slot);
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.cursor_mut().bind(texture);
    }

    /// Line width in canvas pixels.
    fn set_line_width(&mut self, width: f32) {
        self.cursor_mut().set_line_width(width);
    }

    /// Point size in canvas pixels.
    fn set_point_size(&mut self, size: f32) {
        self.cursor_mut().set_point_size(size);
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.cursor_mut().set_polygon_mode(mode);
    }

    // ── draws ────────────────────────────────────────────────────────────

    /// Draws with the active program and the current cursor state.
    fn draw_elements(&mut self, draw: ElementDraw);

    /// Draws with the active program and the current cursor state.
    fn draw_arrays(&mut self, draw: ArrayDraw);
}

/// Sets `parameter` on each of `programs`, leaving the last one active.
pub fn set_parameter_on<D: RenderDevice + ?Sized>(
    device: &mut D,
    programs: &[ProgramKind],
    parameter: ProgramParameter,
) {
    for &program in programs {
        device.activate_program(program);
        device.set_program_parameter(parameter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    // ── cursor ───────────────────────────────────────────────────────────

    #[test]
    fn bind_targets_active_slot() {
        let mut textures: SlotMap<TextureId, ()> = SlotMap::with_key();
        let a = textures.insert(());
        let b = textures.insert(());

        let mut cursor = BindingCursor::default();
        cursor.bind(a);
        cursor.set_active_slot(TextureSlot::TextureAtlas);
        cursor.bind(b);

        assert_eq!(cursor.bound_texture(TextureSlot::SharedTexture), Some(a));
        assert_eq!(cursor.bound_texture(TextureSlot::TextureAtlas), Some(b));
    }

    #[test]
    fn unbind_clears_every_slot_holding_texture() {
        let mut textures: SlotMap<TextureId, ()> = SlotMap::with_key();
        let a = textures.insert(());

        let mut cursor = BindingCursor::default();
        cursor.bind(a);
        cursor.set_active_slot(TextureSlot::TextureAtlas);
        cursor.bind(a);
        cursor.unbind(a);

        assert_eq!(cursor.bound_texture(TextureSlot::SharedTexture), None);
        assert_eq!(cursor.bound_texture(TextureSlot::TextureAtlas), None);
    }

    #[test]
    fn primitive_arity() {
        assert_eq!(Primitive::Points.indices_per_element(), 1);
        assert_eq!(Primitive::Lines.indices_per_element(), 2);
        assert_eq!(Primitive::Triangles.indices_per_element(), 3);
    }
}
