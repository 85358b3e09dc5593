//! In-memory device that records every call.
//!
//! Buffers keep their bytes so uploads can be read back; draws capture the
//! cursor and program parameters current when they were issued.

use anyhow::{bail, Result};
use bytemuck::Pod;
use image::RgbaImage;
use slotmap::SlotMap;

use super::device::{
    ArrayDraw, AttributeSetId, BindingCursor, BufferId, BufferUsage, ElementDraw,
    PointAttributeBuffers, PolygonMode, Primitive, RenderDevice, TextureId, TextureSampling,
    VertexLayout,
};
use super::program::{ProgramKind, ProgramParameter, ProgramParameters, TextureSlot};

/// One call made on a [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateBuffer { buffer: BufferId, label: &'static str, size: u64, usage: BufferUsage },
    WriteBuffer { buffer: BufferId, offset: u64, len: usize },
    UploadBuffer { buffer: BufferId, len: usize, usage: BufferUsage },
    AllocateBuffer { buffer: BufferId, size: u64 },
    ReleaseBuffer(BufferId),
    CreateAttributeSet(AttributeSetId),
    ReleaseAttributeSet(AttributeSetId),
    CreateTexture { texture: TextureId, label: &'static str, width: u32, height: u32, sampling: TextureSampling },
    ReleaseTexture(TextureId),
    ActivateProgram(ProgramKind),
    SetProgramParameter { program: ProgramKind, parameter: ProgramParameter },
    ActivateTexture(TextureSlot),
    BindTexture(TextureId),
    SetLineWidth(f32),
    SetPointSize(f32),
    SetPolygonMode(PolygonMode),
    Draw(DrawRecord),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DrawSource {
    Elements { attributes: AttributeSetId, elements: BufferId },
    Arrays { layout: VertexLayout, vertices: BufferId, first_vertex: u32 },
}

/// Snapshot of a draw and the state it was issued with.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramKind,
    pub primitive: Primitive,
    pub source: DrawSource,
    /// Elements for element draws, vertices for array draws.
    pub count: u32,
    pub texture: Option<TextureId>,
    pub line_width: f32,
    pub point_size: f32,
    pub polygon_mode: PolygonMode,
    pub parameters: ProgramParameters,
}

#[derive(Debug)]
struct RecordedBuffer {
    label: &'static str,
    bytes: Vec<u8>,
    pinned: u32,
}

#[derive(Debug)]
struct RecordedTexture {
    label: &'static str,
    width: u32,
    height: u32,
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    cursor: BindingCursor,
    parameters: [ProgramParameters; ProgramKind::COUNT],
    buffers: SlotMap<BufferId, RecordedBuffer>,
    textures: SlotMap<TextureId, RecordedTexture>,
    attribute_sets: SlotMap<AttributeSetId, PointAttributeBuffers>,
    calls: Vec<DeviceCall>,
    fail_allocations: bool,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent creation or growth fail until reset.
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.calls.iter().filter_map(|c| match c {
            DeviceCall::Draw(d) => Some(d),
            _ => None,
        })
    }

    pub fn buffer_bytes(&self, buffer: BufferId) -> &[u8] {
        &self.buffer(buffer).bytes
    }

    /// Reads a buffer back as a typed vector.
    pub fn buffer_as<T: Pod>(&self, buffer: BufferId) -> Vec<T> {
        bytemuck::pod_collect_to_vec(self.buffer_bytes(buffer))
    }

    pub fn parameters(&self, program: ProgramKind) -> &ProgramParameters {
        &self.parameters[program.index()]
    }

    pub fn texture_size(&self, texture: TextureId) -> (u32, u32) {
        let t = self.texture(texture);
        (t.width, t.height)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_attribute_sets(&self) -> usize {
        self.attribute_sets.len()
    }

    fn buffer(&self, buffer: BufferId) -> &RecordedBuffer {
        self.buffers
            .get(buffer)
            .unwrap_or_else(|| panic!("unknown buffer {buffer:?}"))
    }

    fn buffer_mut(&mut self, buffer: BufferId) -> &mut RecordedBuffer {
        self.buffers
            .get_mut(buffer)
            .unwrap_or_else(|| panic!("unknown buffer {buffer:?}"))
    }

    fn texture(&self, texture: TextureId) -> &RecordedTexture {
        self.textures
            .get(texture)
            .unwrap_or_else(|| panic!("unknown texture {texture:?}"))
    }

    fn record_draw(&mut self, primitive: Primitive, source: DrawSource, count: u32) {
        let program = self
            .cursor
            .program()
            .unwrap_or_else(|| panic!("draw issued with no active program"));
        let texture = program
            .texture_slot()
            .and_then(|slot| self.cursor.bound_texture(slot));

        let record = DrawRecord {
            program,
            primitive,
            source,
            count,
            texture,
            line_width: self.cursor.line_width(),
            point_size: self.cursor.point_size(),
            polygon_mode: self.cursor.polygon_mode(),
            parameters: self.parameters[program.index()],
        };
        self.calls.push(DeviceCall::Draw(record));
    }
}

impl RenderDevice for RecordingDevice {
    fn cursor(&self) -> &BindingCursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut BindingCursor {
        &mut self.cursor
    }

    // ── buffers ──────────────────────────────────────────────────────────

    fn create_buffer(&mut self, label: &'static str, size: u64, usage: BufferUsage) -> Result<BufferId> {
        if self.fail_allocations {
            bail!("allocation of {size} bytes refused");
        }
        let buffer = self.buffers.insert(RecordedBuffer {
            label,
            bytes: vec![0; size as usize],
            pinned: 0,
        });
        self.calls.push(DeviceCall::CreateBuffer { buffer, label, size, usage });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let b = self.buffer_mut(buffer);
        let start = offset as usize;
        let end = start + data.len();
        assert!(
            end <= b.bytes.len(),
            "{}: write {start}..{end} past size {}",
            b.label,
            b.bytes.len()
        );
        b.bytes[start..end].copy_from_slice(data);
        self.calls.push(DeviceCall::WriteBuffer { buffer, offset, len: data.len() });
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8], usage: BufferUsage) -> Result<()> {
        let fail = self.fail_allocations;
        let b = self.buffer_mut(buffer);
        if data.len() > b.bytes.capacity() {
            assert!(b.pinned == 0, "{}: cannot reallocate a buffer in an attribute set", b.label);
            if fail {
                bail!("{}: growth to {} bytes refused", b.label, data.len());
            }
        }
        b.bytes.clear();
        b.bytes.extend_from_slice(data);
        self.calls.push(DeviceCall::UploadBuffer { buffer, len: data.len(), usage });
        Ok(())
    }

    fn allocate_buffer(&mut self, buffer: BufferId, size: u64) -> Result<()> {
        let fail = self.fail_allocations;
        let b = self.buffer_mut(buffer);
        assert!(b.pinned == 0, "{}: cannot reallocate a buffer in an attribute set", b.label);
        if fail {
            bail!("{}: allocation of {size} bytes refused", b.label);
        }
        b.bytes = vec![0; size as usize];
        self.calls.push(DeviceCall::AllocateBuffer { buffer, size });
        Ok(())
    }

    fn buffer_size(&self, buffer: BufferId) -> u64 {
        self.buffer(buffer).bytes.len() as u64
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        let b = self
            .buffers
            .remove(buffer)
            .unwrap_or_else(|| panic!("unknown buffer {buffer:?}"));
        assert!(b.pinned == 0, "{}: released while in an attribute set", b.label);
        self.calls.push(DeviceCall::ReleaseBuffer(buffer));
    }

    // ── point attribute sets ─────────────────────────────────────────────

    fn create_attribute_set(
        &mut self,
        _label: &'static str,
        buffers: &PointAttributeBuffers,
    ) -> Result<AttributeSetId> {
        if self.fail_allocations {
            bail!("attribute set creation refused");
        }
        for id in buffers.all() {
            self.buffer_mut(id).pinned += 1;
        }
        let set = self.attribute_sets.insert(*buffers);
        self.calls.push(DeviceCall::CreateAttributeSet(set));
        Ok(set)
    }

    fn release_attribute_set(&mut self, set: AttributeSetId) {
        let buffers = self
            .attribute_sets
            .remove(set)
            .unwrap_or_else(|| panic!("unknown attribute set {set:?}"));
        for id in buffers.all() {
            self.buffer_mut(id).pinned -= 1;
        }
        self.calls.push(DeviceCall::ReleaseAttributeSet(set));
    }

    // ── textures ─────────────────────────────────────────────────────────

    fn create_texture(
        &mut self,
        label: &'static str,
        image: &RgbaImage,
        sampling: TextureSampling,
    ) -> Result<TextureId> {
        if self.fail_allocations {
            bail!("{label}: texture creation refused");
        }
        let (width, height) = image.dimensions();
        let texture = self.textures.insert(RecordedTexture { label, width, height });
        self.calls.push(DeviceCall::CreateTexture { texture, label, width, height, sampling });
        Ok(texture)
    }

    fn release_texture(&mut self, texture: TextureId) {
        let t = self
            .textures
            .remove(texture)
            .unwrap_or_else(|| panic!("unknown texture {texture:?}"));
        log::trace!("released texture {}", t.label);
        self.cursor.unbind(texture);
        self.calls.push(DeviceCall::ReleaseTexture(texture));
    }

    // ── state ────────────────────────────────────────────────────────────

    fn activate_program(&mut self, program: ProgramKind) {
        self.cursor.set_program(program);
        self.calls.push(DeviceCall::ActivateProgram(program));
    }

    fn set_program_parameter(&mut self, parameter: ProgramParameter) {
        let program = self
            .cursor
            .program()
            .unwrap_or_else(|| panic!("parameter set with no active program"));
        self.parameters[program.index()].apply(parameter);
        self.calls.push(DeviceCall::SetProgramParameter { program, parameter });
    }

    fn activate_texture(&mut self, slot: TextureSlot) {
        self.cursor.set_active_slot(slot);
        self.calls.push(DeviceCall::ActivateTexture(slot));
    }

    fn bind_texture(&mut self, texture: TextureId) {
        assert!(self.textures.contains_key(texture), "unknown texture {texture:?}");
        self.cursor.bind(texture);
        self.calls.push(DeviceCall::BindTexture(texture));
    }

    fn set_line_width(&mut self, width: f32) {
        self.cursor.set_line_width(width);
        self.calls.push(DeviceCall::SetLineWidth(width));
    }

    fn set_point_size(&mut self, size: f32) {
        self.cursor.set_point_size(size);
        self.calls.push(DeviceCall::SetPointSize(size));
    }

    fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.cursor.set_polygon_mode(mode);
        self.calls.push(DeviceCall::SetPolygonMode(mode));
    }

    // ── draws ────────────────────────────────────────────────────────────

    fn draw_elements(&mut self, draw: ElementDraw) {
        assert!(
            self.attribute_sets.contains_key(draw.attributes),
            "unknown attribute set {:?}",
            draw.attributes
        );
        let needed = u64::from(draw.element_count) * u64::from(draw.primitive.indices_per_element()) * 4;
        let size = self.buffer_size(draw.elements);
        assert!(needed <= size, "element draw reads {needed} bytes from a {size}-byte buffer");

        self.record_draw(
            draw.primitive,
            DrawSource::Elements { attributes: draw.attributes, elements: draw.elements },
            draw.element_count,
        );
    }

    fn draw_arrays(&mut self, draw: ArrayDraw) {
        assert!(self.buffers.contains_key(draw.vertices), "unknown buffer {:?}", draw.vertices);
        self.record_draw(
            draw.primitive,
            DrawSource::Arrays {
                layout: draw.layout,
                vertices: draw.vertices,
                first_vertex: draw.first_vertex,
            },
            draw.vertex_count,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── buffers ──────────────────────────────────────────────────────────

    #[test]
    fn upload_sets_size_to_data() {
        let mut dev = RecordingDevice::new();
        let b = dev.create_buffer("e", 64, BufferUsage::Static).unwrap();
        dev.upload_buffer(b, &[1, 2, 3, 4], BufferUsage::Static).unwrap();
        assert_eq!(dev.buffer_size(b), 4);
        assert_eq!(dev.buffer_bytes(b), &[1, 2, 3, 4]);
    }

    #[test]
    fn failing_allocations_surface_as_errors() {
        let mut dev = RecordingDevice::new();
        dev.set_fail_allocations(true);
        assert!(dev.create_buffer("e", 4, BufferUsage::Static).is_err());
    }

    #[test]
    #[should_panic(expected = "attribute set")]
    fn pinned_buffers_cannot_be_reallocated() {
        let mut dev = RecordingDevice::new();
        let mut ids = Vec::new();
        for _ in 0..6 {
            ids.push(dev.create_buffer("p", 8, BufferUsage::Static).unwrap());
        }
        let set = PointAttributeBuffers {
            position: ids[0],
            light: ids[1],
            water: ids[2],
            color: ids[3],
            plane_id: ids[4],
            texture_coordinates: ids[5],
        };
        dev.create_attribute_set("points", &set).unwrap();
        dev.allocate_buffer(ids[0], 16).unwrap();
    }

    // ── draws ────────────────────────────────────────────────────────────

    #[test]
    fn draw_captures_parameters_of_its_program() {
        let mut dev = RecordingDevice::new();
        let vertices = dev.create_buffer("v", 16, BufferUsage::Dynamic).unwrap();

        dev.activate_program(ProgramKind::ShipVectors);
        dev.set_program_parameter(ProgramParameter::AmbientLightIntensity(0.25));
        dev.activate_program(ProgramKind::ShipRopes);
        dev.set_program_parameter(ProgramParameter::AmbientLightIntensity(0.75));
        dev.activate_program(ProgramKind::ShipVectors);
        dev.draw_arrays(ArrayDraw {
            primitive: Primitive::Lines,
            layout: VertexLayout::Position2,
            vertices,
            first_vertex: 0,
            vertex_count: 2,
        });

        let draw = dev.draws().next().unwrap();
        assert_eq!(draw.program, ProgramKind::ShipVectors);
        assert_eq!(draw.parameters.ambient_light_intensity, 0.25);
    }

    #[test]
    #[should_panic(expected = "no active program")]
    fn draw_without_program_panics() {
        let mut dev = RecordingDevice::new();
        let vertices = dev.create_buffer("v", 16, BufferUsage::Dynamic).unwrap();
        dev.draw_arrays(ArrayDraw {
            primitive: Primitive::Lines,
            layout: VertexLayout::Position2,
            vertices,
            first_vertex: 0,
            vertex_count: 2,
        });
    }
}
