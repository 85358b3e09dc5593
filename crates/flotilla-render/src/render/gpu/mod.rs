//! `RenderDevice` backed by wgpu.
//!
//! Draws are recorded as the ship contexts issue them, each with a snapshot of
//! its program's parameters and the cursor state. `encode` replays the frame
//! into a single render pass.
//!
//! Buffer writes reach the GPU before any draw of the frame, so a buffer must
//! not be rewritten after it has been drawn from within the same frame.

mod pipelines;
mod textures;
mod uniforms;

use anyhow::{Result, ensure};
use image::RgbaImage;
use slotmap::SlotMap;

use crate::coords::Viewport;
use crate::render::{
    ArrayDraw, AttributeSetId, BindingCursor, BufferId, BufferUsage, ElementDraw,
    PointAttributeBuffers, Primitive, ProgramKind, ProgramParameter, ProgramParameters,
    RenderCtx, RenderDevice, RenderTarget, TextureFilter, TextureId, TextureSampling, TextureWrap,
    VertexLayout,
};

use pipelines::{BindGroupLayouts, PipelineCache, PipelineKey, bind_slots};
use textures::GpuTexture;
use uniforms::{DrawUniforms, UniformRing};

const MIN_BUFFER_SIZE: u64 = 16;

fn storage_size(size: u64) -> u64 {
    size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT)
        .saturating_mul(wgpu::COPY_BUFFER_ALIGNMENT)
        .max(MIN_BUFFER_SIZE)
}

struct GpuBuffer {
    label: &'static str,
    buffer: wgpu::Buffer,
    /// Logical size in bytes.
    size: u64,
    capacity: u64,
    /// Live attribute sets referencing this buffer.
    pinned: u32,
}

struct GpuAttributeSet {
    bind_group: wgpu::BindGroup,
    buffers: [BufferId; 6],
}

#[derive(Debug, Copy, Clone)]
enum RecordedSource {
    Elements {
        attributes: AttributeSetId,
        elements: BufferId,
    },
    Arrays {
        vertices: BufferId,
        first_vertex: u32,
    },
}

#[derive(Debug, Copy, Clone)]
struct RecordedDraw {
    key: PipelineKey,
    source: RecordedSource,
    count: u32,
    uniform_offset: u32,
    texture: Option<TextureId>,
}

pub struct WgpuRenderDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,

    cursor: BindingCursor,
    parameters: [ProgramParameters; ProgramKind::COUNT],

    buffers: SlotMap<BufferId, GpuBuffer>,
    textures: SlotMap<TextureId, GpuTexture>,
    attribute_sets: SlotMap<AttributeSetId, GpuAttributeSet>,

    layouts: BindGroupLayouts,
    pipelines: PipelineCache,
    // Bound to group 2 by element programs that do not sample.
    fallback_texture: GpuTexture,

    uniforms: UniformRing,
    draws: Vec<RecordedDraw>,
    viewport: Viewport,
    warned_missing_texture: bool,
}

impl WgpuRenderDevice {
    pub fn new(ctx: &RenderCtx<'_>) -> Result<Self> {
        let polygon_line_supported = ctx.device.features().contains(wgpu::Features::POLYGON_MODE_LINE);
        if !polygon_line_supported {
            log::info!("render device: POLYGON_MODE_LINE not available");
        }

        let layouts = BindGroupLayouts::new(ctx.device);
        let fallback_texture = textures::create_texture(
            ctx.device,
            ctx.queue,
            &layouts.texture,
            "flotilla fallback texture",
            &RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])),
            TextureSampling {
                wrap: TextureWrap::ClampToEdge,
                filter: TextureFilter::Nearest,
                mipmaps: false,
            },
        )?;

        let alignment = ctx.device.limits().min_uniform_buffer_offset_alignment;

        Ok(Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            cursor: BindingCursor::default(),
            parameters: [ProgramParameters::default(); ProgramKind::COUNT],
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            attribute_sets: SlotMap::with_key(),
            pipelines: PipelineCache::new(ctx.surface_format, ctx.depth_format, polygon_line_supported),
            layouts,
            fallback_texture,
            uniforms: UniformRing::new(alignment),
            draws: Vec::new(),
            viewport: ctx.viewport,
            warned_missing_texture: false,
        })
    }

    /// Starts recording a frame for a surface of the given format and size.
    pub fn begin_frame(&mut self, viewport: Viewport, color_format: wgpu::TextureFormat) {
        self.draws.clear();
        self.uniforms.clear();
        self.viewport = viewport;
        self.pipelines.set_color_format(color_format);
    }

    /// Number of draws recorded since `begin_frame`.
    pub fn recorded_draw_count(&self) -> usize {
        self.draws.len()
    }

    /// Replays the recorded frame into one pass that clears color and depth.
    pub fn encode(&mut self, target: &mut RenderTarget<'_>, clear_color: wgpu::Color) {
        for i in 0..self.draws.len() {
            let key = self.draws[i].key;
            self.pipelines.ensure(&self.device, &self.layouts, key);
        }
        self.uniforms.upload(&self.device, &self.queue, &self.layouts.uniforms);

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("flotilla ship pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let Some(uniform_group) = self.uniforms.bind_group() else { return };

        for draw in &self.draws {
            let Some(pipeline) = self.pipelines.get(&draw.key) else { continue };
            let slots = bind_slots(draw.key.program);

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, uniform_group, &[draw.uniform_offset]);

            if let Some(group) = slots.texture {
                let texture = draw
                    .texture
                    .and_then(|t| self.textures.get(t))
                    .unwrap_or(&self.fallback_texture);
                rpass.set_bind_group(group, &texture.bind_group, &[]);
            }

            match draw.source {
                RecordedSource::Elements { attributes, elements } => {
                    let Some(set) = self.attribute_sets.get(attributes) else {
                        log::warn!("render device: draw references a released attribute set");
                        continue;
                    };
                    let Some(elements) = self.buffers.get(elements) else {
                        log::warn!("render device: draw references a released element buffer");
                        continue;
                    };
                    if let Some(group) = slots.points {
                        rpass.set_bind_group(group, &set.bind_group, &[]);
                    }

                    let arity = u64::from(draw.key.primitive.indices_per_element());
                    let bytes = u64::from(draw.count) * arity * 4;
                    let slice = elements.buffer.slice(0..bytes);
                    match draw.key.primitive {
                        Primitive::Points | Primitive::Lines => {
                            rpass.set_vertex_buffer(0, slice);
                            rpass.draw(0..6, 0..draw.count);
                        }
                        Primitive::Triangles => {
                            rpass.set_index_buffer(slice, wgpu::IndexFormat::Uint32);
                            rpass.draw_indexed(0..draw.count * 3, 0, 0..1);
                        }
                    }
                }
                RecordedSource::Arrays { vertices, first_vertex } => {
                    let Some(vertices) = self.buffers.get(vertices) else {
                        log::warn!("render device: draw references a released vertex buffer");
                        continue;
                    };
                    rpass.set_vertex_buffer(0, vertices.buffer.slice(0..vertices.capacity));
                    rpass.draw(first_vertex..first_vertex + draw.count, 0..1);
                }
            }
        }
    }

    fn record(&mut self, primitive: Primitive, source: RecordedSource, count: u32) {
        let program = self
            .cursor
            .program()
            .unwrap_or_else(|| panic!("draw issued with no active program"));

        let texture = match program.texture_slot() {
            Some(slot) => match self.cursor.bound_texture(slot) {
                Some(t) => Some(t),
                None => {
                    if !self.warned_missing_texture {
                        log::warn!("render device: {program:?} drawn with no texture on {slot:?}; skipped");
                        self.warned_missing_texture = true;
                    }
                    return;
                }
            },
            None => None,
        };

        let snapshot = DrawUniforms::snapshot(&self.parameters[program.index()], &self.cursor, self.viewport);
        let uniform_offset = self.uniforms.push(&snapshot);

        self.draws.push(RecordedDraw {
            key: PipelineKey::new(program, primitive, self.cursor.polygon_mode()),
            source,
            count,
            uniform_offset,
            texture,
        });
    }

    fn new_wgpu_buffer(&self, label: &'static str, capacity: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::INDEX
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn buffer(&self, id: BufferId) -> &GpuBuffer {
        self.buffers
            .get(id)
            .unwrap_or_else(|| panic!("unknown buffer {id:?}"))
    }
}

impl RenderDevice for WgpuRenderDevice {
    fn cursor(&self) -> &BindingCursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut BindingCursor {
        &mut self.cursor
    }

    fn create_buffer(&mut self, label: &'static str, size: u64, _usage: BufferUsage) -> Result<BufferId> {
        let max = self.device.limits().max_buffer_size;
        ensure!(size <= max, "{label}: {size} bytes exceeds the device limit of {max}");

        let capacity = storage_size(size);
        let buffer = self.new_wgpu_buffer(label, capacity);
        Ok(self.buffers.insert(GpuBuffer {
            label,
            buffer,
            size,
            capacity,
            pinned: 0,
        }))
    }

    fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let b = self.buffer(id);
        let end = offset + data.len() as u64;
        assert!(end <= b.size, "{}: write of {end} bytes past size {}", b.label, b.size);
        self.queue.write_buffer(&b.buffer, offset, data);
    }

    fn upload_buffer(&mut self, id: BufferId, data: &[u8], _usage: BufferUsage) -> Result<()> {
        let required = data.len() as u64;
        let (label, capacity, pinned) = {
            let b = self.buffer(id);
            (b.label, b.capacity, b.pinned)
        };

        if required > capacity {
            assert!(pinned == 0, "{label}: cannot grow a buffer held by an attribute set");
            let max = self.device.limits().max_buffer_size;
            ensure!(required <= max, "{label}: {required} bytes exceeds the device limit of {max}");

            let capacity = storage_size(required).next_power_of_two();
            let buffer = self.new_wgpu_buffer(label, capacity);
            log::debug!("{label}: grew to {capacity} bytes");
            if let Some(b) = self.buffers.get_mut(id) {
                b.buffer = buffer;
                b.capacity = capacity;
            }
        }

        if let Some(b) = self.buffers.get_mut(id) {
            b.size = required;
            if !data.is_empty() {
                self.queue.write_buffer(&b.buffer, 0, data);
            }
        }
        Ok(())
    }

    fn allocate_buffer(&mut self, id: BufferId, size: u64) -> Result<()> {
        let (label, pinned) = {
            let b = self.buffer(id);
            (b.label, b.pinned)
        };
        assert!(pinned == 0, "{label}: cannot reallocate a buffer held by an attribute set");
        let max = self.device.limits().max_buffer_size;
        ensure!(size <= max, "{label}: {size} bytes exceeds the device limit of {max}");

        let capacity = storage_size(size);
        let buffer = self.new_wgpu_buffer(label, capacity);
        if let Some(b) = self.buffers.get_mut(id) {
            b.buffer = buffer;
            b.size = size;
            b.capacity = capacity;
        }
        Ok(())
    }

    fn buffer_size(&self, id: BufferId) -> u64 {
        self.buffer(id).size
    }

    fn release_buffer(&mut self, id: BufferId) {
        let b = self
            .buffers
            .remove(id)
            .unwrap_or_else(|| panic!("unknown buffer {id:?}"));
        assert!(b.pinned == 0, "{}: released while held by an attribute set", b.label);
        b.buffer.destroy();
    }

    fn create_attribute_set(
        &mut self,
        label: &'static str,
        buffers: &PointAttributeBuffers,
    ) -> Result<AttributeSetId> {
        let ids = buffers.all();
        let entries: Vec<wgpu::BindGroupEntry<'_>> = ids
            .iter()
            .enumerate()
            .map(|(binding, &id)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: self.buffer(id).buffer.as_entire_binding(),
            })
            .collect();

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layouts.points,
            entries: &entries,
        });

        for id in ids {
            if let Some(b) = self.buffers.get_mut(id) {
                b.pinned += 1;
            }
        }
        Ok(self.attribute_sets.insert(GpuAttributeSet {
            bind_group,
            buffers: ids,
        }))
    }

    fn release_attribute_set(&mut self, set: AttributeSetId) {
        let set = self
            .attribute_sets
            .remove(set)
            .unwrap_or_else(|| panic!("unknown attribute set {set:?}"));
        for id in set.buffers {
            if let Some(b) = self.buffers.get_mut(id) {
                b.pinned = b.pinned.saturating_sub(1);
            }
        }
    }

    fn create_texture(
        &mut self,
        label: &'static str,
        image: &RgbaImage,
        sampling: TextureSampling,
    ) -> Result<TextureId> {
        let texture = textures::create_texture(
            &self.device,
            &self.queue,
            &self.layouts.texture,
            label,
            image,
            sampling,
        )?;
        Ok(self.textures.insert(texture))
    }

    fn release_texture(&mut self, texture: TextureId) {
        let t = self
            .textures
            .remove(texture)
            .unwrap_or_else(|| panic!("unknown texture {texture:?}"));
        log::trace!("{}: released", t.label);
        self.cursor.unbind(texture);
    }

    fn set_program_parameter(&mut self, parameter: ProgramParameter) {
        let program = self
            .cursor
            .program()
            .unwrap_or_else(|| panic!("parameter set with no active program"));
        self.parameters[program.index()].apply(parameter);
    }

    fn draw_elements(&mut self, draw: ElementDraw) {
        let needed = u64::from(draw.element_count) * u64::from(draw.primitive.indices_per_element()) * 4;
        let size = self.buffer(draw.elements).size;
        assert!(needed <= size, "element draw reads {needed} bytes from a {size}-byte buffer");
        if draw.element_count == 0 {
            return;
        }
        self.record(
            draw.primitive,
            RecordedSource::Elements {
                attributes: draw.attributes,
                elements: draw.elements,
            },
            draw.element_count,
        );
    }

    fn draw_arrays(&mut self, draw: ArrayDraw) {
        let stride = match draw.layout {
            VertexLayout::GenericTexture => 40,
            VertexLayout::Position2 => 8,
        };
        let end = (u64::from(draw.first_vertex) + u64::from(draw.vertex_count)) * stride;
        let size = self.buffer(draw.vertices).size;
        assert!(end <= size, "array draw reads {end} bytes from a {size}-byte buffer");
        if draw.vertex_count == 0 {
            return;
        }
        self.record(
            draw.primitive,
            RecordedSource::Arrays {
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

    #[test]
    fn storage_sizes_are_copy_aligned() {
        assert_eq!(storage_size(0), MIN_BUFFER_SIZE);
        assert_eq!(storage_size(17), 20);
        assert_eq!(storage_size(4096), 4096);
    }
}
