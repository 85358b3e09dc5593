//! Per-draw uniform snapshots packed into one dynamic-offset buffer.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};

use crate::coords::Viewport;
use crate::render::{BindingCursor, ProgramParameters};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct DrawUniforms {
    pub ortho: [[f32; 4]; 4],
    pub matte_color: [f32; 4],
    pub canvas_size: [f32; 2],
    pub line_width: f32,
    pub point_size: f32,
    pub ambient_light_intensity: f32,
    pub water_contrast: f32,
    pub water_level_threshold: f32,
    pub _pad: f32, // 16-byte alignment
}

impl DrawUniforms {
    pub(super) fn snapshot(params: &ProgramParameters, cursor: &BindingCursor, viewport: Viewport) -> Self {
        Self {
            ortho: params.ortho_matrix,
            matte_color: params.matte_color.to_array(),
            canvas_size: [viewport.width.max(1.0), viewport.height.max(1.0)],
            line_width: cursor.line_width(),
            point_size: cursor.point_size(),
            ambient_light_intensity: params.ambient_light_intensity,
            water_contrast: params.water_contrast,
            water_level_threshold: params.water_level_threshold,
            _pad: 0.0,
        }
    }
}

/// Returns the `wgpu` binding size of one `DrawUniforms` slot.
pub(super) fn draw_uniforms_binding_size() -> NonZeroU64 {
    NonZeroU64::new(std::mem::size_of::<DrawUniforms>() as u64)
        .expect("DrawUniforms has non-zero size by construction")
}

/// CPU staging for the frame's snapshots and the buffer they are copied into.
pub(super) struct UniformRing {
    stride: u64,
    staging: Vec<u8>,
    buffer: Option<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
    capacity: u64,
}

impl UniformRing {
    pub(super) fn new(min_offset_alignment: u32) -> Self {
        let size = std::mem::size_of::<DrawUniforms>() as u64;
        let align = u64::from(min_offset_alignment.max(1));
        Self {
            stride: size.div_ceil(align) * align,
            staging: Vec::new(),
            buffer: None,
            bind_group: None,
            capacity: 0,
        }
    }

    pub(super) fn clear(&mut self) {
        self.staging.clear();
    }

    /// Appends a snapshot and returns its dynamic offset.
    pub(super) fn push(&mut self, uniforms: &DrawUniforms) -> u32 {
        let offset = self.staging.len();
        self.staging.extend_from_slice(bytemuck::bytes_of(uniforms));
        self.staging.resize(offset + self.stride as usize, 0);
        offset as u32
    }

    /// Copies the staged snapshots to the device, growing the buffer as needed.
    pub(super) fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) {
        let required = (self.staging.len() as u64).max(self.stride);
        if required > self.capacity || self.buffer.is_none() {
            let slots = (required / self.stride).next_power_of_two().max(64);
            let size = slots * self.stride;

            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("flotilla draw uniforms"),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("flotilla draw uniforms bind group"),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer,
                        offset: 0,
                        size: Some(draw_uniforms_binding_size()),
                    }),
                }],
            });

            log::debug!("draw uniforms: grew to {slots} slots");
            self.buffer = Some(buffer);
            self.bind_group = Some(bind_group);
            self.capacity = size;
        }

        if let Some(buffer) = self.buffer.as_ref() {
            if !self.staging.is_empty() {
                queue.write_buffer(buffer, 0, &self.staging);
            }
        }
    }

    pub(super) fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 112);
    }

    #[test]
    fn snapshots_land_on_aligned_offsets() {
        let mut ring = UniformRing::new(256);
        let u = DrawUniforms::zeroed();
        assert_eq!(ring.push(&u), 0);
        assert_eq!(ring.push(&u), 256);
        assert_eq!(ring.push(&u), 512);
        ring.clear();
        assert_eq!(ring.push(&u), 0);
    }
}
