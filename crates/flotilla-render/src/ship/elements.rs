//! Element streams and the scoped brackets that rebuild them.

use std::mem::size_of;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};

use crate::render::{BufferId, BufferUsage, RenderDevice};

use super::ElementIndex;

// ── element types ─────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct PointElement {
    pub point_index: ElementIndex,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct LineElement {
    pub point_index1: ElementIndex,
    pub point_index2: ElementIndex,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct TriangleElement {
    pub point_index1: ElementIndex,
    pub point_index2: ElementIndex,
    pub point_index3: ElementIndex,
}

pub type SpringElement = LineElement;
pub type RopeElement = LineElement;
pub type StressedSpringElement = LineElement;

// ── stream ────────────────────────────────────────────────────────────────

/// CPU-side element list and the device buffer it is transferred to.
///
/// Clearing keeps capacity; pushing past the reserve grows the list.
#[derive(Debug)]
pub(crate) struct ElementStream<E> {
    label: &'static str,
    elements: Vec<E>,
    /// Elements the device currently holds for this stream.
    transferred: usize,
    buffer: BufferId,
    usage: BufferUsage,
}

impl<E: Pod> ElementStream<E> {
    pub(crate) fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        label: &'static str,
        reserve: usize,
        usage: BufferUsage,
    ) -> Result<Self> {
        let buffer = device
            .create_buffer(label, (reserve * size_of::<E>()) as u64, usage)
            .with_context(|| format!("failed to create {label} buffer"))?;

        Ok(Self {
            label,
            elements: Vec::with_capacity(reserve),
            transferred: 0,
            buffer,
            usage,
        })
    }

    #[inline]
    pub(crate) fn buffer(&self) -> BufferId {
        self.buffer
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Length of the last successful transfer since the last clear.
    #[inline]
    pub(crate) fn transferred_len(&self) -> usize {
        self.transferred
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.elements.capacity()
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.elements.clear();
        self.transferred = 0;
    }

    #[inline]
    pub(crate) fn push(&mut self, element: E) {
        self.elements.push(element);
    }

    pub(crate) fn transfer<D: RenderDevice + ?Sized>(&mut self, device: &mut D) -> Result<()> {
        device
            .upload_buffer(self.buffer, bytemuck::cast_slice(&self.elements), self.usage)
            .with_context(|| format!("failed to transfer {} ({} elements)", self.label, self.len()))?;
        self.transferred = self.elements.len();
        Ok(())
    }

    pub(crate) fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        device.release_buffer(self.buffer);
    }
}

/// All element streams of one ship.
#[derive(Debug)]
pub(crate) struct ElementStreams {
    pub(crate) points: ElementStream<PointElement>,
    pub(crate) springs: ElementStream<SpringElement>,
    pub(crate) ropes: ElementStream<RopeElement>,
    pub(crate) triangles: ElementStream<TriangleElement>,
    pub(crate) stressed_springs: ElementStream<StressedSpringElement>,
    pub(crate) ephemeral_points: ElementStream<PointElement>,
}

impl ElementStreams {
    pub(crate) fn new<D: RenderDevice + ?Sized>(device: &mut D, point_count: usize) -> Result<Self> {
        use super::{
            MAX_EPHEMERAL_PARTICLES, MAX_SPRINGS_PER_POINT, MAX_TRIANGLES_PER_POINT,
            STRESSED_SPRINGS_RESERVE,
        };

        Ok(Self {
            points: ElementStream::new(device, "point elements", point_count, BufferUsage::Static)?,
            springs: ElementStream::new(
                device,
                "spring elements",
                point_count * MAX_SPRINGS_PER_POINT,
                BufferUsage::Static,
            )?,
            ropes: ElementStream::new(device, "rope elements", point_count, BufferUsage::Static)?,
            triangles: ElementStream::new(
                device,
                "triangle elements",
                point_count * MAX_TRIANGLES_PER_POINT,
                BufferUsage::Static,
            )?,
            stressed_springs: ElementStream::new(
                device,
                "stressed spring elements",
                STRESSED_SPRINGS_RESERVE,
                BufferUsage::Dynamic,
            )?,
            ephemeral_points: ElementStream::new(
                device,
                "ephemeral point elements",
                MAX_EPHEMERAL_PARTICLES,
                BufferUsage::Dynamic,
            )?,
        })
    }

    pub(crate) fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        self.points.release(device);
        self.springs.release(device);
        self.ropes.release(device);
        self.triangles.release(device);
        self.stressed_springs.release(device);
        self.ephemeral_points.release(device);
    }
}

// ── upload brackets ───────────────────────────────────────────────────────

/// Keeps the first failure of a bracket closed by drop.
fn defer(slot: &mut Option<anyhow::Error>, result: Result<()>) {
    if let Err(e) = result {
        log::error!("element upload failed: {e:#}");
        slot.get_or_insert(e);
    }
}

/// Bracket rebuilding the point, spring, rope and triangle streams.
///
/// Closing it, by [`finish`](Self::finish) or by drop, transfers the four
/// streams. A failure at drop is reported by the next `render_end`.
pub struct ElementsUpload<'a, D: RenderDevice + ?Sized> {
    pub(crate) streams: &'a mut ElementStreams,
    pub(crate) device: &'a mut D,
    pub(crate) deferred: &'a mut Option<anyhow::Error>,
    pub(crate) finished: bool,
}

impl<D: RenderDevice + ?Sized> ElementsUpload<'_, D> {
    #[inline]
    pub fn add_point(&mut self, point_index: ElementIndex) {
        self.streams.points.push(PointElement { point_index });
    }

    #[inline]
    pub fn add_spring(&mut self, point_index1: ElementIndex, point_index2: ElementIndex) {
        self.streams.springs.push(LineElement { point_index1, point_index2 });
    }

    #[inline]
    pub fn add_rope(&mut self, point_index1: ElementIndex, point_index2: ElementIndex) {
        self.streams.ropes.push(LineElement { point_index1, point_index2 });
    }

    #[inline]
    pub fn add_triangle(
        &mut self,
        point_index1: ElementIndex,
        point_index2: ElementIndex,
        point_index3: ElementIndex,
    ) {
        self.streams.triangles.push(TriangleElement {
            point_index1,
            point_index2,
            point_index3,
        });
    }

    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.transfer()
    }

    fn transfer(&mut self) -> Result<()> {
        let device = &mut *self.device;
        self.streams.points.transfer(device)?;
        self.streams.springs.transfer(device)?;
        self.streams.ropes.transfer(device)?;
        self.streams.triangles.transfer(device)
    }
}

impl<D: RenderDevice + ?Sized> Drop for ElementsUpload<'_, D> {
    fn drop(&mut self) {
        if !self.finished {
            let result = self.transfer();
            defer(self.deferred, result);
        }
    }
}

/// Bracket rebuilding the stressed-spring stream.
pub struct StressedSpringsUpload<'a, D: RenderDevice + ?Sized> {
    pub(crate) stream: &'a mut ElementStream<StressedSpringElement>,
    pub(crate) device: &'a mut D,
    pub(crate) deferred: &'a mut Option<anyhow::Error>,
    pub(crate) finished: bool,
}

impl<D: RenderDevice + ?Sized> StressedSpringsUpload<'_, D> {
    #[inline]
    pub fn add_stressed_spring(&mut self, point_index1: ElementIndex, point_index2: ElementIndex) {
        self.stream.push(LineElement { point_index1, point_index2 });
    }

    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.stream.transfer(&mut *self.device)
    }
}

impl<D: RenderDevice + ?Sized> Drop for StressedSpringsUpload<'_, D> {
    fn drop(&mut self) {
        if !self.finished {
            let result = self.stream.transfer(&mut *self.device);
            defer(self.deferred, result);
        }
    }
}

/// Bracket rebuilding the ephemeral-point stream.
pub struct EphemeralPointsUpload<'a, D: RenderDevice + ?Sized> {
    pub(crate) stream: &'a mut ElementStream<PointElement>,
    pub(crate) device: &'a mut D,
    pub(crate) deferred: &'a mut Option<anyhow::Error>,
    pub(crate) finished: bool,
}

impl<D: RenderDevice + ?Sized> EphemeralPointsUpload<'_, D> {
    #[inline]
    pub fn add_ephemeral_point(&mut self, point_index: ElementIndex) {
        self.stream.push(PointElement { point_index });
    }

    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.stream.transfer(&mut *self.device)
    }
}

impl<D: RenderDevice + ?Sized> Drop for EphemeralPointsUpload<'_, D> {
    fn drop(&mut self) {
        if !self.finished {
            let result = self.stream.transfer(&mut *self.device);
            defer(self.deferred, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingDevice;

    // ── streams ──────────────────────────────────────────────────────────

    #[test]
    fn clear_keeps_reserved_capacity() {
        let mut dev = RecordingDevice::new();
        let mut s = ElementStream::<LineElement>::new(&mut dev, "springs", 16, BufferUsage::Static).unwrap();
        for i in 0..10 {
            s.push(LineElement { point_index1: i, point_index2: i + 1 });
        }
        s.clear();
        assert!(s.is_empty());
        assert!(s.capacity() >= 16);
    }

    #[test]
    fn growth_past_reserve_is_allowed() {
        let mut dev = RecordingDevice::new();
        let mut s = ElementStream::<PointElement>::new(&mut dev, "points", 2, BufferUsage::Static).unwrap();
        for i in 0..5 {
            s.push(PointElement { point_index: i });
        }
        s.transfer(&mut dev).unwrap();
        assert_eq!(s.transferred_len(), 5);
        assert_eq!(dev.buffer_as::<u32>(s.buffer()), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn failed_transfer_leaves_nothing_drawable() {
        let mut dev = RecordingDevice::new();
        let mut s = ElementStream::<PointElement>::new(&mut dev, "points", 0, BufferUsage::Static).unwrap();
        s.push(PointElement { point_index: 0 });
        dev.set_fail_allocations(true);
        assert!(s.transfer(&mut dev).is_err());
        assert_eq!(s.transferred_len(), 0);
    }

    #[test]
    fn element_layouts_are_packed_indices() {
        assert_eq!(size_of::<PointElement>(), 4);
        assert_eq!(size_of::<LineElement>(), 8);
        assert_eq!(size_of::<TriangleElement>(), 12);
    }
}
