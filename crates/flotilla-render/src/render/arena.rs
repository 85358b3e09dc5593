//! Typed device buffers with fixed or grow-only capacity.
//!
//! Both are thin typed views over a `BufferId`; the bytes live in the device.

use std::marker::PhantomData;
use std::mem::size_of;

use anyhow::{Context, Result};
use bytemuck::Pod;

use super::device::{BufferId, BufferUsage, RenderDevice};

// ── fixed ─────────────────────────────────────────────────────────────────

/// Buffer of exactly `len` elements for its whole life.
///
/// There is no resize operation. Full uploads must match `len`; partial uploads
/// must stay inside it.
#[derive(Debug)]
pub struct FixedArena<T> {
    label: &'static str,
    buffer: BufferId,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> FixedArena<T> {
    pub fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        label: &'static str,
        len: usize,
        usage: BufferUsage,
    ) -> Result<Self> {
        let buffer = device
            .create_buffer(label, byte_len::<T>(len), usage)
            .with_context(|| format!("failed to create {label} buffer ({len} elements)"))?;

        Ok(Self {
            label,
            buffer,
            len,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Replaces every element.
    ///
    /// # Panics
    /// If `data.len() != self.len()`.
    pub fn upload<D: RenderDevice + ?Sized>(&self, device: &mut D, data: &[T]) {
        assert_eq!(
            data.len(),
            self.len,
            "{}: full upload of {} elements into arena of {}",
            self.label,
            data.len(),
            self.len
        );
        if data.is_empty() {
            return;
        }
        device.write_buffer(self.buffer, 0, bytemuck::cast_slice(data));
    }

    /// Replaces `data.len()` elements starting at `start`.
    ///
    /// # Panics
    /// If `start + data.len() > self.len()`.
    pub fn upload_range<D: RenderDevice + ?Sized>(&self, device: &mut D, data: &[T], start: usize) {
        let end = start.checked_add(data.len());
        assert!(
            end.is_some_and(|end| end <= self.len),
            "{}: range {start}+{} out of arena of {}",
            self.label,
            data.len(),
            self.len
        );
        if data.is_empty() {
            return;
        }
        device.write_buffer(self.buffer, byte_len::<T>(start), bytemuck::cast_slice(data));
    }

    pub fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        device.release_buffer(self.buffer);
    }
}

// ── grow-only ─────────────────────────────────────────────────────────────

/// Buffer whose capacity follows the largest demand seen and never shrinks.
#[derive(Debug)]
pub struct GrowOnlyArena<T> {
    label: &'static str,
    buffer: BufferId,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> GrowOnlyArena<T> {
    pub fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        label: &'static str,
        capacity: usize,
        usage: BufferUsage,
    ) -> Result<Self> {
        let buffer = device
            .create_buffer(label, byte_len::<T>(capacity), usage)
            .with_context(|| format!("failed to create {label} buffer ({capacity} elements)"))?;

        Ok(Self {
            label,
            buffer,
            capacity,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grows the buffer to exactly `required` elements when it does not fit.
    ///
    /// Returns `true` when the buffer was reallocated; previous contents are then lost.
    pub fn reserve<D: RenderDevice + ?Sized>(&mut self, device: &mut D, required: usize) -> Result<bool> {
        if required <= self.capacity {
            return Ok(false);
        }

        device
            .allocate_buffer(self.buffer, byte_len::<T>(required))
            .with_context(|| format!("failed to grow {} buffer to {required} elements", self.label))?;

        log::debug!("{}: grew from {} to {} elements", self.label, self.capacity, required);
        self.capacity = required;
        Ok(true)
    }

    /// Writes `data` starting at element `start`.
    ///
    /// # Panics
    /// If the range exceeds the current capacity.
    pub fn write<D: RenderDevice + ?Sized>(&self, device: &mut D, data: &[T], start: usize) {
        assert!(
            start + data.len() <= self.capacity,
            "{}: write {start}+{} past capacity {}",
            self.label,
            data.len(),
            self.capacity
        );
        if data.is_empty() {
            return;
        }
        device.write_buffer(self.buffer, byte_len::<T>(start), bytemuck::cast_slice(data));
    }

    pub fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        device.release_buffer(self.buffer);
    }
}

#[inline]
fn byte_len<T>(count: usize) -> u64 {
    (count * size_of::<T>()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingDevice;

    // ── fixed ────────────────────────────────────────────────────────────

    #[test]
    fn fixed_full_upload_round_trips() {
        let mut dev = RecordingDevice::new();
        let arena = FixedArena::<f32>::new(&mut dev, "light", 3, BufferUsage::Dynamic).unwrap();
        arena.upload(&mut dev, &[0.1, 0.2, 0.3]);
        assert_eq!(dev.buffer_as::<f32>(arena.buffer()), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    #[should_panic(expected = "full upload")]
    fn fixed_full_upload_rejects_wrong_length() {
        let mut dev = RecordingDevice::new();
        let arena = FixedArena::<f32>::new(&mut dev, "light", 3, BufferUsage::Dynamic).unwrap();
        arena.upload(&mut dev, &[0.1, 0.2]);
    }

    #[test]
    fn fixed_range_upload_touches_only_range() {
        let mut dev = RecordingDevice::new();
        let arena = FixedArena::<u32>::new(&mut dev, "ids", 5, BufferUsage::Static).unwrap();
        arena.upload(&mut dev, &[1, 1, 1, 1, 1]);
        arena.upload_range(&mut dev, &[7, 8], 2);
        assert_eq!(dev.buffer_as::<u32>(arena.buffer()), vec![1, 1, 7, 8, 1]);
    }

    #[test]
    #[should_panic(expected = "out of arena")]
    fn fixed_range_upload_rejects_overflow() {
        let mut dev = RecordingDevice::new();
        let arena = FixedArena::<u32>::new(&mut dev, "ids", 5, BufferUsage::Static).unwrap();
        arena.upload_range(&mut dev, &[7, 8], 4);
    }

    #[test]
    fn fixed_zero_length_accepts_empty_upload() {
        let mut dev = RecordingDevice::new();
        let arena = FixedArena::<u32>::new(&mut dev, "ids", 0, BufferUsage::Static).unwrap();
        arena.upload(&mut dev, &[]);
        assert!(arena.is_empty());
    }

    // ── grow-only ────────────────────────────────────────────────────────

    #[test]
    fn grow_only_never_shrinks() {
        let mut dev = RecordingDevice::new();
        let mut arena = GrowOnlyArena::<u32>::new(&mut dev, "verts", 0, BufferUsage::Dynamic).unwrap();

        assert!(arena.reserve(&mut dev, 12).unwrap());
        assert_eq!(arena.capacity(), 12);

        assert!(!arena.reserve(&mut dev, 6).unwrap());
        assert_eq!(arena.capacity(), 12);
        assert_eq!(dev.buffer_size(arena.buffer()), 48);

        assert!(arena.reserve(&mut dev, 18).unwrap());
        assert_eq!(arena.capacity(), 18);
    }

    #[test]
    #[should_panic(expected = "past capacity")]
    fn grow_only_write_checks_capacity() {
        let mut dev = RecordingDevice::new();
        let arena = GrowOnlyArena::<u32>::new(&mut dev, "verts", 2, BufferUsage::Dynamic).unwrap();
        arena.write(&mut dev, &[1, 2, 3], 0);
    }
}
