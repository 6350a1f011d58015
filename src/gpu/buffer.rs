// gpu/buffer.rs — Scoped f32 storage buffers on the device.
//
// `GpuBuffer` is the only handle to device memory in the crate. It owns
// its `wgpu::Buffer`, knows its length in elements, and frees the memory
// when dropped. Kernels take `&GpuBuffer`; nothing passes raw addresses.
//
// TRANSFERS
// ─────────
//   upload    create_buffer_init   host slice → STORAGE buffer
//   allocate  create_buffer        zero-filled by wgpu
//   readback  copy into a MAP_READ staging buffer, map, poll, copy out
//
// Readback is synchronous: it blocks until every previously submitted
// command touching the buffer has finished. Storage buffers have no
// per-row alignment rule, so no padding is needed (unlike the 256-byte
// rows of buffer↔texture copies).

use log::trace;
use wgpu::util::DeviceExt;

use crate::gpu::device::{GpuDevice, GpuError};

const F32_BYTES: u64 = std::mem::size_of::<f32>() as u64;

/// Byte size of `len` f32 elements. wgpu rejects zero-sized bindings, so
/// empty buffers are padded to one element. Saturates so an oversized
/// request reaches wgpu's own size limit check instead of wrapping.
#[inline]
pub(crate) fn byte_size(len: usize) -> u64 {
    (len.max(1) as u64).saturating_mul(F32_BYTES)
}

/// A flat `array<f32>` resident on the GPU.
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    len: usize,
}

impl GpuBuffer {
    const USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
        .union(wgpu::BufferUsages::COPY_SRC)
        .union(wgpu::BufferUsages::COPY_DST);

    /// Upload `data` into a new device buffer.
    pub fn from_slice(gpu: &GpuDevice, data: &[f32], label: &str) -> Result<Self, GpuError> {
        trace!("upload {label}: {} samples", data.len());
        let buffer = gpu.scoped(|| {
            if data.is_empty() {
                gpu.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size: byte_size(0),
                    usage: Self::USAGE,
                    mapped_at_creation: false,
                })
            } else {
                gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(data),
                    usage: Self::USAGE,
                })
            }
        })?;
        Ok(GpuBuffer { buffer, len: data.len() })
    }

    /// Allocate a zero-filled buffer of `len` samples.
    pub fn zeroed(gpu: &GpuDevice, len: usize, label: &str) -> Result<Self, GpuError> {
        trace!("allocate {label}: {len} samples");
        let buffer = gpu.scoped(|| {
            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: byte_size(len),
                usage: Self::USAGE,
                mapped_at_creation: false,
            })
        })?;
        Ok(GpuBuffer { buffer, len })
    }

    /// Number of f32 samples.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Copy the buffer back to host memory.
    ///
    /// This is an **expensive, synchronous** operation: it stalls until
    /// all queued work has completed.
    pub fn read_to_vec(&self, gpu: &GpuDevice) -> Result<Vec<f32>, GpuError> {
        if self.len == 0 {
            return Ok(Vec::new());
        }
        let size = byte_size(self.len);

        let staging = gpu.scoped(|| {
            let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("GpuBuffer::readback"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder = gpu.device.create_command_encoder(
                &wgpu::CommandEncoderDescriptor { label: Some("GpuBuffer::readback") },
            );
            encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);
            gpu.queue.submit(std::iter::once(encoder.finish()));
            staging
        })?;

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the poll below; a failed send only
            // means the caller already gave up.
            let _ = tx.send(result);
        });
        gpu.wait();
        rx.recv()
            .map_err(|_| GpuError::MapCallbackDropped)?
            .map_err(GpuError::BufferMap)?;

        let mapped = slice.get_mapped_range();
        let out = bytemuck::cast_slice::<u8, f32>(&mapped).to_vec();
        drop(mapped);
        staging.unmap();
        Ok(out)
    }
}
