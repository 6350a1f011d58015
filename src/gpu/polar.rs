// gpu/polar.rs — GPU Cartesian → polar resampler.
//
// DISPATCH
// ────────
// One invocation per output sample, laid out to match the output buffer:
//
//   x: radius   ceil(radial_steps  / WG_X) workgroups
//   y: angle    ceil(angular_steps / WG_Y) workgroups
//   z: batch    batch_count workgroups (workgroup depth is 1)
//
// No invocation reads another's output, so there are no barriers or
// atomics. The input buffer is bound read-only and may be shared by any
// number of concurrent dispatches; the output buffer belongs to one.
//
// VALIDATION
// ──────────
// Requests are checked with the same rules as the CPU reference before any
// command is recorded, so a rejected call never touches the output.
// Anything wgpu itself rejects (binding too large, device lost) is caught
// by an error scope and returned as `PolarError::Device`.

use std::f64::consts::TAU;

use log::{debug, trace};
use wgpu::util::DeviceExt;

use crate::error::{PolarError, PolarResult};
use crate::extent::{ImageExtent, PolarExtent};
use crate::gpu::buffer::GpuBuffer;
use crate::gpu::device::GpuDevice;
use crate::polar::{check_request, EDGE_TOLERANCE};

// ---------------------------------------------------------------------------
// Uniform params (must match WGSL struct Cart2PolarParams exactly)
// ---------------------------------------------------------------------------

/// Layout:
///   offset  0: width, height, radial_steps, angular_steps (u32)
///   offset 16: batch_count (u32), center_x, center_y, angle_step (f32)
///   offset 32: edge_tolerance (f32), 3 × u32 padding
///   total:  48 bytes (uniform structs round up to 16)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct Cart2PolarParams {
    width: u32,
    height: u32,
    radial_steps: u32,
    angular_steps: u32,
    batch_count: u32,
    center_x: f32,
    center_y: f32,
    angle_step: f32,
    edge_tolerance: f32,
    _pad: [u32; 3],
}

/// Edge slack for the shader's outer ring.
///
/// WGSL only bounds `cos`/`sin` to about 2^-11 absolute error, and the
/// position error grows with the radius, so the CPU's [`EDGE_TOLERANCE`]
/// is too tight on large images. Positions inside the slack are clamped
/// onto the edge exactly as on the CPU.
pub(crate) fn gpu_edge_tolerance(radial_steps: usize) -> f32 {
    EDGE_TOLERANCE.max(radial_steps as f32 / 1024.0)
}

impl Cart2PolarParams {
    fn new(extent: ImageExtent, polar: PolarExtent, batch_count: u32) -> Self {
        let (cx, cy) = extent.center();
        Cart2PolarParams {
            width: extent.width as u32,
            height: extent.height as u32,
            radial_steps: polar.radial_steps as u32,
            angular_steps: polar.angular_steps as u32,
            batch_count,
            center_x: cx as f32,
            center_y: cy as f32,
            angle_step: (TAU / polar.angular_steps as f64) as f32,
            edge_tolerance: gpu_edge_tolerance(polar.radial_steps),
            _pad: [0; 3],
        }
    }
}

// ---------------------------------------------------------------------------
// GpuCart2Polar
// ---------------------------------------------------------------------------

/// Compiled Cartesian → polar pipeline.
///
/// Create once per [`GpuDevice`] and reuse for every batch.
pub struct GpuCart2Polar {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
}

impl GpuCart2Polar {
    pub fn new(gpu: &GpuDevice) -> Self {
        let shader_src = gpu.workgroup_size.specialize(include_str!("../shaders/cart2polar.wgsl"));
        debug!("compiling cart2polar.wgsl, workgroup {}", gpu.workgroup_size);

        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cart2polar.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bgl = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GpuCart2Polar BGL"),
            entries: &[
                // 0 — Cartesian input batch
                storage(0, true),
                // 1 — polar output batch
                storage(1, false),
                // 2 — params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GpuCart2Polar pipeline layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("cart2polar"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cart2polar",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        GpuCart2Polar { pipeline, bgl }
    }

    /// Resample `batch_count` images already resident in `input` into
    /// `output`.
    ///
    /// The work is submitted but not awaited. Call [`GpuDevice::wait`] or
    /// [`GpuBuffer::read_to_vec`] before reading `output`.
    ///
    /// # Errors
    /// Same validation as [`crate::polar::cart2polar`], plus
    /// [`PolarError::BatchTooLarge`] when `batch_count` exceeds the
    /// device's dispatch limit and [`PolarError::Device`] for device-side
    /// failures.
    pub fn resample(
        &self,
        gpu: &GpuDevice,
        input: &GpuBuffer,
        extent: ImageExtent,
        batch_count: usize,
        output: &GpuBuffer,
    ) -> PolarResult<PolarExtent> {
        let polar = check_request(extent, batch_count, input.len(), output.len())
            .inspect_err(|e| debug!("cart2polar rejected: {e}"))?;

        let max = gpu.max_workgroups_per_dimension();
        if batch_count > max as usize {
            return Err(PolarError::BatchTooLarge { batch_count, max });
        }

        let params = Cart2PolarParams::new(extent, polar, batch_count as u32);
        let (wg_x, wg_y) = gpu.dispatch_size(params.radial_steps, params.angular_steps);
        trace!(
            "cart2polar {extent} x{batch_count} -> {polar}: dispatch {wg_x}x{wg_y}x{batch_count}"
        );

        gpu.scoped(|| {
            let params_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Cart2PolarParams"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("GpuCart2Polar BG"),
                layout: &self.bgl,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: input.raw().as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: output.raw().as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 2, resource: params_buf.as_entire_binding() },
                ],
            });

            let mut encoder = gpu.device.create_command_encoder(
                &wgpu::CommandEncoderDescriptor { label: Some("GpuCart2Polar dispatch") },
            );
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("cart2polar"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(wg_x, wg_y, batch_count as u32);
            }
            gpu.queue.submit(std::iter::once(encoder.finish()));
        })?;

        Ok(polar)
    }

    /// Upload, resample, and read back in one blocking call.
    ///
    /// Device buffers live only for the duration of the call.
    pub fn resample_host(
        &self,
        gpu: &GpuDevice,
        input: &[f32],
        extent: ImageExtent,
        batch_count: usize,
    ) -> PolarResult<Vec<f32>> {
        // Reject bad requests before allocating anything on the device.
        let polar = check_request(extent, batch_count, input.len(), usize::MAX)?;

        let input_buf = GpuBuffer::from_slice(gpu, input, "cart2polar input")?;
        let output_buf =
            GpuBuffer::zeroed(gpu, polar.required_len(batch_count), "cart2polar output")?;

        self.resample(gpu, &input_buf, extent, batch_count, &output_buf)?;
        Ok(output_buf.read_to_vec(gpu)?)
    }
}
