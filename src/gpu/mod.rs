// gpu/mod.rs — GPU acceleration layer.
//
// wgpu compute kernels that mirror the CPU resampler in `crate::polar`.
// The CPU implementation is the authoritative reference; every kernel is
// validated against it with a mean-relative-error tolerance.
//
// Pipeline per batch:
//
//   host slice ──upload──▶ GpuBuffer ──cart2polar.wgsl──▶ GpuBuffer ──readback──▶ Vec<f32>
//
// `GpuDevice` is the explicit device context, `GpuBuffer` the scoped
// handle to device memory, and `GpuCart2Polar` the compiled kernel.

pub mod buffer;
pub mod device;
pub mod polar;
