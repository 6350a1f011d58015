// error.rs — Error taxonomy shared by the CPU and GPU resamplers.
//
// Every failure aborts the whole batch call. Validation errors are raised
// before anything is written to the output, so a failed call leaves the
// caller's buffer exactly as it was.

use thiserror::Error;

use crate::gpu::device::GpuError;

/// Errors from extent derivation and Cartesian → polar resampling.
#[derive(Debug, Error)]
pub enum PolarError {
    /// Width or height is zero.
    #[error("invalid image extent {width}x{height}: both dimensions must be at least 1")]
    InvalidExtent { width: usize, height: usize },

    /// `batch_count` was zero.
    #[error("batch count must be at least 1")]
    InvalidBatch,

    /// The input does not hold exactly `batch_count` images of the given extent.
    #[error("input holds {actual} samples but batch count and extent imply {expected}")]
    InputSizeMismatch { expected: usize, actual: usize },

    /// Caller-provided output storage cannot hold the full polar batch.
    #[error("output buffer holds {actual} samples but {required} are required")]
    BufferTooSmall { required: usize, actual: usize },

    /// The batch dimension exceeds the device's per-dimension dispatch limit.
    #[error("batch count {batch_count} exceeds the device dispatch limit of {max}")]
    BatchTooLarge { batch_count: usize, max: u32 },

    /// Accelerator-side failure (validation, out-of-memory, failed map).
    #[error("device fault: {0}")]
    Device(#[from] GpuError),
}

pub type PolarResult<T> = Result<T, PolarError>;
