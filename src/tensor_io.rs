// tensor_io.rs — Raw f32 tensor files.
//
// Format: a headerless little-endian f32 array. Shape and layout are agreed
// out of band (for polar fixtures: angle-major, radius fastest). Used to
// feed reference inputs and expected outputs into tests and benches.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Debug, Error)]
pub enum TensorIoError {
    #[error("failed to access tensor file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("tensor file {path} is {bytes} bytes, not a whole number of f32 values")]
    Truncated { path: PathBuf, bytes: usize },
    #[error("tensor file {path} holds {actual} values, expected {expected}")]
    LengthMismatch { path: PathBuf, expected: usize, actual: usize },
}

/// Read every f32 in `path`.
pub fn read_f32_file(path: impl AsRef<Path>) -> Result<Vec<f32>, TensorIoError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| TensorIoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() % F32_BYTES != 0 {
        return Err(TensorIoError::Truncated { path: path.to_path_buf(), bytes: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(F32_BYTES)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Read `path` and check that it holds exactly `len` values.
pub fn read_f32_file_exact(path: impl AsRef<Path>, len: usize) -> Result<Vec<f32>, TensorIoError> {
    let path = path.as_ref();
    let values = read_f32_file(path)?;
    if values.len() != len {
        return Err(TensorIoError::LengthMismatch {
            path: path.to_path_buf(),
            expected: len,
            actual: values.len(),
        });
    }
    Ok(values)
}

/// Write `values` to `path`, replacing any existing file.
pub fn write_f32_file(path: impl AsRef<Path>, values: &[f32]) -> Result<(), TensorIoError> {
    let path = path.as_ref();
    let mut bytes = Vec::with_capacity(values.len() * F32_BYTES);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, bytes).map_err(|source| TensorIoError::Io {
        path: path.to_path_buf(),
        source,
    })
}
