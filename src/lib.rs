// polar-warp: Cartesian → polar image resampling on the GPU.
//
// CPU reference implementation plus a wgpu compute kernel validated
// against it.
//
//   extent     polar grid size for a Cartesian extent
//   image      f32 image / batch containers, bilinear sampling
//   polar      CPU resampler (authoritative reference)
//   gpu        device context, device buffers, GPU resampler
//   compare    tolerance-based buffer comparison
//   tensor_io  raw f32 tensor files for fixtures

pub mod compare;
pub mod error;
pub mod extent;
pub mod gpu;
pub mod image;
pub mod polar;
pub mod tensor_io;

pub use error::{PolarError, PolarResult};
pub use extent::{polar_extent, ImageExtent, PolarExtent};
pub use image::{Image, ImageBatch, ImageView};
pub use polar::{cart2polar, cart2polar_batch, cart2polar_image};
