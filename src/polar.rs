// polar.rs — CPU reference for Cartesian → polar resampling.
//
// This is the authoritative implementation. The GPU kernel in
// gpu/polar.rs + shaders/cart2polar.wgsl mirrors it line for line and is
// validated against it.
//
// MAPPING
// ───────
// For output sample (r, a) of batch member b:
//
//   θ = a · 2π / angular_steps
//   x = cx + r · cos θ
//   y = cy + r · sin θ
//   out[(b · angular_steps + a) · radial_steps + r] = bilinear(in_b, x, y)
//
// where (cx, cy) = (w / 2, h / 2) in integer division (see extent.rs).
//
// OUT-OF-RANGE FALLBACK
// ─────────────────────
// The grid derivation keeps every sample inside the image, but cos/sin
// round-off can push a position on the outermost ring a few ULPs past an
// edge. Positions within EDGE_TOLERANCE of the image are clamped onto it;
// anything further out samples as 0.0.

use crate::error::{PolarError, PolarResult};
use crate::extent::{polar_extent, ImageExtent, PolarExtent};
use crate::image::{interpolate_bilinear, Image, ImageBatch, ImageView};

/// Slack, in pixels, for positions that round-off pushed past an edge.
pub const EDGE_TOLERANCE: f32 = 1e-4;

/// Value produced for positions outside the image.
pub const OUTSIDE_VALUE: f32 = 0.0;

/// Validate a resampling request and derive its polar grid.
///
/// Checks run in a fixed order and nothing has been written when one
/// fails: extent, batch count, input length, output capacity.
pub(crate) fn check_request(
    extent: ImageExtent,
    batch_count: usize,
    input_len: usize,
    output_len: usize,
) -> PolarResult<PolarExtent> {
    let polar = polar_extent(extent)?;

    if batch_count == 0 {
        return Err(PolarError::InvalidBatch);
    }

    // An input size that overflows usize can never match a real slice.
    let expected = extent
        .checked_len()
        .and_then(|n| n.checked_mul(batch_count))
        .unwrap_or(usize::MAX);
    if input_len != expected {
        return Err(PolarError::InputSizeMismatch { expected, actual: input_len });
    }

    let required = polar.required_len(batch_count);
    if output_len < required {
        return Err(PolarError::BufferTooSmall { required, actual: output_len });
    }

    Ok(polar)
}

/// Cartesian position of polar sample `(r, a)`.
#[inline]
pub fn polar_to_cart(extent: ImageExtent, polar: PolarExtent, r: usize, a: usize) -> (f32, f32) {
    let (cx, cy) = extent.center();
    let (sin, cos) = polar.angle(a).sin_cos();
    let r = r as f32;
    (cx as f32 + r * cos, cy as f32 + r * sin)
}

/// Sample `img` at `(x, y)`, returning [`OUTSIDE_VALUE`] for positions
/// outside the image.
pub fn sample_polar(img: &ImageView<'_>, x: f32, y: f32) -> f32 {
    let max_x = (img.width() - 1) as f32;
    let max_y = (img.height() - 1) as f32;

    let inside = x >= -EDGE_TOLERANCE
        && x <= max_x + EDGE_TOLERANCE
        && y >= -EDGE_TOLERANCE
        && y <= max_y + EDGE_TOLERANCE;
    if !inside {
        return OUTSIDE_VALUE;
    }

    interpolate_bilinear(img, x.clamp(0.0, max_x), y.clamp(0.0, max_y))
}

/// Resample `batch_count` Cartesian images into polar images.
///
/// `input` holds `batch_count` images of `extent`, back to back. The first
/// `batch_count · polar.len()` samples of `output` are overwritten; any
/// remaining tail is left alone.
///
/// # Errors
/// - [`PolarError::InvalidExtent`] for a zero-sized extent.
/// - [`PolarError::InvalidBatch`] for `batch_count == 0`.
/// - [`PolarError::InputSizeMismatch`] if `input` does not hold exactly
///   `batch_count` images.
/// - [`PolarError::BufferTooSmall`] if `output` is too short. Nothing is
///   written in that case.
pub fn cart2polar(
    input: &[f32],
    extent: ImageExtent,
    batch_count: usize,
    output: &mut [f32],
) -> PolarResult<PolarExtent> {
    let polar = check_request(extent, batch_count, input.len(), output.len())?;

    // cos/sin depend only on the angle row, shared by every radius and batch.
    let rotations: Vec<(f32, f32)> = (0..polar.angular_steps)
        .map(|a| {
            let (sin, cos) = polar.angle(a).sin_cos();
            (cos, sin)
        })
        .collect();
    let (cx, cy) = extent.center();
    let (cx, cy) = (cx as f32, cy as f32);

    let out = &mut output[..polar.required_len(batch_count)];
    for (src, dst) in input.chunks_exact(extent.len()).zip(out.chunks_exact_mut(polar.len())) {
        let img = ImageView::new(src, extent);
        for (row, &(cos, sin)) in dst.chunks_exact_mut(polar.radial_steps).zip(&rotations) {
            for (r, slot) in row.iter_mut().enumerate() {
                let r = r as f32;
                *slot = sample_polar(&img, cx + r * cos, cy + r * sin);
            }
        }
    }

    Ok(polar)
}

/// Resample a single image. The result has `width = radial_steps` and
/// `height = angular_steps`.
pub fn cart2polar_image(img: &Image) -> PolarResult<Image> {
    let polar = polar_extent(img.extent())?;
    let mut out = Image::new(polar.radial_steps, polar.angular_steps);
    cart2polar(img.as_slice(), img.extent(), 1, out.as_mut_slice())?;
    Ok(out)
}

/// Resample every member of a batch.
pub fn cart2polar_batch(batch: &ImageBatch) -> PolarResult<ImageBatch> {
    let polar = polar_extent(batch.extent())?;
    let polar_as_image = ImageExtent::new(polar.radial_steps, polar.angular_steps);
    let mut out = ImageBatch::new(polar_as_image, batch.count());
    cart2polar(batch.as_slice(), batch.extent(), batch.count(), out.as_mut_slice())?;
    Ok(out)
}
