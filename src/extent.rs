// extent.rs — Cartesian and polar grid extents, and the rule that maps one
// to the other.
//
// GRID DERIVATION
// ───────────────
//   radial_steps  = ceil(min(w, h) / 2)
//   angular_steps = ceil(2π · radial_steps)
//
// The radius is limited by the shorter side, so the full circle of every
// radius fits inside the image. The angular count is the circumference of
// the outermost ring in pixels, so neighbouring samples on that ring are
// at most one pixel apart; inner rings are oversampled.
//
// CENTRE CONVENTION
// ─────────────────
// The centre is the integer pixel (w / 2, h / 2) using integer division:
//
//   w = 16 → cx = 8   (one half-pixel right of the geometric centre 7.5)
//   w = 15 → cx = 7   (exactly the geometric centre)
//
// With radius r < ceil(min / 2) this keeps every sample inside
// [0, w-1] × [0, h-1]:
//   even: 8 - 7 = 1 ≥ 0,   8 + 7 = 15 = w-1
//   odd:  7 - 7 = 0,       7 + 7 = 14 = w-1

use std::f64::consts::TAU;
use std::fmt;

use crate::error::{PolarError, PolarResult};

/// Size of one Cartesian image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageExtent {
    pub width: usize,
    pub height: usize,
}

impl ImageExtent {
    /// Construct without validation. Use [`ImageExtent::validate`] or
    /// [`polar_extent`] to reject zero-sized extents.
    pub const fn new(width: usize, height: usize) -> Self {
        ImageExtent { width, height }
    }

    pub fn validate(&self) -> PolarResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PolarError::InvalidExtent { width: self.width, height: self.height });
        }
        Ok(())
    }

    /// Number of pixels in one image.
    ///
    /// # Panics
    /// Panics on overflow in debug builds; use [`ImageExtent::checked_len`]
    /// for extents that have not been allocated yet.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Number of pixels, or `None` if it does not fit in `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        self.width.checked_mul(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Integer centre pixel `(w / 2, h / 2)`.
    pub fn center(&self) -> (usize, usize) {
        (self.width / 2, self.height / 2)
    }
}

impl fmt::Display for ImageExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Size of one polar image: `radial_steps` columns, `angular_steps` rows.
///
/// Polar buffers are angle-major: sample `(r, a)` of batch member `b`
/// lives at `(b * angular_steps + a) * radial_steps + r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolarExtent {
    pub radial_steps: usize,
    pub angular_steps: usize,
}

impl PolarExtent {
    /// Number of samples in one polar image.
    pub fn len(&self) -> usize {
        self.radial_steps * self.angular_steps
    }

    /// Number of samples, or `None` if it does not fit in `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        self.radial_steps.checked_mul(self.angular_steps)
    }

    pub fn is_empty(&self) -> bool {
        self.radial_steps == 0 || self.angular_steps == 0
    }

    /// Samples needed for `batch_count` polar images. Saturates instead
    /// of overflowing so an absurd request still fails the size check.
    pub fn required_len(&self, batch_count: usize) -> usize {
        self.checked_len()
            .and_then(|n| n.checked_mul(batch_count))
            .unwrap_or(usize::MAX)
    }

    /// Angle in radians of row `a`.
    #[inline]
    pub fn angle(&self, a: usize) -> f32 {
        (a as f64 * TAU / self.angular_steps as f64) as f32
    }
}

impl fmt::Display for PolarExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} radii x {} angles", self.radial_steps, self.angular_steps)
    }
}

/// Derive the polar grid for a Cartesian extent.
///
/// Pure: the same extent always yields the same grid.
///
/// # Errors
/// [`PolarError::InvalidExtent`] if width or height is zero.
pub fn polar_extent(extent: ImageExtent) -> PolarResult<PolarExtent> {
    extent.validate()?;

    let min_side = extent.width.min(extent.height);
    let radial_steps = min_side.div_ceil(2);
    let angular_steps = (TAU * radial_steps as f64).ceil() as usize;

    Ok(PolarExtent { radial_steps, angular_steps })
}
