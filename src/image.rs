// image.rs — f32 image containers and bilinear sampling.
//
// Three shapes of the same row-major layout:
//
//   Image          owned, one image        data.len() == width * height
//   ImageView<'a>  borrowed, one image     used to address a batch member
//   ImageBatch     owned, `count` images   image-major, then row-major
//
// There is no row padding. GPU kernels read these buffers as flat
// `array<f32>` storage bindings, which have no per-row alignment rule
// (unlike buffer→texture copies), so stride == width always.
//
// Polar images use the same containers: width = radial steps,
// height = angular steps.

use std::fmt;

use crate::extent::ImageExtent;

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// A single-channel f32 image, row-major, contiguous.
#[derive(Clone, PartialEq)]
pub struct Image {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl Image {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize) -> Self {
        Image { data: vec![0.0; width * height], width, height }
    }

    /// Wrap an existing buffer.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length {} does not match {}x{}",
            data.len(),
            width,
            height
        );
        Image { data, width, height }
    }

    /// Build an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Image { data, width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn extent(&self) -> ImageExtent {
        ImageExtent::new(self.width, self.height)
    }

    /// # Panics
    /// Panics if `(x, y)` is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.view().get(x, y)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        assert!(x < self.width && y < self.height, "({x}, {y}) out of bounds");
        self.data[y * self.width + x] = value;
    }

    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn view(&self) -> ImageView<'_> {
        ImageView { data: &self.data, width: self.width, height: self.height }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Image {}x{}", self.width, self.height)?;
        // Print at most 8×8 pixels to keep test failures readable.
        for y in 0..self.height.min(8) {
            write!(f, "  ")?;
            for x in 0..self.width.min(8) {
                write!(f, "{:8.3}", self.get(x, y))?;
            }
            if self.width > 8 {
                write!(f, " ...")?;
            }
            writeln!(f)?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ImageView
// ---------------------------------------------------------------------------

/// A borrowed single image, typically one member of an [`ImageBatch`].
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    data: &'a [f32],
    width: usize,
    height: usize,
}

impl<'a> ImageView<'a> {
    /// # Panics
    /// Panics if `data.len() != extent.len()`.
    pub fn new(data: &'a [f32], extent: ImageExtent) -> Self {
        assert_eq!(data.len(), extent.len(), "view length does not match extent {extent}");
        ImageView { data, width: extent.width, height: extent.height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        assert!(x < self.width && y < self.height, "({x}, {y}) out of bounds");
        self.data[y * self.width + x]
    }

    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    pub fn to_owned_image(&self) -> Image {
        Image::from_vec(self.width, self.height, self.data.to_vec())
    }
}

// ---------------------------------------------------------------------------
// ImageBatch
// ---------------------------------------------------------------------------

/// `count` same-sized images stored back to back.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBatch {
    data: Vec<f32>,
    extent: ImageExtent,
    count: usize,
}

impl ImageBatch {
    /// Zero-filled batch.
    pub fn new(extent: ImageExtent, count: usize) -> Self {
        ImageBatch { data: vec![0.0; extent.len() * count], extent, count }
    }

    /// # Panics
    /// Panics if `data.len() != extent.len() * count`.
    pub fn from_vec(extent: ImageExtent, count: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            extent.len() * count,
            "batch data length does not match {count} images of {extent}"
        );
        ImageBatch { data, extent, count }
    }

    /// Concatenate images that all share one extent.
    ///
    /// # Panics
    /// Panics if `images` is empty or the extents differ.
    pub fn from_images(images: &[Image]) -> Self {
        assert!(!images.is_empty(), "batch needs at least one image");
        let extent = images[0].extent();
        let mut data = Vec::with_capacity(extent.len() * images.len());
        for img in images {
            assert_eq!(img.extent(), extent, "all batch members must share one extent");
            data.extend_from_slice(img.as_slice());
        }
        ImageBatch { data, extent, count: images.len() }
    }

    /// `count` copies of `image`.
    pub fn repeat(image: &Image, count: usize) -> Self {
        ImageBatch {
            data: image.as_slice().repeat(count),
            extent: image.extent(),
            count,
        }
    }

    pub fn extent(&self) -> ImageExtent {
        self.extent
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Borrow batch member `i`.
    pub fn image(&self, i: usize) -> ImageView<'_> {
        assert!(i < self.count, "batch index {i} out of range (count {})", self.count);
        let n = self.extent.len();
        ImageView::new(&self.data[i * n..(i + 1) * n], self.extent)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

// ---------------------------------------------------------------------------
// Bilinear interpolation
// ---------------------------------------------------------------------------

/// Bilinear interpolation at a sub-pixel position.
///
/// `(x, y)` must lie in `[0, width-1] × [0, height-1]`; callers handle
/// out-of-range positions before calling. On the last row/column the
/// missing neighbour is replaced by the edge pixel, which carries zero
/// weight there anyway.
///
/// Non-finite pixels propagate: a NaN neighbour yields NaN even when its
/// weight is zero.
///
/// GPU EQUIVALENT: `sample_bilinear` in `shaders/cart2polar.wgsl`.
pub fn interpolate_bilinear(img: &ImageView<'_>, x: f32, y: f32) -> f32 {
    debug_assert!(x >= 0.0 && y >= 0.0, "negative sample position ({x}, {y})");

    let x0 = (x.floor() as usize).min(img.width - 1);
    let y0 = (y.floor() as usize).min(img.height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let x1 = (x0 + 1).min(img.width - 1);
    let y1 = (y0 + 1).min(img.height - 1);

    let p00 = img.get(x0, y0);
    let p10 = img.get(x1, y0);
    let p01 = img.get(x0, y1);
    let p11 = img.get(x1, y1);

    (1.0 - fx) * (1.0 - fy) * p00
        + fx * (1.0 - fy) * p10
        + (1.0 - fx) * fy * p01
        + fx * fy * p11
}
