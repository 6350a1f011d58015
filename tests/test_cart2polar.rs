// tests/test_cart2polar.rs — CPU resampler against analytic references.
//
// Reference fixtures: bilinear interpolation reproduces affine functions
// exactly, so for f(x, y) = αx + βy + γ the expected polar image is
// f(cx + r·cos θ, cy + r·sin θ), evaluated here in f64. Fixtures are written
// to raw tensor files and read back, exercising the same load path as
// externally produced reference data.
//
// The fixture generator takes its centre as a literal rather than asking the
// library, so a change to the centring convention fails these scenarios.

use std::f64::consts::TAU;
use std::path::PathBuf;

use polar_warp::compare::{max_abs_error, mean_relative_error};
use polar_warp::extent::{polar_extent, ImageExtent};
use polar_warp::image::{Image, ImageBatch};
use polar_warp::polar::{cart2polar, cart2polar_batch, cart2polar_image};
use polar_warp::tensor_io::{read_f32_file_exact, write_f32_file};
use polar_warp::PolarError;

const TOLERANCE: f64 = 3e-3;
// Bilinear is exact on an affine ramp, so only f32 round-off remains. A
// one-pixel centre shift moves every sample by at least ALPHA.
const MAX_ABS_TOLERANCE: f32 = 1e-2;
const ALPHA: f64 = 0.7;
const BETA: f64 = 1.3;
const GAMMA: f64 = 50.0;

fn affine(x: f64, y: f64) -> f64 {
    ALPHA * x + BETA * y + GAMMA
}

fn ramp(extent: ImageExtent) -> Image {
    Image::from_fn(extent.width, extent.height, |x, y| affine(x as f64, y as f64) as f32)
}

fn analytic_polar(extent: ImageExtent, (cx, cy): (usize, usize)) -> Vec<f32> {
    let polar = polar_extent(extent).unwrap();
    let mut out = Vec::with_capacity(polar.len());
    for a in 0..polar.angular_steps {
        let theta = a as f64 * TAU / polar.angular_steps as f64;
        for r in 0..polar.radial_steps {
            let r = r as f64;
            out.push(affine(cx as f64 + r * theta.cos(), cy as f64 + r * theta.sin()) as f32);
        }
    }
    out
}

fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("polar-warp-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn assert_matches_reference(extent: ImageExtent, desired: &[f32], output: &[f32]) {
    let mre = mean_relative_error(desired, output);
    let max_abs = max_abs_error(desired, output);
    assert!(
        mre <= TOLERANCE && max_abs <= MAX_ABS_TOLERANCE,
        "{extent}: mean relative error {mre}, max abs error {max_abs}"
    );
}

fn run_reference_case(case: usize, extent: ImageExtent, center: (usize, usize)) {
    let dir = fixture_dir(&format!("case{case}"));
    let input_path = dir.join(format!("Input_Cart2Polar_{case}.bin"));
    let output_path = dir.join(format!("Output_Cart2Polar_{case}.bin"));
    write_f32_file(&input_path, ramp(extent).as_slice()).unwrap();
    write_f32_file(&output_path, &analytic_polar(extent, center)).unwrap();

    let polar = polar_extent(extent).unwrap();
    let input = read_f32_file_exact(&input_path, extent.len()).unwrap();
    let desired = read_f32_file_exact(&output_path, polar.len()).unwrap();

    let mut output = vec![0.0; polar.len()];
    cart2polar(&input, extent, 1, &mut output).unwrap();

    assert_matches_reference(extent, &desired, &output);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn reference_even_16x16() {
    run_reference_case(1, ImageExtent::new(16, 16), (8, 8));
}

#[test]
fn reference_odd_15x15() {
    run_reference_case(2, ImageExtent::new(15, 15), (7, 7));
}

#[test]
fn reference_even_by_odd_16x9() {
    run_reference_case(3, ImageExtent::new(16, 9), (8, 4));
}

#[test]
fn reference_non_square() {
    let cases = [
        ((32usize, 9usize), (16usize, 4usize)),
        ((7, 20), (3, 10)),
        ((2, 2), (1, 1)),
        ((1, 1), (0, 0)),
    ];
    for &((w, h), center) in &cases {
        let extent = ImageExtent::new(w, h);
        let out = cart2polar_image(&ramp(extent)).unwrap();
        assert_matches_reference(extent, &analytic_polar(extent, center), out.as_slice());
    }
}

#[test]
fn output_shape_is_radius_by_angle() {
    let out = cart2polar_image(&ramp(ImageExtent::new(16, 16))).unwrap();
    assert_eq!(out.width(), 8);
    assert_eq!(out.height(), 51);
}

#[test]
fn identical_batch_members_give_identical_outputs() {
    let img = Image::from_fn(15, 15, |x, y| ((x * 7 + y * 3) % 11) as f32 + 0.5);
    let single = cart2polar_image(&img).unwrap();

    let batch = cart2polar_batch(&ImageBatch::repeat(&img, 4)).unwrap();
    assert_eq!(batch.count(), 4);
    for i in 0..4 {
        assert_eq!(batch.image(i).as_slice(), single.as_slice(), "batch member {i}");
    }
}

#[test]
fn batch_members_do_not_bleed() {
    let a = Image::from_vec(10, 10, vec![1.0; 100]);
    let b = Image::from_vec(10, 10, vec![9.0; 100]);
    let out = cart2polar_batch(&ImageBatch::from_images(&[a, b])).unwrap();
    assert!(out.image(0).as_slice().iter().all(|&v| (v - 1.0).abs() < 1e-5));
    assert!(out.image(1).as_slice().iter().all(|&v| (v - 9.0).abs() < 1e-5));
}

#[test]
fn short_output_is_rejected_untouched() {
    let extent = ImageExtent::new(16, 16);
    let polar = polar_extent(extent).unwrap();
    let input = ImageBatch::repeat(&ramp(extent), 3);
    let mut output = vec![-7.0; 3 * polar.len() - 1];

    let err = cart2polar(input.as_slice(), extent, 3, &mut output).unwrap_err();
    assert!(matches!(
        err,
        PolarError::BufferTooSmall { required, actual }
            if required == 3 * polar.len() && actual == 3 * polar.len() - 1
    ));
    assert!(output.iter().all(|&v| v == -7.0), "rejected call wrote to the output");
}

#[test]
fn invalid_extent_is_rejected() {
    let mut output = vec![0.0; 16];
    let err = cart2polar(&[], ImageExtent::new(0, 4), 1, &mut output).unwrap_err();
    assert!(matches!(err, PolarError::InvalidExtent { width: 0, height: 4 }));
}

#[test]
fn batch_count_must_match_input() {
    let extent = ImageExtent::new(8, 8);
    let input = vec![1.0; 2 * extent.len()];
    let mut output = vec![0.0; 10_000];

    let err = cart2polar(&input, extent, 3, &mut output).unwrap_err();
    assert!(matches!(err, PolarError::InputSizeMismatch { expected: 192, actual: 128 }));

    let err = cart2polar(&input, extent, 0, &mut output).unwrap_err();
    assert!(matches!(err, PolarError::InvalidBatch));
}

#[test]
#[cfg(target_pointer_width = "64")]
fn overflowing_extent_is_rejected_without_panic() {
    // 2^33 × 2^33 pixels does not fit in usize; the size checks must
    // report it instead of wrapping or panicking.
    let extent = ImageExtent::new(1 << 33, 1 << 33);
    let err = cart2polar(&[], extent, 1, &mut []).unwrap_err();
    assert!(matches!(err, PolarError::InputSizeMismatch { expected: usize::MAX, actual: 0 }));

    let err = cart2polar(&[1.0; 4], extent, 1, &mut []).unwrap_err();
    assert!(matches!(err, PolarError::InputSizeMismatch { expected: usize::MAX, actual: 4 }));
}

#[test]
fn nan_input_passes_through() {
    let mut img = Image::from_vec(9, 9, vec![1.0; 81]);
    img.set(4, 4, f32::NAN);
    let out = cart2polar_image(&img).unwrap();
    // Radius 0 samples the centre pixel on every angle row.
    for a in 0..out.height() {
        assert!(out.get(0, a).is_nan(), "angle row {a}");
    }
    // The outermost ring never touches the centre.
    let last = out.width() - 1;
    assert!((0..out.height()).all(|a| out.get(last, a).is_finite()));
}
