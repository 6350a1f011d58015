// compare.rs — Tolerance-based comparison of sample buffers.
//
// Results from different back-ends (CPU libm vs GPU cos/sin, fused vs
// unfused multiply-add) never agree bit for bit. Acceptance is judged on
// the mean relative error instead.

/// Floor for `|expected|` so near-zero references do not blow up the ratio.
pub const RELATIVE_EPSILON: f64 = 1e-6;

/// Mean of `|actual - expected| / max(|expected|, ε)` over all elements.
///
/// Accumulates in f64. Returns 0.0 for empty inputs.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn mean_relative_error(expected: &[f32], actual: &[f32]) -> f64 {
    assert_eq!(
        expected.len(),
        actual.len(),
        "cannot compare buffers of different length"
    );
    if expected.is_empty() {
        return 0.0;
    }

    let sum: f64 = expected
        .iter()
        .zip(actual)
        .map(|(&e, &a)| {
            let e = e as f64;
            (a as f64 - e).abs() / e.abs().max(RELATIVE_EPSILON)
        })
        .sum();
    sum / expected.len() as f64
}

/// Largest `|actual - expected|`. Handy next to the mean when a
/// comparison fails.
pub fn max_abs_error(expected: &[f32], actual: &[f32]) -> f32 {
    assert_eq!(expected.len(), actual.len());
    expected
        .iter()
        .zip(actual)
        .map(|(&e, &a)| (a - e).abs())
        .fold(0.0, f32::max)
}
