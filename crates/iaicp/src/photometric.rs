use iaicp_3d::cloud::GridPoint;

/// Largest gray value, used to normalize intensity differences.
pub const MAX_GRAY: f64 = 255.0;

/// Signed intensity residual of a target sample against a source sample.
#[inline]
pub fn intensity_residual(target: &GridPoint, source: &GridPoint) -> f64 {
    target.intensity - source.intensity
}

/// Normalized gray similarity in `[0, 1]`: one for equal intensities, zero for black
/// against white.
///
/// NaN when either intensity is NaN.
#[inline]
pub fn gray_similarity(a: &GridPoint, b: &GridPoint) -> f64 {
    let diff = (a.intensity - b.intensity).abs();
    if diff.is_nan() {
        return f64::NAN;
    }
    1.0 - (diff / MAX_GRAY).min(1.0)
}
