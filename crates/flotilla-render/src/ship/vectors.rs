use crate::coords::Vec2;

/// Length of each arrowhead stroke, in world units.
pub const ARROWHEAD_LENGTH: f32 = 0.2;

/// Points per arrow: stem plus two arrowhead strokes, two endpoints each.
pub const POINTS_PER_ARROW: usize = 6;

// Rotation by -π/4 and +π/4, as (x-row, y-row).
const COS_ALPHA: f32 = std::f32::consts::FRAC_1_SQRT_2;
const SIN_ALPHA_LEFT: f32 = -std::f32::consts::FRAC_1_SQRT_2;
const SIN_ALPHA_RIGHT: f32 = std::f32::consts::FRAC_1_SQRT_2;

const X_MATRIX_LEFT: Vec2 = Vec2::new(COS_ALPHA, SIN_ALPHA_LEFT);
const Y_MATRIX_LEFT: Vec2 = Vec2::new(-SIN_ALPHA_LEFT, COS_ALPHA);
const X_MATRIX_RIGHT: Vec2 = Vec2::new(COS_ALPHA, SIN_ALPHA_RIGHT);
const Y_MATRIX_RIGHT: Vec2 = Vec2::new(-SIN_ALPHA_RIGHT, COS_ALPHA);

/// Replaces `out` with line-list endpoints drawing one arrow per sample.
///
/// A sample whose scaled vector is zero or non-finite collapses to six copies
/// of its position.
///
/// # Panics
/// If `positions` and `vectors` differ in length.
pub fn build_vector_arrows(
    positions: &[Vec2],
    vectors: &[Vec2],
    length_adjustment: f32,
    out: &mut Vec<Vec2>,
) {
    assert_eq!(
        positions.len(),
        vectors.len(),
        "vector overlay: {} positions but {} vectors",
        positions.len(),
        vectors.len()
    );

    out.clear();
    out.reserve(positions.len() * POINTS_PER_ARROW);

    for (&position, &vector) in positions.iter().zip(vectors) {
        let stem = vector * length_adjustment;
        if !position.is_finite() || !stem.is_finite() || stem.length() == 0.0 {
            let anchor = if position.is_finite() { position } else { Vec2::zero() };
            out.extend(std::iter::repeat_n(anchor, POINTS_PER_ARROW));
            continue;
        }

        let tip = position + stem;
        let left = Vec2::new(-vector.dot(X_MATRIX_LEFT), -vector.dot(Y_MATRIX_LEFT)).normalise();
        let right = Vec2::new(-vector.dot(X_MATRIX_RIGHT), -vector.dot(Y_MATRIX_RIGHT)).normalise();

        out.extend_from_slice(&[
            position,
            tip,
            tip,
            tip + left * ARROWHEAD_LENGTH,
            tip,
            tip + right * ARROWHEAD_LENGTH,
        ]);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn arrows(positions: &[Vec2], vectors: &[Vec2], k: f32) -> Vec<Vec2> {
        let mut out = Vec::new();
        build_vector_arrows(positions, vectors, k, &mut out);
        out
    }

    // ── geometry ─────────────────────────────────────────────────────────

    #[test]
    fn unit_x_arrow() {
        let a = arrows(&[Vec2::zero()], &[Vec2::new(1.0, 0.0)], 1.0);
        assert_eq!(a.len(), 6);
        assert_eq!(a[0], Vec2::zero());
        assert_eq!(a[1], Vec2::new(1.0, 0.0));

        for stroke in [&a[2..4], &a[4..6]] {
            assert_eq!(stroke[0], Vec2::new(1.0, 0.0));
            assert_relative_eq!((stroke[1] - stroke[0]).length(), 0.2, epsilon = 1e-6);
            // Arrowheads point back along the stem.
            assert!(stroke[1].x < 1.0);
        }

        // One stroke on each side of the stem.
        assert!(a[3].y * a[5].y < 0.0);
    }

    #[test]
    fn length_adjustment_scales_stem_only() {
        let a = arrows(&[Vec2::new(1.0, 1.0)], &[Vec2::new(0.0, 2.0)], 0.5);
        assert_relative_eq!(a[1].x, 1.0);
        assert_relative_eq!(a[1].y, 2.0);
        assert_relative_eq!((a[3] - a[2]).length(), 0.2, epsilon = 1e-6);
    }

    #[test]
    fn output_holds_latest_call_only() {
        let mut out = Vec::new();
        build_vector_arrows(&[Vec2::zero(); 3], &[Vec2::new(1.0, 0.0); 3], 1.0, &mut out);
        build_vector_arrows(&[Vec2::zero()], &[Vec2::new(1.0, 0.0)], 1.0, &mut out);
        assert_eq!(out.len(), 6);
    }

    // ── degenerate input ─────────────────────────────────────────────────

    #[test]
    fn zero_vector_collapses_to_position() {
        let p = Vec2::new(2.0, -3.0);
        let a = arrows(&[p], &[Vec2::zero()], 1.0);
        assert!(a.iter().all(|&q| q == p));
    }

    #[test]
    fn non_finite_vector_never_yields_nan() {
        let a = arrows(
            &[Vec2::new(1.0, 1.0), Vec2::new(0.0, 0.0)],
            &[Vec2::new(f32::NAN, 0.0), Vec2::new(f32::INFINITY, 1.0)],
            1.0,
        );
        assert!(a.iter().all(|q| q.is_finite()));
    }

    #[test]
    #[should_panic(expected = "vector overlay")]
    fn mismatched_lengths_panic() {
        arrows(&[Vec2::zero()], &[], 1.0);
    }
}
