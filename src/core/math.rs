//! Scalar Helpers
//!
//! Interpolation and range mapping shared by the spread model and the
//! targeting code.

/// Tolerance used for "has this value settled" checks.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// Below this squared distance an interpolation snaps to its target.
pub const SMALL_NUMBER: f32 = 1.0e-8;

/// Check if two values are within `tolerance` of each other.
#[inline]
pub fn nearly_equal(a: f32, b: f32, tolerance: f32) -> bool {
    (a - b).abs() <= tolerance
}

/// Frame-rate independent approach of `current` toward `target`.
///
/// Moves `(target - current) * clamp(dt * rate, 0, 1)` per call. A
/// non-positive rate snaps straight to the target.
#[inline]
pub fn finterp_to(current: f32, target: f32, delta_seconds: f32, rate: f32) -> f32 {
    if rate <= 0.0 {
        return target;
    }

    let dist = target - current;
    if dist * dist < SMALL_NUMBER {
        return target;
    }

    let alpha = (delta_seconds * rate).clamp(0.0, 1.0);
    current + dist * alpha
}

/// Map `value` from `[in_a, in_b]` onto `[out_a, out_b]`, clamping to the
/// output range.
#[inline]
pub fn map_range_clamped(in_range: (f32, f32), out_range: (f32, f32), value: f32) -> f32 {
    let (in_a, in_b) = in_range;
    let (out_a, out_b) = out_range;

    let span = in_b - in_a;
    let alpha = if span.abs() < SMALL_NUMBER {
        if value >= in_b { 1.0 } else { 0.0 }
    } else {
        ((value - in_a) / span).clamp(0.0, 1.0)
    };
    out_a + (out_b - out_a) * alpha
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finterp_to_moves_proportionally() {
        // 5/s for 0.1s closes half the gap
        let v = finterp_to(1.0, 0.0, 0.1, 5.0);
        assert!(nearly_equal(v, 0.5, 1.0e-6));
    }

    #[test]
    fn test_finterp_to_never_overshoots() {
        let v = finterp_to(1.0, 0.0, 10.0, 5.0);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn test_finterp_to_snaps() {
        assert_eq!(finterp_to(1.0, 0.25, 0.016, 0.0), 0.25);
        assert_eq!(finterp_to(0.25 + 1.0e-5, 0.25, 0.016, 5.0), 0.25);
    }

    #[test]
    fn test_map_range_clamped() {
        // Pistol standing still: speed [80, 100] -> [0.9, 1.0]
        assert_eq!(map_range_clamped((80.0, 100.0), (0.9, 1.0), 0.0), 0.9);
        assert_eq!(map_range_clamped((80.0, 100.0), (0.9, 1.0), 500.0), 1.0);
        assert!(nearly_equal(map_range_clamped((80.0, 100.0), (0.9, 1.0), 90.0), 0.95, 1.0e-6));
    }

    #[test]
    fn test_map_range_degenerate_input() {
        assert_eq!(map_range_clamped((5.0, 5.0), (0.0, 1.0), 4.0), 0.0);
        assert_eq!(map_range_clamped((5.0, 5.0), (0.0, 1.0), 6.0), 1.0);
    }
}
