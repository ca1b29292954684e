//! Fractional motion accumulator
//!
//! Pointer APIs only take whole units, but the correction loop produces
//! fractional displacements (e.g. `0.35` per tick). Truncating every request
//! would silently drop the fractional part forever, so the accumulator keeps
//! the residue and releases it once it crosses an integer boundary.
//!
//! ```text
//! request 0.5 ──► remainder 0.5 ──► emit 0 (keep 0.5)
//! request 0.5 ──► remainder 1.0 ──► emit 1 (keep 0.0)
//! ```

/// Converts a stream of fractional deltas into integer pointer moves
/// without losing sub-unit precision.
///
/// Owned exclusively by one correction loop instance. A fresh loop always
/// starts from a fresh (zeroed) accumulator.
#[derive(Debug, Clone, Default)]
pub struct MotionAccumulator {
    remainder_x: f64,
    remainder_y: f64,
}

impl MotionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the requested delta and returns the whole-unit part to emit.
    ///
    /// The remainders are updated before the caller decides whether to issue
    /// a move, so a `(0, 0)` result still carries the request forward.
    /// Truncation is toward zero: two requests of `-0.5` emit `-1` once,
    /// never `-2`.
    pub fn accumulate(&mut self, dx: f64, dy: f64) -> (i32, i32) {
        self.remainder_x += dx;
        self.remainder_y += dy;

        let int_dx = self.remainder_x.trunc();
        let int_dy = self.remainder_y.trunc();

        self.remainder_x -= int_dx;
        self.remainder_y -= int_dy;

        // `as` saturates; callers clamp requests long before i32 range matters
        (int_dx as i32, int_dy as i32)
    }

    /// Residue carried into the next call.
    pub fn remainder(&self) -> (f64, f64) {
        (self.remainder_x, self.remainder_y)
    }

    pub fn reset(&mut self) {
        self.remainder_x = 0.0;
        self.remainder_y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_steps_sum_without_drift() {
        let mut acc = MotionAccumulator::new();
        let mut total_x = 0;
        let mut non_zero = 0;
        for _ in 0..8 {
            let (dx, dy) = acc.accumulate(0.5, 0.0);
            assert_eq!(dy, 0);
            total_x += dx;
            if dx != 0 {
                non_zero += 1;
            }
        }
        assert_eq!(total_x, 4);
        assert_eq!(non_zero, 4);
        assert_eq!(acc.remainder(), (0.0, 0.0));
    }

    #[test]
    fn negative_requests_truncate_toward_zero() {
        let mut acc = MotionAccumulator::new();
        let first = acc.accumulate(-0.5, 0.0);
        let second = acc.accumulate(-0.5, 0.0);
        assert_eq!(first, (0, 0));
        assert_eq!(second, (-1, 0));
        assert_eq!(first.0 + second.0, -1);
    }

    #[test]
    fn tiny_requests_eventually_cross_a_unit() {
        let mut acc = MotionAccumulator::new();
        let emitted: i32 = (0..10).map(|_| acc.accumulate(0.0, 0.25).1).sum();
        assert_eq!(emitted, 2);
        let (_, ry) = acc.remainder();
        assert!((ry - 0.5).abs() < 1e-9);
    }

    #[test]
    fn large_requests_are_not_clamped_here() {
        let mut acc = MotionAccumulator::new();
        assert_eq!(acc.accumulate(1234.75, -987.5), (1234, -987));
        let (rx, ry) = acc.remainder();
        assert!((rx - 0.75).abs() < 1e-9);
        assert!((ry + 0.5).abs() < 1e-9);
    }

    #[test]
    fn reset_drops_carried_residue() {
        let mut acc = MotionAccumulator::new();
        acc.accumulate(0.9, -0.9);
        acc.reset();
        assert_eq!(acc.accumulate(0.2, -0.2), (0, 0));
        let (rx, ry) = acc.remainder();
        assert!((rx - 0.2).abs() < 1e-9);
        assert!((ry + 0.2).abs() < 1e-9);
    }
}
