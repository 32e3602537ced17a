//! Numeric helpers shared by the aggregators.
//!
//! Sums are carried at full `f64` precision; rounding happens once, when a
//! value leaves an aggregator as a reported figure.

/// Decimal places used for success rates, weighted values and ratios.
pub const RATE_PRECISION: u32 = 1;

/// Decimal places used for relation averages and course grades.
pub const GRADE_PRECISION: u32 = 2;

/// Round `value` to `places` decimals, halves away from zero.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// `numerator / denominator`, or `0.0` when the denominator is zero.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Arithmetic mean of `sum` over `count` items, `0.0` when there are none.
pub fn mean_or_zero(sum: f64, count: usize) -> f64 {
    ratio_or_zero(sum, count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_one_place() {
        assert_eq!(round_to(80.04, 1), 80.0);
        assert_eq!(round_to(66.666_666, 1), 66.7);
        assert_eq!(round_to(0.0, 1), 0.0);
    }

    #[test]
    fn round_to_two_places() {
        assert_eq!(round_to(0.333_333, 2), 0.33);
        assert_eq!(round_to(1.0 / 3.0 * 2.0, 2), 0.67);
    }

    #[test]
    fn round_half_goes_away_from_zero() {
        assert_eq!(round_to(0.25, 1), 0.3);
        assert_eq!(round_to(-0.25, 1), -0.3);
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        assert_eq!(ratio_or_zero(40.0, 0.0), 0.0);
        assert_eq!(ratio_or_zero(40.0, 0.5), 80.0);
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        assert_eq!(mean_or_zero(12.0, 0), 0.0);
        assert_eq!(mean_or_zero(12.0, 4), 3.0);
    }
}
