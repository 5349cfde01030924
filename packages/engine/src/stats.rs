//! Small shared numeric helpers for the scoring and outlier code.

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

/// Population standard deviation. Returns 0.0 for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Rounds to `places` decimal places, half away from zero.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places.cast_signed());
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_std_dev(&[]), 0.0);
    }

    #[test]
    fn population_std_dev_matches_hand_computation() {
        // [1, 2, 3, 4]: mean 2.5, population variance 1.25
        let std = population_std_dev(&[1.0, 2.0, 3.0, 4.0]);
        assert!((std - 1.25_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn std_dev_of_constant_values_is_zero() {
        assert_eq!(population_std_dev(&[2.0, 2.0, 2.0]), 0.0);
    }

    #[test]
    fn rounding_to_places() {
        assert!((round_to(1.0949, 2) - 1.09).abs() < 1e-12);
        assert!((round_to(2.189_999, 2) - 2.19).abs() < 1e-12);
        assert!((round_to(0.123_45, 3) - 0.123).abs() < 1e-12);
    }
}
