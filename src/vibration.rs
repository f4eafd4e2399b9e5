//! Vibration magnitude and RPM estimation

use crate::adxl345::AccelerationSample;

/// Euclidean norm of a 3-axis sample, in g
///
/// Zero for an all-zero sample. NaN or infinite axes propagate.
pub fn vibration_magnitude(sample: &AccelerationSample) -> f64 {
    (sample.x * sample.x + sample.y * sample.y + sample.z * sample.z).sqrt()
}

/// Linear RPM estimate before clamping
pub fn raw_rpm(magnitude: f64, conversion_factor: f64) -> f64 {
    conversion_factor * magnitude
}

/// RPM estimate clamped to `[0, threshold]`
///
/// NaN maps to 0 so the result is in range for every input.
pub fn to_rpm(magnitude: f64, conversion_factor: f64, threshold: f64) -> f64 {
    let raw = raw_rpm(magnitude, conversion_factor);
    if raw.is_nan() {
        return 0.0;
    }
    raw.max(0.0).min(threshold)
}

/// Pipeline result for one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Vibration magnitude in g
    pub vibration: f64,
    /// Clamped RPM
    pub rpm: f64,
    /// Unclamped RPM, used for the over-threshold alarm
    pub raw_rpm: f64,
}

impl Estimate {
    pub fn from_sample(sample: &AccelerationSample, conversion_factor: f64, threshold: f64) -> Self {
        let vibration = vibration_magnitude(sample);
        Self {
            vibration,
            rpm: to_rpm(vibration, conversion_factor, threshold),
            raw_rpm: raw_rpm(vibration, conversion_factor),
        }
    }

    pub fn exceeds(&self, threshold: f64) -> bool {
        self.raw_rpm > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample_has_zero_magnitude() {
        assert_eq!(vibration_magnitude(&AccelerationSample::new(0.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_magnitude_is_euclidean_norm() {
        let m = vibration_magnitude(&AccelerationSample::new(3.0, -4.0, 12.0));
        assert!((m - 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_magnitude_nonnegative_and_zero_only_at_origin() {
        let values = [-2.5, -0.0039, 0.0, 0.0039, 1.0, 16.0];
        for &x in &values {
            for &y in &values {
                for &z in &values {
                    let m = vibration_magnitude(&AccelerationSample::new(x, y, z));
                    assert!(m >= 0.0);
                    assert_eq!(m == 0.0, x == 0.0 && y == 0.0 && z == 0.0);
                }
            }
        }
    }

    #[test]
    fn test_non_finite_input_propagates() {
        assert!(vibration_magnitude(&AccelerationSample::new(f64::NAN, 0.0, 0.0)).is_nan());
        assert!(vibration_magnitude(&AccelerationSample::new(f64::INFINITY, 0.0, 0.0)).is_infinite());
    }

    #[test]
    fn test_rpm_of_zero_is_zero() {
        assert_eq!(to_rpm(0.0, 100.0, 3000.0), 0.0);
    }

    #[test]
    fn test_rpm_scales_linearly_below_threshold() {
        assert!((to_rpm(0.9984, 100.0, 3000.0) - 99.84).abs() < 1e-9);
    }

    #[test]
    fn test_rpm_clamps_to_threshold() {
        assert_eq!(to_rpm(50.0, 100.0, 3000.0), 3000.0);
        // Exactly at threshold / factor and anything above
        assert_eq!(to_rpm(30.0, 100.0, 3000.0), 3000.0);
        assert_eq!(to_rpm(1e9, 100.0, 3000.0), 3000.0);
        assert_eq!(to_rpm(f64::INFINITY, 100.0, 3000.0), 3000.0);
    }

    #[test]
    fn test_rpm_always_in_range() {
        for m in [-10.0, 0.0, 1e-6, 1.0, 29.999, 30.0, 31.0, f64::NAN, f64::INFINITY] {
            let rpm = to_rpm(m, 100.0, 3000.0);
            assert!((0.0..=3000.0).contains(&rpm), "rpm {} for magnitude {}", rpm, m);
        }
    }

    #[test]
    fn test_estimate_alarm_uses_unclamped_rpm() {
        let sample = AccelerationSample::new(50.0, 0.0, 0.0);
        let estimate = Estimate::from_sample(&sample, 100.0, 3000.0);
        assert_eq!(estimate.rpm, 3000.0);
        assert_eq!(estimate.raw_rpm, 5000.0);
        assert!(estimate.exceeds(3000.0));

        let calm = Estimate::from_sample(&AccelerationSample::new(1.0, 0.0, 0.0), 100.0, 3000.0);
        assert!(!calm.exceeds(3000.0));
    }
}
