//! Rolling window statistics.

/// Rolling mean over `window` values. First `window - 1` entries are NaN.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = slice.iter().sum::<f64>() / window as f64;
    }
    result
}

/// Rolling sample standard deviation (n-1 denominator) over `window` values.
///
/// Requires `window >= 2`; the first `window - 1` entries are NaN.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window < 2 || n < window {
        return result;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window as f64 - 1.0);
        result[i] = var.sqrt();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn rolling_mean_known_values() {
        let m = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2);
        assert!(m[0].is_nan());
        assert_approx(m[1], 1.5, DEFAULT_EPSILON);
        assert_approx(m[2], 2.5, DEFAULT_EPSILON);
        assert_approx(m[3], 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_std_known_values() {
        // window [1, 3]: mean 2, var (1+1)/1 = 2
        let s = rolling_std(&[1.0, 3.0, 3.0], 2);
        assert!(s[0].is_nan());
        assert_approx(s[1], 2.0_f64.sqrt(), DEFAULT_EPSILON);
        assert_approx(s[2], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn nan_window_yields_nan() {
        let m = rolling_mean(&[1.0, f64::NAN, 3.0, 4.0], 2);
        assert!(m[1].is_nan());
        assert!(m[2].is_nan());
        assert_approx(m[3], 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn short_input_all_nan() {
        let m = rolling_mean(&[1.0, 2.0], 5);
        assert!(m.iter().all(|v| v.is_nan()));
        assert_eq!(m.len(), 2);
    }
}
