//! One-sample t-test against zero, from first principles.
//!
//! Student-t CDF via the regularized incomplete beta function (Lentz
//! continued fraction) and a Lanczos ln-gamma. One-sided: H0 mean = 0,
//! H1 mean > 0.
//!
//! The p-values gate pattern significance; they are honest small-sample
//! statistics, not guarantees about future returns.

use serde::{Deserialize, Serialize};

/// Lanczos approximation for ln(Gamma(x)), g=7, n=9.
fn ln_gamma(x: f64) -> f64 {
    #[allow(clippy::excessive_precision)]
    const COEFFICIENTS: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];
    const G: f64 = 7.0;

    if x < 0.5 {
        // Reflection: Gamma(x) * Gamma(1-x) = pi / sin(pi*x)
        let log_pi = std::f64::consts::PI.ln();
        let sin_val = (std::f64::consts::PI * x).sin();
        if sin_val.abs() < 1e-300 {
            return f64::INFINITY;
        }
        return log_pi - sin_val.abs().ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, &c) in COEFFICIENTS.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }

    let t = x + G + 0.5;
    let log_sqrt_2pi = (2.0 * std::f64::consts::PI).sqrt().ln();

    log_sqrt_2pi + (t.ln() * (x + 0.5)) - t + sum.ln()
}

/// Regularized incomplete beta I_x(a, b) via modified Lentz continued
/// fraction, with the symmetry relation for convergence when x is large.
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) {
        return f64::NAN;
    }
    if x == 0.0 {
        return 0.0;
    }
    if x == 1.0 {
        return 1.0;
    }

    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_incomplete_beta(b, a, 1.0 - x);
    }

    let ln_prefix =
        a * x.ln() + b * (1.0 - x).ln() - ln_gamma(a) - ln_gamma(b) + ln_gamma(a + b) - a.ln();
    let prefix = ln_prefix.exp();

    let max_iter = 200;
    let epsilon = 1e-14;
    let tiny = 1e-30;

    let mut c = 1.0_f64;
    let mut d = 1.0 - (a + b) * x / (a + 1.0);
    if d.abs() < tiny {
        d = tiny;
    }
    d = 1.0 / d;
    let mut f = d;

    for m in 1..=max_iter {
        let m_f64 = m as f64;

        let numerator_even =
            m_f64 * (b - m_f64) * x / ((a + 2.0 * m_f64 - 1.0) * (a + 2.0 * m_f64));
        d = 1.0 + numerator_even * d;
        if d.abs() < tiny {
            d = tiny;
        }
        c = 1.0 + numerator_even / c;
        if c.abs() < tiny {
            c = tiny;
        }
        d = 1.0 / d;
        f *= c * d;

        let numerator_odd = -((a + m_f64) * (a + b + m_f64) * x)
            / ((a + 2.0 * m_f64) * (a + 2.0 * m_f64 + 1.0));
        d = 1.0 + numerator_odd * d;
        if d.abs() < tiny {
            d = tiny;
        }
        c = 1.0 + numerator_odd / c;
        if c.abs() < tiny {
            c = tiny;
        }
        d = 1.0 / d;
        let delta = c * d;
        f *= delta;

        if (delta - 1.0).abs() < epsilon {
            break;
        }
    }

    prefix * f
}

/// Student's t-distribution CDF: P(T <= t) with `df` degrees of freedom.
pub fn t_cdf(t: f64, df: f64) -> f64 {
    if df <= 0.0 {
        return f64::NAN;
    }
    if t == 0.0 {
        return 0.5;
    }

    let x = df / (df + t * t);
    let ib = regularized_incomplete_beta(df / 2.0, 0.5, x);

    if t > 0.0 {
        1.0 - 0.5 * ib
    } else {
        0.5 * ib
    }
}

/// Result of the one-sided test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TTest {
    pub t_statistic: f64,
    /// One-sided p-value: P(T > t) under H0.
    pub p_value: f64,
    pub df: f64,
}

/// One-sided one-sample t-test: H0 mean = 0, H1 mean > 0.
///
/// Returns None for fewer than 2 values. Identical values are degenerate:
/// t = +inf / p = 0 when the mean is positive, else p = 0.5.
pub fn one_sided_t_test(values: &[f64]) -> Option<TTest> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let n_f = n as f64;
    let mean = values.iter().sum::<f64>() / n_f;
    let variance = values.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n_f - 1.0);
    let std_err = (variance / n_f).sqrt();
    let df = n_f - 1.0;

    if std_err < 1e-15 {
        return Some(if mean > 0.0 {
            TTest { t_statistic: f64::INFINITY, p_value: 0.0, df }
        } else {
            TTest { t_statistic: 0.0, p_value: 0.5, df }
        });
    }

    let t_stat = mean / std_err;
    let p_value = 1.0 - t_cdf(t_stat, df);

    Some(TTest { t_statistic: t_stat, p_value, df })
}
