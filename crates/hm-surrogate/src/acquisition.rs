//! Expected Improvement for minimization.

/// Expected Improvement of a point with posterior `(mean, var)` over the
/// incumbent `best`, with exploration offset `xi`.
pub fn expected_improvement(mean: f64, var: f64, best: f64, xi: f64) -> f64 {
    let std = var.max(0.0).sqrt();
    let improvement = best - mean - xi;
    if std < 1e-12 {
        return improvement.max(0.0);
    }
    let z = improvement / std;
    (improvement * normal_cdf(z) + std * normal_pdf(z)).max(0.0)
}

/// Standard normal CDF
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Standard normal PDF
pub fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Error function, Abramowitz and Stegun 7.1.26 (max error 1.5e-7).
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}
