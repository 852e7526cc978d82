//! Least-squares trend fits shared by the predictor and the classifier.

/// A fitted straight line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Value at x = 0
    pub intercept: f64,
    /// Change in y per unit x
    pub slope: f64,
    /// Coefficient of determination (0.0 to 1.0)
    pub r_squared: f64,
    /// Residual standard deviation, once there are more points than parameters
    pub residual_sd: Option<f64>,
}

impl LinearFit {
    /// Fitted value at `x`.
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// A fitted parabola `y = a + b * x + c * x^2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticFit {
    /// Value at x = 0
    pub a: f64,
    /// Slope at x = 0
    pub b: f64,
    /// Half the second derivative
    pub c: f64,
    /// Coefficient of determination (0.0 to 1.0)
    pub r_squared: f64,
}

impl QuadraticFit {
    /// Fitted value at `x`.
    pub fn at(&self, x: f64) -> f64 {
        self.a + self.b * x + self.c * x * x
    }
}

const EPSILON: f64 = 1e-12;

/// Weighted least-squares line. Returns `None` when the x values do not vary
/// or the weights sum to zero.
pub fn weighted_linear_fit(xs: &[f64], ys: &[f64], weights: &[f64]) -> Option<LinearFit> {
    let n = xs.len();
    if n < 2 || ys.len() != n || weights.len() != n {
        return None;
    }

    let total_weight: f64 = weights.iter().sum();
    if total_weight <= EPSILON {
        return None;
    }

    let x_mean = xs.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>() / total_weight;
    let y_mean = ys.iter().zip(weights).map(|(y, w)| y * w).sum::<f64>() / total_weight;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in 0..n {
        let dx = xs[i] - x_mean;
        sxx += weights[i] * dx * dx;
        sxy += weights[i] * dx * (ys[i] - y_mean);
    }
    if sxx <= EPSILON {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for i in 0..n {
        let residual = ys[i] - (intercept + slope * xs[i]);
        ss_res += weights[i] * residual * residual;
        ss_tot += weights[i] * (ys[i] - y_mean).powi(2);
    }

    // Unbiased for n > 2: the line consumes two degrees of freedom.
    let residual_sd = (n > 2).then(|| {
        let scale = n as f64 / (n as f64 - 2.0);
        (ss_res / total_weight * scale).sqrt()
    });

    Some(LinearFit {
        intercept,
        slope,
        r_squared: r_squared(ss_res, ss_tot),
        residual_sd,
    })
}

/// Ordinary least-squares parabola. Returns `None` for fewer than three
/// points or a singular system (fewer than three distinct x values).
pub fn quadratic_fit(xs: &[f64], ys: &[f64]) -> Option<QuadraticFit> {
    let n = xs.len();
    if n < 3 || ys.len() != n {
        return None;
    }

    // Center x to keep the normal equations well conditioned.
    let m = xs.iter().sum::<f64>() / n as f64;
    let mut s = [0.0f64; 5];
    let mut t = [0.0f64; 3];
    for (x, y) in xs.iter().zip(ys) {
        let u = x - m;
        let mut p = 1.0;
        for (k, sk) in s.iter_mut().enumerate() {
            *sk += p;
            if k < 3 {
                t[k] += p * y;
            }
            p *= u;
        }
    }

    let matrix = [[s[0], s[1], s[2]], [s[1], s[2], s[3]], [s[2], s[3], s[4]]];
    let [a0, b0, c] = solve3(matrix, t)?;

    // Shift back from u = x - m to x.
    let a = a0 - b0 * m + c * m * m;
    let b = b0 - 2.0 * c * m;

    let y_mean = ys.iter().sum::<f64>() / n as f64;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let fitted = a + b * x + c * x * x;
        ss_res += (y - fitted).powi(2);
        ss_tot += (y - y_mean).powi(2);
    }

    Some(QuadraticFit {
        a,
        b,
        c,
        r_squared: r_squared(ss_res, ss_tot),
    })
}

/// R² with a flat series reported as zero explained variance.
fn r_squared(ss_res: f64, ss_tot: f64) -> f64 {
    if ss_tot <= EPSILON {
        0.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    }
}

/// Gaussian elimination with partial pivoting on a 3x3 system.
fn solve3(mut m: [[f64; 3]; 3], mut v: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() <= EPSILON {
            return None;
        }
        m.swap(col, pivot);
        v.swap(col, pivot);

        for row in (col + 1)..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..3 {
                m[row][k] -= factor * m[col][k];
            }
            v[row] -= factor * v[col];
        }
    }

    let mut out = [0.0f64; 3];
    for row in (0..3).rev() {
        let tail: f64 = ((row + 1)..3).map(|k| m[row][k] * out[k]).sum();
        out[row] = (v[row] - tail) / m[row][row];
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_linear_fit_exact_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [10.0, 8.0, 6.0, 4.0];
        let fit = weighted_linear_fit(&xs, &ys, &[1.0; 4]).unwrap();

        assert!(close(fit.slope, -2.0));
        assert!(close(fit.intercept, 10.0));
        assert!(close(fit.r_squared, 1.0));
        assert!(close(fit.residual_sd.unwrap(), 0.0));
        assert!(close(fit.at(5.0), 0.0));
    }

    #[test]
    fn test_linear_fit_weights_pull_toward_heavy_points() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 1.0, 5.0];
        let even = weighted_linear_fit(&xs, &ys, &[1.0, 1.0, 1.0]).unwrap();
        let light_tail = weighted_linear_fit(&xs, &ys, &[1.0, 1.0, 0.1]).unwrap();
        assert!(light_tail.slope < even.slope);
    }

    #[test]
    fn test_linear_fit_two_points_has_no_residual_sd() {
        let fit = weighted_linear_fit(&[0.0, 7.0], &[130.0, 129.0], &[0.9, 0.9]).unwrap();
        assert!(fit.residual_sd.is_none());
    }

    #[test]
    fn test_linear_fit_degenerate_inputs() {
        assert!(weighted_linear_fit(&[1.0, 1.0], &[3.0, 4.0], &[1.0, 1.0]).is_none());
        assert!(weighted_linear_fit(&[0.0, 1.0], &[3.0, 4.0], &[0.0, 0.0]).is_none());
        assert!(weighted_linear_fit(&[0.0], &[3.0], &[1.0]).is_none());
    }

    #[test]
    fn test_quadratic_fit_recovers_curve() {
        let xs: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 130.0 - 3.0 * x + 0.25 * x * x).collect();
        let fit = quadratic_fit(&xs, &ys).unwrap();

        assert!(close(fit.a, 130.0));
        assert!(close(fit.b, -3.0));
        assert!(close(fit.c, 0.25));
        assert!(close(fit.r_squared, 1.0));
        assert!(close(fit.at(2.0), 125.0));
    }

    #[test]
    fn test_quadratic_fit_flat_series_has_zero_r_squared() {
        let fit = quadratic_fit(&[0.0, 1.0, 2.0, 3.0], &[5.0; 4]).unwrap();
        assert_eq!(fit.r_squared, 0.0);
    }

    #[test]
    fn test_quadratic_fit_singular() {
        assert!(quadratic_fit(&[1.0, 1.0, 2.0, 2.0], &[3.0, 4.0, 5.0, 6.0]).is_none());
    }
}
