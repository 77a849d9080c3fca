//! Small-sample statistics for index and weather series
//!
//! Series are tens of points long, so everything here is a direct
//! single-pass computation over slices.

/// Ordinary least squares fit of y = intercept + slope × x
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination (0 when y has no variance)
    pub r_squared: f64,
    /// Standard deviation of residuals (n - 2 degrees of freedom)
    pub residual_std: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Median absolute deviation
pub fn mad(values: &[f64]) -> Option<f64> {
    let m = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}

/// Fit a line through (x, y) pairs
///
/// Returns None with fewer than 2 points or when all x are equal.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);

    let mx = mean(x)?;
    let my = mean(y)?;

    let sxx: f64 = x.iter().map(|xi| (xi - mx).powi(2)).sum();
    if sxx <= f64::EPSILON {
        return None;
    }
    let sxy: f64 = x.iter().zip(y).map(|(xi, yi)| (xi - mx) * (yi - my)).sum();
    let syy: f64 = y.iter().map(|yi| (yi - my).powi(2)).sum();

    let slope = sxy / sxx;
    let intercept = my - slope * mx;

    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (yi - (intercept + slope * xi)).powi(2))
        .sum();

    let r_squared = if syy > f64::EPSILON { (1.0 - ss_res / syy).clamp(0.0, 1.0) } else { 0.0 };
    let residual_std = if n > 2 { (ss_res / (n - 2) as f64).sqrt() } else { 0.0 };

    Some(LinearFit { slope, intercept, r_squared, residual_std })
}

/// Centered moving average
///
/// The window shrinks symmetrically at the edges, so end points keep their
/// raw value and a linear series passes through unchanged.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || values.len() < 2 {
        return values.to_vec();
    }
    let half = window / 2;
    let n = values.len();
    (0..n)
        .map(|i| {
            let h = half.min(i).min(n - 1 - i);
            let slice = &values[i - h..=i + h];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = linear_regression(&x, &y).unwrap();
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.residual_std, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_regression() {
        assert!(linear_regression(&[1.0], &[2.0]).is_none());
        assert!(linear_regression(&[2.0, 2.0], &[1.0, 3.0]).is_none());
    }

    #[test]
    fn test_moving_average_edges() {
        let smoothed = moving_average(&[1.0, 2.0, 6.0, 4.0], 3);
        assert_relative_eq!(smoothed[0], 1.0);
        assert_relative_eq!(smoothed[1], 3.0);
        assert_relative_eq!(smoothed[2], 4.0);
        assert_relative_eq!(smoothed[3], 4.0);

        let linear = moving_average(&[0.1, 0.2, 0.3, 0.4, 0.5], 5);
        assert_relative_eq!(linear[1], 0.2, epsilon = 1e-12);
        assert_relative_eq!(linear[2], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_median_and_mad() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(mad(&[1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0]), Some(1.0));
        assert_eq!(std_dev(&[1.0]), None);
    }
}
