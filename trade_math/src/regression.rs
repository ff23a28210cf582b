//! Least-squares regression for trend fitting
//!
//! Contains:
//! - Residual variance of an ordinary least-squares line
//! - Penalised (ridge) least squares over an arbitrary design matrix

use crate::{MathError, Result};

/// Mean squared residual of the ordinary least-squares line through (x, y)
pub fn linear_residual_variance(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "x and y must have the same length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(MathError::InsufficientData(
            "Need at least 2 points for linear regression".to_string(),
        ));
    }

    let n = x.len() as f64;
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        numerator += (xi - x_mean) * (yi - y_mean);
        denominator += (xi - x_mean) * (xi - x_mean);
    }

    if denominator.abs() < 1e-12 {
        return Err(MathError::CalculationError(
            "Cannot calculate slope: x values are too similar".to_string(),
        ));
    }

    let slope = numerator / denominator;
    let intercept = y_mean - slope * x_mean;
    let ss_residual: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| (yi - (slope * xi + intercept)).powi(2))
        .sum();

    Ok(ss_residual / n)
}

/// Solve `min ||y - X b||^2 + sum_j penalties[j] * b[j]^2`.
///
/// `design` is row-major: one row per observation, one column per coefficient.
/// A zero penalty leaves that coefficient unregularised.
pub fn ridge_least_squares(design: &[Vec<f64>], y: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    if design.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but {} targets",
            design.len(),
            y.len()
        )));
    }
    let cols = penalties.len();
    if cols == 0 {
        return Err(MathError::InvalidInput(
            "At least one coefficient is required".to_string(),
        ));
    }
    if let Some(row) = design.iter().find(|row| row.len() != cols) {
        return Err(MathError::InvalidInput(format!(
            "Design row has {} columns, expected {}",
            row.len(),
            cols
        )));
    }
    if penalties.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(MathError::InvalidInput(
            "Penalties must be finite and non-negative".to_string(),
        ));
    }

    // Normal equations: (X'X + diag(penalties)) b = X'y
    let mut gram = vec![vec![0.0; cols]; cols];
    let mut rhs = vec![0.0; cols];
    for (row, &target) in design.iter().zip(y) {
        for i in 0..cols {
            rhs[i] += row[i] * target;
            for j in 0..cols {
                gram[i][j] += row[i] * row[j];
            }
        }
    }
    for (i, penalty) in penalties.iter().enumerate() {
        gram[i][i] += penalty;
    }

    solve_linear_system(gram, rhs)
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting
pub fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(
            "Matrix must be square and match the right-hand side".to_string(),
        ));
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);

        if a[pivot][col].abs() < 1e-12 {
            return Err(MathError::CalculationError(format!(
                "Matrix is singular at column {}",
                col
            )));
        }

        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Solution contains non-finite values".to_string(),
        ));
    }

    Ok(x)
}
