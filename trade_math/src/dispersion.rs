//! Dispersion statistics over plain slices

use crate::{MathError, Result};

/// Element-wise residuals `actual - fitted`
pub fn residuals(actual: &[f64], fitted: &[f64]) -> Result<Vec<f64>> {
    if actual.len() != fitted.len() {
        return Err(MathError::InvalidInput(format!(
            "Actual length ({}) doesn't match fitted length ({})",
            actual.len(),
            fitted.len()
        )));
    }
    Ok(actual.iter().zip(fitted).map(|(a, f)| a - f).collect())
}

/// Mean squared value, used as the maximum-likelihood noise variance
pub fn mean_square(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the mean square of an empty slice".to_string(),
        ));
    }
    Ok(values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64)
}

/// Largest absolute value, 0 for an empty slice
pub fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_residuals_and_mean_square() {
        let r = residuals(&[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(r, vec![0.0, 1.0, 2.0]);
        assert!((mean_square(&r).unwrap() - 5.0 / 3.0).abs() < 1e-12);
        assert!(residuals(&[1.0], &[]).is_err());
    }

    #[test]
    fn test_max_abs() {
        assert_eq!(max_abs(&[-3.0, 2.0]), 3.0);
        assert_eq!(max_abs(&[]), 0.0);
    }
}
