use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::SystToolsError;

const SVD_EPS: f64 = 1e-12;

/// A polynomial approximation of a parameter response
///
/// Stores `order + 1` coefficients, evaluating `c0 + c1 x + c2 x^2 + ...`.
/// Used where a fixed, small footprint matters more than reproducing every
/// knot exactly, such as precalculated response tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyResponse {
    coefficients: Vec<f64>,
}

impl PolyResponse {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// Least-squares fit of an `order` polynomial through `(x, y)`
    pub fn fit(x: &[f64], y: &[f64], order: usize) -> Result<Self, SystToolsError> {
        if x.len() != y.len() {
            return Err(SystToolsError::FitFailed(format!(
                "{} abscissae but {} values",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(SystToolsError::FitFailed("no points to fit".to_string()));
        }
        if x.len() <= order {
            tracing::debug!(
                "Fitting an order {} polynomial through {} points, the fit is underdetermined",
                order,
                x.len()
            );
        }

        let design = DMatrix::from_fn(x.len(), order + 1, |i, j| x[i].powi(j as i32));
        let target = DVector::from_column_slice(y);
        let solution = design
            .svd(true, true)
            .solve(&target, SVD_EPS)
            .map_err(|e| SystToolsError::FitFailed(e.to_string()))?;

        Ok(Self {
            coefficients: solution.iter().copied().collect(),
        })
    }

    pub fn order(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_eval() {
        let poly = PolyResponse::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(poly.order(), 2);
        assert_relative_eq!(poly.eval(2.0), 1.0 + 4.0 + 12.0);
        assert_eq!(PolyResponse::new(vec![]).eval(3.0), 0.0);
    }

    #[test]
    fn test_fit_recovers_polynomial() {
        let x = [-2.0, -1.0, 0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 0.5 - v + 0.25 * v * v).collect();
        let poly = PolyResponse::fit(&x, &y, 2).unwrap();
        assert_relative_eq!(poly.coefficients()[0], 0.5, epsilon = 1e-10);
        assert_relative_eq!(poly.coefficients()[1], -1.0, epsilon = 1e-10);
        assert_relative_eq!(poly.coefficients()[2], 0.25, epsilon = 1e-10);
    }

    #[test]
    fn test_fit_least_squares_line() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 2.0, 1.0];
        let poly = PolyResponse::fit(&x, &y, 1).unwrap();
        assert_relative_eq!(poly.coefficients()[0], 0.5, epsilon = 1e-10);
        assert_relative_eq!(poly.coefficients()[1], 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_fit_errors() {
        assert!(matches!(
            PolyResponse::fit(&[], &[], 1),
            Err(SystToolsError::FitFailed(_))
        ));
        assert!(matches!(
            PolyResponse::fit(&[1.0], &[1.0, 2.0], 1),
            Err(SystToolsError::FitFailed(_))
        ));
    }
}
