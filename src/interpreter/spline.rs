//! Cubic spline interpolation of parameter responses
//!
//! A [Spline] interpolates `(variation, response)` knots with a piecewise cubic
//! using not-a-knot end conditions, so that a response sampled from any cubic
//! is reproduced exactly. Fewer knots degrade gracefully:
//!
//! | knots | interpolant |
//! |---|---|
//! | 1 | constant |
//! | 2 | straight line |
//! | 3 | the parabola through all three |
//! | 4+ | not-a-knot cubic spline |
//!
//! Outside the knot range the end segments are extrapolated.
//!
//! # Example
//!
//! ```rust
//! use systtools::interpreter::spline::Spline;
//!
//! let spline = Spline::new(&[-1.0, 0.0, 1.0, 2.0], &[0.9, 1.0, 1.1, 1.2]).unwrap();
//! assert!((spline.eval(0.5) - 1.05).abs() < 1e-12);
//! ```

use nalgebra::{DMatrix, DVector};

use crate::error::SystToolsError;

/// A piecewise cubic interpolant
///
/// Segment `i` evaluates `y[i] + b[i] t + c[i] t^2 + d[i] t^3` with
/// `t = x - x[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spline {
    x: Vec<f64>,
    y: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

// ============================================================================
// Construction
// ============================================================================

/// Second derivatives at the knots for a not-a-knot cubic spline
fn not_a_knot_curvature(x: &[f64], y: &[f64]) -> Result<Vec<f64>, SystToolsError> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let slope: Vec<f64> = (0..n - 1).map(|i| (y[i + 1] - y[i]) / h[i]).collect();

    let mut a = DMatrix::<f64>::zeros(n, n);
    let mut rhs = DVector::<f64>::zeros(n);

    // Third derivative continuous across the second knot
    a[(0, 0)] = h[1];
    a[(0, 1)] = -(h[0] + h[1]);
    a[(0, 2)] = h[0];

    for i in 1..n - 1 {
        a[(i, i - 1)] = h[i - 1];
        a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
        a[(i, i + 1)] = h[i];
        rhs[i] = 6.0 * (slope[i] - slope[i - 1]);
    }

    // ... and across the second to last knot
    a[(n - 1, n - 3)] = h[n - 2];
    a[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
    a[(n - 1, n - 1)] = h[n - 3];

    a.lu()
        .solve(&rhs)
        .map(|m| m.iter().copied().collect())
        .ok_or_else(|| SystToolsError::InvalidKnots("singular spline system".to_string()))
}

impl Spline {
    /// Build a spline through the knots `(x[i], y[i])`
    ///
    /// Knots may be given in any order but must be finite and have distinct
    /// `x`.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, SystToolsError> {
        if x.len() != y.len() {
            return Err(SystToolsError::InvalidKnots(format!(
                "{} knots but {} values",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(SystToolsError::InvalidKnots("no knots".to_string()));
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(SystToolsError::InvalidKnots(
                "knots must be finite".to_string(),
            ));
        }

        let mut knots: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
        knots.sort_by(|l, r| l.0.total_cmp(&r.0));
        if let Some(w) = knots.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(SystToolsError::InvalidKnots(format!(
                "duplicated knot at {}",
                w[0].0
            )));
        }
        let (x, y): (Vec<f64>, Vec<f64>) = knots.into_iter().unzip();

        let n = x.len();
        let curvature = match n {
            1 | 2 => vec![0.0; n],
            3 => {
                let second = ((y[2] - y[1]) / (x[2] - x[1]) - (y[1] - y[0]) / (x[1] - x[0]))
                    / (x[2] - x[0]);
                vec![2.0 * second; 3]
            }
            _ => not_a_knot_curvature(&x, &y)?,
        };

        let segments = n - 1;
        let mut b = Vec::with_capacity(segments);
        let mut c = Vec::with_capacity(segments);
        let mut d = Vec::with_capacity(segments);
        for i in 0..segments {
            let h = x[i + 1] - x[i];
            let (m0, m1) = (curvature[i], curvature[i + 1]);
            b.push((y[i + 1] - y[i]) / h - h * (2.0 * m0 + m1) / 6.0);
            c.push(m0 / 2.0);
            d.push((m1 - m0) / (6.0 * h));
        }

        Ok(Self { x, y, b, c, d })
    }

    /// A spline evaluating to `value` everywhere
    pub fn flat(value: f64) -> Self {
        Self {
            x: vec![0.0],
            y: vec![value],
            b: Vec::new(),
            c: Vec::new(),
            d: Vec::new(),
        }
    }

    pub fn n_knots(&self) -> usize {
        self.x.len()
    }

    /// Knot positions, sorted
    pub fn knots(&self) -> &[f64] {
        &self.x
    }

    /// Values at [Self::knots]
    pub fn values(&self) -> &[f64] {
        &self.y
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Evaluate the interpolant at `x`
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.x.len();
        if n == 1 {
            return self.y[0];
        }
        if x == self.x[n - 1] {
            return self.y[n - 1];
        }
        let i = self
            .x
            .partition_point(|&k| k <= x)
            .saturating_sub(1)
            .min(n - 2);
        let t = x - self.x[i];
        self.y[i] + t * (self.b[i] + t * (self.c[i] + t * self.d[i]))
    }

    /// First derivative of the interpolant at `x`
    pub fn derivative(&self, x: f64) -> f64 {
        let n = self.x.len();
        if n == 1 {
            return 0.0;
        }
        let i = self
            .x
            .partition_point(|&k| k <= x)
            .saturating_sub(1)
            .min(n - 2);
        let t = x - self.x[i];
        self.b[i] + t * (2.0 * self.c[i] + 3.0 * t * self.d[i])
    }
}
