//! L2-regularized logistic regression fitted by batch gradient descent

use super::{check_columns, check_training_shapes, label_from_proba, sigmoid, Classifier};
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    intercept: f64,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum gradient steps
    pub max_iter: usize,
    /// Stop when the gradient norm drops below this
    pub tol: f64,
    pub learning_rate: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            alpha: 1e-4,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shapes(x, y)?;
        let n = x.nrows() as f64;

        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut bias = 0.0;

        for _ in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let errors = linear.mapv(sigmoid) - y;

            let dw = x.t().dot(&errors) / n + &weights * self.alpha;
            let db = errors.sum() / n;

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - dw * self.learning_rate;
            bias -= self.learning_rate * db;
        }

        if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
            return Err(RiskError::Training("logistic regression diverged".into()));
        }

        self.coefficients = Some(weights);
        self.intercept = bias;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(label_from_proba))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(RiskError::NotFitted)?;
        check_columns(coefficients.len(), x)?;
        Ok((x.dot(coefficients) + self.intercept).mapv(sigmoid))
    }
}
