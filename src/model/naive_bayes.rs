//! Gaussian naive Bayes

use super::{check_columns, check_training_shapes, label_from_proba, Classifier};
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Per-class statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassStats {
    label: f64,
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    classes: Vec<ClassStats>,
    /// Fraction of the largest feature variance added to every variance
    pub var_smoothing: f64,
    n_features: usize,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            var_smoothing: 1e-9,
            n_features: 0,
        }
    }

    fn joint_log_likelihood(&self, row: ArrayView1<f64>) -> Vec<f64> {
        self.classes
            .iter()
            .map(|c| {
                let ll: f64 = row
                    .iter()
                    .zip(c.means.iter().zip(c.variances.iter()))
                    .map(|(&xi, (&mean, &var))| {
                        -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln())
                    })
                    .sum();
                c.log_prior + ll
            })
            .collect()
    }
}

impl Classifier for GaussianNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shapes(x, y)?;
        let n_samples = x.nrows() as f64;
        let n_features = x.ncols();

        let max_variance = x
            .columns()
            .into_iter()
            .map(|col| col.var(0.0))
            .fold(0.0_f64, f64::max);
        let epsilon = self.var_smoothing * max_variance.max(f64::MIN_POSITIVE);

        let mut classes = Vec::new();
        for label in [0.0, 1.0] {
            let rows: Vec<usize> = (0..x.nrows()).filter(|&i| y[i] == label).collect();
            if rows.is_empty() {
                continue;
            }

            // Welford's single pass
            let mut means = vec![0.0; n_features];
            let mut m2 = vec![0.0; n_features];
            for (count, &i) in rows.iter().enumerate() {
                let k = (count + 1) as f64;
                for (j, &v) in x.row(i).iter().enumerate() {
                    let delta = v - means[j];
                    means[j] += delta / k;
                    m2[j] += delta * (v - means[j]);
                }
            }
            let n_class = rows.len() as f64;
            let variances = m2.iter().map(|&m| m / n_class + epsilon).collect();

            classes.push(ClassStats {
                label,
                log_prior: (n_class / n_samples).ln(),
                means,
                variances,
            });
        }

        self.classes = classes;
        self.n_features = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(label_from_proba))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.is_empty() {
            return Err(RiskError::NotFitted);
        }
        check_columns(self.n_features, x)?;

        let probs = x
            .rows()
            .into_iter()
            .map(|row| {
                let jll = self.joint_log_likelihood(row);
                // log-sum-exp normalization
                let max = jll.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let log_sum = jll.iter().map(|v| (v - max).exp()).sum::<f64>().ln() + max;
                self.classes
                    .iter()
                    .zip(jll.iter())
                    .find(|(c, _)| c.label == 1.0)
                    .map(|(_, &v)| (v - log_sum).exp())
                    .unwrap_or(0.0)
            })
            .collect();

        Ok(probs)
    }
}
