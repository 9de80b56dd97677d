//! k-nearest-neighbours with uniform weights and Euclidean distance

use super::{check_columns, check_training_shapes, label_from_proba, Classifier};
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    pub k: usize,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KnnClassifier {
    fn default() -> Self {
        Self::new(5)
    }
}

impl KnnClassifier {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            x_train: None,
            y_train: None,
        }
    }
}

impl Classifier for KnnClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_shapes(x, y)?;
        if self.k == 0 {
            return Err(RiskError::Training("k must be at least 1".into()));
        }
        if self.k > x.nrows() {
            return Err(RiskError::InsufficientData(format!(
                "k = {} exceeds {} training rows",
                self.k,
                x.nrows()
            )));
        }
        self.x_train = Some(x.to_owned());
        self.y_train = Some(y.to_owned());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(label_from_proba))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(xt), Some(yt)) => (xt, yt),
            _ => return Err(RiskError::NotFitted),
        };
        check_columns(x_train.ncols(), x)?;

        let k = self.k;
        let rows: Vec<_> = x.outer_iter().collect();
        let probs: Vec<f64> = rows
            .par_iter()
            .map(|row| {
                let mut distances: Vec<(f64, f64)> = x_train
                    .outer_iter()
                    .zip(y_train.iter())
                    .map(|(train_row, &label)| {
                        let d: f64 = row
                            .iter()
                            .zip(train_row.iter())
                            .map(|(a, b)| (a - b).powi(2))
                            .sum();
                        (d, label)
                    })
                    .collect();

                distances.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0));
                distances[..k].iter().map(|(_, label)| label).sum::<f64>() / k as f64
            })
            .collect();

        Ok(Array1::from(probs))
    }
}
