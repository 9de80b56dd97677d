use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardization with population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let means = x
            .mean_axis(Axis(0))
            .ok_or_else(|| RiskError::InsufficientData("cannot fit scaler on zero rows".into()))?;
        // Constant columns keep their centered value
        let scales = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        Ok(Self { means, scales })
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.means.len() {
            return Err(RiskError::DimensionMismatch {
                expected: self.means.len(),
                actual: x.ncols(),
            });
        }
        Ok((x - &self.means) / &self.scales)
    }
}
