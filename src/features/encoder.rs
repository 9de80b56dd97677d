//! One-hot encoding aligned to the training-time column set
//!
//! Numeric and boolean columns pass through first, in source order. Each
//! categorical column then contributes one dummy per sorted level after the
//! first, named `{column}_{level}`.

use super::normalizer::NormalizedRecord;
use crate::data::{Cell, ColumnKind, Frame};
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SourceColumn {
    name: String,
    kind: ColumnKind,
    /// Sorted distinct levels; the first is the dropped reference level
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    levels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    columns: Vec<SourceColumn>,
    encoded_feature_names: Vec<String>,
}

impl FeatureEncoder {
    pub fn fit(frame: &Frame) -> Result<Self> {
        if frame.n_cols() == 0 {
            return Err(RiskError::InsufficientData("no feature columns".into()));
        }

        let columns: Vec<SourceColumn> = frame
            .columns
            .iter()
            .map(|col| {
                let levels = match col.kind {
                    ColumnKind::Categorical => col
                        .cells
                        .iter()
                        .filter_map(Cell::render)
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect(),
                    _ => Vec::new(),
                };
                SourceColumn {
                    name: col.name.clone(),
                    kind: col.kind,
                    levels,
                }
            })
            .collect();

        let mut encoded_feature_names: Vec<String> = columns
            .iter()
            .filter(|c| c.kind != ColumnKind::Categorical)
            .map(|c| c.name.clone())
            .collect();
        for col in columns.iter().filter(|c| c.kind == ColumnKind::Categorical) {
            encoded_feature_names.extend(
                col.levels
                    .iter()
                    .skip(1)
                    .map(|level| format!("{}_{}", col.name, level)),
            );
        }

        if encoded_feature_names.is_empty() {
            return Err(RiskError::InsufficientData(
                "encoding leaves no feature columns".into(),
            ));
        }

        Ok(Self {
            columns,
            encoded_feature_names,
        })
    }

    /// Source columns, in training order
    pub fn feature_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn encoded_feature_names(&self) -> &[String] {
        &self.encoded_feature_names
    }

    pub fn n_encoded(&self) -> usize {
        self.encoded_feature_names.len()
    }

    /// Encode every row of a frame holding the source columns
    pub fn encode_frame(&self, frame: &Frame) -> Result<Array2<f64>> {
        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| frame.column(&c.name).is_none())
            .map(|c| c.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(RiskError::MissingFields(missing));
        }

        let mut out = Array2::<f64>::zeros((frame.n_rows(), self.n_encoded()));
        for row in 0..frame.n_rows() {
            let encoded = self.encode_cells(|name| {
                frame.column(name).map(|c| c.cells[row].clone())
            })?;
            out.row_mut(row).assign(&encoded);
        }
        Ok(out)
    }

    /// Encode one normalized record
    pub fn encode(&self, record: &NormalizedRecord) -> Result<Array1<f64>> {
        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| record.get(&c.name).is_none())
            .map(|c| c.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(RiskError::MissingFields(missing));
        }
        self.encode_cells(|name| record.get(name).map(Cell::from_json))
    }

    fn encode_cells<F>(&self, cell_for: F) -> Result<Array1<f64>>
    where
        F: Fn(&str) -> Option<Cell>,
    {
        let mut out = Array1::<f64>::zeros(self.n_encoded());
        let mut pos = 0;

        for col in self.columns.iter().filter(|c| c.kind != ColumnKind::Categorical) {
            let cell = cell_for(&col.name).unwrap_or(Cell::Missing);
            out[pos] = numeric_value(&cell).ok_or_else(|| RiskError::InvalidValue {
                field: col.name.clone(),
                value: cell.render().unwrap_or_else(|| "null".to_string()),
            })?;
            pos += 1;
        }

        for col in self.columns.iter().filter(|c| c.kind == ColumnKind::Categorical) {
            let n_dummies = col.levels.len().saturating_sub(1);
            let level = cell_for(&col.name).and_then(|c| c.render());
            // Unknown and reference levels leave every dummy at 0
            if let Some(idx) = level.and_then(|l| col.levels.iter().position(|v| *v == l)) {
                if idx > 0 {
                    out[pos + idx - 1] = 1.0;
                }
            }
            pos += n_dummies;
        }

        Ok(out)
    }
}

fn numeric_value(cell: &Cell) -> Option<f64> {
    cell.as_f64().or_else(|| match cell {
        Cell::Text(s) if s.trim().eq_ignore_ascii_case("true") => Some(1.0),
        Cell::Text(s) if s.trim().eq_ignore_ascii_case("false") => Some(0.0),
        _ => None,
    })
}
