//! Tabular data: an in-memory column store loaded from CSV
//!
//! Cells keep their parsed type so the encoder can tell numeric, boolean and
//! categorical columns apart.

pub mod loader;
#[cfg(test)]
mod tests;

pub use loader::{load_csv, read_frame};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Tokens treated as a missing value
pub const MISSING_MARKERS: &[&str] = &["", "NA", "NaN", "null", "None"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Boolean,
    Categorical,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Bool(bool),
    Text(String),
    Missing,
}

impl Cell {
    /// Convert a JSON input value; `null` becomes `Missing`
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Missing,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing),
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Numeric view: finite numbers, bools as 1/0 and finite numeric strings
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v).filter(|v| v.is_finite()),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Cell::Missing => None,
        }
    }

    /// Text form used to match categorical levels
    ///
    /// Bools render as `True`/`False` and whole floats drop the trailing `.0`,
    /// the way the values appear in a CSV.
    pub fn render(&self) -> Option<String> {
        match self {
            Cell::Number(v) => Some(render_number(*v)),
            Cell::Bool(true) => Some("True".to_string()),
            Cell::Bool(false) => Some("False".to_string()),
            Cell::Text(s) => Some(s.clone()),
            Cell::Missing => None,
        }
    }
}

pub(crate) fn render_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            kind,
            cells,
        }
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }

    /// Value used to fill missing cells: mean for numeric columns, mode otherwise
    ///
    /// Mode ties go to the smallest rendered value.
    fn fill_value(&self) -> Option<Cell> {
        match self.kind {
            ColumnKind::Numeric => {
                let values: Vec<f64> = self.cells.iter().filter_map(Cell::as_f64).collect();
                if values.is_empty() {
                    return None;
                }
                Some(Cell::Number(values.iter().sum::<f64>() / values.len() as f64))
            }
            ColumnKind::Boolean | ColumnKind::Categorical => {
                let mut counts: BTreeMap<String, (usize, &Cell)> = BTreeMap::new();
                for cell in self.cells.iter().filter(|c| !c.is_missing()) {
                    if let Some(key) = cell.render() {
                        counts.entry(key).or_insert((0, cell)).0 += 1;
                    }
                }
                let mut best: Option<(usize, &Cell)> = None;
                for (count, cell) in counts.values() {
                    if best.is_none_or(|(c, _)| *count > c) {
                        best = Some((*count, *cell));
                    }
                }
                best.map(|(_, cell)| cell.clone())
            }
        }
    }
}

/// Ordered set of equal-length columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub columns: Vec<Column>,
}

impl Frame {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.cells.len()).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx))
    }

    /// New frame holding the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                kind: c.kind,
                cells: rows.iter().map(|&r| c.cells[r].clone()).collect(),
            })
            .collect();
        Frame { columns }
    }

    /// Fill missing cells in place and return the filled column names
    pub fn impute(&mut self) -> Vec<String> {
        let mut imputed = Vec::new();
        for column in &mut self.columns {
            let missing = column.missing_count();
            if missing == 0 {
                continue;
            }
            let fill = match column.fill_value() {
                Some(fill) => fill,
                None => {
                    warn!(column = %column.name, "Column has no values, filling with 0");
                    Cell::Number(0.0)
                }
            };
            info!(
                column = %column.name,
                missing,
                fill = ?fill,
                "Imputed missing values"
            );
            for cell in column.cells.iter_mut().filter(|c| c.is_missing()) {
                *cell = fill.clone();
            }
            imputed.push(column.name.clone());
        }
        imputed
    }
}
