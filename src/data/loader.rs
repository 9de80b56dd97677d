use super::{Cell, Column, ColumnKind, Frame, MISSING_MARKERS};
use crate::error::{Result, RiskError};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Load a CSV file with a header row
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Frame> {
    let path = path.as_ref();
    info!("Loading data from {:?}", path);

    let file = File::open(path)?;
    let frame = read_frame(BufReader::new(file))?;

    info!(
        rows = frame.n_rows(),
        columns = frame.n_cols(),
        "Loaded training data"
    );
    Ok(frame)
}

/// Parse CSV text into a typed frame
pub fn read_frame<R: Read>(reader: R) -> Result<Frame> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(|s| s.to_string()).collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(RiskError::InsufficientData("CSV has no header row".into()));
    }
    debug!("Headers: {:?}", headers);

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for result in csv_reader.records() {
        let record = result?;
        for (idx, field) in record.iter().enumerate() {
            let value = if MISSING_MARKERS.contains(&field) {
                None
            } else {
                Some(field.to_string())
            };
            raw[idx].push(value);
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, values)| {
            let kind = infer_kind(&values);
            debug!(column = %name, ?kind, "Inferred column kind");
            let cells = values.into_iter().map(|v| to_cell(v, kind)).collect();
            Column::new(name, kind, cells)
        })
        .collect();

    Ok(Frame::new(columns))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn infer_kind(values: &[Option<String>]) -> ColumnKind {
    let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
    if present.iter().all(|v| v.parse::<f64>().is_ok()) {
        ColumnKind::Numeric
    } else if present.iter().all(|v| parse_bool(v).is_some()) {
        ColumnKind::Boolean
    } else {
        ColumnKind::Categorical
    }
}

fn to_cell(value: Option<String>, kind: ColumnKind) -> Cell {
    let Some(value) = value else {
        return Cell::Missing;
    };
    match kind {
        ColumnKind::Numeric => value.parse().map(Cell::Number).unwrap_or(Cell::Missing),
        ColumnKind::Boolean => parse_bool(&value).map(Cell::Bool).unwrap_or(Cell::Missing),
        ColumnKind::Categorical => Cell::Text(value),
    }
}
