//! Schema reconciliation: loose user JSON to an exact field set

use super::schema::{gastric_default, FieldKind, FieldSpec, Schema};
use crate::error::{Result, RiskError};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Field name to value, in schema order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedRecord {
    fields: Map<String, Value>,
}

impl NormalizedRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    fn insert(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }
}

/// Case-insensitive view over an input object
struct FieldLookup<'a> {
    input: &'a Map<String, Value>,
    by_lower: HashMap<String, &'a Value>,
}

impl<'a> FieldLookup<'a> {
    fn new(input: &'a Map<String, Value>) -> Self {
        // Later keys overwrite earlier ones on a case-insensitive collision
        let by_lower = input.iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
        Self { input, by_lower }
    }

    /// Exact key first, then case-insensitive; `null` counts as absent
    fn find(&self, field: &str) -> Option<&'a Value> {
        self.input
            .get(field)
            .or_else(|| self.by_lower.get(&field.to_lowercase()).copied())
            .filter(|v| !v.is_null())
    }
}

pub fn normalize(input: &Value, schema: &Schema<'_>) -> Result<NormalizedRecord> {
    let object = input
        .as_object()
        .ok_or_else(|| RiskError::InvalidInput("input must be a JSON object".into()))?;
    let lookup = FieldLookup::new(object);

    match schema {
        Schema::Strict(fields) => normalize_strict(&lookup, fields),
        Schema::Lenient(names) => Ok(normalize_lenient(&lookup, names)),
    }
}

fn normalize_strict(lookup: &FieldLookup<'_>, fields: &[FieldSpec]) -> Result<NormalizedRecord> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|f| lookup.find(f.name).is_none())
        .map(|f| f.name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(RiskError::MissingFields(missing));
    }

    let mut record = NormalizedRecord::default();
    for spec in fields {
        let raw = lookup
            .find(spec.name)
            .ok_or_else(|| RiskError::MissingFields(vec![spec.name.to_string()]))?;
        let value = coerce(spec.kind, raw).ok_or_else(|| RiskError::invalid_value(spec.name, raw))?;
        record.insert(spec.name, value);
    }
    Ok(record)
}

fn normalize_lenient(lookup: &FieldLookup<'_>, names: &[String]) -> NormalizedRecord {
    let mut record = NormalizedRecord::default();
    for name in names {
        let value = match lookup.find(name) {
            Some(v) => v.clone(),
            None => {
                let default = gastric_default(name);
                debug!(field = %name, default = %default, "Using default value");
                default
            }
        };
        record.insert(name, value);
    }
    record
}

fn as_number(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    v.filter(|v| v.is_finite())
}

/// Coerce and validate one strict field; `None` when it fails either step
fn coerce(kind: FieldKind, value: &Value) -> Option<Value> {
    match kind {
        FieldKind::Number { min, max } => {
            let v = as_number(value)?;
            (min..=max).contains(&v).then(|| json!(v))
        }
        FieldKind::Category(levels) => {
            let s = value.as_str()?.trim();
            levels
                .iter()
                .find(|level| level.eq_ignore_ascii_case(s))
                .map(|level| json!(level))
        }
        FieldKind::Flag => {
            let v = match value {
                Value::Bool(b) => u8::from(*b) as f64,
                other => as_number(other)?,
            };
            if v == 0.0 {
                Some(json!(0))
            } else if v == 1.0 {
                Some(json!(1))
            } else {
                None
            }
        }
    }
}
