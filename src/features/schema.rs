//! Required-field schemas and default values per condition

use crate::types::Condition;
use serde_json::{json, Value};

/// How a strict field's value is coerced and checked
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Number (or numeric string) within an inclusive range
    Number { min: f64, max: f64 },
    /// One of a fixed set of labels, matched case-insensitively
    Category(&'static [&'static str]),
    /// 0 or 1, as number, string or bool
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn number(name: &'static str, min: f64, max: f64) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Number { min, max },
    }
}

const fn category(name: &'static str, levels: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Category(levels),
    }
}

pub const HEART_FIELDS: &[FieldSpec] = &[
    number("Age", 0.0, 120.0),
    category("Sex", &["M", "F"]),
    category("ChestPainType", &["ATA", "NAP", "ASY", "TA"]),
    number("RestingBP", 0.0, 300.0),
    number("Cholesterol", 0.0, 1000.0),
    FieldSpec {
        name: "FastingBS",
        kind: FieldKind::Flag,
    },
    category("RestingECG", &["Normal", "ST", "LVH"]),
    number("MaxHR", 0.0, 300.0),
    category("ExerciseAngina", &["Y", "N"]),
    number("Oldpeak", -10.0, 10.0),
    category("ST_Slope", &["Up", "Flat", "Down"]),
];

/// Gastric fields a user is expected to fill in; the rest fall back to defaults
pub const GASTRIC_KEY_FIELDS: &[&str] = &[
    "age",
    "gender",
    "alcohol_consumption",
    "ct_scan",
    "dietary_habits",
    "geographical_location",
    "existing_conditions",
    "biopsy_results",
    "family_history",
    "smoking_habits",
];

/// Target column per condition
pub fn target_column(condition: Condition) -> &'static str {
    match condition {
        Condition::HeartDisease => "HeartDisease",
        Condition::GastricCancer => "Diagnosis",
    }
}

/// Default for a gastric field the caller did not supply
///
/// Looked up by lower-cased name in the known-biomarker table, then by the
/// generic naming rules.
pub fn gastric_default(field: &str) -> Value {
    let lower = field.to_lowercase();
    match lower.as_str() {
        "mature_mirna_acc" => json!("MI0000077"),
        "mature_mirna_id" => json!("hsa-miR-21"),
        "mirdb" | "pictar" | "microcosm" | "miranda" | "targetscan" | "diana_microt" => json!(true),
        "pita" => json!(0.5),
        "elmmo" => json!(3),
        "target_entrez" => json!("5290"),
        "target_symbol" => json!("TP53"),
        "target_ensembl" => json!("ENSG00000146648"),
        "predicted.sum" => json!(8),
        "all.sum" => json!(10),
        "helicobacter_pylori_infection" => json!(true),
        "endoscopic_images" => json!("Available"),
        _ if lower.contains("mirna") || lower.contains("target") => json!("unknown"),
        _ if lower.contains("sum") => json!(0),
        "true" | "false" => json!(false),
        _ => json!(0),
    }
}

/// Field set a record is normalized against
#[derive(Debug, Clone, Copy)]
pub enum Schema<'a> {
    /// Every field required and validated
    Strict(&'static [FieldSpec]),
    /// Fields come from the trained bundle; absent ones get defaults
    Lenient(&'a [String]),
}

impl<'a> Schema<'a> {
    /// Schema for a condition, given the bundle's original feature columns
    pub fn for_condition(condition: Condition, feature_names: &'a [String]) -> Self {
        match condition {
            Condition::HeartDisease => Schema::Strict(HEART_FIELDS),
            Condition::GastricCancer => Schema::Lenient(feature_names),
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        match self {
            Schema::Strict(fields) => fields.iter().map(|f| f.name).collect(),
            Schema::Lenient(names) => names.iter().map(String::as_str).collect(),
        }
    }
}
