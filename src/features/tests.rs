//! Tests for normalization, encoding and scaling

use super::*;
use crate::data::{read_frame, Cell, Column, ColumnKind, Frame};
use crate::error::RiskError;
use crate::types::Condition;
use ndarray::array;
use serde_json::json;

fn heart_input() -> serde_json::Value {
    json!({
        "Age": 54,
        "sex": "m",
        "ChestPainType": "asy",
        "RestingBP": "140",
        "Cholesterol": 239,
        "FastingBS": "0",
        "RestingECG": "Normal",
        "MaxHR": 160,
        "ExerciseAngina": "N",
        "Oldpeak": 1.2,
        "ST_Slope": "up",
        "Unrelated": "dropped"
    })
}

fn heart_schema() -> Schema<'static> {
    Schema::Strict(HEART_FIELDS)
}

#[test]
fn test_heart_normalization_canonicalizes() {
    let record = normalize(&heart_input(), &heart_schema()).unwrap();
    assert_eq!(record.len(), HEART_FIELDS.len());
    assert_eq!(record.get("Sex"), Some(&json!("M")));
    assert_eq!(record.get("ChestPainType"), Some(&json!("ASY")));
    assert_eq!(record.get("RestingBP"), Some(&json!(140.0)));
    assert_eq!(record.get("FastingBS"), Some(&json!(0)));
    assert_eq!(record.get("ST_Slope"), Some(&json!("Up")));
    assert!(record.get("Unrelated").is_none());

    let names: Vec<&String> = record.iter().map(|(k, _)| k).collect();
    assert_eq!(names[0], "Age");
    assert_eq!(names[10], "ST_Slope");
}

#[test]
fn test_heart_missing_fields_reported_together() {
    let input = json!({ "Age": 40, "Sex": "F", "MaxHR": null });
    let err = normalize(&input, &heart_schema()).unwrap_err();
    match err {
        RiskError::MissingFields(fields) => {
            assert_eq!(
                fields,
                vec![
                    "ChestPainType",
                    "RestingBP",
                    "Cholesterol",
                    "FastingBS",
                    "RestingECG",
                    "MaxHR",
                    "ExerciseAngina",
                    "Oldpeak",
                    "ST_Slope"
                ]
            );
        }
        other => panic!("expected missing fields, got {:?}", other),
    }
}

#[test]
fn test_heart_out_of_range_rejected() {
    let mut input = heart_input();
    input["Age"] = json!(150);
    let err = normalize(&input, &heart_schema()).unwrap_err();
    assert_eq!(err.to_string(), "Invalid value for Age: 150");
}

#[test]
fn test_heart_unknown_category_rejected() {
    let mut input = heart_input();
    input["RestingECG"] = json!("Abnormal");
    let err = normalize(&input, &heart_schema()).unwrap_err();
    assert_eq!(err.to_string(), "Invalid value for RestingECG: Abnormal");
}

#[test]
fn test_heart_flag_forms() {
    for (value, expected) in [(json!(1), 1), (json!("1"), 1), (json!(true), 1), (json!(false), 0)] {
        let mut input = heart_input();
        input["FastingBS"] = value;
        let record = normalize(&input, &heart_schema()).unwrap();
        assert_eq!(record.get("FastingBS"), Some(&json!(expected)));
    }

    let mut input = heart_input();
    input["FastingBS"] = json!(2);
    assert!(matches!(
        normalize(&input, &heart_schema()),
        Err(RiskError::InvalidValue { .. })
    ));
}

#[test]
fn test_exact_match_beats_case_insensitive() {
    let mut input = heart_input();
    input["age"] = json!(99);
    let record = normalize(&input, &heart_schema()).unwrap();
    assert_eq!(record.get("Age"), Some(&json!(54.0)));
}

#[test]
fn test_case_insensitive_collision_last_wins() {
    let names = vec!["Gender".to_string()];
    let input = json!({ "GENDER": "Male", "gender": "Female" });
    let record = normalize(&input, &Schema::Lenient(&names)).unwrap();
    assert_eq!(record.get("Gender"), Some(&json!("Female")));
}

#[test]
fn test_non_object_input_rejected() {
    let err = normalize(&json!([1, 2]), &heart_schema()).unwrap_err();
    assert!(matches!(err, RiskError::InvalidInput(_)));
}

#[test]
fn test_gastric_defaults() {
    let names: Vec<String> = [
        "Age",
        "Mature_miRNA_ID",
        "miRDB",
        "Predicted.sum",
        "other_target_gene",
        "custom_sum",
        "True",
        "biomarker_x",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let input = json!({ "age": 61, "extra": 1 });
    let record = normalize(&input, &Schema::for_condition(Condition::GastricCancer, &names)).unwrap();

    assert_eq!(record.len(), names.len());
    assert_eq!(record.get("Age"), Some(&json!(61)));
    assert_eq!(record.get("Mature_miRNA_ID"), Some(&json!("hsa-miR-21")));
    assert_eq!(record.get("miRDB"), Some(&json!(true)));
    assert_eq!(record.get("Predicted.sum"), Some(&json!(8)));
    assert_eq!(record.get("other_target_gene"), Some(&json!("unknown")));
    assert_eq!(record.get("custom_sum"), Some(&json!(0)));
    assert_eq!(record.get("True"), Some(&json!(false)));
    assert_eq!(record.get("biomarker_x"), Some(&json!(0)));
    assert!(record.get("extra").is_none());
}

#[test]
fn test_gastric_default_table() {
    assert_eq!(gastric_default("PITA"), json!(0.5));
    assert_eq!(gastric_default("elmmo"), json!(3));
    assert_eq!(gastric_default("target_symbol"), json!("TP53"));
    assert_eq!(gastric_default("endoscopic_images"), json!("Available"));
    assert_eq!(gastric_default("all.sum"), json!(10));
    assert_eq!(GASTRIC_KEY_FIELDS.len(), 10);
}

const TRAINING: &str = "\
age,smoker,region,diet
40,true,Asia,High
55,false,Europe,Low
61,true,Africa,High
";

#[test]
fn test_encoder_column_order_matches_get_dummies() {
    let frame = read_frame(TRAINING.as_bytes()).unwrap();
    let encoder = FeatureEncoder::fit(&frame).unwrap();
    assert_eq!(
        encoder.encoded_feature_names(),
        &["age", "smoker", "region_Asia", "region_Europe", "diet_Low"]
    );
    assert_eq!(encoder.feature_names(), vec!["age", "smoker", "region", "diet"]);
}

#[test]
fn test_encode_frame() {
    let frame = read_frame(TRAINING.as_bytes()).unwrap();
    let encoder = FeatureEncoder::fit(&frame).unwrap();
    let x = encoder.encode_frame(&frame).unwrap();
    assert_eq!(x.shape(), &[3, 5]);
    assert_eq!(x.row(0).to_vec(), vec![40.0, 1.0, 1.0, 0.0, 0.0]);
    assert_eq!(x.row(1).to_vec(), vec![55.0, 0.0, 0.0, 1.0, 1.0]);
    // Africa is the reference level
    assert_eq!(x.row(2).to_vec(), vec![61.0, 1.0, 0.0, 0.0, 0.0]);
}

#[test]
fn test_encode_record_with_unknown_level() {
    let frame = read_frame(TRAINING.as_bytes()).unwrap();
    let encoder = FeatureEncoder::fit(&frame).unwrap();
    let names = encoder.feature_names();
    let input = json!({ "AGE": "47", "smoker": "True", "region": "Oceania", "diet": "Low" });
    let record = normalize(&input, &Schema::Lenient(&names)).unwrap();
    let row = encoder.encode(&record).unwrap();
    assert_eq!(row.to_vec(), vec![47.0, 1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_encode_rejects_non_numeric() {
    let frame = read_frame(TRAINING.as_bytes()).unwrap();
    let encoder = FeatureEncoder::fit(&frame).unwrap();
    let names = encoder.feature_names();
    let input = json!({ "age": "old", "smoker": false, "region": "Asia", "diet": "High" });
    let record = normalize(&input, &Schema::Lenient(&names)).unwrap();
    let err = encoder.encode(&record).unwrap_err();
    assert_eq!(err.to_string(), "Invalid value for age: old");
}

#[test]
fn test_encode_rejects_non_finite() {
    let frame = read_frame(TRAINING.as_bytes()).unwrap();
    let encoder = FeatureEncoder::fit(&frame).unwrap();
    let names = encoder.feature_names();
    for value in ["NaN", "inf", "-inf"] {
        let input = json!({ "age": value, "smoker": false, "region": "Asia", "diet": "High" });
        let record = normalize(&input, &Schema::Lenient(&names)).unwrap();
        let err = encoder.encode(&record).unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), format!("Invalid value for age: {}", value));
    }
}

#[test]
fn test_heart_non_finite_rejected() {
    let mut input = heart_input();
    input["RestingBP"] = json!("inf");
    let err = normalize(&input, &heart_schema()).unwrap_err();
    assert_eq!(err.to_string(), "Invalid value for RestingBP: inf");
}

#[test]
fn test_encoder_needs_at_least_one_encoded_column() {
    let frame = Frame::new(vec![Column::new(
        "site",
        ColumnKind::Categorical,
        vec![Cell::Text("A".into()), Cell::Text("A".into())],
    )]);
    match FeatureEncoder::fit(&frame).unwrap_err() {
        RiskError::InsufficientData(msg) => assert!(msg.contains("no feature columns")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_encode_requires_columns() {
    let frame = read_frame(TRAINING.as_bytes()).unwrap();
    let encoder = FeatureEncoder::fit(&frame).unwrap();
    let names = vec!["age".to_string()];
    let record = normalize(&json!({ "age": 3 }), &Schema::Lenient(&names)).unwrap();
    match encoder.encode(&record).unwrap_err() {
        RiskError::MissingFields(fields) => assert_eq!(fields, vec!["smoker", "region", "diet"]),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_numeric_categories_render_without_decimal() {
    let frame = Frame::new(vec![Column::new(
        "grade",
        ColumnKind::Categorical,
        vec![Cell::Text("1".into()), Cell::Text("2".into()), Cell::Text("3".into())],
    )]);
    let encoder = FeatureEncoder::fit(&frame).unwrap();
    let names = encoder.feature_names();
    let record = normalize(&json!({ "grade": 2.0 }), &Schema::Lenient(&names)).unwrap();
    assert_eq!(encoder.encode(&record).unwrap().to_vec(), vec![1.0, 0.0]);
}

#[test]
fn test_scaler() {
    let x = array![[1.0, 5.0], [3.0, 5.0]];
    let scaler = StandardScaler::fit(&x).unwrap();
    let scaled = scaler.transform(&x).unwrap();
    assert_eq!(scaled, array![[-1.0, 0.0], [1.0, 0.0]]);

    let err = scaler.transform(&array![[1.0, 2.0, 3.0]]).unwrap_err();
    assert!(matches!(
        err,
        RiskError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
    ));
}
