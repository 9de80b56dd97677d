//! Tests for CSV loading and imputation

use super::*;
use serde_json::json;
use std::io::Write;

const SAMPLE: &str = "\
age,gender,smoker,score
45,Male,True,1.5
NA,Female,false,
60,Male,,2.5
";

#[test]
fn test_kind_inference() {
    let frame = read_frame(SAMPLE.as_bytes()).unwrap();
    assert_eq!(frame.n_rows(), 3);
    assert_eq!(frame.column_names(), vec!["age", "gender", "smoker", "score"]);
    assert_eq!(frame.column("age").unwrap().kind, ColumnKind::Numeric);
    assert_eq!(frame.column("gender").unwrap().kind, ColumnKind::Categorical);
    assert_eq!(frame.column("smoker").unwrap().kind, ColumnKind::Boolean);
    assert_eq!(frame.column("score").unwrap().kind, ColumnKind::Numeric);
}

#[test]
fn test_missing_markers() {
    let frame = read_frame(SAMPLE.as_bytes()).unwrap();
    assert_eq!(frame.column("age").unwrap().cells[1], Cell::Missing);
    assert_eq!(frame.column("score").unwrap().missing_count(), 1);
    assert_eq!(frame.column("smoker").unwrap().cells[2], Cell::Missing);
}

#[test]
fn test_impute_mean_and_mode() {
    let mut frame = read_frame(SAMPLE.as_bytes()).unwrap();
    let imputed = frame.impute();
    assert_eq!(imputed, vec!["age", "smoker", "score"]);

    assert_eq!(frame.column("age").unwrap().cells[1], Cell::Number(52.5));
    assert_eq!(frame.column("score").unwrap().cells[1], Cell::Number(2.0));
    // True and false tie; the smaller rendering ("False") wins
    assert_eq!(frame.column("smoker").unwrap().cells[2], Cell::Bool(false));
}

#[test]
fn test_impute_all_missing_column() {
    let mut frame = Frame::new(vec![Column::new(
        "empty",
        ColumnKind::Numeric,
        vec![Cell::Missing, Cell::Missing],
    )]);
    frame.impute();
    assert_eq!(frame.column("empty").unwrap().cells, vec![Cell::Number(0.0); 2]);
}

#[test]
fn test_select_and_remove() {
    let mut frame = read_frame(SAMPLE.as_bytes()).unwrap();
    let subset = frame.select_rows(&[2, 0]);
    assert_eq!(subset.n_rows(), 2);
    assert_eq!(subset.column("age").unwrap().cells[0], Cell::Number(60.0));

    let removed = frame.remove_column("gender").unwrap();
    assert_eq!(removed.name, "gender");
    assert_eq!(frame.n_cols(), 3);
    assert!(frame.remove_column("gender").is_none());
}

#[test]
fn test_cell_render() {
    assert_eq!(Cell::Number(3.0).render().unwrap(), "3");
    assert_eq!(Cell::Number(2.5).render().unwrap(), "2.5");
    assert_eq!(Cell::Bool(true).render().unwrap(), "True");
    assert_eq!(Cell::Text("Asia".into()).render().unwrap(), "Asia");
    assert!(Cell::Missing.render().is_none());
}

#[test]
fn test_cell_from_json() {
    assert_eq!(Cell::from_json(&json!(null)), Cell::Missing);
    assert_eq!(Cell::from_json(&json!(4)), Cell::Number(4.0));
    assert_eq!(Cell::from_json(&json!("x")), Cell::Text("x".into()));
    assert_eq!(Cell::from_json(&json!(false)), Cell::Bool(false));
    assert_eq!(Cell::Text(" 12 ".into()).as_f64(), Some(12.0));
}

#[test]
fn test_non_finite_values_are_not_numeric() {
    for text in ["NaN", "inf", "-inf", "infinity"] {
        assert_eq!(Cell::Text(text.into()).as_f64(), None, "{}", text);
    }
    assert_eq!(Cell::Number(f64::NAN).as_f64(), None);
    assert_eq!(Cell::Text("-1e3".into()).as_f64(), Some(-1000.0));
}

#[test]
fn test_load_csv_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", SAMPLE).unwrap();
    let frame = load_csv(file.path()).unwrap();
    assert_eq!(frame.n_rows(), 3);
}

#[test]
fn test_ragged_rows_rejected() {
    let bad = "a,b\n1,2\n3\n";
    assert!(read_frame(bad.as_bytes()).is_err());
}
