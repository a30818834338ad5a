//! Run file formats and the run table join

mod common;

use std::sync::Arc;

use arrow::array::{Float64Array, Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bicycle_id::data::loader::load_run_matrices;
use bicycle_id::{load, Error, MetadataSource, MetadataTable};
use common::{input_matrix, metadata_csv, run_json, scratch_dir, state_matrix, RunSpec};
use parquet::arrow::ArrowWriter;

fn specs() -> Vec<RunSpec> {
    vec![RunSpec::new("00105", 4.0), RunSpec::new("00106", 2.0)]
}

fn row_major(m: &nalgebra::Matrix4<f64>) -> String {
    (0..4)
        .flat_map(|i| (0..4).map(move |j| m[(i, j)].to_string()))
        .collect::<Vec<_>>()
        .join(";")
}

fn list_column(rows: &[Vec<f64>]) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    builder.finish()
}

#[test]
fn json_csv_and_parquet_agree() {
    let specs = specs();
    let dir = scratch_dir("formats");

    let json = dir.join("runs.json");
    std::fs::write(&json, run_json(&specs)).unwrap();

    let csv = dir.join("runs.csv");
    let mut text = String::from("run_id,speed,duration,fits,state_matrix,input_matrix\n");
    for s in &specs {
        text.push_str(&format!(
            "{}.mat,{},{},{f};{f};{f};{f},{},0;0;-0.5;5\n",
            s.run_id,
            s.speed,
            s.duration,
            row_major(&state_matrix(s.speed)),
            f = s.mean_fit,
        ));
    }
    std::fs::write(&csv, text).unwrap();

    let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let schema = Arc::new(Schema::new(vec![
        Field::new("run_id", DataType::Utf8, false),
        Field::new("speed", DataType::Float64, false),
        Field::new("duration", DataType::Float64, false),
        Field::new("fits", list_type.clone(), false),
        Field::new("state_matrix", list_type.clone(), false),
        Field::new("input_matrix", list_type, false),
    ]));
    let a_rows: Vec<Vec<f64>> = specs
        .iter()
        .map(|s| state_matrix(s.speed).transpose().iter().copied().collect())
        .collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(vec!["00105.mat", "00106.mat"])),
            Arc::new(Float64Array::from(vec![4.0, 2.0])),
            Arc::new(Float64Array::from(vec![30.0, 30.0])),
            Arc::new(list_column(&[vec![0.8; 4], vec![0.8; 4]])),
            Arc::new(list_column(&a_rows)),
            Arc::new(list_column(&vec![input_matrix().as_slice().to_vec(); 2])),
        ],
    )
    .unwrap();
    let parquet = dir.join("runs.parquet");
    let mut writer =
        ArrowWriter::try_new(std::fs::File::create(&parquet).unwrap(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let from_json = load_run_matrices(&json).unwrap().into_fitted_runs().unwrap();
    let from_csv = load_run_matrices(&csv).unwrap().into_fitted_runs().unwrap();
    let from_parquet = load_run_matrices(&parquet).unwrap().into_fitted_runs().unwrap();
    assert_eq!(from_json, from_csv);
    assert_eq!(from_json, from_parquet);
    assert_eq!(from_json[0].run_id, "00105");
    assert_eq!(from_json[1].state_matrix, state_matrix(2.0));
}

#[test]
fn missing_metadata_row_is_malformed_input() {
    let specs = specs();
    let dir = scratch_dir("missing_row");
    let runs = dir.join("runs.json");
    std::fs::write(&runs, run_json(&specs)).unwrap();

    let metadata = MetadataTable::from_reader(metadata_csv(&specs[..1]).as_bytes()).unwrap();
    assert!(matches!(metadata.lookup("00106"), Err(Error::RecordNotFound(_))));

    let err = load(&runs, &metadata, common::grid()).unwrap_err();
    assert!(matches!(err, Error::MalformedInput(ref msg) if msg.contains("00106")));
    assert!(err.is_input_error());
}

#[test]
fn run_table_with_extra_rows_is_malformed_input() {
    let specs = specs();
    let dir = scratch_dir("extra_rows");
    let runs = dir.join("runs.json");
    std::fs::write(&runs, run_json(&specs[..1])).unwrap();

    let metadata = MetadataTable::from_reader(metadata_csv(&specs).as_bytes()).unwrap();
    assert_eq!(metadata.len(), 2);
    let err = load(&runs, &metadata, common::grid()).unwrap_err();
    assert!(matches!(err, Error::MalformedInput(ref msg) if msg.contains("1 runs")));
}

#[test]
fn null_scalars_in_parquet_are_malformed_input() {
    let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let schema = Arc::new(Schema::new(vec![
        Field::new("run_id", DataType::Utf8, false),
        Field::new("speed", DataType::Float64, true),
        Field::new("duration", DataType::Float64, true),
        Field::new("fits", list_type.clone(), false),
        Field::new("state_matrix", list_type.clone(), false),
        Field::new("input_matrix", list_type, false),
    ]));
    let a_row: Vec<f64> = state_matrix(4.0).transpose().iter().copied().collect();
    let b_row = input_matrix().as_slice().to_vec();

    for (name, speed, duration) in [("speed", None, Some(30.0)), ("duration", Some(4.0), None)] {
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["00105.mat"])),
                Arc::new(Float64Array::from(vec![speed])),
                Arc::new(Float64Array::from(vec![duration])),
                Arc::new(list_column(&[vec![0.8; 4]])),
                Arc::new(list_column(&[a_row.clone()])),
                Arc::new(list_column(&[b_row.clone()])),
            ],
        )
        .unwrap();
        let path = scratch_dir(&format!("null_{name}")).join("runs.parquet");
        let mut writer =
            ArrowWriter::try_new(std::fs::File::create(&path).unwrap(), schema.clone(), None)
                .unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = load_run_matrices(&path).unwrap_err();
        assert!(
            matches!(err, Error::MalformedInput(ref msg) if msg.contains(name)),
            "null {name} gave {err}"
        );
    }
}

#[test]
fn duplicate_run_table_rows_are_rejected() {
    let mut text = metadata_csv(&specs());
    text.push_str("00105,Luke,Balance,Pavillion Floor,4.0\n");
    let err = MetadataTable::from_reader(text.as_bytes()).unwrap_err();
    assert!(matches!(err, Error::MalformedInput(_)));
}

#[test]
fn unsupported_extension() {
    let dir = scratch_dir("extension");
    let path = dir.join("runs.mat");
    std::fs::write(&path, b"not a run file").unwrap();
    assert!(matches!(load_run_matrices(&path), Err(Error::MalformedInput(_))));
}

#[test]
fn missing_file_is_io_error() {
    let dir = scratch_dir("missing_file");
    let err = load_run_matrices(&dir.join("absent.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
