use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Float32Array, Float64Array, LargeListArray, LargeStringArray, ListArray, StringArray};
use arrow::datatypes::DataType;
use log::info;
use nalgebra::{Dyn, Matrix4, U4};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;

use super::metadata::MetadataSource;
use super::model::{FittedRun, FrequencyGrid, InputMatrix, RunCollection, RunRecord, STATE_COUNT};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the run matrix file, join every run with its metadata row and build
/// the collection with its derived responses and eigenvalues.
///
/// A run without a metadata row, or a run table whose row count differs
/// from the number of runs, aborts the load with [`Error::MalformedInput`];
/// no partial collection is returned.
pub fn load<M>(path: &Path, metadata: &M, grid: FrequencyGrid) -> Result<RunCollection>
where
    M: MetadataSource + ?Sized,
{
    let fitted = load_run_matrices(path)?.into_fitted_runs()?;

    let mut runs = Vec::with_capacity(fitted.len());
    for run in fitted {
        let row = metadata.lookup(&run.run_id).map_err(|e| match e {
            Error::RecordNotFound(id) => {
                Error::MalformedInput(format!("run {id} has no row in the run table"))
            }
            other => other,
        })?;
        runs.push(RunRecord::new(run, row));
    }
    if metadata.len() != runs.len() {
        return Err(Error::MalformedInput(format!(
            "run file lists {} runs but the run table has {} rows",
            runs.len(),
            metadata.len()
        )));
    }

    let collection = RunCollection::new(runs, grid)?;
    info!("Loaded {} runs from {}", collection.len(), path.display());
    Ok(collection)
}

/// Read the run matrix file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json`    – columnar document with parallel arrays (see [`RunMatrices`])
/// * `.parquet` – one row per run, list columns for fits and matrices
/// * `.csv`     – same columns as Parquet, lists separated by semicolons
pub fn load_run_matrices(path: &Path) -> Result<RunMatrices> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        "csv" => load_csv(path),
        other => Err(Error::MalformedInput(format!(
            "unsupported run file extension: .{other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// RunMatrices – parallel per-run sequences
// ---------------------------------------------------------------------------

/// Per-run fields as parallel sequences, exactly as stored in the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMatrices {
    pub run_ids: Vec<String>,
    pub speeds: Vec<f64>,
    pub durations: Vec<f64>,
    pub fits: Vec<Vec<f64>>,
    pub state_matrices: Vec<Matrix4<f64>>,
    pub input_matrices: Vec<InputMatrix>,
}

impl RunMatrices {
    pub fn len(&self) -> usize {
        self.run_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.run_ids.is_empty()
    }

    /// Zip the parallel sequences into runs, checking that every sequence
    /// has one entry per run and every run has one fit per state.
    pub fn into_fitted_runs(self) -> Result<Vec<FittedRun>> {
        let n = self.run_ids.len();
        for (name, len) in [
            ("speeds", self.speeds.len()),
            ("durations", self.durations.len()),
            ("fits", self.fits.len()),
            ("state matrices", self.state_matrices.len()),
            ("input matrices", self.input_matrices.len()),
        ] {
            if len != n {
                return Err(Error::MalformedInput(format!(
                    "{name} has {len} entries but the file lists {n} runs"
                )));
            }
        }

        let mut runs = Vec::with_capacity(n);
        let columns = self
            .speeds
            .into_iter()
            .zip(self.durations)
            .zip(self.fits)
            .zip(self.state_matrices)
            .zip(self.input_matrices);
        for (run_id, ((((speed, duration), fits), state_matrix), input_matrix)) in
            self.run_ids.into_iter().zip(columns)
        {
            let fits: [f64; STATE_COUNT] = fits.as_slice().try_into().map_err(|_| {
                Error::MalformedInput(format!(
                    "run {run_id}: expected {STATE_COUNT} fits, found {}",
                    fits.len()
                ))
            })?;
            runs.push(FittedRun {
                run_id: strip_extension(&run_id),
                speed,
                duration,
                fits,
                state_matrix,
                input_matrix,
            });
        }
        Ok(runs)
    }
}

/// `00105.mat` → `00105`
fn strip_extension(run_id: &str) -> String {
    Path::new(run_id)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(run_id)
        .to_string()
}

fn state_matrix_from_row_major(values: &[f64], run: usize) -> Result<Matrix4<f64>> {
    if values.len() != STATE_COUNT * STATE_COUNT {
        return Err(Error::MalformedInput(format!(
            "run {run}: state matrix has {} entries, expected 16",
            values.len()
        )));
    }
    Ok(Matrix4::from_row_slice(values))
}

fn input_matrix_from_row_major(values: &[f64], run: usize) -> Result<InputMatrix> {
    let inputs = values.len() / STATE_COUNT;
    if values.len() % STATE_COUNT != 0 || !(1..=2).contains(&inputs) {
        return Err(Error::MalformedInput(format!(
            "run {run}: input matrix has {} entries, expected 4 or 8",
            values.len()
        )));
    }
    Ok(InputMatrix::from_row_slice_generic(U4, Dyn(inputs), values))
}

fn flatten_rows(rows: &[Vec<f64>], run: usize, what: &str) -> Result<Vec<f64>> {
    if rows.len() != STATE_COUNT {
        return Err(Error::MalformedInput(format!(
            "run {run}: {what} has {} rows, expected {STATE_COUNT}",
            rows.len()
        )));
    }
    let width = rows[0].len();
    if rows.iter().any(|r| r.len() != width) {
        return Err(Error::MalformedInput(format!("run {run}: {what} rows differ in length")));
    }
    Ok(rows.concat())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Columnar layout, one array entry per run:
///
/// ```json
/// {
///   "matFiles": ["00105.mat", ...],
///   "speeds": [4.1, ...],
///   "durations": [20.0, ...],
///   "fits": [[0.8, 0.9, 0.6, 0.7], ...],
///   "stateMatrices": [[[..4..], [..4..], [..4..], [..4..]], ...],
///   "inputMatrices": [[[b11], [b21], [b31], [b41]], ...]
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonRunFile {
    mat_files: Vec<String>,
    speeds: Vec<f64>,
    durations: Vec<f64>,
    fits: Vec<Vec<f64>>,
    state_matrices: Vec<Vec<Vec<f64>>>,
    input_matrices: Vec<Vec<Vec<f64>>>,
}

fn load_json(path: &Path) -> Result<RunMatrices> {
    let text = std::fs::read_to_string(path)?;
    parse_json(&text)
}

pub(crate) fn parse_json(text: &str) -> Result<RunMatrices> {
    let file: JsonRunFile = serde_json::from_str(text)?;

    let state_matrices = file
        .state_matrices
        .iter()
        .enumerate()
        .map(|(i, rows)| state_matrix_from_row_major(&flatten_rows(rows, i, "state matrix")?, i))
        .collect::<Result<Vec<_>>>()?;
    let input_matrices = file
        .input_matrices
        .iter()
        .enumerate()
        .map(|(i, rows)| input_matrix_from_row_major(&flatten_rows(rows, i, "input matrix")?, i))
        .collect::<Result<Vec<_>>>()?;

    Ok(RunMatrices {
        run_ids: file.mat_files,
        speeds: file.speeds,
        durations: file.durations,
        fits: file.fits,
        state_matrices,
        input_matrices,
    })
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with `run_id, speed, duration, fits,
/// state_matrix, input_matrix`. The last three hold semicolon-separated
/// floats, matrices in row-major order:
///   `"0.8;0.9;0.6;0.7"`
fn load_csv(path: &Path) -> Result<RunMatrices> {
    let reader = csv::Reader::from_path(path)?;
    read_csv(reader)
}

pub(crate) fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<RunMatrices> {
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::MalformedInput(format!("CSV missing '{name}' column")))
    };
    let id_idx = position("run_id")?;
    let speed_idx = position("speed")?;
    let duration_idx = position("duration")?;
    let fits_idx = position("fits")?;
    let a_idx = position("state_matrix")?;
    let b_idx = position("input_matrix")?;

    let mut out = RunMatrices::default();

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        out.run_ids.push(field(id_idx).to_string());
        out.speeds.push(parse_float(field(speed_idx), row_no, "speed")?);
        out.durations.push(parse_float(field(duration_idx), row_no, "duration")?);
        out.fits.push(parse_semicolon_floats(field(fits_idx), row_no, "fits")?);
        out.state_matrices.push(state_matrix_from_row_major(
            &parse_semicolon_floats(field(a_idx), row_no, "state_matrix")?,
            row_no,
        )?);
        out.input_matrices.push(input_matrix_from_row_major(
            &parse_semicolon_floats(field(b_idx), row_no, "input_matrix")?,
            row_no,
        )?);
    }

    Ok(out)
}

fn parse_float(s: &str, row: usize, col: &str) -> Result<f64> {
    s.trim().parse::<f64>().map_err(|_| {
        Error::MalformedInput(format!("Row {row}, {col}: '{s}' is not a number"))
    })
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| parse_float(tok, row, &format!("{col}[{j}]")))
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Expected schema:
/// - `run_id`: Utf8 or LargeUtf8
/// - `speed`, `duration`: Float64 or Float32
/// - `fits`, `state_matrix`, `input_matrix`: List<Float64> or
///   LargeList<Float64>, matrices row-major
fn load_parquet(path: &Path) -> Result<RunMatrices> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut out = RunMatrices::default();

    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();
        let column = |name: &str| {
            schema
                .index_of(name)
                .map(|i| batch.column(i))
                .map_err(|_| Error::MalformedInput(format!("Parquet file missing '{name}' column")))
        };
        let ids = column("run_id")?;
        let speeds = column("speed")?;
        let durations = column("duration")?;
        let fits = column("fits")?;
        let a = column("state_matrix")?;
        let b = column("input_matrix")?;

        for row in 0..batch.num_rows() {
            let run = out.len();
            out.run_ids.push(extract_string(ids, row)?);
            out.speeds.push(extract_f64(speeds, row, "speed")?);
            out.durations.push(extract_f64(durations, row, "duration")?);
            out.fits.push(extract_f64_list(fits, row)?);
            out.state_matrices
                .push(state_matrix_from_row_major(&extract_f64_list(a, row)?, run)?);
            out.input_matrices
                .push(input_matrix_from_row_major(&extract_f64_list(b, row)?, run)?);
        }
    }

    Ok(out)
}

// -- Parquet / Arrow helpers --

fn extract_string(col: &Arc<dyn Array>, row: usize) -> Result<String> {
    if col.is_null(row) {
        return Err(Error::MalformedInput(format!("Row {row}: null run_id")));
    }
    if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
        Ok(s.value(row).to_string())
    } else if let Some(s) = col.as_any().downcast_ref::<LargeStringArray>() {
        Ok(s.value(row).to_string())
    } else {
        Err(Error::MalformedInput(format!(
            "run_id column is {:?}, expected Utf8",
            col.data_type()
        )))
    }
}

fn extract_f64(col: &Arc<dyn Array>, row: usize, name: &str) -> Result<f64> {
    if col.is_null(row) {
        return Err(Error::MalformedInput(format!("Row {row}: null {name}")));
    }
    if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        Ok(arr.value(row))
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        Ok(arr.value(row) as f64)
    } else {
        Err(Error::MalformedInput(format!(
            "expected Float64 or Float32 column, got {:?}",
            col.data_type()
        )))
    }
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        return Err(Error::MalformedInput(format!("Row {row}: null value in list column")));
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .map(|list| list.value(row)),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .map(|list| list.value(row)),
        _ => None,
    }
    .ok_or_else(|| {
        Error::MalformedInput(format!(
            "Expected List or LargeList column, got {:?}",
            col.data_type()
        ))
    })?;

    // The inner array can be Float64 or Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        Err(Error::MalformedInput(format!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )))
    }
}
