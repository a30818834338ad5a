use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use nalgebra::Matrix4;

use crate::data::model::{InputMatrix, Subset};
use crate::error::Result;

/// Column names of the acceleration-equation entries: `a31..a34, a41..a44`
/// followed by the bottom two rows of B (`b31, b41` or `b31, b32, b41, b42`).
pub fn coefficient_names(inputs: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(8 + 2 * inputs);
    for i in 3..=4 {
        for j in 1..=4 {
            names.push(format!("a{i}{j}"));
        }
    }
    for i in 3..=4 {
        for j in 1..=inputs {
            names.push(format!("b{i}{j}"));
        }
    }
    names
}

/// Flattened bottom two rows of A and B, in [`coefficient_names`] order.
pub fn acceleration_coefficients(a: &Matrix4<f64>, b: &InputMatrix) -> Vec<f64> {
    let mut values = Vec::with_capacity(8 + 2 * b.ncols());
    for i in 2..4 {
        values.extend((0..4).map(|j| a[(i, j)]));
    }
    for i in 2..4 {
        values.extend((0..b.ncols()).map(|j| b[(i, j)]));
    }
    values
}

/// One row of a coefficient table.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientRow {
    /// Run identifier for experimental rows, `None` for model rows.
    pub run_id: Option<String>,
    pub speed: f64,
    pub values: Vec<f64>,
}

/// Acceleration-equation coefficients, one row per run or model speed.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientTable {
    pub columns: Vec<String>,
    pub rows: Vec<CoefficientRow>,
}

impl CoefficientTable {
    pub fn new(inputs: usize) -> Self {
        CoefficientTable {
            columns: coefficient_names(inputs),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one named column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    pub fn speeds(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.speed).collect()
    }

    /// Columnar Arrow view: optional `RunID`, `Speed`, then one Float64
    /// column per coefficient.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let with_ids = self.rows.iter().any(|r| r.run_id.is_some());

        let mut fields = Vec::with_capacity(self.columns.len() + 2);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len() + 2);

        if with_ids {
            fields.push(Field::new("RunID", DataType::Utf8, true));
            arrays.push(Arc::new(StringArray::from(
                self.rows
                    .iter()
                    .map(|r| r.run_id.as_deref())
                    .collect::<Vec<_>>(),
            )));
        }
        fields.push(Field::new("Speed", DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(self.speeds())));

        for (idx, name) in self.columns.iter().enumerate() {
            fields.push(Field::new(name, DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from(
                self.rows.iter().map(|r| r.values[idx]).collect::<Vec<_>>(),
            )));
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

/// Coefficients of every run in a subset, keyed by run identifier.
pub fn experimental_coefficients(subset: &Subset<'_>) -> CoefficientTable {
    let inputs = subset.collection().input_count().unwrap_or(1);
    let mut table = CoefficientTable::new(inputs);
    table.rows = subset
        .records()
        .map(|r| CoefficientRow {
            run_id: Some(r.run_id.clone()),
            speed: r.speed,
            values: acceleration_coefficients(&r.state_matrix, &r.input_matrix),
        })
        .collect();
    table
}
