use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bicycle_id::{FirstPrinciplesModel, InputSet, Rider, SpeedBin};
use parquet::arrow::ArrowWriter;
use serde::Serialize;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}

const MANEUVERS: [&str; 4] = [
    "Balance",
    "Track Straight Line",
    "Balance With Disturbance",
    "Track Straight Line With Disturbance",
];
const ENVIRONMENTS: [&str; 2] = ["Horse Treadmill", "Pavillion Floor"];
const RUNS_PER_BIN: usize = 3;

/// One row of the run table.
#[derive(Serialize)]
struct MetadataRow<'a> {
    #[serde(rename = "RunID")]
    run_id: String,
    #[serde(rename = "Rider")]
    rider: &'a str,
    #[serde(rename = "Maneuver")]
    maneuver: &'a str,
    #[serde(rename = "Environment")]
    environment: &'a str,
    #[serde(rename = "Speed")]
    speed: f64,
}

fn list_column(rows: &[Vec<f64>]) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        let values = builder.values();
        for &v in row {
            values.append_value(v);
        }
        builder.append(true);
    }
    builder.finish()
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let mut run_ids: Vec<String> = Vec::new();
    let mut speeds: Vec<f64> = Vec::new();
    let mut durations: Vec<f64> = Vec::new();
    let mut fits: Vec<Vec<f64>> = Vec::new();
    let mut state_matrices: Vec<Vec<f64>> = Vec::new();
    let mut input_matrices: Vec<Vec<f64>> = Vec::new();
    let mut metadata: Vec<MetadataRow> = Vec::new();

    let mut run_no = 100;
    for rider in Rider::ALL {
        let model =
            FirstPrinciplesModel::from_parameters(rider, InputSet::SteerTorque, rider.default_parameters());

        for bin in SpeedBin::ALL {
            for _ in 0..RUNS_PER_BIN {
                let speed = bin.value() + rng.gauss(0.0, 0.05);
                let (a, b) = model
                    .state_space(speed)
                    .with_context(|| format!("{rider} model at {speed:.2} m/s"))?;

                // Identified matrices scatter around the first-principles ones.
                let mut state_row_major: Vec<f64> = a.transpose().iter().copied().collect();
                for v in &mut state_row_major[8..] {
                    *v *= 1.0 + rng.gauss(0.0, 0.1);
                }
                let mut input_row_major: Vec<f64> = b.transpose().iter().copied().collect();
                for v in &mut input_row_major[2..] {
                    *v *= 1.0 + rng.gauss(0.0, 0.1);
                }

                let run_id = format!("{run_no:05}");
                run_ids.push(format!("{run_id}.mat"));
                speeds.push(speed);
                durations.push(rng.uniform(10.0, 60.0));
                fits.push((0..4).map(|_| rng.uniform(0.3, 0.98)).collect());
                state_matrices.push(state_row_major);
                input_matrices.push(input_row_major);
                metadata.push(MetadataRow {
                    run_id,
                    rider: rider.name(),
                    maneuver: rng.pick(&MANEUVERS),
                    environment: rng.pick(&ENVIRONMENTS),
                    speed: bin.value(),
                });
                run_no += 1;
            }
        }
    }

    let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let schema = Arc::new(Schema::new(vec![
        Field::new("run_id", DataType::Utf8, false),
        Field::new("speed", DataType::Float64, false),
        Field::new("duration", DataType::Float64, false),
        Field::new("fits", list_type.clone(), false),
        Field::new("state_matrix", list_type.clone(), false),
        Field::new("input_matrix", list_type, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(
                run_ids.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(speeds)),
            Arc::new(Float64Array::from(durations)),
            Arc::new(list_column(&fits)),
            Arc::new(list_column(&state_matrices)),
            Arc::new(list_column(&input_matrices)),
        ],
    )
    .context("building run batch")?;

    // Write Parquet
    let runs_path = "sample_runs.parquet";
    let file = std::fs::File::create(runs_path).context("creating run file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;

    let metadata_path = "sample_metadata.csv";
    let mut csv_writer = csv::Writer::from_path(metadata_path).context("creating run table")?;
    for row in &metadata {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;

    println!(
        "Wrote {} runs to {runs_path} and their run table to {metadata_path}",
        metadata.len()
    );
    Ok(())
}
