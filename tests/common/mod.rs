//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use bicycle_id::data::model::{FittedRun, InputMatrix, RunMetadata};
use bicycle_id::{FrequencyGrid, RunCollection, RunRecord};
use nalgebra::Matrix4;

/// A stable, lightly coupled state matrix whose entries depend on speed.
pub fn state_matrix(speed: f64) -> Matrix4<f64> {
    Matrix4::new(
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, //
        -8.0, 2.0 - speed, -0.5, -speed, //
        3.0, -2.0 - speed * speed, 0.3 * speed, -3.0 - speed,
    )
}

pub fn input_matrix() -> InputMatrix {
    InputMatrix::from_column_slice(&[0.0, 0.0, -0.5, 5.0])
}

/// One run with every metadata field given.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub run_id: &'static str,
    pub rider: &'static str,
    pub maneuver: &'static str,
    pub environment: &'static str,
    pub speed_bin: f64,
    pub speed: f64,
    pub duration: f64,
    pub mean_fit: f64,
}

impl RunSpec {
    pub fn new(run_id: &'static str, speed: f64) -> Self {
        RunSpec {
            run_id,
            rider: "Jason",
            maneuver: "Balance",
            environment: "Horse Treadmill",
            speed_bin: speed,
            speed,
            duration: 30.0,
            mean_fit: 0.8,
        }
    }

    pub fn record(&self) -> RunRecord {
        RunRecord::new(
            FittedRun {
                run_id: self.run_id.to_string(),
                speed: self.speed,
                duration: self.duration,
                fits: [self.mean_fit; 4],
                state_matrix: state_matrix(self.speed),
                input_matrix: input_matrix(),
            },
            RunMetadata {
                rider: self.rider.to_string(),
                maneuver: self.maneuver.to_string(),
                environment: self.environment.to_string(),
                speed_bin: self.speed_bin,
            },
        )
    }
}

pub fn grid() -> FrequencyGrid {
    FrequencyGrid::logspace(-1.0, 2.0, 40).unwrap()
}

pub fn collection(specs: &[RunSpec]) -> RunCollection {
    RunCollection::new(specs.iter().map(RunSpec::record).collect(), grid()).unwrap()
}

/// Columnar JSON run file for `specs`.
pub fn run_json(specs: &[RunSpec]) -> String {
    let rows = |m: &Matrix4<f64>| -> Vec<Vec<f64>> {
        (0..4).map(|i| (0..4).map(|j| m[(i, j)]).collect()).collect()
    };
    let b = input_matrix();
    serde_json::json!({
        "matFiles": specs.iter().map(|s| format!("{}.mat", s.run_id)).collect::<Vec<_>>(),
        "speeds": specs.iter().map(|s| s.speed).collect::<Vec<_>>(),
        "durations": specs.iter().map(|s| s.duration).collect::<Vec<_>>(),
        "fits": specs.iter().map(|s| vec![s.mean_fit; 4]).collect::<Vec<_>>(),
        "stateMatrices": specs.iter().map(|s| rows(&state_matrix(s.speed))).collect::<Vec<_>>(),
        "inputMatrices": specs
            .iter()
            .map(|_| (0..4).map(|i| vec![b[(i, 0)]]).collect::<Vec<_>>())
            .collect::<Vec<_>>(),
    })
    .to_string()
}

/// CSV run table for `specs`.
pub fn metadata_csv(specs: &[RunSpec]) -> String {
    let mut out = String::from("RunID,Rider,Maneuver,Environment,Speed\n");
    for s in specs {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            s.run_id, s.rider, s.maneuver, s.environment, s.speed_bin
        ));
    }
    out
}

/// A fresh scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bicycle_id_{}_{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
